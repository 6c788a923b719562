//! The conversation state machine.
//!
//! [`Engine`] is sans-I/O: the session layer feeds it response lines and
//! acts on what it returns. This keeps every conversation shape (TLS
//! branching, mechanism selection, the FETCH handoff) testable without a
//! socket.

mod engine;
mod state;

pub use engine::{Action, Engine};
pub use state::State;
