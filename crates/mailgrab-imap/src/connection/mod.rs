//! Connection management: configuration, transport streams, line framing
//! and the session lifecycle.

mod config;
mod framed;
mod session;
mod stream;

pub use config::{Config, ConfigBuilder, Credentials, Security};
pub use framed::FramedStream;
pub use session::ImapSession;
pub use stream::{ImapStream, connect};
