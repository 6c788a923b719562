//! Core types shared across the crate.

mod capability;

pub use capability::{Capabilities, Status};
pub use mailgrab_sasl::{Mechanism, MechanismSet};
