//! Legacy LOGIN mechanism.
//!
//! LOGIN has no formal specification; the server prompts twice and the
//! client answers with the base64 username and then the base64 password.
//! The same encoding serves as the initial response when SASL-IR is in use.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encodes one LOGIN answer (the username or the password).
#[must_use]
pub fn message(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}
