//! PLAIN (RFC 4616).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Builds the single PLAIN client message.
///
/// Format: `\0<username>\0<password>`, base64-encoded. The authorization
/// identity is left empty, so the server derives it from the authentication
/// identity.
#[must_use]
pub fn message(username: &str, password: &str) -> String {
    let raw = format!("\0{username}\0{password}");
    STANDARD.encode(raw.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4616_example() {
        // RFC 4616 section 4: tim / tanstaaftanstaaf
        let msg = message("tim", "tanstaaftanstaaf");
        let decoded = STANDARD.decode(&msg).unwrap();
        assert_eq!(decoded, b"\0tim\0tanstaaftanstaaf");
    }

    #[test]
    fn empty_credentials_still_encode() {
        let msg = message("", "");
        let decoded = STANDARD.decode(&msg).unwrap();
        assert_eq!(decoded, b"\0\0");
    }
}
