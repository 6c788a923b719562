//! CRAM-MD5 (RFC 2195).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{SaslError, hmac_md5, to_hex};

/// Builds the CRAM-MD5 response to a server challenge.
///
/// The challenge arrives base64-encoded in the continuation line. A bare
/// `=` (or nothing at all) stands for an empty challenge. The reply is
/// `<username> <hex HMAC-MD5 of the challenge keyed with the password>`,
/// base64-encoded.
pub fn message(challenge_b64: &str, username: &str, password: &str) -> Result<String, SaslError> {
    let challenge_b64 = challenge_b64.trim();
    let challenge = if challenge_b64.is_empty() || challenge_b64 == "=" {
        Vec::new()
    } else {
        STANDARD.decode(challenge_b64)?
    };

    let digest = hmac_md5(password.as_bytes(), &challenge)?;
    let reply = format!("{username} {}", to_hex(&digest));

    Ok(STANDARD.encode(reply.as_bytes()))
}
