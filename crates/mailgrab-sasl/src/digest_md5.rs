//! DIGEST-MD5 (RFC 2831).
//!
//! The server challenge carries `realm`, `nonce` and `qop` directives; the
//! client answers with a digest computed over the credentials, both nonces
//! and the digest URI. The server then proves mutual knowledge in a second
//! continuation round, which the engine answers with an empty line.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};

use crate::{SaslError, to_hex};

const MECHANISM: &str = "DIGEST-MD5";

/// Builds the DIGEST-MD5 digest-response for a server challenge.
///
/// `service` is the registered GSS service name, `imap` for this client;
/// together with the realm it forms the digest URI (`imap/<realm>`).
pub fn message(
    challenge_b64: &str,
    username: &str,
    password: &str,
    service: &str,
) -> Result<String, SaslError> {
    let cnonce = to_hex(&rand::random::<[u8; 16]>());
    respond(challenge_b64, username, password, service, &cnonce)
}

fn respond(
    challenge_b64: &str,
    username: &str,
    password: &str,
    service: &str,
    cnonce: &str,
) -> Result<String, SaslError> {
    let raw = STANDARD.decode(challenge_b64.trim())?;
    let text = std::str::from_utf8(&raw).map_err(|_| SaslError::Challenge {
        mechanism: MECHANISM,
        reason: "challenge is not UTF-8",
    })?;

    let mut realm = "";
    let mut nonce = None;
    let mut qop_values = None;
    for (key, value) in directives(text) {
        match key {
            "realm" => realm = value,
            "nonce" => nonce = Some(value),
            "qop" => qop_values = Some(value),
            _ => {}
        }
    }

    let nonce = nonce.ok_or(SaslError::Challenge {
        mechanism: MECHANISM,
        reason: "challenge carries no nonce",
    })?;
    if let Some(qop) = qop_values {
        if !qop.split(',').any(|v| v.trim() == "auth") {
            return Err(SaslError::Challenge {
                mechanism: MECHANISM,
                reason: "server does not offer qop=auth",
            });
        }
    }

    let nc = "00000001";
    let qop = "auth";
    let uri = format!("{service}/{realm}");

    // A1 = H( H(username:realm:password) : nonce : cnonce )
    let mut hash = Md5::new();
    hash.update(username.as_bytes());
    hash.update(b":");
    hash.update(realm.as_bytes());
    hash.update(b":");
    hash.update(password.as_bytes());
    let credentials: [u8; 16] = hash.finalize().into();

    let mut hash = Md5::new();
    hash.update(credentials);
    hash.update(b":");
    hash.update(nonce.as_bytes());
    hash.update(b":");
    hash.update(cnonce.as_bytes());
    let ha1 = to_hex(hash.finalize().as_slice());

    let ha2 = to_hex(Md5::digest(format!("AUTHENTICATE:{uri}").as_bytes()).as_slice());

    let response = to_hex(
        Md5::digest(format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}").as_bytes()).as_slice(),
    );

    let reply = format!(
        "username=\"{username}\",realm=\"{realm}\",nonce=\"{nonce}\",cnonce=\"{cnonce}\",\
         nc={nc},digest-uri=\"{uri}\",response={response},qop={qop}"
    );

    Ok(STANDARD.encode(reply.as_bytes()))
}

/// Iterates `key=value` directives, honoring quoted values with embedded
/// commas.
fn directives(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        while pos < bytes.len() && (bytes[pos] == b',' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        let key_start = pos;
        while pos < bytes.len() && bytes[pos] != b'=' && bytes[pos] != b',' {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            continue;
        }
        let key = text[key_start..pos].trim();
        pos += 1;

        let value = if bytes.get(pos) == Some(&b'"') {
            pos += 1;
            let value_start = pos;
            while pos < bytes.len() && bytes[pos] != b'"' {
                pos += 1;
            }
            let value = &text[value_start..pos];
            pos += 1;
            value
        } else {
            let value_start = pos;
            while pos < bytes.len() && bytes[pos] != b',' {
                pos += 1;
            }
            text[value_start..pos].trim()
        };

        out.push((key, value));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_parsing_handles_quotes() {
        let parsed = directives(r#"realm="elwood.innosoft.com",nonce="OA6MG9tEQGm2hh",qop="auth",algorithm=md5-sess,charset=utf-8"#);
        assert_eq!(parsed[0], ("realm", "elwood.innosoft.com"));
        assert_eq!(parsed[1], ("nonce", "OA6MG9tEQGm2hh"));
        assert_eq!(parsed[2], ("qop", "auth"));
        assert_eq!(parsed[3], ("algorithm", "md5-sess"));
    }

    #[test]
    fn rfc2831_worked_example() {
        // RFC 2831 section 4: chris/secret against elwood.innosoft.com with
        // a pinned cnonce.
        let challenge = STANDARD.encode(
            r#"realm="elwood.innosoft.com",nonce="OA6MG9tEQGm2hh",qop="auth",algorithm=md5-sess,charset=utf-8"#,
        );
        let msg = respond(&challenge, "chris", "secret", "imap", "OA6MHXh6VqTrRk").unwrap();
        let decoded = String::from_utf8(STANDARD.decode(&msg).unwrap()).unwrap();

        assert!(decoded.contains("username=\"chris\""));
        assert!(decoded.contains("digest-uri=\"imap/elwood.innosoft.com\""));
        assert!(decoded.contains("response=d388dad90d4bbd760a152321f2143af7"));
        assert!(decoded.contains("qop=auth"));
    }

    #[test]
    fn challenge_without_nonce_is_rejected() {
        let challenge = STANDARD.encode(r#"realm="x",qop="auth""#);
        assert!(matches!(
            message(&challenge, "user", "secret", "imap"),
            Err(SaslError::Challenge { .. })
        ));
    }

    #[test]
    fn challenge_without_auth_qop_is_rejected() {
        let challenge = STANDARD.encode(r#"nonce="abc",qop="auth-conf""#);
        assert!(matches!(
            message(&challenge, "user", "secret", "imap"),
            Err(SaslError::Challenge { .. })
        ));
    }
}
