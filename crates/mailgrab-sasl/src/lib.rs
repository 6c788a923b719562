//! # mailgrab-sasl
//!
//! SASL payload builders for the IMAP `AUTHENTICATE` exchange.
//!
//! Each mechanism module turns credentials (and, for challenge-response
//! mechanisms, the server challenge) into the base64 line the client sends
//! as continuation data. The protocol engine decides *when* each payload is
//! sent; this crate only decides *what* the bytes are.
//!
//! Supported mechanisms:
//!
//! - [`plain`]: RFC 4616, single client-first message
//! - [`login`]: legacy user/password round-trips
//! - [`cram_md5`]: RFC 2195 keyed-MD5 challenge response
//! - [`digest_md5`]: RFC 2831 digest challenge response
//! - [`ntlm`]: MS-NLMP negotiate/authenticate with NTLMv2 responses
//!
//! GSSAPI and EXTERNAL are named in [`Mechanism`] so capability data can be
//! tracked, but no payload builder exists for them.

pub mod cram_md5;
pub mod digest_md5;
mod error;
pub mod login;
mod mechanism;
pub mod ntlm;
pub mod plain;

pub use error::SaslError;
pub use mechanism::{Mechanism, MechanismSet};

use hmac::{Hmac, Mac};
use md5::Md5;

/// Lowercase hex rendering of a digest.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// HMAC-MD5 as used by CRAM-MD5 and the NTLMv2 proof.
pub(crate) fn hmac_md5(key: &[u8], data: &[u8]) -> Result<[u8; 16], SaslError> {
    let mut mac = Hmac::<Md5>::new_from_slice(key).map_err(|_| SaslError::Hmac)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
