//! Error type shared by the mechanism modules.

use thiserror::Error;

/// Errors raised while building a SASL payload.
#[derive(Debug, Error)]
pub enum SaslError {
    /// The server challenge was not valid base64.
    #[error("invalid base64 in server challenge: {0}")]
    ChallengeBase64(#[from] base64::DecodeError),

    /// The decoded challenge does not have the shape the mechanism requires.
    #[error("malformed {mechanism} challenge: {reason}")]
    Challenge {
        /// Wire name of the mechanism that rejected the challenge.
        mechanism: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The HMAC backend rejected the key.
    #[error("could not initialize HMAC")]
    Hmac,
}
