//! Error types for the fetch core.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching a message.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// No response arrived within the response timeout.
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// The URL violates the IMAP URL grammar.
    #[error("Malformed URL: {0}")]
    UrlMalformed(String),

    /// The server sent a line the protocol engine cannot make sense of.
    #[error("Weird server reply: {0}")]
    WeirdServerReply(String),

    /// TLS was demanded but the server cannot or will not negotiate it.
    #[error("TLS unavailable: {0}")]
    TlsUnavailable(String),

    /// Authentication was refused, or no usable mechanism exists.
    #[error("Login denied: {0}")]
    LoginDenied(String),

    /// The URL names a scheme this client does not speak.
    #[error("Unsupported protocol: {0}")]
    Unsupported(String),

    /// A SASL payload could not be built from the server challenge.
    #[error("SASL error: {0}")]
    Sasl(#[from] mailgrab_sasl::SaslError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
