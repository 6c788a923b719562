//! Plain and TLS transport for the conversation.
//!
//! A connection starts as bare TCP, or handshakes before the first IMAP
//! byte when the security mode is implicit TLS, and may switch to TLS
//! mid-stream once the server accepts STARTTLS. Certificate verification
//! uses the bundled webpki roots; the rustls connector is built once and
//! shared by every connection in the process.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::{Error, Result};

/// The connection transport: cleartext TCP until (and unless) TLS takes
/// over.
pub enum ImapStream {
    /// Cleartext TCP.
    Plain(TcpStream),
    /// TLS session over the same TCP connection. Boxed: the rustls session
    /// state dwarfs the plain variant.
    Tls(Box<TlsStream<TcpStream>>),
}

/// Both variants read and write the same way; the poll impls only need a
/// view of whichever one is live.
trait Transport: AsyncRead + AsyncWrite + Unpin {}

impl<T: AsyncRead + AsyncWrite + Unpin> Transport for T {}

/// One rustls connector, built on first use, serves the whole process.
fn shared_connector() -> &'static TlsConnector {
    static CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();
    CONNECTOR.get_or_init(|| {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        TlsConnector::from(Arc::new(tls_config))
    })
}

/// Runs the TLS handshake over an established TCP connection.
async fn secure(tcp: TcpStream, host: &str) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = shared_connector().connect(server_name, tcp).await?;
    Ok(ImapStream::Tls(Box::new(tls)))
}

impl ImapStream {
    /// Hands the plain stream over to TLS after the server accepted
    /// STARTTLS. A stream already running TLS cannot be upgraded twice.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => secure(tcp, host).await,
            Self::Tls(_) => Err(Error::TlsUnavailable("stream is already TLS".to_string())),
        }
    }

    /// Whether TLS is active on this stream.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// The live transport, whichever variant holds it.
    fn transport(&mut self) -> &mut dyn Transport {
        match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(tls) => tls.as_mut(),
        }
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().transport()).poll_read(cx, buf)
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(self.get_mut().transport()).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().transport()).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().transport()).poll_shutdown(cx)
    }
}

/// Opens the transport for `config`. Implicit-TLS configurations
/// handshake before the first IMAP byte; every other security mode starts
/// in the clear and leaves STARTTLS to the protocol engine.
pub async fn connect(config: &Config) -> Result<ImapStream> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;

    if config.security == Security::Implicit {
        secure(tcp, &config.host).await
    } else {
        Ok(ImapStream::Plain(tcp))
    }
}
