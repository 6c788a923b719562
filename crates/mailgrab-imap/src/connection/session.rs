//! The session lifecycle: connect, fetch, logout.
//!
//! [`ImapSession`] owns the framed transport and the sans-I/O [`Engine`],
//! and moves bytes between them: every awaited line is fed to the engine,
//! every engine action is carried out on the socket. The suspension points
//! of the conversation (waiting for bytes, for a write, for the TLS
//! handshake) are exactly the `.await`s in this module.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::AsyncWrite;

use super::config::Config;
use super::framed::FramedStream;
use super::stream::{self, ImapStream};
use crate::fetch::{FetchReport, FetchRequest, Transfer};
use crate::protocol::{Action, Engine};
use crate::types::Capabilities;
use crate::url::ImapUrl;
use crate::{Error, Result};

/// Process-wide connection counter; feeds the tag prefix letter so
/// concurrent connections tag their commands distinctly.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// A live IMAP connection.
///
/// Construction runs the whole connect phase; afterwards the session idles
/// between commands and [`fetch`](Self::fetch) / [`logout`](Self::logout)
/// drive the remaining phases. Any error marks the connection dead: no
/// further commands, and no LOGOUT courtesy either.
pub struct ImapSession {
    framed: FramedStream<ImapStream>,
    engine: Engine,
    response_timeout: Duration,
    dead: bool,
}

impl ImapSession {
    /// Connects and completes the connect-phase conversation: greeting,
    /// capability discovery, optional STARTTLS upgrade, authentication.
    ///
    /// # Errors
    ///
    /// Transport and timeout errors, [`Error::TlsUnavailable`] when TLS is
    /// required but not negotiable, [`Error::LoginDenied`] when the server
    /// refuses the credentials, [`Error::WeirdServerReply`] on protocol
    /// violations.
    pub async fn connect(config: Config) -> Result<Self> {
        let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(host = %config.host, port = config.port, connection_id, "connecting");

        let stream = tokio::time::timeout(config.connect_timeout, stream::connect(&config))
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout))??;

        let mut framed = FramedStream::new(stream);
        let mut engine = Engine::new(&config, connection_id);

        loop {
            let line = read_line_timeout(&mut framed, config.response_timeout).await?;
            match engine.feed(&line)? {
                Action::Send(data) => framed.write_command(&data).await?,
                Action::Continue => {}
                Action::StartTlsHandshake => {
                    // The server is silent between its STARTTLS go-ahead
                    // and our handshake, so no buffered bytes are lost by
                    // unwrapping the framer here.
                    let upgraded = framed.into_inner().upgrade_to_tls(&config.host).await?;
                    tracing::debug!(host = %config.host, "connection upgraded to TLS");
                    framed = FramedStream::new(upgraded);
                    let capability = engine.tls_handshake_done();
                    framed.write_command(&capability).await?;
                }
                Action::Done => break,
                Action::Body { .. } => {
                    return Err(Error::WeirdServerReply(
                        "message data during the connect phase".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            framed,
            engine,
            response_timeout: config.response_timeout,
            dead: false,
        })
    }

    /// Connects with everything a URL carries: host, port, scheme security
    /// and credentials.
    ///
    /// # Errors
    ///
    /// As [`connect`](Self::connect).
    pub async fn connect_url(url: &ImapUrl) -> Result<Self> {
        Self::connect(Config::from_url(url)).await
    }

    /// Capabilities the server advertised.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        self.engine.capabilities()
    }

    /// Whether an earlier failure made the connection unusable.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead
    }

    /// Whether the conversation runs over TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.framed.get_ref().is_tls()
    }

    /// Fetches one message per `request`, streaming the body literal into
    /// `sink`.
    ///
    /// With [`Transfer::Info`] the conversation still runs, but the body is
    /// not read; a non-empty literal then leaves the connection out of sync
    /// and it is marked dead.
    ///
    /// # Errors
    ///
    /// Transport and timeout errors, [`Error::LoginDenied`] when SELECT is
    /// refused, [`Error::WeirdServerReply`] when the FETCH response carries
    /// no parsable literal. Every error marks the connection dead.
    pub async fn fetch<W>(&mut self, request: FetchRequest, sink: &mut W) -> Result<FetchReport>
    where
        W: AsyncWrite + Unpin,
    {
        if self.dead {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is closed",
            )));
        }

        let result = self.drive_fetch(request, sink).await;
        // Request-scoped state is released whatever the outcome.
        let _ = self.engine.take_request();
        if result.is_err() {
            self.dead = true;
        }
        result
    }

    async fn drive_fetch<W>(&mut self, request: FetchRequest, sink: &mut W) -> Result<FetchReport>
    where
        W: AsyncWrite + Unpin,
    {
        let transfer = request.transfer;
        let select = self.engine.begin_fetch(request);
        self.framed.write_command(&select).await?;

        loop {
            let line = read_line_timeout(&mut self.framed, self.response_timeout).await?;
            match self.engine.feed(&line)? {
                Action::Send(data) => self.framed.write_command(&data).await?,
                Action::Continue => {}
                Action::Body { size } => {
                    if transfer == Transfer::Info {
                        if size > 0 {
                            // The literal stays on the wire unread; nothing
                            // sensible can follow on this connection.
                            self.dead = true;
                        }
                        return Ok(FetchReport {
                            size,
                            bytes_written: 0,
                        });
                    }

                    let bytes_written = if size > 0 {
                        self.framed.read_body(sink, size).await?
                    } else {
                        0
                    };
                    return Ok(FetchReport {
                        size,
                        bytes_written,
                    });
                }
                Action::StartTlsHandshake | Action::Done => {
                    return Err(Error::WeirdServerReply(
                        "unexpected conversation turn".to_string(),
                    ));
                }
            }
        }
    }

    /// Says goodbye and consumes the session.
    ///
    /// On a healthy connection this sends LOGOUT and waits for the server
    /// to finish. A dead connection gets no farewell: sending commands to a
    /// broken peer only adds wait time.
    ///
    /// # Errors
    ///
    /// Transport and timeout errors while waiting for the LOGOUT
    /// completion.
    pub async fn logout(mut self) -> Result<()> {
        if self.dead {
            return Ok(());
        }

        let logout = self.engine.begin_logout();
        self.framed.write_command(&logout).await?;

        loop {
            let line = read_line_timeout(&mut self.framed, self.response_timeout).await?;
            if self.engine.feed(&line)? == Action::Done {
                return Ok(());
            }
        }
    }
}

async fn read_line_timeout(
    framed: &mut FramedStream<ImapStream>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    tokio::time::timeout(timeout, framed.read_line())
        .await
        .map_err(|_| Error::Timeout(timeout))?
}
