//! The sans-I/O conversation engine.

use mailgrab_sasl::{self as sasl, Mechanism};

use crate::command::{Command, TagGenerator, continuation_line};
use crate::connection::{Config, Credentials, Security};
use crate::fetch::{FetchRequest, parse_literal_size};
use crate::parser::{Reply, classify};
use crate::types::Capabilities;
use crate::{Error, Result};

use super::State;

/// What the session driver must do after feeding a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write these bytes, then keep feeding response lines.
    Send(Vec<u8>),
    /// Run the TLS handshake, then call [`Engine::tls_handshake_done`].
    /// The engine must not be fed lines while the handshake runs.
    StartTlsHandshake,
    /// A message literal of `size` bytes follows the line just fed (zero
    /// when the server had no data). The framer cache may already hold the
    /// first body bytes.
    Body {
        /// Announced literal size.
        size: u64,
    },
    /// Nothing to do; feed the next response line.
    Continue,
    /// The active phase is complete.
    Done,
}

/// Drives one IMAP conversation: greeting, capability discovery, optional
/// STARTTLS, authentication, then per-request SELECT/FETCH and finally
/// LOGOUT.
///
/// The engine owns no I/O. It consumes response lines (CRLF stripped) via
/// [`feed`](Self::feed) and tells the caller what to do through [`Action`]s,
/// which keeps every branch of the conversation testable without a socket.
/// Exactly one command is outstanding at a time; the tag generated for it is
/// the tag the next completion must echo.
pub struct Engine {
    state: State,
    tags: TagGenerator,
    /// Tag expected on the next tagged completion; `*` before the first
    /// command so the untagged greeting matches.
    resptag: String,
    caps: Capabilities,
    security: Security,
    tls_active: bool,
    credentials: Option<Credentials>,
    authused: Option<Mechanism>,
    request: Option<FetchRequest>,
}

impl Engine {
    /// Creates the engine for a fresh connection. `connection_id` feeds the
    /// tag prefix so concurrent connections stay distinguishable in traces.
    #[must_use]
    pub fn new(config: &Config, connection_id: u64) -> Self {
        Self {
            state: State::ServerGreet,
            tags: TagGenerator::for_connection(connection_id),
            resptag: "*".to_string(),
            caps: Capabilities::default(),
            security: config.security,
            tls_active: matches!(config.security, Security::Implicit),
            credentials: config.credentials.clone(),
            authused: None,
            request: None,
        }
    }

    /// Current conversation state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Whether the engine is idle between phases.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state == State::Stop
    }

    /// Capabilities discovered so far.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Whether the conversation runs over TLS.
    #[must_use]
    pub const fn tls_active(&self) -> bool {
        self.tls_active
    }

    /// The mechanism chosen for this session, once selection has happened.
    #[must_use]
    pub const fn auth_mechanism(&self) -> Option<Mechanism> {
        self.authused
    }

    /// Feeds one response line (CRLF stripped) to the engine.
    ///
    /// # Errors
    ///
    /// Protocol violations surface as [`Error::WeirdServerReply`], refused
    /// authentication as [`Error::LoginDenied`], and a denied-but-mandatory
    /// STARTTLS as [`Error::TlsUnavailable`]. All of them are fatal for the
    /// connection.
    pub fn feed(&mut self, line: &[u8]) -> Result<Action> {
        if matches!(self.state, State::UpgradeTls | State::Stop) {
            return Err(Error::WeirdServerReply(
                "response while no command is outstanding".to_string(),
            ));
        }

        match classify(line, &self.resptag)? {
            Reply::Unmatched => Ok(Action::Continue),
            Reply::Untagged(data) => self.on_untagged(data),
            Reply::Continuation(data) => {
                if self.state.accepts_continuation() {
                    self.on_continuation(data)
                } else {
                    tracing::error!("unexpected continuation response");
                    Err(Error::WeirdServerReply(
                        "unexpected continuation response".to_string(),
                    ))
                }
            }
            Reply::Tagged(status) => self.on_tagged(status.is_ok()),
        }
    }

    /// Tells the engine the TLS handshake completed. Capabilities are
    /// rediscovered on the secured channel; returns the CAPABILITY command
    /// to send.
    pub fn tls_handshake_done(&mut self) -> Vec<u8> {
        debug_assert_eq!(self.state, State::UpgradeTls);
        self.tls_active = true;
        tracing::debug!("connection secured, rerunning capability discovery");
        self.send_capability()
    }

    /// Starts the SELECT → FETCH phase for `request`; returns the SELECT
    /// command to send. Only valid while the engine is stopped between
    /// phases.
    pub fn begin_fetch(&mut self, request: FetchRequest) -> Vec<u8> {
        debug_assert_eq!(self.state, State::Stop);
        let mailbox = request.mailbox.clone().unwrap_or_default();
        if let Some(uidvalidity) = &request.uidvalidity {
            tracing::debug!(%uidvalidity, "fetching against pinned uidvalidity");
        }
        self.request = Some(request);
        let bytes = self.send(&Command::Select { mailbox });
        self.set_state(State::Select);
        bytes
    }

    /// Releases the request-scoped state of the current fetch, if any.
    pub fn take_request(&mut self) -> Option<FetchRequest> {
        self.request.take()
    }

    /// Starts the LOGOUT exchange; returns the command to send.
    pub fn begin_logout(&mut self) -> Vec<u8> {
        let bytes = self.send(&Command::Logout);
        self.set_state(State::Logout);
        bytes
    }

    /// This is the only place the state changes.
    fn set_state(&mut self, new: State) {
        if self.state != new {
            tracing::debug!(from = self.state.name(), to = new.name(), "state change");
        }
        self.state = new;
    }

    /// Tags and serializes a command; the tag becomes the expected one.
    fn send(&mut self, command: &Command) -> Vec<u8> {
        self.resptag = self.tags.next();
        command.serialize(&self.resptag)
    }

    fn send_capability(&mut self) -> Vec<u8> {
        self.caps.clear();
        self.authused = None;
        let bytes = self.send(&Command::Capability);
        self.set_state(State::Capability);
        bytes
    }

    fn creds(&self) -> Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| Error::LoginDenied("no credentials configured".to_string()))
    }

    fn on_untagged(&mut self, data: &[u8]) -> Result<Action> {
        match self.state {
            State::Capability => {
                self.caps.scan(data);
                Ok(Action::Continue)
            }
            State::Fetch => {
                let size = parse_literal_size(data).ok_or_else(|| {
                    Error::WeirdServerReply("FETCH response without a literal size".to_string())
                })?;
                tracing::info!(size, "found bytes to download");
                self.set_state(State::Stop);
                Ok(Action::Body { size })
            }
            // Out-of-band data (EXISTS, FLAGS, BYE, ...) that no state
            // cares about.
            _ => Ok(Action::Continue),
        }
    }

    fn on_tagged(&mut self, ok: bool) -> Result<Action> {
        match self.state {
            State::ServerGreet => {
                if ok {
                    Ok(Action::Send(self.send_capability()))
                } else {
                    tracing::error!("unexpected greeting from server");
                    Err(Error::WeirdServerReply("unexpected greeting".to_string()))
                }
            }
            State::Capability => {
                if !ok {
                    // Capability discovery failed; try clear text directly.
                    self.start_login()
                } else if self.security.wants_starttls() && !self.tls_active {
                    if self.caps.starttls {
                        let bytes = self.send(&Command::StartTls);
                        self.set_state(State::StartTls);
                        Ok(Action::Send(bytes))
                    } else if self.security == Security::Required {
                        tracing::error!("STARTTLS not supported");
                        Err(Error::TlsUnavailable(
                            "server does not advertise STARTTLS".to_string(),
                        ))
                    } else {
                        self.authenticate()
                    }
                } else {
                    self.authenticate()
                }
            }
            State::StartTls => {
                if ok {
                    self.set_state(State::UpgradeTls);
                    Ok(Action::StartTlsHandshake)
                } else if self.security == Security::Required {
                    tracing::error!("STARTTLS denied");
                    Err(Error::TlsUnavailable("STARTTLS denied".to_string()))
                } else {
                    self.authenticate()
                }
            }
            // A tagged reply where a continuation prompt was required.
            State::AuthenticatePlain
            | State::AuthenticateLogin
            | State::AuthenticateLoginPassword
            | State::AuthenticateCramMd5
            | State::AuthenticateDigestMd5
            | State::AuthenticateDigestMd5Resp
            | State::AuthenticateNtlm
            | State::AuthenticateNtlmType2 => {
                tracing::error!("access denied");
                Err(Error::LoginDenied("access denied".to_string()))
            }
            State::Authenticate => {
                if ok {
                    self.set_state(State::Stop);
                    Ok(Action::Done)
                } else {
                    tracing::error!("authentication failed");
                    Err(Error::LoginDenied("authentication failed".to_string()))
                }
            }
            State::Login => {
                if ok {
                    self.set_state(State::Stop);
                    Ok(Action::Done)
                } else {
                    tracing::error!("access denied");
                    Err(Error::LoginDenied("access denied".to_string()))
                }
            }
            State::Select => {
                if ok {
                    self.send_fetch()
                } else {
                    tracing::error!("mailbox selection failed");
                    Err(Error::LoginDenied("mailbox selection failed".to_string()))
                }
            }
            State::Fetch => {
                if ok {
                    // Completion before any untagged data: nothing to
                    // download.
                    self.set_state(State::Stop);
                    Ok(Action::Body { size: 0 })
                } else {
                    Err(Error::WeirdServerReply("FETCH failed".to_string()))
                }
            }
            State::Logout => {
                self.set_state(State::Stop);
                Ok(Action::Done)
            }
            // Guarded at the top of feed().
            State::UpgradeTls | State::Stop => Ok(Action::Continue),
        }
    }

    fn on_continuation(&mut self, data: &[u8]) -> Result<Action> {
        match self.state {
            State::AuthenticatePlain => {
                let creds = self.creds()?;
                let reply = sasl::plain::message(&creds.username, &creds.password);
                self.set_state(State::Authenticate);
                Ok(Action::Send(continuation_line(&reply)))
            }
            State::AuthenticateLogin => {
                let reply = sasl::login::message(&self.creds()?.username);
                self.set_state(State::AuthenticateLoginPassword);
                Ok(Action::Send(continuation_line(&reply)))
            }
            State::AuthenticateLoginPassword => {
                let reply = sasl::login::message(&self.creds()?.password);
                self.set_state(State::Authenticate);
                Ok(Action::Send(continuation_line(&reply)))
            }
            State::AuthenticateCramMd5 => {
                let creds = self.creds()?;
                let reply =
                    sasl::cram_md5::message(challenge_text(data)?, &creds.username, &creds.password)?;
                self.set_state(State::Authenticate);
                Ok(Action::Send(continuation_line(&reply)))
            }
            State::AuthenticateDigestMd5 => {
                let creds = self.creds()?;
                let reply = sasl::digest_md5::message(
                    challenge_text(data)?,
                    &creds.username,
                    &creds.password,
                    "imap",
                )?;
                self.set_state(State::AuthenticateDigestMd5Resp);
                Ok(Action::Send(continuation_line(&reply)))
            }
            State::AuthenticateDigestMd5Resp => {
                // The rspauth round needs no reply content.
                self.set_state(State::Authenticate);
                Ok(Action::Send(continuation_line("")))
            }
            State::AuthenticateNtlm => {
                let reply = sasl::ntlm::type1_message();
                self.set_state(State::AuthenticateNtlmType2);
                Ok(Action::Send(continuation_line(&reply)))
            }
            State::AuthenticateNtlmType2 => {
                let creds = self.creds()?;
                let reply =
                    sasl::ntlm::type3_message(challenge_text(data)?, &creds.username, &creds.password)?;
                self.set_state(State::Authenticate);
                Ok(Action::Send(continuation_line(&reply)))
            }
            // A further prompt after the final leg means we were refused.
            State::Authenticate => {
                tracing::error!("authentication failed");
                Err(Error::LoginDenied("authentication failed".to_string()))
            }
            _ => Err(Error::WeirdServerReply(
                "unexpected continuation response".to_string(),
            )),
        }
    }

    /// Picks the best advertised mechanism, most secure first, and opens
    /// the AUTHENTICATE exchange. Falls back to clear-text LOGIN when the
    /// server offers nothing usable but has not disabled LOGIN.
    fn authenticate(&mut self) -> Result<Action> {
        if self.credentials.is_none() {
            // Nothing to authenticate with; the connect phase ends here.
            self.set_state(State::Stop);
            return Ok(Action::Done);
        }

        let mechs = self.caps.mechanisms;
        let (mechanism, state1, state2) = if mechs.contains(Mechanism::DigestMd5) {
            (
                Mechanism::DigestMd5,
                State::AuthenticateDigestMd5,
                State::AuthenticateDigestMd5,
            )
        } else if mechs.contains(Mechanism::CramMd5) {
            (
                Mechanism::CramMd5,
                State::AuthenticateCramMd5,
                State::AuthenticateCramMd5,
            )
        } else if mechs.contains(Mechanism::Ntlm) {
            (
                Mechanism::Ntlm,
                State::AuthenticateNtlm,
                State::AuthenticateNtlmType2,
            )
        } else if mechs.contains(Mechanism::Login) {
            (
                Mechanism::Login,
                State::AuthenticateLogin,
                State::AuthenticateLoginPassword,
            )
        } else if mechs.contains(Mechanism::Plain) {
            (Mechanism::Plain, State::AuthenticatePlain, State::Authenticate)
        } else if self.caps.login_disabled {
            tracing::info!("no known authentication mechanisms supported");
            return Err(Error::LoginDenied(
                "no supported authentication mechanism".to_string(),
            ));
        } else {
            // Perform clear text authentication.
            return self.start_login();
        };

        self.authused = Some(mechanism);
        tracing::debug!(mechanism = mechanism.name(), "authenticating");

        // With SASL-IR the first token rides on the command itself and the
        // first continuation round is skipped.
        let initial_response = if self.caps.sasl_ir && mechanism.client_first() {
            let creds = self.creds()?;
            Some(match mechanism {
                Mechanism::Plain => sasl::plain::message(&creds.username, &creds.password),
                Mechanism::Login => sasl::login::message(&creds.username),
                _ => sasl::ntlm::type1_message(),
            })
        } else {
            None
        };

        let next = if initial_response.is_some() { state2 } else { state1 };
        let bytes = self.send(&Command::Authenticate {
            mechanism: mechanism.name(),
            initial_response,
        });
        self.set_state(next);
        Ok(Action::Send(bytes))
    }

    fn start_login(&mut self) -> Result<Action> {
        let Some(creds) = &self.credentials else {
            self.set_state(State::Stop);
            return Ok(Action::Done);
        };
        let command = Command::Login {
            username: creds.username.clone(),
            password: creds.password.clone(),
        };
        let bytes = self.send(&command);
        self.set_state(State::Login);
        Ok(Action::Send(bytes))
    }

    fn send_fetch(&mut self) -> Result<Action> {
        let request = self.request.as_ref().ok_or_else(|| {
            Error::WeirdServerReply("no fetch request in progress".to_string())
        })?;
        // An unnamed message defaults to message number 1.
        let uid = request.uid.clone().unwrap_or_else(|| "1".to_string());
        let section = request.section.clone().unwrap_or_default();
        let bytes = self.send(&Command::Fetch { uid, section });
        self.set_state(State::Fetch);
        Ok(Action::Send(bytes))
    }
}

/// Extracts the challenge payload from a continuation line.
fn challenge_text(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data.trim_ascii())
        .map_err(|_| Error::WeirdServerReply("challenge is not valid UTF-8".to_string()))
}
