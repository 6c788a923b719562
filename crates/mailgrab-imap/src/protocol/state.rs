//! Conversation states.

/// Phase of the IMAP conversation.
///
/// The connect phase runs `ServerGreet` → `Capability` → (optional
/// `StartTls`/`UpgradeTls` → `Capability`) → one authentication exchange →
/// `Stop`. The fetch phase runs `Select` → `Fetch` → `Stop`, and the
/// disconnect phase `Logout` → `Stop`. `Stop` means the engine is idle
/// between phases (or, after `Fetch`, that the socket now carries the body
/// literal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for the untagged OK greeting.
    #[default]
    ServerGreet,
    /// CAPABILITY sent, accumulating untagged capability data.
    Capability,
    /// STARTTLS sent, waiting for permission to upgrade.
    StartTls,
    /// TLS handshake in progress; no lines may be read.
    UpgradeTls,
    /// AUTHENTICATE PLAIN sent, waiting for the empty continuation.
    AuthenticatePlain,
    /// AUTHENTICATE LOGIN sent, waiting for the username prompt.
    AuthenticateLogin,
    /// Username sent, waiting for the password prompt.
    AuthenticateLoginPassword,
    /// AUTHENTICATE CRAM-MD5 sent, waiting for the challenge.
    AuthenticateCramMd5,
    /// AUTHENTICATE DIGEST-MD5 sent, waiting for the challenge.
    AuthenticateDigestMd5,
    /// Digest response sent, waiting for the server's rspauth round.
    AuthenticateDigestMd5Resp,
    /// AUTHENTICATE NTLM sent, waiting for the empty continuation.
    AuthenticateNtlm,
    /// NTLM type-1 sent, waiting for the type-2 challenge.
    AuthenticateNtlmType2,
    /// Final SASL leg sent, waiting for the tagged completion.
    Authenticate,
    /// LOGIN sent, waiting for the tagged completion.
    Login,
    /// SELECT sent, waiting for the tagged completion.
    Select,
    /// FETCH sent, waiting for the untagged literal announcement.
    Fetch,
    /// LOGOUT sent, waiting for the server to finish.
    Logout,
    /// No command outstanding.
    Stop,
}

impl State {
    /// States in which a `+` continuation is a valid server response.
    /// Anywhere else a continuation is a protocol error.
    #[must_use]
    pub const fn accepts_continuation(self) -> bool {
        matches!(
            self,
            Self::AuthenticatePlain
                | Self::AuthenticateLogin
                | Self::AuthenticateLoginPassword
                | Self::AuthenticateCramMd5
                | Self::AuthenticateDigestMd5
                | Self::AuthenticateDigestMd5Resp
                | Self::AuthenticateNtlm
                | Self::AuthenticateNtlmType2
                | Self::Authenticate
        )
    }

    /// Name for state-change logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerGreet => "SERVERGREET",
            Self::Capability => "CAPABILITY",
            Self::StartTls => "STARTTLS",
            Self::UpgradeTls => "UPGRADETLS",
            Self::AuthenticatePlain => "AUTHENTICATE_PLAIN",
            Self::AuthenticateLogin => "AUTHENTICATE_LOGIN",
            Self::AuthenticateLoginPassword => "AUTHENTICATE_LOGIN_PASSWD",
            Self::AuthenticateCramMd5 => "AUTHENTICATE_CRAMMD5",
            Self::AuthenticateDigestMd5 => "AUTHENTICATE_DIGESTMD5",
            Self::AuthenticateDigestMd5Resp => "AUTHENTICATE_DIGESTMD5_RESP",
            Self::AuthenticateNtlm => "AUTHENTICATE_NTLM",
            Self::AuthenticateNtlmType2 => "AUTHENTICATE_NTLM_TYPE2MSG",
            Self::Authenticate => "AUTHENTICATE",
            Self::Login => "LOGIN",
            Self::Select => "SELECT",
            Self::Fetch => "FETCH",
            Self::Logout => "LOGOUT",
            Self::Stop => "STOP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_the_greeting_wait() {
        assert_eq!(State::default(), State::ServerGreet);
    }

    #[test]
    fn only_auth_states_accept_continuations() {
        assert!(State::AuthenticatePlain.accepts_continuation());
        assert!(State::AuthenticateNtlmType2.accepts_continuation());
        assert!(State::Authenticate.accepts_continuation());

        assert!(!State::ServerGreet.accepts_continuation());
        assert!(!State::Capability.accepts_continuation());
        assert!(!State::Select.accepts_continuation());
        assert!(!State::Fetch.accepts_continuation());
        assert!(!State::Logout.accepts_continuation());
        assert!(!State::Stop.accepts_continuation());
    }
}
