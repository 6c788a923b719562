//! Mechanism names and the advertised-mechanism set.

/// SASL mechanisms the `AUTHENTICATE` negotiation knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// Legacy LOGIN: base64 username, then base64 password.
    Login,
    /// PLAIN (RFC 4616).
    Plain,
    /// CRAM-MD5 (RFC 2195).
    CramMd5,
    /// DIGEST-MD5 (RFC 2831).
    DigestMd5,
    /// GSSAPI (RFC 4752). Tracked but never selected.
    Gssapi,
    /// EXTERNAL (RFC 4422). Tracked but never selected.
    External,
    /// NTLM (MS-NLMP).
    Ntlm,
}

impl Mechanism {
    /// The name used on the wire, in `AUTH=<name>` capability tokens and
    /// `AUTHENTICATE <name>` commands.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Plain => "PLAIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::DigestMd5 => "DIGEST-MD5",
            Self::Gssapi => "GSSAPI",
            Self::External => "EXTERNAL",
            Self::Ntlm => "NTLM",
        }
    }

    /// Resolves a capability token mechanism name. Matching is exact:
    /// capability tokens are compared case-sensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LOGIN" => Some(Self::Login),
            "PLAIN" => Some(Self::Plain),
            "CRAM-MD5" => Some(Self::CramMd5),
            "DIGEST-MD5" => Some(Self::DigestMd5),
            "GSSAPI" => Some(Self::Gssapi),
            "EXTERNAL" => Some(Self::External),
            "NTLM" => Some(Self::Ntlm),
            _ => None,
        }
    }

    /// Whether the mechanism can send its first token on the `AUTHENTICATE`
    /// command itself when the server advertises SASL-IR.
    #[must_use]
    pub const fn client_first(self) -> bool {
        matches!(self, Self::Login | Self::Plain | Self::Ntlm)
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Login => 1,
            Self::Plain => 1 << 1,
            Self::CramMd5 => 1 << 2,
            Self::DigestMd5 => 1 << 3,
            Self::Gssapi => 1 << 4,
            Self::External => 1 << 5,
            Self::Ntlm => 1 << 6,
        }
    }
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of mechanisms advertised by a server, kept as a bitset so the
/// priority sweep over candidates stays a handful of `contains` checks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MechanismSet(u8);

impl MechanismSet {
    /// The empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Adds a mechanism to the set.
    pub const fn insert(&mut self, mechanism: Mechanism) {
        self.0 |= mechanism.bit();
    }

    /// Whether the server advertised `mechanism`.
    #[must_use]
    pub const fn contains(self, mechanism: Mechanism) -> bool {
        self.0 & mechanism.bit() != 0
    }

    /// Removes every mechanism, e.g. before re-running CAPABILITY.
    pub const fn clear(&mut self) {
        self.0 = 0;
    }

    /// Whether no mechanism was advertised.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}
