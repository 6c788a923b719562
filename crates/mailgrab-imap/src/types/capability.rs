//! Tagged response status and discovered server capabilities.

use mailgrab_sasl::{Mechanism, MechanismSet};

/// Status of a tagged completion response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// What the server advertised in CAPABILITY data.
///
/// Populated by [`scan`](Self::scan) from untagged lines while a CAPABILITY
/// command is outstanding, and final for the session once the tagged OK
/// arrives, until CAPABILITY is re-run after a STARTTLS upgrade.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Server offers the STARTTLS upgrade.
    pub starttls: bool,
    /// Server refuses clear-text LOGIN.
    pub login_disabled: bool,
    /// Server accepts SASL initial responses (RFC 4959).
    pub sasl_ir: bool,
    /// Advertised `AUTH=` mechanisms.
    pub mechanisms: MechanismSet,
}

impl Capabilities {
    /// Forgets everything, e.g. before re-running CAPABILITY.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Scans one untagged capability line (the payload after `* `).
    ///
    /// Tokens are compared case-sensitively, as servers emit them in the
    /// canonical uppercase form; delimiters are space, tab, CR and LF.
    pub fn scan(&mut self, line: &[u8]) {
        for token in line.split(|&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n')) {
            match token {
                b"" => {}
                b"STARTTLS" => self.starttls = true,
                b"LOGINDISABLED" => self.login_disabled = true,
                b"SASL-IR" => self.sasl_ir = true,
                _ => {
                    if let Some(name) = token.strip_prefix(b"AUTH=") {
                        if let Some(mech) = std::str::from_utf8(name)
                            .ok()
                            .and_then(Mechanism::from_name)
                        {
                            self.mechanisms.insert(mech);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        assert!(Status::Ok.is_ok());
        assert!(!Status::No.is_ok());
        assert!(!Status::Bad.is_ok());
    }

    #[test]
    fn scan_picks_up_flags_and_mechanisms() {
        let mut caps = Capabilities::default();
        caps.scan(b"CAPABILITY IMAP4rev1 STARTTLS SASL-IR AUTH=PLAIN AUTH=CRAM-MD5");

        assert!(caps.starttls);
        assert!(caps.sasl_ir);
        assert!(!caps.login_disabled);
        assert!(caps.mechanisms.contains(Mechanism::Plain));
        assert!(caps.mechanisms.contains(Mechanism::CramMd5));
        assert!(!caps.mechanisms.contains(Mechanism::Ntlm));
    }

    #[test]
    fn scan_accumulates_across_lines() {
        let mut caps = Capabilities::default();
        caps.scan(b"CAPABILITY IMAP4rev1 AUTH=LOGIN");
        caps.scan(b"CAPABILITY LOGINDISABLED");

        assert!(caps.login_disabled);
        assert!(caps.mechanisms.contains(Mechanism::Login));
    }

    #[test]
    fn scan_is_case_sensitive() {
        let mut caps = Capabilities::default();
        caps.scan(b"starttls auth=plain Sasl-Ir");

        assert!(!caps.starttls);
        assert!(!caps.sasl_ir);
        assert!(caps.mechanisms.is_empty());
    }

    #[test]
    fn scan_tolerates_tabs_and_stray_whitespace() {
        let mut caps = Capabilities::default();
        caps.scan(b"CAPABILITY\tSTARTTLS  AUTH=NTLM\r");

        assert!(caps.starttls);
        assert!(caps.mechanisms.contains(Mechanism::Ntlm));
    }

    #[test]
    fn unknown_auth_token_is_ignored() {
        let mut caps = Capabilities::default();
        caps.scan(b"CAPABILITY AUTH=XOAUTH2 AUTH=");
        assert!(caps.mechanisms.is_empty());
    }

    #[test]
    fn clear_resets_everything() {
        let mut caps = Capabilities::default();
        caps.scan(b"STARTTLS AUTH=PLAIN");
        caps.clear();
        assert_eq!(caps, Capabilities::default());
    }
}
