//! IMAP command builders.
//!
//! A [`Command`] is serialized with the tag the [`TagGenerator`] produced
//! for it; continuation data (SASL payloads) goes out untagged via
//! [`continuation_line`].

mod serialize;
mod tag_generator;

pub use serialize::quote_atom;
pub use tag_generator::TagGenerator;

/// Commands issued during a fetch conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CAPABILITY`
    Capability,
    /// `STARTTLS`
    StartTls,
    /// `AUTHENTICATE <mechanism> [<initial response>]`
    Authenticate {
        /// Wire name of the SASL mechanism.
        mechanism: &'static str,
        /// Base64 initial response, when SASL-IR applies.
        initial_response: Option<String>,
    },
    /// `LOGIN <username> <password>`
    Login {
        /// Account name, quoted as an atom on the wire.
        username: String,
        /// Account password, quoted as an atom on the wire.
        password: String,
    },
    /// `SELECT <mailbox>`
    Select {
        /// Mailbox name, quoted as an atom on the wire.
        mailbox: String,
    },
    /// `FETCH <uid> BODY[<section>]`
    Fetch {
        /// Message number or UID from the URL.
        uid: String,
        /// Body section, empty for the whole body.
        section: String,
    },
    /// `LOGOUT`
    Logout,
}

impl Command {
    /// Serializes the command with its tag, CRLF-terminated.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');
        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(initial) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(initial.as_bytes());
                }
            }
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                buf.extend_from_slice(quote_atom(username).as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(quote_atom(password).as_bytes());
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                buf.extend_from_slice(quote_atom(mailbox).as_bytes());
            }
            Self::Fetch { uid, section } => {
                buf.extend_from_slice(b"FETCH ");
                buf.extend_from_slice(uid.as_bytes());
                buf.extend_from_slice(b" BODY[");
                buf.extend_from_slice(section.as_bytes());
                buf.push(b']');
            }
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
        }
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Serializes raw continuation data (a SASL reply), CRLF-terminated.
#[must_use]
pub fn continuation_line(data: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 2);
    buf.extend_from_slice(data.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_with_tag() {
        assert_eq!(Command::Capability.serialize("A001"), b"A001 CAPABILITY\r\n");
    }

    #[test]
    fn authenticate_without_initial_response() {
        let cmd = Command::Authenticate {
            mechanism: "CRAM-MD5",
            initial_response: None,
        };
        assert_eq!(cmd.serialize("A002"), b"A002 AUTHENTICATE CRAM-MD5\r\n");
    }

    #[test]
    fn authenticate_with_initial_response() {
        let cmd = Command::Authenticate {
            mechanism: "PLAIN",
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(
            cmd.serialize("A002"),
            b"A002 AUTHENTICATE PLAIN AHVzZXIAcGFzcw==\r\n"
        );
    }

    #[test]
    fn login_quotes_credentials() {
        let cmd = Command::Login {
            username: "user name".to_string(),
            password: "pa\"ss".to_string(),
        };
        assert_eq!(
            cmd.serialize("B007"),
            b"B007 LOGIN \"user name\" pa\\\"ss\r\n"
        );
    }

    #[test]
    fn select_quotes_mailbox() {
        let cmd = Command::Select {
            mailbox: "My Mail".to_string(),
        };
        assert_eq!(cmd.serialize("A003"), b"A003 SELECT \"My Mail\"\r\n");
    }

    #[test]
    fn fetch_body_section() {
        let cmd = Command::Fetch {
            uid: "12".to_string(),
            section: "1.2".to_string(),
        };
        assert_eq!(cmd.serialize("A004"), b"A004 FETCH 12 BODY[1.2]\r\n");
    }

    #[test]
    fn fetch_whole_body() {
        let cmd = Command::Fetch {
            uid: "1".to_string(),
            section: String::new(),
        };
        assert_eq!(cmd.serialize("A004"), b"A004 FETCH 1 BODY[]\r\n");
    }

    #[test]
    fn continuation_data_is_untagged() {
        assert_eq!(continuation_line("dXNlcg=="), b"dXNlcg==\r\n");
        assert_eq!(continuation_line(""), b"\r\n");
    }
}
