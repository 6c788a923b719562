//! Fetch request/report types and the FETCH literal-size scan.

use crate::url::UrlPath;

/// Whether the request transfers the message body or only metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transfer {
    /// Download the body literal (the normal case).
    #[default]
    Body,
    /// Run the conversation but do not read the body.
    Info,
}

/// One message-fetch request, usually decoded from a URL path.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Mailbox to SELECT; an unnamed mailbox selects `""`.
    pub mailbox: Option<String>,
    /// UIDVALIDITY the caller pinned, carried for diagnostics.
    pub uidvalidity: Option<String>,
    /// Message to FETCH. Without one, message number 1 is fetched.
    pub uid: Option<String>,
    /// Body section; the whole body when absent.
    pub section: Option<String>,
    /// Body or metadata-only transfer.
    pub transfer: Transfer,
}

impl From<UrlPath> for FetchRequest {
    fn from(path: UrlPath) -> Self {
        Self {
            mailbox: path.mailbox,
            uidvalidity: path.uidvalidity,
            uid: path.uid,
            section: path.section,
            transfer: Transfer::Body,
        }
    }
}

/// Result of a completed fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Literal size announced by the server.
    pub size: u64,
    /// Bytes actually delivered to the body sink.
    pub bytes_written: u64,
}

/// Extracts the `{N}` literal size from the first untagged FETCH line,
/// e.g. `1 FETCH (BODY[TEXT] {2021}`.
///
/// Everything before the first `{` is ignored; the digits after it must
/// parse as an unsigned decimal. Returns `None` when the line carries no
/// parsable literal.
#[must_use]
pub fn parse_literal_size(line: &[u8]) -> Option<u64> {
    let open = line.iter().position(|&b| b == b'{')?;
    let digits = &line[open + 1..];

    let mut size: u64 = 0;
    let mut seen = 0usize;
    for &b in digits {
        if !b.is_ascii_digit() {
            break;
        }
        size = size
            .checked_mul(10)?
            .checked_add(u64::from(b - b'0'))?;
        seen += 1;
    }

    (seen > 0).then_some(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_fetch_line() {
        assert_eq!(
            parse_literal_size(b"1 FETCH (BODY[TEXT] {2021}"),
            Some(2021)
        );
    }

    #[test]
    fn ignores_everything_before_the_brace() {
        assert_eq!(parse_literal_size(b"junk } stuff {7}tail"), Some(7));
    }

    #[test]
    fn zero_is_a_valid_size() {
        assert_eq!(parse_literal_size(b"1 FETCH (BODY[] {0}"), Some(0));
    }

    #[test]
    fn missing_brace_is_none() {
        assert_eq!(parse_literal_size(b"1 FETCH (FLAGS (\\Seen))"), None);
    }

    #[test]
    fn brace_without_digits_is_none() {
        assert_eq!(parse_literal_size(b"1 FETCH (BODY[] {}"), None);
        assert_eq!(parse_literal_size(b"1 FETCH (BODY[] {abc}"), None);
    }

    #[test]
    fn overflowing_size_is_none() {
        assert_eq!(parse_literal_size(b"x {99999999999999999999999}"), None);
    }

    #[test]
    fn request_from_url_path() {
        let path = crate::url::UrlPath::parse("INBOX;UID=5;SECTION=1.2").unwrap();
        let request = FetchRequest::from(path);
        assert_eq!(request.mailbox.as_deref(), Some("INBOX"));
        assert_eq!(request.uid.as_deref(), Some("5"));
        assert_eq!(request.section.as_deref(), Some("1.2"));
        assert_eq!(request.transfer, Transfer::Body);
    }
}
