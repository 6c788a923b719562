//! Response line classification.
//!
//! IMAP servers answer with three kinds of lines: tagged completions,
//! untagged `* ` data, and `+ ` continuation requests. [`classify`] sorts a
//! line into one of those (or reports that it is not addressed to us); what
//! an untagged or continuation line *means* depends on the conversation
//! phase and is the engine's business.

use crate::types::Status;
use crate::{Error, Result};

/// Classification of one response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    /// `<tag> OK|NO|BAD …` completion for the expected tag.
    Tagged(Status),
    /// `* …` server data; payload excludes the leading `* `.
    Untagged(&'a [u8]),
    /// `+ …` continuation request; payload excludes the marker.
    Continuation(&'a [u8]),
    /// Not addressed to us; read another line.
    Unmatched,
}

/// Classifies a response line (CRLF already stripped) against the tag
/// expected on the next completion.
///
/// The tag match requires the exact tag bytes followed by a single space.
/// Before the first command the expected tag is the sentinel `*`, which
/// makes the untagged `* OK` greeting classify as a tagged OK; the wait
/// for the greeting relies on exactly this.
///
/// # Errors
///
/// [`Error::WeirdServerReply`] when a line carries our tag but the word
/// after it is not OK, NO or BAD.
pub fn classify<'a>(line: &'a [u8], expected_tag: &str) -> Result<Reply<'a>> {
    let tag = expected_tag.as_bytes();

    if line.len() > tag.len() && line.starts_with(tag) && line[tag.len()] == b' ' {
        let word = &line[tag.len() + 1..];
        return if word.starts_with(b"OK") {
            Ok(Reply::Tagged(Status::Ok))
        } else if word.starts_with(b"NO") {
            Ok(Reply::Tagged(Status::No))
        } else if word.starts_with(b"BAD") {
            Ok(Reply::Tagged(Status::Bad))
        } else {
            Err(Error::WeirdServerReply("bad tagged response".to_string()))
        };
    }

    if let Some(rest) = line.strip_prefix(b"* ") {
        return Ok(Reply::Untagged(rest));
    }

    if line == b"+" {
        return Ok(Reply::Continuation(&[]));
    }
    if let Some(rest) = line.strip_prefix(b"+ ") {
        return Ok(Reply::Continuation(rest));
    }

    Ok(Reply::Unmatched)
}
