//! Command serialization helpers.

/// Prepares a string for use as an IMAP atom argument.
///
/// Strings free of backslash, double quote and space pass through
/// unchanged. Otherwise every backslash and double quote is escaped with a
/// backslash, and the whole is wrapped in double quotes iff it contains a
/// space.
#[must_use]
pub fn quote_atom(s: &str) -> String {
    let mut needs_escape = false;
    let mut has_space = false;
    for b in s.bytes() {
        match b {
            b'\\' | b'"' => needs_escape = true,
            b' ' => has_space = true,
            _ => {}
        }
    }

    if !needs_escape && !has_space {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    if has_space {
        out.push('"');
    }
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    if has_space {
        out.push('"');
    }
    out
}
