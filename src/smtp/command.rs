//! Classifies a command-mode line into a [`Command`], independent of the
//! session's current phase. Keeping classification phase-free lets the
//! dispatcher apply syntax checks before state-legality checks, matching the
//! precedence rule: a well-formed MAIL in the wrong phase yields the
//! nested-MAIL 503, not a syntax error.

/// The outcome of parsing a single command-mode line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO <host>`. `None` means the argument was missing (malformed).
    Helo(Option<String>),
    /// `NOOP`. `true` means trailing arguments were present (malformed).
    Noop { has_args: bool },
    Quit,
    /// `RSET`. `true` means trailing arguments were present (malformed).
    Rset { has_args: bool },
    /// `MAIL FROM:<addr>`. `None` means the line didn't parse as
    /// `FROM:<...>` at all (malformed); `Some(addr)` may be empty.
    Mail(Option<String>),
    /// `RCPT TO:<addr>`. `None` means the line didn't parse, or the address
    /// was empty (both malformed per the grammar in the spec).
    Rcpt(Option<String>),
    /// `DATA`. `true` means trailing arguments were present (malformed).
    Data { has_args: bool },
    /// Any other verb. The verb is preserved verbatim-uppercased for the
    /// `502` reply.
    Unknown(String),
}

/// Parses one command-mode line (CRLF already stripped) into a [`Command`].
///
/// The verb (first whitespace-delimited token) is matched case-insensitively;
/// arguments retain their original case.
pub fn parse(line: &str) -> Command {
    let trimmed = line.trim_end();
    let verb_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let verb = &trimmed[..verb_end];
    let rest = trimmed[verb_end..].trim_start();
    let upper_verb = verb.to_ascii_uppercase();

    match upper_verb.as_str() {
        "HELO" => Command::Helo(non_empty(rest)),
        "NOOP" => Command::Noop { has_args: !rest.is_empty() },
        "QUIT" => Command::Quit,
        "RSET" => Command::Rset { has_args: !rest.is_empty() },
        "MAIL" => Command::Mail(parse_path_arg(rest, "FROM:", true)),
        "RCPT" => Command::Rcpt(parse_path_arg(rest, "TO:", false)),
        "DATA" => Command::Data { has_args: !rest.is_empty() },
        "" => Command::Unknown(String::new()),
        other => Command::Unknown(other.to_string()),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parses a `KEYWORD:<address>` argument, tolerating whitespace between the
/// colon and the opening angle bracket. `allow_empty` controls whether an
/// empty `<>` reverse-path is accepted (true for MAIL, false for RCPT).
fn parse_path_arg(rest: &str, keyword: &str, allow_empty: bool) -> Option<String> {
    let rest_upper = rest.to_ascii_uppercase();
    if !rest_upper.starts_with(keyword) {
        return None;
    }
    let after_keyword = rest[keyword.len()..].trim_start();
    let start = after_keyword.find('<')?;
    let end = after_keyword.find('>')?;
    if end < start {
        return None;
    }
    let addr = &after_keyword[start + 1..end];
    if addr.is_empty() && !allow_empty {
        return None;
    }
    Some(addr.to_string())
}
