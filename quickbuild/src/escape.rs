//! Character substitution tables used when emitting MUSH code.
//!
//! Two independent tables live here:
//! - literal-code escaping, applied to free text the author wants uploaded
//!   verbatim (function-call and substitution metacharacters are backslashed,
//!   line breaks become `%r`);
//! - attribute-name sanitizing, applied to room and exit ids before they are
//!   used as part of an attribute name on the building character.

/// Characters that are backslash-escaped in literal code.
pub const LITERAL_RESERVED: &[char] = &['\\', '$', '%', '(', ')', ',', ';', '[', ']', '^', '{', '}'];

/// Characters that cannot appear in an attribute name on PennMUSH, TinyMUX or RhostMUSH.
pub const ATTR_RESERVED: &[char] = &[
    '"', '%', '(', ')', '*', ',', ':', ';', '[', '\\', ']', '^', '{', '|', '}',
];

/// Line-break marker understood by the MUSH parser.
pub const LINE_BREAK: &str = "%r";

/// Escape `text` so the MUSH evaluates it as literal text.
///
/// ```
/// use quickbuild::escape::escape_literal;
///
/// assert_eq!(escape_literal("say [add(1,2)]"), r"say \[add\(1\,2\)\]");
/// assert_eq!(escape_literal("one\ntwo"), "one%rtwo");
/// ```
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                // \r\n collapses into a single break
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(LINE_BREAK);
            },
            '\n' => out.push_str(LINE_BREAK),
            c if LITERAL_RESERVED.contains(&c) => {
                out.push('\\');
                out.push(c);
            },
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_literal`]. Line breaks come back as `\n`.
pub fn unescape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            },
            '%' if chars.peek() == Some(&'r') => {
                chars.next();
                out.push('\n');
            },
            c => out.push(c),
        }
    }
    out
}

/// Sanitize `name` for use inside an attribute name.
///
/// Reserved characters become `$` followed by their lowercase hex code and
/// spaces become underscores. The mapping is stable but not guaranteed to be
/// reversible.
pub fn escape_attr(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch == ' ' {
            out.push('_');
        } else if ATTR_RESERVED.contains(&ch) {
            out.push_str(&format!("${:x}", u32::from(ch)));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Sanitized id for a source token such as `"Red Room"` or `"Red Room".dark`.
///
/// One leading and one trailing quote are dropped before sanitizing, so any
/// type suffix keeps the id distinct from the bare name.
pub fn token_id(token: &str) -> String {
    let trimmed = token.strip_prefix('"').unwrap_or(token);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    escape_attr(trimmed)
}

/// Display name for a source token: the text between its first and last quote.
pub fn token_name(token: &str) -> &str {
    match (token.find('"'), token.rfind('"')) {
        (Some(start), Some(end)) if end > start => &token[start + 1..end],
        _ => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_escape_covers_every_reserved_char() {
        let all: String = LITERAL_RESERVED.iter().collect();
        let escaped = escape_literal(&all);
        assert_eq!(escaped, r"\\\$\%\(\)\,\;\[\]\^\{\}");
        assert_eq!(unescape_literal(&escaped), all);
    }

    #[test]
    fn literal_escape_round_trips_printable_text() {
        let samples = [
            "plain words",
            "@emit [name(%#)] has arrived; {really}",
            r"back\slash and 100% ^caret$",
            "%r is not a break here",
            "multi\nline",
            "",
        ];
        for s in samples {
            assert_eq!(unescape_literal(&escape_literal(s)), s, "round trip of {s:?}");
        }
    }

    #[test]
    fn crlf_becomes_single_break() {
        assert_eq!(escape_literal("a\r\nb\rc"), "a%rb%rc");
    }

    #[test]
    fn attr_escape_is_stable_and_clean() {
        let name = r#"The "Big" Room: [north|south] 50%"#;
        let first = escape_attr(name);
        assert_eq!(first, escape_attr(name));
        assert_eq!(first, "The_$22Big$22_Room$3a_$5bnorth$7csouth$5d_50$25");
        assert!(!first.chars().any(|c| ATTR_RESERVED.contains(&c) || c == ' '));
    }

    #[test]
    fn token_helpers_strip_quotes_and_keep_suffix() {
        assert_eq!(token_id("\"Red Room\""), "Red_Room");
        assert_eq!(token_name("\"Red Room\""), "Red Room");
        assert_eq!(token_id("\"Red Room\".dark"), "Red_Room$22.dark");
        assert_eq!(token_name("\"Red Room\".dark"), "Red Room");
        assert_eq!(token_name("bare"), "bare");
    }
}
