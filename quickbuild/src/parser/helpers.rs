use crate::escape::{LINE_BREAK, escape_literal};

/// Free text as it is appended to a room or exit buffer.
///
/// Indented lines continue the previous line; anything else starts a new
/// one. Leading whitespace is dropped and tabs become spaces.
pub(super) fn buffer_prefix(line: &str) -> String {
    let trimmed = line.trim_start();
    let lead = if trimmed.len() == line.len() { "\n" } else { "" };
    format!("{lead}{}", trimmed.replace('\t', " "))
}

/// Text for a `>` line: literal-escaped, joined to the previous `>` line
/// with a MUSH line break when the two are adjacent in the input.
pub(super) fn escaped_line(rest: &str, joined: bool) -> String {
    let lead = if joined { LINE_BREAK } else { "\n" };
    format!("{lead}{}", escape_literal(rest))
}
