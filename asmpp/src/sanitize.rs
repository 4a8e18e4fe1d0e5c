//! Comment and blank stripping.

use std::ops::ControlFlow;

use crate::line::LineStore;
use crate::scanner::{find_unquoted_char, for_each_unquoted, is_blank, is_unquoted_at};

/// Line comment marker
pub const COMMENT: char = ';';

/// Cut the line at the first `;` outside a string literal
pub fn strip_comment(line: &mut String) {
    if let Some(offset) = find_unquoted_char(line, 0, |c| c == COMMENT) {
        line.truncate(offset);
    }
}

/// Remove leading spaces and tabs
pub fn strip_leading_blanks(line: &mut String) {
    let blanks = line.len() - line.trim_start_matches(is_blank).len();
    if blanks > 0 {
        line.drain(..blanks);
    }
}

/// Remove every unquoted blank that directly follows a comma or another blank
///
/// `mov  a,  b` becomes `mov a,b`. The first blank after a token is kept, so
/// the mnemonic stays separated from its operands.
pub fn collapse_blanks(line: &mut String) {
    let mut redundant = Vec::new();
    // last kept unquoted character and the offset right after it
    let mut previous: Option<(usize, char)> = None;

    for_each_unquoted(line, 0, |offset, ch| {
        let end = offset + ch.len_utf8();
        let after_separator = matches!(
            previous,
            Some((prev_end, prev)) if prev_end == offset && (prev == ',' || is_blank(prev))
        );
        previous = match previous {
            Some((_, prev)) if after_separator && is_blank(ch) => {
                redundant.push(offset);
                Some((end, prev))
            }
            _ => Some((end, ch)),
        };
        ControlFlow::Continue(())
    });

    for offset in redundant.into_iter().rev() {
        line.remove(offset);
    }
}

/// Remove trailing spaces and tabs that are not part of a string literal
pub fn strip_trailing_blanks(line: &mut String) {
    let kept = line.trim_end_matches(is_blank).len();
    if kept < line.len() && is_unquoted_at(line, kept) {
        line.truncate(kept);
    }
}

/// Apply every sanitizing step to one line
pub fn sanitize_line(line: &mut String) {
    strip_comment(line);
    strip_leading_blanks(line);
    collapse_blanks(line);
    strip_trailing_blanks(line);
}

/// Sanitize every line of `store` in place
pub fn sanitize(store: &mut LineStore) {
    for line in store.iter_mut() {
        sanitize_line(line.text_mut());
    }
}
