//! Quote-aware character traversal.
//!
//! Everything between an unescaped pair of double quotes is opaque: comment
//! stripping, blank collapsing and macro lookup never look inside a string
//! literal. An unterminated quote swallows the rest of the line.

use std::ops::ControlFlow;

/// String literal delimiter
pub const QUOTE: char = '"';

/// Escape character inside string literals
pub const ESCAPE: char = '\\';

/// Check if a character is a blank (space or tab)
#[must_use]
pub const fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Visit every character of `text` from byte offset `start` that lies
/// outside a string literal.
///
/// `visit` receives the byte offset and the character, and returns
/// `ControlFlow::Break(())` to stop the scan. The quote characters
/// themselves are never visited. Returns `true` if `visit` stopped the scan.
///
/// A `start` past the end of `text`, or not on a character boundary, visits
/// nothing.
pub fn for_each_unquoted<F>(text: &str, start: usize, mut visit: F) -> bool
where
    F: FnMut(usize, char) -> ControlFlow<()>,
{
    let Some(tail) = text.get(start..) else {
        return false;
    };

    let mut in_quotes = false;
    let mut chars = tail.char_indices();
    while let Some((offset, ch)) = chars.next() {
        if in_quotes {
            if ch == ESCAPE {
                chars.next();
            } else if ch == QUOTE {
                in_quotes = false;
            }
        } else if ch == QUOTE {
            in_quotes = true;
        } else if visit(start + offset, ch).is_break() {
            return true;
        }
    }
    false
}

/// Find the first unquoted character matching `pred`, starting at `start`
#[must_use]
pub fn find_unquoted_char<P>(text: &str, start: usize, mut pred: P) -> Option<usize>
where
    P: FnMut(char) -> bool,
{
    let mut found = None;
    for_each_unquoted(text, start, |offset, ch| {
        if pred(ch) {
            found = Some(offset);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    found
}

/// Find `needle` in `text`, ignoring occurrences that start inside a string
/// literal.
///
/// An empty needle, or one that starts with a quote, never matches.
#[must_use]
pub fn find_unquoted(text: &str, needle: &str, start: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let mut found = None;
    for_each_unquoted(text, start, |offset, _| {
        if text[offset..].starts_with(needle) {
            found = Some(offset);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    found
}

/// Whether the character at byte `offset` is outside any string literal
#[must_use]
pub fn is_unquoted_at(text: &str, offset: usize) -> bool {
    let mut hit = false;
    for_each_unquoted(text, 0, |at, _| {
        if at >= offset {
            hit = at == offset;
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    hit
}
