//! Substring search bounded by delimiter characters.

use std::ops::ControlFlow;

use crate::scanner::for_each_unquoted;

/// Characters that may surround a macro name on an ordinary line
pub const MACRO_DELIMITERS: &[char] = &[' ', ',', '\t'];

/// Which sides of a match must sit on a delimiter or string boundary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Boundary {
    /// Only the character after the match is checked, so `FOO` matches the
    /// tail of `XFOO`
    Trailing,
    /// Both the character before and the character after the match are checked
    #[default]
    Both,
}

fn is_delimited(
    haystack: &str,
    start: usize,
    end: usize,
    delimiters: &[char],
    boundary: Boundary,
) -> bool {
    let trailing_ok = haystack[end..]
        .chars()
        .next()
        .is_none_or(|c| delimiters.contains(&c));
    if !trailing_ok {
        return false;
    }
    match boundary {
        Boundary::Trailing => true,
        Boundary::Both => haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| delimiters.contains(&c)),
    }
}

/// Find the first occurrence of `needle` in `haystack` bounded by
/// `delimiters` or the ends of the string.
///
/// Overlapping candidates are all considered, so `aa` is found at offset 1
/// in `aaa,` under [`Boundary::Trailing`].
#[must_use]
pub fn find_delimited(
    haystack: &str,
    needle: &str,
    delimiters: &[char],
    boundary: Boundary,
) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .char_indices()
        .map(|(offset, _)| offset)
        .find(|&offset| {
            haystack[offset..].starts_with(needle)
                && is_delimited(
                    haystack,
                    offset,
                    offset + needle.len(),
                    delimiters,
                    boundary,
                )
        })
}

/// Like [`find_delimited`], but matches starting inside a string literal are
/// skipped.
#[must_use]
pub fn find_delimited_unquoted(
    haystack: &str,
    needle: &str,
    delimiters: &[char],
    boundary: Boundary,
) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let mut found = None;
    for_each_unquoted(haystack, 0, |offset, _| {
        if haystack[offset..].starts_with(needle)
            && is_delimited(
                haystack,
                offset,
                offset + needle.len(),
                delimiters,
                boundary,
            )
        {
            found = Some(offset);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    found
}
