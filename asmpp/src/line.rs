use std::fmt;
use std::ops::{Index, Range};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::Location;

/// A source file as it entered the line stream
#[derive(Debug)]
pub(crate) struct Origin {
    path: PathBuf,
    included_from: Option<(Rc<Origin>, usize)>,
}

impl Origin {
    pub(crate) fn root(path: PathBuf) -> Rc<Self> {
        Rc::new(Self {
            path,
            included_from: None,
        })
    }

    pub(crate) fn included(path: PathBuf, directive: &Line) -> Rc<Self> {
        Rc::new(Self {
            path,
            included_from: Some((Rc::clone(&directive.origin), directive.number)),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `path` is this file or one of the files that included it
    pub(crate) fn chain_contains(&self, path: &Path) -> bool {
        let mut current = Some(self);
        while let Some(origin) = current {
            if origin.path == path {
                return true;
            }
            current = origin.included_from.as_ref().map(|(parent, _)| parent.as_ref());
        }
        false
    }
}

/// One line of source text together with where it came from
#[derive(Clone, Debug)]
pub struct Line {
    text: String,
    number: usize,
    origin: Rc<Origin>,
    depth: usize,
}

impl Line {
    pub(crate) fn new(text: impl Into<String>, number: usize, origin: Rc<Origin>) -> Self {
        Self {
            text: text.into(),
            number,
            origin,
            depth: 0,
        }
    }

    /// A line produced by expanding a multi-line macro on this line
    pub(crate) fn spawn(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            number: self.number,
            origin: Rc::clone(&self.origin),
            depth: self.depth + 1,
        }
    }

    /// Current text of the line
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Mutable access to the text of the line
    pub fn text_mut(&mut self) -> &mut String {
        &mut self.text
    }

    /// 1-based line number in the originating file
    #[must_use]
    pub const fn number(&self) -> usize {
        self.number
    }

    /// File the line was read from
    #[must_use]
    pub fn file(&self) -> &Path {
        self.origin.path()
    }

    /// How many multi-line macro expansions produced this line
    #[must_use]
    pub const fn expansion_depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn origin(&self) -> &Rc<Origin> {
        &self.origin
    }

    /// Source location of the line, including the `#include` chain
    #[must_use]
    pub fn location(&self) -> Location {
        let mut included_from = Vec::new();
        let mut parent = self.origin.included_from.as_ref();
        while let Some((origin, number)) = parent {
            included_from.push(Location::new(origin.path.clone(), *number));
            parent = origin.included_from.as_ref();
        }
        Location {
            file: self.origin.path.clone(),
            line: self.number,
            included_from,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Ordered, mutable working buffer shared by every pass
///
/// Positions are plain indices: after any insertion or removal a caller must
/// recompute the index it is working on.
#[derive(Clone, Debug, Default)]
pub struct LineStore {
    lines: Vec<Line>,
}

impl LineStore {
    /// Create an empty store
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Split `source` into numbered lines belonging to `origin`
    pub(crate) fn from_source(source: &str, origin: &Rc<Origin>) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, text)| Line::new(text, i + 1, Rc::clone(origin)))
            .collect();
        Self { lines }
    }

    /// Number of lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the store holds no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Mutable line at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Line> {
        self.lines.get_mut(index)
    }

    /// Insert `lines` so that the first of them ends up at `index`
    ///
    /// # Panics
    /// Panics if `index > len`.
    pub fn insert_all<I>(&mut self, index: usize, lines: I)
    where
        I: IntoIterator<Item = Line>,
    {
        self.lines.splice(index..index, lines);
    }

    /// Remove and return the line at `index`
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> Line {
        self.lines.remove(index)
    }

    /// Remove and return every line in `range`
    ///
    /// # Panics
    /// Panics if `range` is out of bounds.
    pub fn remove_range(&mut self, range: Range<usize>) -> Vec<Line> {
        self.lines.drain(range).collect()
    }

    /// Replace the line at `index` with `lines`
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn replace<I>(&mut self, index: usize, lines: I)
    where
        I: IntoIterator<Item = Line>,
    {
        self.lines.splice(index..=index, lines);
    }

    /// Iterate over the lines in order
    pub fn iter(&self) -> std::slice::Iter<'_, Line> {
        self.lines.iter()
    }

    /// Iterate mutably over the lines in order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Line> {
        self.lines.iter_mut()
    }

    /// Texts of every line in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(Line::text)
    }

    /// Consume the store and return its lines
    #[must_use]
    pub fn into_lines(self) -> Vec<Line> {
        self.lines
    }
}

impl Index<usize> for LineStore {
    type Output = Line;

    fn index(&self, index: usize) -> &Line {
        &self.lines[index]
    }
}

impl IntoIterator for LineStore {
    type Item = Line;
    type IntoIter = std::vec::IntoIter<Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<'a> IntoIterator for &'a LineStore {
    type Item = &'a Line;
    type IntoIter = std::slice::Iter<'a, Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

impl fmt::Display for LineStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(line.text())?;
        }
        Ok(())
    }
}
