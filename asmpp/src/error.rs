use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A position in the original (pre-expansion) source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// File the line was read from
    pub file: PathBuf,
    /// 1-based line number inside `file`
    pub line: usize,
    /// Chain of `#include` directives that pulled `file` in, innermost first
    pub included_from: Vec<Location>,
}

impl Location {
    /// Create a location with no include chain
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            included_from: Vec::new(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

fn at_prefix(at: &Option<Location>) -> String {
    match at {
        Some(location) => format!("{location}: "),
        None => String::new(),
    }
}

/// Errors that can occur during preprocessing
///
/// Every variant is fatal: preprocessing stops at the first one.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Top-level or included file does not exist
    #[error("{}file not found: {}", at_prefix(.included_at), .path.display())]
    FileNotFound {
        /// Path that was looked up
        path: PathBuf,
        /// The `#include` line, `None` for the top-level file
        included_at: Option<Location>,
    },
    /// File exists but could not be read
    #[error("{}failed to read {}: {source}", at_prefix(.included_at), .path.display())]
    Io {
        /// Path that was read
        path: PathBuf,
        /// The `#include` line, `None` for the top-level file
        included_at: Option<Location>,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
    /// Directive that cannot be parsed
    #[error("{location}: malformed directive: {message}")]
    MalformedDirective {
        /// What is wrong with it
        message: String,
        /// Where the directive is
        location: Location,
    },
    /// `#define` without a value, or `#macro` block without any body line
    #[error("{location}: empty macro `{name}`")]
    EmptyMacro {
        /// Macro name
        name: String,
        /// The defining line
        location: Location,
    },
    /// `#macro` block that reaches end of input without `#endmacro`
    #[error("{location}: unterminated macro `{name}`, missing #endmacro")]
    UnterminatedMacroBlock {
        /// Macro name
        name: String,
        /// The `#macro` line
        location: Location,
    },
    /// Macro expansion that does not terminate
    #[error("{location}: recursive expansion of macro `{name}`")]
    RecursiveMacro {
        /// Macro being expanded when the limit was hit
        name: String,
        /// Line being expanded
        location: Location,
    },
    /// `#include_recursive` of a file that is already including it
    #[error("{location}: include cycle through {}", .path.display())]
    IncludeCycle {
        /// File that would be included again
        path: PathBuf,
        /// The offending `#include_recursive` line
        location: Location,
    },
}

impl PreprocessError {
    pub(crate) fn malformed(message: impl Into<String>, location: Location) -> Self {
        Self::MalformedDirective {
            message: message.into(),
            location,
        }
    }

    /// Source location the error refers to, if any
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::FileNotFound { included_at, .. } | Self::Io { included_at, .. } => {
                included_at.as_ref()
            }
            Self::MalformedDirective { location, .. }
            | Self::EmptyMacro { location, .. }
            | Self::UnterminatedMacroBlock { location, .. }
            | Self::RecursiveMacro { location, .. }
            | Self::IncludeCycle { location, .. } => Some(location),
        }
    }

    /// Whether the error comes from reading a file rather than from its contents
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::FileNotFound { .. } | Self::Io { .. })
    }
}
