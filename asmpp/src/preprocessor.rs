use std::path::{Path, PathBuf};

use crate::config::PreprocessorConfig;
use crate::error::PreprocessError;
use crate::expand::Expander;
use crate::include::IncludeResolver;
use crate::line::{Line, LineStore};
use crate::macros::MacroTable;
use crate::sanitize::sanitize;

/// Result of one preprocessing run
#[derive(Debug)]
pub struct Preprocessed {
    /// Cleaned, macro-expanded lines ready for the instruction parser
    pub lines: LineStore,
    /// Every macro defined during the run
    pub macros: MacroTable,
    /// Files pulled in through `#include`, sorted
    pub included_files: Vec<PathBuf>,
}

impl Preprocessed {
    /// Texts of the output lines joined with newlines
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.to_string()
    }

    /// Consume the result and return the output lines
    #[must_use]
    pub fn into_lines(self) -> Vec<Line> {
        self.lines.into_lines()
    }
}

/// The preprocessor
///
/// Each call to [`Preprocessor::preprocess`] starts from an empty include set
/// and an empty macro table; nothing carries over between runs.
#[derive(Debug, Default)]
pub struct Preprocessor {
    config: PreprocessorConfig,
}

impl Preprocessor {
    /// Create a preprocessor with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preprocessor with the given configuration
    #[must_use]
    pub fn with_config(config: PreprocessorConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    /// Preprocess the file at `path`
    ///
    /// # Errors
    /// Returns the first `PreprocessError` raised by any pass.
    pub fn preprocess<P: AsRef<Path>>(&self, path: P) -> Result<Preprocessed, PreprocessError> {
        let mut resolver = IncludeResolver::new(&self.config);
        let store = resolver.resolve(path.as_ref())?;
        self.finish(store, &resolver)
    }

    /// Preprocess `source` as if it were the contents of `path`
    ///
    /// Includes are resolved relative to `path`'s directory.
    ///
    /// # Errors
    /// Returns the first `PreprocessError` raised by any pass.
    pub fn preprocess_source<P: AsRef<Path>>(
        &self,
        path: P,
        source: &str,
    ) -> Result<Preprocessed, PreprocessError> {
        let mut resolver = IncludeResolver::new(&self.config);
        let store = resolver.resolve_source(path.as_ref(), source)?;
        self.finish(store, &resolver)
    }

    fn finish(
        &self,
        mut lines: LineStore,
        resolver: &IncludeResolver<'_>,
    ) -> Result<Preprocessed, PreprocessError> {
        sanitize(&mut lines);
        log::debug!("sanitize pass: {} lines", lines.len());

        let mut macros = MacroTable::new(self.config.redefinition);
        Expander::new(&self.config, &mut macros).run(&mut lines)?;

        let mut included_files: Vec<PathBuf> = resolver.included().map(Path::to_path_buf).collect();
        included_files.sort();

        Ok(Preprocessed {
            lines,
            macros,
            included_files,
        })
    }
}
