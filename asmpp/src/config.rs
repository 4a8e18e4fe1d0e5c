use std::io;
use std::path::Path;
use std::rc::Rc;

use crate::macros::Redefinition;
use crate::search::Boundary;

/// Type alias for a source loader function
///
/// Given a resolved path, returns the file contents. The default loader reads
/// from the file system.
pub type SourceLoader = Rc<dyn Fn(&Path) -> io::Result<String>>;

/// Type alias for warning handler function
pub type WarningHandler = Rc<dyn Fn(&str)>;

/// Directory that `#include` paths are relative to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IncludeBase {
    /// The directory of the file containing the directive
    #[default]
    IncludingFile,
    /// The directory of the top-level file, whatever the nesting
    RootFile,
}

/// Configuration for the preprocessor
#[derive(Clone)]
pub struct PreprocessorConfig {
    /// How nested include paths are resolved
    pub include_base: IncludeBase,
    /// What a second definition of a macro does
    pub redefinition: Redefinition,
    /// Which sides of a macro name must be delimited
    pub boundary: Boundary,
    /// Maximum nesting of multi-line expansions
    pub recursion_limit: usize,
    /// Custom source loader
    pub loader: Option<SourceLoader>,
    /// Optional handler for non-fatal diagnostics
    pub warning_handler: Option<WarningHandler>,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            include_base: IncludeBase::IncludingFile,
            redefinition: Redefinition::Append,
            boundary: Boundary::Both,
            recursion_limit: 128,
            loader: None,
            warning_handler: None,
        }
    }
}

impl PreprocessorConfig {
    /// Configuration matching the historical behaviour: includes resolve
    /// against the top-level file and macro names are only checked on their
    /// trailing side
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            include_base: IncludeBase::RootFile,
            boundary: Boundary::Trailing,
            ..Self::default()
        }
    }

    /// Set how include paths are resolved
    #[must_use]
    pub const fn with_include_base(mut self, base: IncludeBase) -> Self {
        self.include_base = base;
        self
    }

    /// Set the macro redefinition policy
    #[must_use]
    pub const fn with_redefinition(mut self, redefinition: Redefinition) -> Self {
        self.redefinition = redefinition;
        self
    }

    /// Set the macro name boundary check
    #[must_use]
    pub const fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Set the expansion limit
    #[must_use]
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Load sources through `loader` instead of the file system
    #[must_use]
    pub fn with_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&Path) -> io::Result<String> + 'static,
    {
        self.loader = Some(Rc::new(loader));
        self
    }

    /// Set a warning handler
    #[must_use]
    pub fn with_warning_handler(mut self, handler: WarningHandler) -> Self {
        self.warning_handler = Some(handler);
        self
    }

    pub(crate) fn load(&self, path: &Path) -> io::Result<String> {
        match &self.loader {
            Some(loader) => loader(path),
            None => std::fs::read_to_string(path),
        }
    }

    pub(crate) fn warn(&self, message: &str) {
        match &self.warning_handler {
            Some(handler) => {
                log::debug!("{message}");
                handler(message);
            }
            None => log::warn!("{message}"),
        }
    }
}

impl std::fmt::Debug for PreprocessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessorConfig")
            .field("include_base", &self.include_base)
            .field("redefinition", &self.redefinition)
            .field("boundary", &self.boundary)
            .field("recursion_limit", &self.recursion_limit)
            .field("loader", &self.loader.is_some())
            .field("warning_handler", &self.warning_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn legacy_preset() {
        let config = PreprocessorConfig::legacy();
        assert_eq!(config.include_base, IncludeBase::RootFile);
        assert_eq!(config.boundary, Boundary::Trailing);
        assert_eq!(config.redefinition, Redefinition::Append);
    }

    #[test]
    fn custom_loader_is_used() {
        let config = PreprocessorConfig::default().with_loader(|path| {
            Ok(format!("; {}", path.display()))
        });
        assert_eq!(config.load(Path::new("a.asm")).unwrap(), "; a.asm");
    }

    #[test]
    fn warnings_reach_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let config = PreprocessorConfig::default().with_warning_handler(Rc::new(move |msg: &str| {
            sink.borrow_mut().push(msg.to_string());
        }));
        config.warn("unknown directive");
        assert_eq!(*seen.borrow(), ["unknown directive"]);
    }

    #[test]
    fn warnings_without_handler_go_to_the_log_only() {
        let config = PreprocessorConfig::default();
        assert!(config.warning_handler.is_none());
        config.warn("unknown directive");
    }
}
