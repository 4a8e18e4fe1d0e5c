use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::{IncludeBase, PreprocessorConfig};
use crate::error::{Location, PreprocessError};
use crate::line::{Line, LineStore, Origin};
use crate::scanner::{QUOTE, is_blank};

const INCLUDE: &str = "#include";
const INCLUDE_RECURSIVE: &str = "#include_recursive";

/// How an `#include` treats files that were already included
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeMode {
    /// `#include`: skipped if the file was included before
    Once,
    /// `#include_recursive`: always spliced in
    Recursive,
}

#[derive(Debug, PartialEq, Eq)]
struct IncludeDirective<'a> {
    target: &'a str,
    mode: IncludeMode,
}

/// Parse an include directive, `None` if the line is not one
fn parse_directive(text: &str) -> Option<Result<IncludeDirective<'_>, &'static str>> {
    let text = text.trim_start_matches(is_blank);
    let (rest, mode) = if let Some(rest) = text.strip_prefix(INCLUDE_RECURSIVE) {
        (rest, IncludeMode::Recursive)
    } else if let Some(rest) = text.strip_prefix(INCLUDE) {
        (rest, IncludeMode::Once)
    } else {
        return None;
    };

    // `#includes` or `#include_foo` is some other directive
    if !rest.is_empty() && !rest.starts_with(is_blank) && !rest.starts_with(QUOTE) {
        return None;
    }

    let Some(quoted) = rest.trim_start_matches(is_blank).strip_prefix(QUOTE) else {
        return Some(Err("expected a quoted file name"));
    };
    let Some(end) = quoted.find(QUOTE) else {
        return Some(Err("unterminated file name"));
    };
    let target = &quoted[..end];
    if target.is_empty() {
        return Some(Err("empty file name"));
    }
    Some(Ok(IncludeDirective { target, mode }))
}

/// Resolve `.` and `..` without touching the file system
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Expands `#include` directives into a flat line sequence
///
/// The set of included files lives as long as one call to [`resolve`] or
/// [`resolve_source`].
///
/// [`resolve`]: IncludeResolver::resolve
/// [`resolve_source`]: IncludeResolver::resolve_source
pub struct IncludeResolver<'a> {
    config: &'a PreprocessorConfig,
    included: HashSet<PathBuf>,
    root_dir: PathBuf,
}

impl<'a> IncludeResolver<'a> {
    /// Create a resolver loading files through `config`
    #[must_use]
    pub fn new(config: &'a PreprocessorConfig) -> Self {
        Self {
            config,
            included: HashSet::new(),
            root_dir: PathBuf::new(),
        }
    }

    /// Read `path` and expand every include directive in it
    ///
    /// # Errors
    /// Returns `PreprocessError::FileNotFound` if `path` or any included file
    /// is missing, `PreprocessError::MalformedDirective` for an include
    /// without a quoted name, and `PreprocessError::IncludeCycle` when an
    /// `#include_recursive` would never terminate.
    pub fn resolve(&mut self, path: &Path) -> Result<LineStore, PreprocessError> {
        let path = normalize(path);
        let source = self.load(&path, None)?;
        self.resolve_source(&path, &source)
    }

    /// Expand every include directive in `source`, which is treated as the
    /// contents of `path`
    ///
    /// # Errors
    /// Same as [`IncludeResolver::resolve`], minus the top-level read.
    pub fn resolve_source(
        &mut self,
        path: &Path,
        source: &str,
    ) -> Result<LineStore, PreprocessError> {
        let path = normalize(path);
        self.included.clear();
        self.root_dir = parent_dir(&path);

        let mut store = LineStore::from_source(source, &Origin::root(path));
        self.expand(&mut store)?;
        log::debug!(
            "include pass: {} lines, {} files included",
            store.len(),
            self.included.len()
        );
        Ok(store)
    }

    /// Files included so far
    pub fn included(&self) -> impl Iterator<Item = &Path> {
        self.included.iter().map(PathBuf::as_path)
    }

    fn expand(&mut self, store: &mut LineStore) -> Result<(), PreprocessError> {
        let mut cursor = 0;
        while cursor < store.len() {
            let line = &store[cursor];
            let directive = match parse_directive(line.text()) {
                None => {
                    cursor += 1;
                    continue;
                }
                Some(Err(message)) => {
                    return Err(PreprocessError::malformed(
                        format!("{INCLUDE}: {message}"),
                        line.location(),
                    ));
                }
                Some(Ok(directive)) => directive,
            };

            let target = normalize(&self.base_dir(line).join(directive.target));

            if directive.mode == IncludeMode::Once && self.included.contains(&target) {
                log::trace!(
                    "{}: skipping {}, already included",
                    line.location(),
                    target.display()
                );
                store.remove(cursor);
                continue;
            }

            if directive.mode == IncludeMode::Recursive && line.origin().chain_contains(&target) {
                return Err(PreprocessError::IncludeCycle {
                    path: target,
                    location: line.location(),
                });
            }

            let source = self.load(&target, Some(line.location()))?;
            log::trace!("{}: including {}", line.location(), target.display());
            let origin = Origin::included(target.clone(), line);
            self.included.insert(target);

            // the cursor stays put so nested directives are expanded next
            store.replace(cursor, LineStore::from_source(&source, &origin));
        }
        Ok(())
    }

    fn base_dir(&self, line: &Line) -> PathBuf {
        match self.config.include_base {
            IncludeBase::IncludingFile => parent_dir(line.file()),
            IncludeBase::RootFile => self.root_dir.clone(),
        }
    }

    fn load(&self, path: &Path, included_at: Option<Location>) -> Result<String, PreprocessError> {
        self.config.load(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                PreprocessError::FileNotFound {
                    path: path.to_path_buf(),
                    included_at,
                }
            } else {
                PreprocessError::Io {
                    path: path.to_path_buf(),
                    included_at,
                    source,
                }
            }
        })
    }
}

impl std::fmt::Debug for IncludeResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncludeResolver")
            .field("included", &self.included)
            .field("root_dir", &self.root_dir)
            .finish_non_exhaustive()
    }
}
