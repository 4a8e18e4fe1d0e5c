#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Stack-assembly Preprocessor Library
//!
//! This library turns a stack-machine assembly source file into the clean
//! line stream the instruction parser expects. It runs three passes over a
//! single line buffer:
//!
//! 1. include resolution (`#include`, `#include_recursive`)
//! 2. sanitizing: `;` comments, indentation and redundant blanks are removed
//! 3. macro definition and expansion (`#define`, `#macro` … `#endmacro`)
//!
//! String literals are never touched by any pass. Every output line remembers
//! the file and line it came from, so errors point at the original source.
//!
//! ## Example
//!
//! ```rust,no_run
//! use asmpp::{preprocess_file, PreprocessorConfig};
//!
//! let config = PreprocessorConfig::default();
//! let lines = preprocess_file("program.asm", &config).unwrap();
//! for line in lines {
//!     println!("{line}");
//! }
//! ```

mod config;
mod error;
mod expand;
mod include;
mod line;
mod macros;
mod preprocessor;
pub mod sanitize;
pub mod scanner;
pub mod search;

pub use config::{IncludeBase, PreprocessorConfig, SourceLoader, WarningHandler};
pub use error::{Location, PreprocessError};
pub use expand::Expander;
pub use include::{IncludeMode, IncludeResolver};
pub use line::{Line, LineStore};
pub use macros::{Macro, MacroTable, Redefinition};
pub use preprocessor::{Preprocessed, Preprocessor};
pub use search::Boundary;

use std::path::Path;

/// Preprocess a file and return the output line texts
///
/// # Errors
/// Returns `PreprocessError` if a file cannot be read, a directive is
/// malformed, or macro expansion does not terminate.
pub fn preprocess_file<P: AsRef<Path>>(
    path: P,
    config: &PreprocessorConfig,
) -> Result<Vec<String>, PreprocessError> {
    let output = Preprocessor::with_config(config.clone()).preprocess(path)?;
    Ok(output.lines.texts().map(str::to_string).collect())
}

/// Preprocess in-memory source named `path` and return the output joined
/// with newlines
///
/// # Errors
/// Same as [`preprocess_file`].
pub fn preprocess_str<P: AsRef<Path>>(
    path: P,
    source: &str,
    config: &PreprocessorConfig,
) -> Result<String, PreprocessError> {
    let output = Preprocessor::with_config(config.clone()).preprocess_source(path, source)?;
    Ok(output.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::io;
    use std::path::PathBuf;

    fn virtual_files(files: &[(&str, &str)]) -> PreprocessorConfig {
        let files: HashMap<PathBuf, String> = files
            .iter()
            .map(|(path, text)| (PathBuf::from(path), (*text).to_string()))
            .collect();
        PreprocessorConfig::default().with_loader(move |path| {
            files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        })
    }

    #[test]
    fn no_directives_only_cleans() {
        let src = "  push 1 ; one\n\tprint \"a ; b\",  2\npop   ";
        let out = preprocess_str("main.asm", src, &PreprocessorConfig::default()).unwrap();
        assert_eq!(out, "push 1\nprint \"a ; b\",2\npop");
    }

    #[test]
    fn define_from_included_header() {
        let config = virtual_files(&[
            ("main.asm", "#include \"h.asm\"\npush N"),
            ("h.asm", "#define N 5"),
        ]);
        assert_eq!(preprocess_file("main.asm", &config).unwrap(), ["push 5"]);
    }

    #[test]
    fn header_included_once() {
        let config = virtual_files(&[
            ("main.asm", "#include \"b.asm\"\npush 1\n#include \"b.asm\"\npush 2"),
            ("b.asm", "pop"),
        ]);
        assert_eq!(
            preprocess_file("main.asm", &config).unwrap(),
            ["pop", "push 1", "push 2"]
        );
    }

    #[test]
    fn recursive_include_repeats_content() {
        let config = virtual_files(&[
            ("main.asm", "#include \"b.asm\"\n#include_recursive \"b.asm\""),
            ("b.asm", "pop"),
        ]);
        assert_eq!(preprocess_file("main.asm", &config).unwrap(), ["pop", "pop"]);
    }

    #[test]
    fn comments_and_indentation_inside_macro_blocks() {
        let src = r#"
#macro GREET      ; prints a greeting
    print "hi; there",  10
    pop
#endmacro
GREET
"#;
        let out = preprocess_str("main.asm", src, &PreprocessorConfig::default()).unwrap();
        assert_eq!(out, "\nprint \"hi; there\",10\npop");
    }

    #[test]
    fn macro_defined_after_use_is_not_expanded() {
        let src = "push N\nnop\nnop\nnop\nnop\n#define N 5\npush N";
        let out = preprocess_str("main.asm", src, &PreprocessorConfig::default()).unwrap();
        assert_eq!(out, "push N\nnop\nnop\nnop\nnop\npush 5");
    }

    #[test]
    fn result_exposes_macros_and_includes() {
        let config = virtual_files(&[
            ("main.asm", "#include \"lib/defs.asm\"\nINIT"),
            ("lib/defs.asm", "#define INIT push 0\n#define INIT push 1"),
        ]);
        let out = Preprocessor::with_config(config).preprocess("main.asm").unwrap();
        assert_eq!(out.included_files, [PathBuf::from("lib/defs.asm")]);
        assert_eq!(out.macros.get("INIT").unwrap().body(), ["push 0", "push 1"]);
        assert_eq!(out.text(), "push 0\npush 1");
        let lines = out.into_lines();
        assert_eq!(lines[1].file(), Path::new("main.asm"));
        assert_eq!(lines[1].number(), 2);
    }

    #[test]
    fn error_location_points_into_included_file() {
        let config = virtual_files(&[
            ("main.asm", "nop\n#include \"m.asm\""),
            ("m.asm", "nop\n#macro BROKEN\npush 1"),
        ]);
        let err = preprocess_file("main.asm", &config).unwrap_err();
        let location = err.location().unwrap();
        assert_eq!(location.file, PathBuf::from("m.asm"));
        assert_eq!(location.line, 2);
        assert_eq!(location.included_from, vec![Location::new("main.asm", 2)]);
        assert!(matches!(err, PreprocessError::UnterminatedMacroBlock { .. }));
    }

    #[test]
    fn macros_do_not_leak_between_runs() {
        let pp = Preprocessor::new();
        let first = pp.preprocess_source("a.asm", "#define N 1\npush N").unwrap();
        assert_eq!(first.text(), "push 1");
        let second = pp.preprocess_source("b.asm", "push N").unwrap();
        assert_eq!(second.text(), "push N");
    }

    #[test]
    fn reads_nested_includes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("main.asm"), "#include \"lib/io.asm\"\nPRINT_ALL\n").unwrap();
        fs::write(
            dir.path().join("lib/io.asm"),
            "#include \"consts.asm\"\n#macro PRINT_ALL\nprint GREETING\n#endmacro\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("lib/consts.asm"),
            "#define GREETING \"hello, world\"\n",
        )
        .unwrap();

        let out = preprocess_file(dir.path().join("main.asm"), &PreprocessorConfig::default())
            .unwrap();
        assert_eq!(out, ["print \"hello, world\""]);
    }

    #[test]
    fn legacy_includes_resolve_from_top_level_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("main.asm"), "#include \"lib/a.asm\"\n").unwrap();
        fs::write(dir.path().join("lib/a.asm"), "#include \"b.asm\"\n").unwrap();
        fs::write(dir.path().join("b.asm"), "push 1\n").unwrap();

        let main = dir.path().join("main.asm");
        let out = preprocess_file(&main, &PreprocessorConfig::legacy()).unwrap();
        assert_eq!(out, ["push 1"]);

        let err = preprocess_file(&main, &PreprocessorConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::FileNotFound { .. }));
    }

    #[test]
    fn missing_top_level_file() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            preprocess_file(dir.path().join("absent.asm"), &PreprocessorConfig::default())
                .unwrap_err();
        assert!(err.is_io());
        assert!(err.location().is_none());
    }
}
