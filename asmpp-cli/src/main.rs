#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # asmpp CLI
//!
//! A command-line interface for the asmpp stack-assembly preprocessor.

use anyhow::{Context, Result};
use asmpp::{
    Boundary, IncludeBase, PreprocessError, Preprocessed, Preprocessor, PreprocessorConfig,
    Redefinition, WarningHandler,
};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const PREPROCESS_ERROR: i32 = 3;
}

/// Name used for diagnostics when reading from stdin
const STDIN_NAME: &str = "<stdin>";

/// Command-line interface for the asmpp preprocessor
#[derive(Parser)]
#[command(
    name = "asmpp",
    version,
    author,
    about = "Include, comment and macro preprocessor for stack-machine assembly",
    long_about = "asmpp resolves #include directives, strips comments and redundant blanks, and expands #define and #macro blocks, producing the clean line stream consumed by the instruction parser.",
    after_help = "EXAMPLES:
  # Preprocess a program to stdout
  $ asmpp program.asm

  # Write the result to a file
  $ asmpp program.asm -o program.pp

  # Reproduce the historical include and macro matching rules
  $ asmpp program.asm --legacy

  # Read from stdin, includes resolve against the working directory
  $ cat program.asm | asmpp -

  # Full report with line provenance and macro table
  $ asmpp program.asm --json"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input file to preprocess (use '-' for stdin)
    #[arg(help = "Input source file to preprocess (use '-' for stdin)")]
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(
        short = 'o',
        long,
        help = "Output file (use '-' for stdout, default: stdout)"
    )]
    output: Option<PathBuf>,

    /// Directory include paths are relative to
    #[arg(
        long,
        value_enum,
        default_value = "including-file",
        help = "Directory that #include paths are relative to"
    )]
    include_base: IncludeBaseValue,

    /// What a repeated #define does
    #[arg(
        long,
        value_enum,
        default_value = "append",
        help = "What a second definition of a macro does"
    )]
    redefinition: RedefinitionValue,

    /// Macro name boundary check
    #[arg(
        long,
        value_enum,
        default_value = "both",
        help = "Which sides of a macro name must be delimited"
    )]
    boundary: BoundaryValue,

    /// Use the historical include and matching rules
    #[arg(
        long,
        conflicts_with_all = ["include_base", "boundary"],
        help = "Resolve includes from the top-level file and check only the trailing side of macro names"
    )]
    legacy: bool,

    /// Maximum nesting of multi-line macro expansions
    #[arg(
        long,
        default_value = "128",
        help = "Maximum nesting of multi-line macro expansions"
    )]
    recursion_limit: usize,

    /// Output in JSON format
    #[arg(long, help = "Output lines, macros and included files as JSON")]
    #[cfg(feature = "json")]
    json: bool,

    /// Enable verbose output
    #[arg(
        short = 'v',
        long,
        help = "Enable verbose output with diagnostic information"
    )]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short = 'q', long, help = "Suppress non-error output (quiet mode)")]
    quiet: bool,

    /// Show preprocessing warnings
    #[arg(short = 'W', long, help = "Report unrecognised directives")]
    warnings: bool,

    /// Show what would happen without preprocessing
    #[arg(
        short = 'n',
        long,
        help = "Show what would happen without actually preprocessing"
    )]
    dry_run: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    no_color: bool,

    /// Force colored output
    #[arg(long, help = "Force colored output even when not a terminal")]
    force_color: bool,
}

/// Include base values for CLI
#[derive(Clone, Copy, Debug, ValueEnum)]
enum IncludeBaseValue {
    IncludingFile,
    RootFile,
}

impl From<IncludeBaseValue> for IncludeBase {
    fn from(value: IncludeBaseValue) -> Self {
        match value {
            IncludeBaseValue::IncludingFile => IncludeBase::IncludingFile,
            IncludeBaseValue::RootFile => IncludeBase::RootFile,
        }
    }
}

/// Redefinition policy values for CLI
#[derive(Clone, Copy, Debug, ValueEnum)]
enum RedefinitionValue {
    Append,
    Replace,
}

impl From<RedefinitionValue> for Redefinition {
    fn from(value: RedefinitionValue) -> Self {
        match value {
            RedefinitionValue::Append => Redefinition::Append,
            RedefinitionValue::Replace => Redefinition::Replace,
        }
    }
}

/// Boundary check values for CLI
#[derive(Clone, Copy, Debug, ValueEnum)]
enum BoundaryValue {
    Trailing,
    Both,
}

impl From<BoundaryValue> for Boundary {
    fn from(value: BoundaryValue) -> Self {
        match value {
            BoundaryValue::Trailing => Boundary::Trailing,
            BoundaryValue::Both => Boundary::Both,
        }
    }
}

/// Global flag to track if any warnings occurred
static WARNINGS_OCCURRED: AtomicBool = AtomicBool::new(false);

/// Main application entry point
fn main() {
    std::process::exit(match run() {
        Ok(()) => {
            if WARNINGS_OCCURRED.load(Ordering::Relaxed) {
                exit_code::GENERAL_ERROR
            } else {
                exit_code::SUCCESS
            }
        }
        Err(e) => {
            report_error(&e);
            determine_exit_code(&e)
        }
    });
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if let Some(err) = error.downcast_ref::<PreprocessError>() {
        if err.is_io() {
            exit_code::IO_ERROR
        } else {
            exit_code::PREPROCESS_ERROR
        }
    } else if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

/// Print one diagnostic for a fatal error
fn report_error(error: &anyhow::Error) {
    eprintln!("{} {error:#}", "error:".red().bold());
    if let Some(location) = error
        .downcast_ref::<PreprocessError>()
        .and_then(PreprocessError::location)
    {
        for parent in &location.included_from {
            eprintln!("  {} {parent}", "included from".dimmed());
        }
    }
}

/// Run the main application logic
fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_color(&cli);
    init_logging(&cli);

    validate_args(&cli)?;

    if cli.dry_run {
        show_dry_run_info(&cli);
        return Ok(());
    }

    let preprocessor = Preprocessor::with_config(create_config(&cli));

    let start_time = std::time::Instant::now();
    let output = if is_stdio(&cli.input) {
        let source = read_stdin()?;
        preprocessor.preprocess_source(STDIN_NAME, &source)?
    } else {
        preprocessor.preprocess(&cli.input)?
    };
    let processing_time = start_time.elapsed();

    write_output(&cli, &output, processing_time)?;

    if cli.verbose {
        show_verbose_info(&cli, &output, processing_time);
    }

    if cli.verbose && !cli.quiet {
        let output_display = cli
            .output
            .as_deref()
            .map_or_else(|| "stdout".to_string(), format_output);
        eprintln!(
            "{} Preprocessed {} -> {output_display}",
            "✓".green(),
            format_input(&cli.input)
        );
    }

    Ok(())
}

fn is_stdio(path: &Path) -> bool {
    path == Path::new("-")
}

/// Apply --no-color / --force-color, otherwise color only on a terminal
fn setup_color(cli: &Cli) {
    if cli.no_color {
        colored::control::set_override(false);
    } else if cli.force_color {
        colored::control::set_override(true);
    } else if !std::io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Install the logger; `RUST_LOG` overrides the level chosen by the flags
fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// Validate command-line arguments
fn validate_args(cli: &Cli) -> Result<()> {
    if let Some(output) = &cli.output
        && !is_stdio(output)
        && std::fs::canonicalize(output).ok() == std::fs::canonicalize(&cli.input).ok()
    {
        return Err(anyhow::anyhow!(
            "Input and output files cannot be the same: {}",
            output.display()
        ));
    }

    if cli.recursion_limit == 0 {
        return Err(anyhow::anyhow!("Recursion limit must be greater than 0"));
    }

    Ok(())
}

/// Show dry run information
fn show_dry_run_info(cli: &Cli) {
    let config = create_config(cli);
    let output_display = cli
        .output
        .as_deref()
        .map_or_else(|| "stdout".to_string(), format_output);

    eprintln!(
        "Dry run: would preprocess {} -> {output_display}",
        format_input(&cli.input)
    );
    show_config(&config);

    #[cfg(feature = "json")]
    if cli.json {
        eprintln!("Output format: JSON");
    }
}

fn show_config(config: &PreprocessorConfig) {
    eprintln!("Include base: {:?}", config.include_base);
    eprintln!("Redefinition: {:?}", config.redefinition);
    eprintln!("Boundary: {:?}", config.boundary);
    eprintln!("Recursion limit: {}", config.recursion_limit);
}

/// Create preprocessor configuration from CLI arguments
fn create_config(cli: &Cli) -> PreprocessorConfig {
    let base = if cli.legacy {
        PreprocessorConfig::legacy()
    } else {
        PreprocessorConfig::default()
            .with_include_base(cli.include_base.into())
            .with_boundary(cli.boundary.into())
    };

    let mut config = base
        .with_redefinition(cli.redefinition.into())
        .with_recursion_limit(cli.recursion_limit);

    if cli.warnings {
        config = config.with_warning_handler(create_warning_handler(cli));
    }

    config
}

/// Create a warning handler
fn create_warning_handler(cli: &Cli) -> WarningHandler {
    let quiet = cli.quiet;

    Rc::new(move |message: &str| {
        WARNINGS_OCCURRED.store(true, Ordering::Relaxed);
        if !quiet {
            eprintln!("{} {message}", "warning:".yellow().bold());
        }
    })
}

/// Read the whole of stdin
fn read_stdin() -> Result<String> {
    use std::io::Read;
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

/// Write output to file or stdout
fn write_output(
    cli: &Cli,
    output: &Preprocessed,
    processing_time: std::time::Duration,
) -> Result<()> {
    #[cfg(feature = "json")]
    if cli.json {
        return write_json_output(cli, output, processing_time);
    }
    #[cfg(not(feature = "json"))]
    let _ = processing_time;

    let mut content = output.text();
    if !content.is_empty() {
        content.push('\n');
    }

    match &cli.output {
        Some(output_path) if !is_stdio(output_path) => {
            std::fs::write(output_path, content).with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => {
            print!("{content}");
        }
    }

    Ok(())
}

/// JSON report types
#[cfg(feature = "json")]
mod report {
    use asmpp::{Line, Macro, Preprocessed};
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct Report<'a> {
        pub success: bool,
        pub input_file: String,
        pub output_file: Option<String>,
        pub lines: Vec<ReportLine<'a>>,
        pub macros: Vec<ReportMacro<'a>>,
        pub included_files: Vec<String>,
        pub processing_time_ms: u128,
    }

    #[derive(Serialize)]
    pub struct ReportLine<'a> {
        pub text: &'a str,
        pub file: String,
        pub line: usize,
    }

    #[derive(Serialize)]
    pub struct ReportMacro<'a> {
        pub name: &'a str,
        pub body: &'a [String],
        pub defined_at: String,
    }

    impl<'a> From<&'a Line> for ReportLine<'a> {
        fn from(line: &'a Line) -> Self {
            Self {
                text: line.text(),
                file: line.file().display().to_string(),
                line: line.number(),
            }
        }
    }

    impl<'a> From<&'a Macro> for ReportMacro<'a> {
        fn from(mac: &'a Macro) -> Self {
            Self {
                name: mac.name(),
                body: mac.body(),
                defined_at: mac.defined_at().to_string(),
            }
        }
    }

    impl<'a> Report<'a> {
        pub fn new(
            output: &'a Preprocessed,
            input_file: String,
            output_file: Option<String>,
            processing_time: std::time::Duration,
        ) -> Self {
            Self {
                success: true,
                input_file,
                output_file,
                lines: output.lines.iter().map(ReportLine::from).collect(),
                macros: output.macros.iter().map(ReportMacro::from).collect(),
                included_files: output
                    .included_files
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
                processing_time_ms: processing_time.as_millis(),
            }
        }
    }
}

/// Write JSON output
#[cfg(feature = "json")]
fn write_json_output(
    cli: &Cli,
    output: &Preprocessed,
    processing_time: std::time::Duration,
) -> Result<()> {
    let report = report::Report::new(
        output,
        format_input(&cli.input),
        cli.output.as_deref().map(format_output),
        processing_time,
    );
    let json = serde_json::to_string_pretty(&report)?;

    match &cli.output {
        Some(output_path) if !is_stdio(output_path) => {
            std::fs::write(output_path, json + "\n").with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => println!("{json}"),
    }
    Ok(())
}

/// Show verbose information
fn show_verbose_info(cli: &Cli, output: &Preprocessed, processing_time: std::time::Duration) {
    if cli.quiet {
        return;
    }

    show_config(&create_config(cli));
    eprintln!("Processing time: {processing_time:?}");
    eprintln!("Output lines: {}", output.lines.len());
    eprintln!("Macros defined: {}", output.macros.len());

    if !output.included_files.is_empty() {
        eprintln!("Included files ({}):", output.included_files.len());
        for file in &output.included_files {
            eprintln!("  {}", file.display());
        }
    }
}

/// Format input path for display
fn format_input(path: &Path) -> String {
    if is_stdio(path) {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

/// Format output path for display
fn format_output(path: &Path) -> String {
    if is_stdio(path) {
        "stdout".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn legacy_flag_selects_historical_rules() {
        let cli = Cli::parse_from(["asmpp", "in.asm", "--legacy", "--redefinition", "replace"]);
        let config = create_config(&cli);
        assert_eq!(config.include_base, IncludeBase::RootFile);
        assert_eq!(config.boundary, Boundary::Trailing);
        assert_eq!(config.redefinition, Redefinition::Replace);
    }

    #[test]
    fn defaults_map_to_library_defaults() {
        let cli = Cli::parse_from(["asmpp", "in.asm"]);
        let config = create_config(&cli);
        assert_eq!(config.include_base, IncludeBase::IncludingFile);
        assert_eq!(config.boundary, Boundary::Both);
        assert_eq!(config.recursion_limit, 128);
        assert!(config.warning_handler.is_none());
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let missing = anyhow::Error::new(PreprocessError::FileNotFound {
            path: PathBuf::from("x.asm"),
            included_at: None,
        });
        assert_eq!(determine_exit_code(&missing), exit_code::IO_ERROR);

        let empty = anyhow::Error::new(PreprocessError::EmptyMacro {
            name: "M".to_string(),
            location: asmpp::Location::new("x.asm", 1),
        });
        assert_eq!(determine_exit_code(&empty), exit_code::PREPROCESS_ERROR);

        let other = anyhow::anyhow!("bad arguments");
        assert_eq!(determine_exit_code(&other), exit_code::GENERAL_ERROR);
    }

    #[test]
    fn stdio_paths_are_displayed_by_name() {
        assert_eq!(format_input(Path::new("-")), "stdin");
        assert_eq!(format_output(Path::new("-")), "stdout");
        assert_eq!(format_input(Path::new("a.asm")), "a.asm");
    }
}
