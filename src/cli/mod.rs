//! CLI module for the spectest demo runner
//!
//! ## Commands
//!
//! - `list` - Show the bundled specs and their test trees
//! - `run [SPEC...]` - Run specs (all of them by default)
//!
//! ## Modules
//!
//! - `console` - Console and JSON-lines listeners
//! - `demo` - Bundled demo specs
//! - `panic_hook` - Quiet panic hook installed while specs run
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod console;
pub mod demo;
pub mod panic_hook;

use std::fmt;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use spectest_core::Try;

use crate::engine::{
    Engine, EngineConfig, EngineContext, EngineListener, ExtensionRegistry, IsolationMode, NameFilter, SpecId,
    SpecInstantiator, SpecRegistry, Summary, TagFilter, TestCase, TestCaseExtension, config::parse_timeout_ms,
};
use crate::version::SPECTEST_VERSION;

use console::{ConsoleListener, JsonListener};
use panic_hook::QuietPanics;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// A fatal error aborted the run.
    pub const ABORTED: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run the bundled demo specs through the spectest engine
#[derive(Parser, Debug)]
#[command(name = "spectest")]
#[command(version = SPECTEST_VERSION)]
#[command(about = "Run the bundled demo specs through the spectest engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the bundled specs and their tests
    List,

    /// Run specs (all bundled specs when none are named)
    Run {
        /// Spec ids to run
        #[arg(value_name = "SPEC")]
        specs: Vec<String>,
        /// Verbose output (one line per test)
        #[arg(short, long)]
        verbose: bool,
        /// Only run tests whose path contains EXPR
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Only run tests carrying one of these tags
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Skip tests carrying any of these tags
        #[arg(long = "exclude-tag", value_name = "TAG")]
        exclude_tags: Vec<String>,
        /// Include slow tests
        #[arg(long)]
        slow: bool,
        /// Engine default timeout in milliseconds (overrides SPECTEST_TIMEOUT_MS)
        #[arg(long = "timeout-ms", value_name = "MS", value_parser = parse_timeout_ms)]
        timeout: Option<Duration>,
        /// Isolation mode for every spec: shared, fresh-per-test or fresh-per-leaf
        #[arg(long, value_name = "MODE")]
        isolation: Option<IsolationMode>,
        /// Emit JSON lines instead of console output
        #[arg(long)]
        json: bool,
    },
}

/// Options of the `run` subcommand after parsing.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub specs: Vec<String>,
    pub verbose: bool,
    pub filter: Option<String>,
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub slow: bool,
    pub timeout: Option<Duration>,
    pub isolation: Option<IsolationMode>,
    pub json: bool,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub async fn run() {
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

async fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::List => list_specs(&demo::registry(None), &mut io::stdout().lock()),
        Command::Run {
            specs,
            verbose,
            filter,
            tags,
            exclude_tags,
            slow,
            timeout,
            isolation,
            json,
        } => {
            let options = RunOptions {
                specs,
                verbose,
                filter,
                tags,
                exclude_tags,
                slow,
                timeout,
                isolation,
                json,
            };
            run_specs(options).await
        }
    }
}

/// Print every spec with its declared tree.
pub fn list_specs(registry: &SpecRegistry, out: &mut impl Write) -> CliResult<ExitCode> {
    let io_err = |e: io::Error| CliError::failure(format!("Error writing output: {e}"));
    for spec in registry.descriptors() {
        writeln!(out, "{} [{}]", spec.id(), spec.isolation()).map_err(io_err)?;
        match registry.construct(spec) {
            Ok(Try::Success(instance)) => {
                for root in instance.roots() {
                    write_tree(root, 1, out).map_err(io_err)?;
                }
            }
            Ok(Try::Failure(err)) => writeln!(out, "  <could not instantiate: {err}>").map_err(io_err)?,
            Err(fatal) => return Err(CliError::new(fatal.to_string(), ExitCode::ABORTED)),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn write_tree(test: &TestCase, depth: usize, out: &mut impl Write) -> io::Result<()> {
    let tags = test.config().tags.iter().map(|t| format!(" #{t}")).collect::<String>();
    writeln!(out, "{}{}{tags}", "  ".repeat(depth), test.name())?;
    for child in test.children() {
        write_tree(&child, depth + 1, out)?;
    }
    Ok(())
}

/// Build the engine context for a run: environment config, CLI overrides, and the filter extensions.
pub fn build_context(options: &RunOptions) -> CliResult<EngineContext> {
    let mut config = EngineConfig::from_env().map_err(|e| CliError::failure(e.to_string()))?;
    if let Some(timeout) = options.timeout {
        config = config.with_default_timeout(timeout);
    }

    let mut tag_filter = TagFilter::new();
    for tag in &options.tags {
        tag_filter = tag_filter.include(tag.clone());
    }
    for tag in &options.exclude_tags {
        tag_filter = tag_filter.exclude(tag.clone());
    }
    if !options.slow {
        tag_filter = tag_filter.exclude(demo::SLOW_TAG);
    }

    let mut extensions = ExtensionRegistry::new();
    if !tag_filter.is_empty() {
        extensions = extensions.with_test_extension(Arc::new(tag_filter) as Arc<TestCaseExtension>);
    }
    if let Some(filter) = &options.filter {
        extensions = extensions.with_test_extension(Arc::new(NameFilter::new(filter.clone())) as Arc<TestCaseExtension>);
    }
    Ok(EngineContext::new(config, extensions))
}

async fn run_specs(options: RunOptions) -> CliResult<ExitCode> {
    let context = build_context(&options)?;
    let registry = demo::registry(options.isolation);
    let listener: Arc<dyn EngineListener> = if options.json {
        Arc::new(JsonListener::new(io::stdout()))
    } else {
        Arc::new(ConsoleListener::new(io::stdout()).verbose(options.verbose))
    };
    let engine = Engine::new(context, registry).with_listener(listener);
    let _quiet = QuietPanics::install();

    let aborted = |fatal: spectest_core::FatalError| CliError::new(format!("aborted: {fatal}"), ExitCode::ABORTED);
    let outcomes = if options.specs.is_empty() {
        engine.run_all().await.map_err(aborted)?
    } else {
        let mut outcomes = Vec::with_capacity(options.specs.len());
        for id in &options.specs {
            let id = SpecId::from(id.as_str());
            let outcome = engine.run_spec(&id).await.map_err(aborted)?;
            outcomes.push((id, outcome));
        }
        outcomes
    };

    let mut total = Summary::default();
    let mut spec_errors = 0;
    for (id, outcome) in &outcomes {
        match outcome {
            Try::Success(results) => total.merge(results.summary()),
            Try::Failure(err) => {
                spec_errors += 1;
                tracing::error!(spec = %id, error = %err, "spec failed");
            }
        }
    }
    tracing::info!(
        specs = outcomes.len(),
        passed = total.passed,
        failed = total.failed,
        ignored = total.ignored,
        "run finished"
    );

    if total.failed > 0 || spec_errors > 0 {
        // Summary already printed by the listener
        Err(CliError::new("", ExitCode::FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

// ============================================================================
// Tests
// ============================================================================
