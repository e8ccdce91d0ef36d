// racematch CLI - fuzzy event reconciliation across race listings

mod exit_codes;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use racematch_recon::ScorerKind;

use exit_codes::EXIT_SUCCESS;
use run::{RunOptions, RunOverrides};

#[derive(Parser)]
#[command(name = "racematch")]
#[command(about = "Reconcile event listings across sources and infer sanctioning")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  racematch run trifind-usat.match.toml
  racematch run trifind-usat.match.toml --threshold 85 --scorer indel
  racematch run runsignup.match.toml --year-filter --json
  racematch run trifind-usat.match.toml --output report.json --strict")]
    Run {
        /// Path to the .match.toml config file
        config: PathBuf,

        /// Score strictly above this value confirms sanctioning (overrides config)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// Require candidate year to equal the source year (overrides config)
        #[arg(long)]
        year_filter: bool,

        /// Title scorer: jaro_winkler, levenshtein or indel (overrides config)
        #[arg(long)]
        scorer: Option<ScorerKind>,

        /// Print the JSON report to stdout instead of the text summary
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 63 when any row was excluded for an unmapped state
        #[arg(long)]
        strict: bool,
    },

    /// Validate a config without loading any data
    #[command(after_help = "\
Examples:
  racematch validate trifind-usat.match.toml")]
    Validate {
        /// Path to the .match.toml config file
        config: PathBuf,
    },

    /// List the state name → code table used for normalization
    #[command(after_help = "\
Examples:
  racematch states
  racematch states --config trifind-usat.match.toml --json")]
    States {
        /// Include [states] overrides from this config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  racematch-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default));
    if quiet {
        // --quiet wins over RUST_LOG
        builder.filter_level(log::LevelFilter::Warn);
    }
    builder.format_timestamp(None).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let result = match cli.command {
        Commands::Run {
            config,
            threshold,
            year_filter,
            scorer,
            json,
            output,
            strict,
        } => run::cmd_run(
            config,
            RunOverrides { threshold, year_filter, scorer },
            RunOptions { json, output, strict },
        ),
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::States { config, json } => run::cmd_states(config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
