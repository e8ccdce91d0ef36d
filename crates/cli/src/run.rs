//! `racematch run` / `validate` / `states`: config-driven event reconciliation.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use racematch_recon::states::{StateTable, US_STATES};
use racematch_recon::{MatchConfig, ScorerKind};

use crate::exit_codes::{
    io_exit_code, recon_exit_code, EXIT_ERROR, EXIT_RUN_ATTENTION, EXIT_RUN_INVALID_CONFIG,
    EXIT_RUN_OUTPUT, EXIT_USAGE,
};
use crate::CliError;

/// Command-line overrides layered over the config file.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub threshold: Option<u8>,
    pub year_filter: bool,
    pub scorer: Option<ScorerKind>,
}

pub struct RunOptions {
    pub json: bool,
    pub output: Option<PathBuf>,
    pub strict: bool,
}

fn run_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

/// Read and validate a config file. Paths inside it resolve against its directory.
fn load_config(path: &Path) -> Result<(MatchConfig, PathBuf), CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        run_err(EXIT_USAGE, format!("cannot read config {}: {e}", path.display()))
    })?;
    let config = MatchConfig::from_toml(&text).map_err(|e| {
        run_err(recon_exit_code(&e), e.to_string())
            .with_hint(format!("check {}", path.display()))
    })?;
    let base_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((config, base_dir))
}

fn apply_overrides(config: &mut MatchConfig, overrides: &RunOverrides) -> Result<(), CliError> {
    if let Some(threshold) = overrides.threshold {
        config.threshold = threshold;
    }
    if overrides.year_filter {
        config.year_filter = true;
    }
    if let Some(scorer) = overrides.scorer {
        config.scorer = scorer;
    }
    config
        .validate()
        .map_err(|e| run_err(EXIT_RUN_INVALID_CONFIG, e.to_string()))
}

// ============================================================================
// run
// ============================================================================

pub fn cmd_run(
    config_path: PathBuf,
    overrides: RunOverrides,
    options: RunOptions,
) -> Result<(), CliError> {
    let (mut config, base_dir) = load_config(&config_path)?;
    apply_overrides(&mut config, &overrides)?;

    let input = racematch_io::load_input(&config, &base_dir)
        .map_err(|e| run_err(io_exit_code(&e), e.to_string()))?;

    let report = racematch_recon::run(&config, &input).map_err(|e| {
        let err = run_err(recon_exit_code(&e), e.to_string());
        match e {
            racematch_recon::ReconError::MissingColumn { .. } => {
                err.with_hint("column names in [*.columns] must match the header row exactly")
            }
            _ => err,
        }
    })?;

    racematch_io::write_outputs(&report, &config, &base_dir)
        .map_err(|e| run_err(io_exit_code(&e), e.to_string()))?;

    if let Some(ref path) = options.output {
        racematch_io::json::write_report(&report, path)
            .map_err(|e| run_err(EXIT_RUN_OUTPUT, e.to_string()))?;
        log::info!("wrote {}", path.display());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if options.json {
        let json = report
            .to_json_pretty()
            .map_err(|e| run_err(EXIT_ERROR, e.to_string()))?;
        writeln!(out, "{json}").map_err(|e| run_err(EXIT_ERROR, e.to_string()))?;
    } else {
        for line in racematch_recon::report::render_summary(&report) {
            writeln!(out, "{line}").map_err(|e| run_err(EXIT_ERROR, e.to_string()))?;
        }
    }

    let attention = report.needs_attention();
    if options.strict && !attention.is_empty() {
        let rows: usize = attention.iter().map(|(_, _, n)| n).sum();
        return Err(run_err(
            EXIT_RUN_ATTENTION,
            format!(
                "{} unmapped state value(s) across {rows} row(s) need attention",
                attention.len()
            ),
        )
        .with_hint("map them under [states] in the config, e.g. \"Puerto Rico\" = \"PR\""));
    }

    Ok(())
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, _) = load_config(&config_path)?;
    let targets: Vec<&str> = config.targets.iter().map(|t| t.name.as_str()).collect();
    println!(
        "{}: ok ({} vs {}; scorer {}, threshold > {}, sanction target {}, flag {})",
        config.name,
        config.source.name,
        targets.join(" + "),
        config.scorer,
        config.threshold,
        config.sanction_target(),
        config.flag_source(),
    );
    Ok(())
}

// ============================================================================
// states
// ============================================================================

#[derive(serde::Serialize)]
struct StateEntry<'a> {
    name: &'a str,
    code: &'a str,
    builtin: bool,
}

pub fn cmd_states(config_path: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let table = match config_path {
        Some(path) => {
            let (config, _) = load_config(&path)?;
            StateTable::with_overrides(&config.states)
        }
        None => StateTable::default(),
    };

    let entries: Vec<StateEntry> = table
        .names()
        .into_iter()
        .map(|(name, code)| StateEntry {
            name,
            code,
            builtin: US_STATES.iter().any(|(n, c)| *n == name && *c == code),
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&entries)
            .map_err(|e| run_err(EXIT_ERROR, e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in &entries {
        let marker = if entry.builtin { "" } else { "  (config)" };
        writeln!(out, "{:<24} {}{marker}", entry.name, entry.code)
            .map_err(|e| run_err(EXIT_ERROR, e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
name = "t"
threshold = 90
[source]
name = "trifind"
file = "t.csv"
[source.columns]
title = "title"
state = "state"
date = "date"
[[targets]]
name = "usat"
file = "u.csv"
[targets.columns]
title = "Name"
state = "State"
date = "Date"
"#;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = MatchConfig::from_toml(CONFIG).unwrap();
        let overrides = RunOverrides {
            threshold: Some(85),
            year_filter: true,
            scorer: Some(ScorerKind::Indel),
        };
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.threshold, 85);
        assert!(config.year_filter);
        assert_eq!(config.scorer, ScorerKind::Indel);
    }

    #[test]
    fn empty_overrides_keep_config() {
        let mut config = MatchConfig::from_toml(CONFIG).unwrap();
        apply_overrides(&mut config, &RunOverrides::default()).unwrap();
        assert_eq!(config.threshold, 90);
        assert!(!config.year_filter);
        assert_eq!(config.scorer, ScorerKind::JaroWinkler);
    }

    #[test]
    fn missing_config_is_usage_error() {
        let err = load_config(Path::new("/nonexistent/racematch.toml")).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }

    #[test]
    fn base_dir_is_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.toml");
        std::fs::write(&path, CONFIG).unwrap();
        let (_, base) = load_config(&path).unwrap();
        assert_eq!(base, dir.path());
    }
}
