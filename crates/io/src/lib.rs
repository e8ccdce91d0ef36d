//! `racematch-io`: loading source tables and publishing run artifacts.
//!
//! Inputs are CSV/TSV files or spreadsheet workbooks. Outputs are an xlsx
//! workbook, a flat CSV of the data sheet and a JSON report, each written
//! atomically.

pub mod artifact;
pub mod csv;
pub mod error;
pub mod json;
pub mod publish;
pub mod update;
pub mod xlsx;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use racematch_recon::config::SourceConfig;
use racematch_recon::{MatchConfig, MatchInput, RunReport, Table};

pub use error::IoError;

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Load a table by extension. Spreadsheets read `sheet` (or the first sheet);
/// anything else is treated as delimited text.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<Table, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        xlsx::read_table(path, sheet)
    } else {
        csv::read_table(path)
    }
}

/// Resolve a configured path against the config file's directory.
pub fn resolve_path(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn load_side(source: &SourceConfig, base_dir: &Path) -> Result<Table, IoError> {
    let path = resolve_path(base_dir, &source.file);
    let table = load_table(&path, source.sheet.as_deref())?;
    log::info!(
        "loaded '{}' from {} ({} rows)",
        source.name,
        path.display(),
        table.rows.len()
    );
    Ok(table)
}

/// Load the source and every target table named by `config`.
pub fn load_input(config: &MatchConfig, base_dir: &Path) -> Result<MatchInput, IoError> {
    let source = load_side(&config.source, base_dir)?;
    let mut targets = BTreeMap::new();
    for target in &config.targets {
        targets.insert(target.name.clone(), load_side(target, base_dir)?);
    }
    Ok(MatchInput { source, targets })
}

/// Write every configured artifact. Returns the paths written, in order
/// xlsx, csv, json.
///
/// In update mode an existing workbook is edited in place: only the managed
/// sheets are rewritten and everything else in the package is kept as is.
pub fn write_outputs(
    report: &RunReport,
    config: &MatchConfig,
    base_dir: &Path,
) -> Result<Vec<PathBuf>, IoError> {
    let output = &config.output;
    let mut written = Vec::new();

    if let Some(ref file) = output.xlsx {
        let path = resolve_path(base_dir, file);
        let sheets = artifact::managed_sheets(report, config);
        if output.update && path.exists() {
            let kept = update::update_workbook(&path, &sheets)?;
            log::info!(
                "update mode: kept {kept} other sheet(s) in {}",
                path.display()
            );
        } else {
            xlsx::write_workbook(&sheets, &path)?;
        }
        written.push(path);
    }

    if let Some(ref file) = output.csv {
        let path = resolve_path(base_dir, file);
        csv::write_table(&artifact::data_sheet(report, config).to_table(), &path)?;
        written.push(path);
    }

    if let Some(ref file) = output.json {
        let path = resolve_path(base_dir, file);
        json::write_report(report, &path)?;
        written.push(path);
    }

    for path in &written {
        log::info!("wrote {}", path.display());
    }
    Ok(written)
}
