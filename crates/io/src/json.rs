// JSON export of the full run report

use std::path::Path;

use racematch_recon::RunReport;

use crate::error::IoError;
use crate::publish::write_atomic;

/// Write the run report as pretty-printed JSON, atomically.
pub fn write_report(report: &RunReport, path: &Path) -> Result<(), IoError> {
    let json = report
        .to_json_pretty()
        .map_err(|e| IoError::write(path, e))?;
    write_atomic(path, |tmp| std::fs::write(tmp, json).map_err(|e| IoError::write(path, e)))
}
