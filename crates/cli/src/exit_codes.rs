//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Code | Domain    | Description                                          |
//! |------|-----------|------------------------------------------------------|
//! | 0    | Universal | Success                                              |
//! | 1    | Universal | General error (unspecified)                          |
//! | 2    | Universal | CLI usage error (bad args, unreadable config file)   |
//! | 60   | run       | Config parse or validation failed                    |
//! | 61   | run       | An input table could not be loaded                   |
//! | 62   | run       | An output artifact could not be written              |
//! | 63   | run       | Run completed but rows need attention (`--strict`)   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use racematch_io::IoError;
use racematch_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, config file missing or unreadable.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (60-69)
// =============================================================================

/// Config failed to parse or validate, or names an unknown target.
pub const EXIT_RUN_INVALID_CONFIG: u8 = 60;

/// An input file could not be opened or read, or lacks a required column.
pub const EXIT_RUN_INPUT: u8 = 61;

/// Writing the xlsx/csv/json artifact failed. No partial file is left behind.
pub const EXIT_RUN_OUTPUT: u8 = 62;

/// `--strict` only: the run finished and its artifacts were written, but some
/// rows were excluded for an unmapped state.
pub const EXIT_RUN_ATTENTION: u8 = 63;

// =============================================================================
// Error mapping
// =============================================================================

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::UnknownTarget(_) => EXIT_RUN_INVALID_CONFIG,
        ReconError::MissingColumn { .. } => EXIT_RUN_INPUT,
        ReconError::Serialize(_) => EXIT_RUN_OUTPUT,
    }
}

/// Map an I/O error to its exit code.
pub fn io_exit_code(err: &IoError) -> u8 {
    if err.is_input() {
        EXIT_RUN_INPUT
    } else {
        EXIT_RUN_OUTPUT
    }
}
