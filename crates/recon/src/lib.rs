//! `racematch-recon`: fuzzy cross-source event reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns a run report with
//! per-record best matches, sanctioning verdicts and aggregates.
//! No CLI or IO dependencies.

pub mod aggregate;
pub mod candidates;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod report;
pub mod states;

pub use config::MatchConfig;
pub use engine::run;
pub use error::ReconError;
pub use matcher::{Scorer, ScorerKind};
pub use model::{MatchInput, RunReport, Table};
