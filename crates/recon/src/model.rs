use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A loaded table: header row plus string cells. Produced by the IO layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

/// Pre-loaded tables: the source plus one table per target, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MatchInput {
    pub source: Table,
    pub targets: BTreeMap<String, Table>,
}

/// One event description from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub source: String,
    /// 1-based data row in the input table (header excluded).
    pub row: usize,
    pub title: String,
    pub state: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    /// Carried columns in configured order.
    pub extra: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonical two-letter state code, or the explicit sentinel for strings the
/// state table does not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCode {
    Code(String),
    Unmapped,
}

impl StateCode {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(c) => Some(c),
            Self::Unmapped => None,
        }
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, Self::Unmapped)
    }
}

impl std::fmt::Display for StateCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(c) => write!(f, "{c}"),
            Self::Unmapped => write!(f, "unmapped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    pub record: SourceRecord,
    pub title_norm: String,
    pub state_code: StateCode,
    pub date: Option<NaiveDate>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Best candidate for one source record against one target pool.
///
/// `best` indexes the target pool. `score` is 0 and `best` is `None` when
/// the candidate set was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub best: Option<usize>,
    pub score: u8,
}

impl MatchResult {
    pub const NONE: MatchResult = MatchResult { best: None, score: 0 };
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetMatch {
    pub target: String,
    pub score: u8,
    pub band: String,
    pub candidate_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<NormalizedRecord>,
}

// ---------------------------------------------------------------------------
// Sanction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionReason {
    Both,
    FlagOnly,
    ScoreOnly,
    Neither,
}

impl SanctionReason {
    pub const ALL: [SanctionReason; 4] = [Self::Both, Self::FlagOnly, Self::ScoreOnly, Self::Neither];
}

impl std::fmt::Display for SanctionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Both => write!(f, "both"),
            Self::FlagOnly => write!(f, "flag_only"),
            Self::ScoreOnly => write!(f, "score_only"),
            Self::Neither => write!(f, "neither"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SanctionVerdict {
    pub flag: bool,
    /// Score strictly above the threshold.
    pub score_high: bool,
    pub inferred: bool,
    pub discrepancy: bool,
    pub reason: SanctionReason,
}

// ---------------------------------------------------------------------------
// Resolution + Exclusions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRow {
    pub record: NormalizedRecord,
    pub matches: Vec<TargetMatch>,
    /// Raw flag text the verdict was read from. `None` when there is no flag
    /// source, or the flag target produced no candidate.
    pub flag_raw: Option<String>,
    pub verdict: SanctionVerdict,
}

impl ResolvedRow {
    pub fn target_match(&self, target: &str) -> Option<&TargetMatch> {
        self.matches.iter().find(|m| m.target == target)
    }
}

/// Rows of one input table that did not take part in matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Exclusions {
    pub loaded: usize,
    pub missing_fields: usize,
    pub outside_year: usize,
    /// Distinct unmapped state strings with occurrence counts.
    pub unmapped: BTreeMap<String, usize>,
}

impl Exclusions {
    pub fn unmapped_rows(&self) -> usize {
        self.unmapped.values().sum()
    }

    pub fn total(&self) -> usize {
        self.missing_fields + self.outside_year + self.unmapped_rows()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateTally {
    pub total: usize,
    pub sanctioned: usize,
    pub not_sanctioned: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub rows: usize,
    pub sanctioned: usize,
    pub not_sanctioned: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscrepancyCounts {
    pub agree: usize,
    pub disagree: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Band counts per target, in configured target order.
    pub bands: Vec<(String, Vec<BandCount>)>,
    /// Rows per target whose score cleared the threshold.
    pub matched: BTreeMap<String, usize>,
    pub states: BTreeMap<String, StateTally>,
    pub top_states: Vec<(String, StateTally)>,
    pub totals: Totals,
    pub reasons: BTreeMap<SanctionReason, usize>,
    pub discrepancies: DiscrepancyCounts,
    /// Raw flag text → occurrences. Blank flags count as "(blank)".
    pub raw_flags: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub threshold: u8,
    pub scorer: String,
    pub year_filter: bool,
    pub sanction_target: String,
    pub flag_source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub summary: Summary,
    pub exclusions: BTreeMap<String, Exclusions>,
    pub rows: Vec<ResolvedRow>,
}

impl RunReport {
    pub fn to_json_pretty(&self) -> Result<String, crate::ReconError> {
        serde_json::to_string_pretty(self).map_err(|e| crate::ReconError::Serialize(e.to_string()))
    }

    /// Distinct unmapped state strings across every input, prefixed by input name.
    pub fn needs_attention(&self) -> Vec<(String, String, usize)> {
        self.exclusions
            .iter()
            .flat_map(|(source, ex)| {
                ex.unmapped
                    .iter()
                    .map(move |(value, count)| (source.clone(), value.clone(), *count))
            })
            .collect()
    }
}
