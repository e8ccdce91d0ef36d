use std::collections::BTreeMap;

use crate::config::{FlagSource, MatchConfig};
use crate::model::{
    BandCount, DiscrepancyCounts, ResolvedRow, SanctionReason, StateTally, Summary, Totals,
};

/// Label used in `raw_flags` for empty or absent flag text.
pub const BLANK_FLAG: &str = "(blank)";

/// Right-inclusive partition of 0–100 for reporting.
///
/// Built from ascending upper bounds; the lowest band starts at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreBands {
    bounds: Vec<u8>,
    labels: Vec<String>,
}

impl ScoreBands {
    /// `bounds` must be strictly increasing and end at 100 (checked by config validation).
    pub fn new(bounds: &[u8]) -> Self {
        let mut labels = Vec::with_capacity(bounds.len());
        let mut lower = 0u16;
        for &upper in bounds {
            labels.push(format!("{lower}–{upper}"));
            lower = upper as u16 + 1;
        }
        Self {
            bounds: bounds.to_vec(),
            labels,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn band_for(&self, score: u8) -> &str {
        let idx = self
            .bounds
            .iter()
            .position(|&upper| score <= upper)
            .unwrap_or(self.bounds.len().saturating_sub(1));
        self.labels.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Build the run summary from resolved rows. Order-independent: only counts
/// are accumulated.
pub fn summarize(rows: &[ResolvedRow], config: &MatchConfig, bands: &ScoreBands) -> Summary {
    let mut band_counts: Vec<(String, BTreeMap<&str, usize>)> = config
        .targets
        .iter()
        .map(|t| {
            let zeroed = bands.labels().iter().map(|l| (l.as_str(), 0)).collect();
            (t.name.clone(), zeroed)
        })
        .collect();

    let mut matched: BTreeMap<String, usize> =
        config.targets.iter().map(|t| (t.name.clone(), 0)).collect();
    let mut states: BTreeMap<String, StateTally> = BTreeMap::new();
    let mut totals = Totals::default();
    let mut reasons: BTreeMap<SanctionReason, usize> =
        SanctionReason::ALL.iter().map(|r| (*r, 0)).collect();
    let mut discrepancies = DiscrepancyCounts::default();
    let mut raw_flags: BTreeMap<String, usize> = BTreeMap::new();
    let count_flags = config.flag_source() != FlagSource::None;

    for row in rows {
        for (target, counts) in band_counts.iter_mut() {
            let score = row.target_match(target).map(|m| m.score).unwrap_or(0);
            *counts.entry(bands.band_for(score)).or_insert(0) += 1;
            if score > config.threshold {
                *matched.entry(target.clone()).or_insert(0) += 1;
            }
        }

        let inferred = row.verdict.inferred;
        let tally = states.entry(row.record.state_code.to_string()).or_default();
        tally.total += 1;
        totals.rows += 1;
        if inferred {
            tally.sanctioned += 1;
            totals.sanctioned += 1;
        } else {
            tally.not_sanctioned += 1;
            totals.not_sanctioned += 1;
        }

        *reasons.entry(row.verdict.reason).or_insert(0) += 1;
        if row.verdict.discrepancy {
            discrepancies.disagree += 1;
        } else {
            discrepancies.agree += 1;
        }

        if count_flags {
            let text = row
                .flag_raw
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(BLANK_FLAG);
            *raw_flags.entry(text.to_string()).or_insert(0) += 1;
        }
    }

    let band_table: Vec<(String, Vec<BandCount>)> = band_counts
        .into_iter()
        .map(|(target, counts)| {
            let ordered = bands
                .labels()
                .iter()
                .map(|label| BandCount {
                    label: label.clone(),
                    count: counts.get(label.as_str()).copied().unwrap_or(0),
                })
                .collect();
            (target, ordered)
        })
        .collect();

    Summary {
        bands: band_table,
        matched,
        top_states: top_states(&states, config.top_states),
        states,
        totals,
        reasons,
        discrepancies,
        raw_flags,
    }
}

/// The `n` states with the most rows. Ties go to the lower state code.
pub fn top_states(states: &BTreeMap<String, StateTally>, n: usize) -> Vec<(String, StateTally)> {
    let mut ranked: Vec<(String, StateTally)> =
        states.iter().map(|(code, tally)| (code.clone(), *tally)).collect();
    // BTreeMap iteration is already code-ascending; a stable sort keeps that for ties
    ranked.sort_by(|a, b| b.1.total.cmp(&a.1.total));
    ranked.truncate(n);
    ranked
}
