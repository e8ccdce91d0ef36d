//! Human-readable rendering of a run report.
//!
//! The same lines go to the console and to the summary sheet of the artifact.

use crate::model::{RunReport, SanctionReason};

pub fn render_summary(report: &RunReport) -> Vec<String> {
    let meta = &report.meta;
    let summary = &report.summary;
    let mut lines = Vec::new();

    lines.push(format!("Run: {}", meta.config_name));
    lines.push(format!(
        "Scorer: {}  Threshold: > {}  Year filter: {}",
        meta.scorer,
        meta.threshold,
        if meta.year_filter { "on" } else { "off" }
    ));
    lines.push(format!("Rows resolved: {}", summary.totals.rows));
    lines.push(String::new());

    for (target, bands) in &summary.bands {
        lines.push(format!("Score bands vs {target}:"));
        for band in bands {
            lines.push(format!("  {:<8} {}", band.label, band.count));
        }
        let total: usize = bands.iter().map(|b| b.count).sum();
        lines.push(format!("  {:<8} {}", "TOTAL", total));
        let matched = summary.matched.get(target).copied().unwrap_or(0);
        lines.push(format!("  Above threshold: {matched}"));
        lines.push(String::new());
    }

    if !summary.raw_flags.is_empty() {
        lines.push(format!("Sanction flag values ({}):", meta.flag_source));
        for (value, count) in &summary.raw_flags {
            lines.push(format!("  {value}: {count}"));
        }
        lines.push(String::new());
    }

    lines.push(format!("Inferred sanctioning (score from {}):", meta.sanction_target));
    lines.push(format!("  Sanctioned: {}", summary.totals.sanctioned));
    lines.push(format!("  Not sanctioned: {}", summary.totals.not_sanctioned));
    lines.push(format!(
        "  Flag and score agree: {}, disagree: {}",
        summary.discrepancies.agree, summary.discrepancies.disagree
    ));
    for reason in SanctionReason::ALL {
        let count = summary.reasons.get(&reason).copied().unwrap_or(0);
        lines.push(format!("  {reason}: {count}"));
    }
    lines.push(String::new());

    if !summary.top_states.is_empty() {
        lines.push(format!("Top {} states by event count:", summary.top_states.len()));
        for (code, tally) in &summary.top_states {
            lines.push(format!(
                "  {code}: {} total (sanctioned {}, not sanctioned {})",
                tally.total, tally.sanctioned, tally.not_sanctioned
            ));
        }
        lines.push(String::new());
    }

    lines.push("Excluded rows:".to_string());
    for (source, ex) in &report.exclusions {
        lines.push(format!(
            "  {source}: {} loaded, {} missing fields, {} outside year, {} unmapped state",
            ex.loaded,
            ex.missing_fields,
            ex.outside_year,
            ex.unmapped_rows()
        ));
    }

    let attention = report.needs_attention();
    if !attention.is_empty() {
        lines.push(String::new());
        lines.push("Needs attention (unmapped states):".to_string());
        for (source, value, count) in attention {
            lines.push(format!("  {source}: \"{value}\" x{count}"));
        }
    }

    lines
}
