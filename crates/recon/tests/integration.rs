use std::collections::BTreeMap;
use std::path::PathBuf;

use racematch_recon::config::MatchConfig;
use racematch_recon::model::{MatchInput, RunReport, SanctionReason, StateCode, Table};
use racematch_recon::report::render_summary;
use racematch_recon::run;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_table(file: &str) -> Table {
    let path = fixtures_dir().join(file);
    let mut reader = csv::Reader::from_path(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    Table::new(headers, rows)
}

fn load_config(name: &str) -> MatchConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join(name)).unwrap();
    MatchConfig::from_toml(&toml).unwrap()
}

fn load_and_run(config: &MatchConfig) -> RunReport {
    let mut targets = BTreeMap::new();
    for target in &config.targets {
        targets.insert(target.name.clone(), read_table(&target.file));
    }
    let input = MatchInput {
        source: read_table(&config.source.file),
        targets,
    };
    run(config, &input).unwrap()
}

fn reason_of(report: &RunReport, title: &str) -> SanctionReason {
    report
        .rows
        .iter()
        .find(|r| r.record.record.title == title)
        .unwrap_or_else(|| panic!("no row titled {title}"))
        .verdict
        .reason
}

// -------------------------------------------------------------------------
// Two sources
// -------------------------------------------------------------------------

#[test]
fn two_source_verdicts() {
    let report = load_and_run(&load_config("two-source.match.toml"));

    assert_eq!(report.meta.config_name, "Trifind vs USAT 2025");
    assert_eq!(report.meta.flag_source, "source");
    assert_eq!(report.meta.sanction_target, "usat");
    assert_eq!(report.rows.len(), 5);

    assert_eq!(reason_of(&report, "Boulder Sprint Triathlon"), SanctionReason::ScoreOnly);
    assert_eq!(reason_of(&report, "Lake Tahoe Triathlon"), SanctionReason::Both);
    assert_eq!(reason_of(&report, "Austin Spring Duathlon"), SanctionReason::FlagOnly);
    assert_eq!(reason_of(&report, "Denver Olympic Tri"), SanctionReason::ScoreOnly);
    assert_eq!(reason_of(&report, "Cheyenne Classic"), SanctionReason::Neither);
}

#[test]
fn two_source_best_match_carries_target_columns() {
    let report = load_and_run(&load_config("two-source.match.toml"));
    let boulder = report
        .rows
        .iter()
        .find(|r| r.record.record.title == "Boulder Sprint Triathlon")
        .unwrap();
    assert_eq!(
        boulder.record.record.extra,
        vec![("url".to_string(), "https://trifind.example/events/1".to_string())]
    );

    let m = boulder.target_match("usat").unwrap();
    assert_eq!(m.score, 95);
    assert_eq!(m.band, "95–100");
    // the 2024 edition is dropped by the target year, so only two CO candidates remain
    assert_eq!(m.candidate_count, 2);
    let best = m.candidate.as_ref().unwrap();
    assert_eq!(best.record.title, "Boulder Sprint Tri");
    assert_eq!(best.record.extra[0], ("ApplicationID".to_string(), "APP-101".to_string()));
}

#[test]
fn two_source_summary() {
    let report = load_and_run(&load_config("two-source.match.toml"));
    let s = &report.summary;

    assert_eq!(s.totals.rows, 5);
    assert_eq!(s.totals.sanctioned, 4);
    assert_eq!(s.totals.not_sanctioned, 1);
    assert_eq!(s.matched["usat"], 3);
    assert_eq!(s.discrepancies.agree, 2);
    assert_eq!(s.discrepancies.disagree, 3);
    assert_eq!(s.raw_flags["No"], 3);
    assert_eq!(s.raw_flags["Yes"], 2);

    let (target, bands) = &s.bands[0];
    assert_eq!(target, "usat");
    let counts: Vec<usize> = bands.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![2, 0, 0, 0, 3]);

    let top: Vec<&str> = s.top_states.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(top, vec!["CO", "NV", "TX", "WY"]);
    assert_eq!(s.states["CO"].sanctioned, 2);
}

#[test]
fn two_source_exclusions() {
    let report = load_and_run(&load_config("two-source.match.toml"));

    let trifind = &report.exclusions["trifind"];
    assert_eq!(trifind.loaded, 7);
    assert_eq!(trifind.missing_fields, 1);
    assert_eq!(trifind.unmapped.len(), 1);
    assert_eq!(trifind.unmapped["Puerto Rico"], 1);

    let usat = &report.exclusions["usat"];
    assert_eq!(usat.loaded, 5);
    assert_eq!(usat.outside_year, 1);
    assert!(usat.unmapped.is_empty());

    assert!(report
        .rows
        .iter()
        .all(|r| r.record.state_code != StateCode::Unmapped));
    assert_eq!(
        report.needs_attention(),
        vec![("trifind".to_string(), "Puerto Rico".to_string(), 1)]
    );
}

#[test]
fn puerto_rico_mapped_by_config() {
    let mut config = load_config("two-source.match.toml");
    config.states.insert("Puerto Rico".into(), "PR".into());
    let report = load_and_run(&config);

    assert_eq!(report.rows.len(), 6);
    assert!(report.exclusions["trifind"].unmapped.is_empty());
    assert_eq!(reason_of(&report, "San Juan Tri"), SanctionReason::Neither);
}

#[test]
fn rendered_summary_mentions_attention() {
    let report = load_and_run(&load_config("two-source.match.toml"));
    let text = render_summary(&report).join("\n");
    assert!(text.contains("Score bands vs usat:"));
    assert!(text.contains("trifind: \"Puerto Rico\" x1"));
}

// -------------------------------------------------------------------------
// Three sources
// -------------------------------------------------------------------------

#[test]
fn three_source_flag_from_matched_row() {
    let report = load_and_run(&load_config("three-source.match.toml"));

    assert_eq!(report.meta.flag_source, "trifind");
    assert_eq!(report.rows.len(), 4);
    for row in &report.rows {
        let targets: Vec<&str> = row.matches.iter().map(|m| m.target.as_str()).collect();
        assert_eq!(targets, vec!["trifind", "usat"]);
    }

    assert_eq!(reason_of(&report, "Boulder Sprint Triathlon"), SanctionReason::ScoreOnly);
    assert_eq!(reason_of(&report, "Lake Tahoe Tri"), SanctionReason::Both);
    assert_eq!(reason_of(&report, "Austin Spring Duathlon"), SanctionReason::FlagOnly);
    assert_eq!(reason_of(&report, "Gulf Coast 5K"), SanctionReason::Neither);

    let gulf = report
        .rows
        .iter()
        .find(|r| r.record.record.title == "Gulf Coast 5K")
        .unwrap();
    assert!(gulf.flag_raw.is_none());
    assert!(gulf.matches.iter().all(|m| m.score == 0 && m.candidate.is_none()));
    assert_eq!(report.summary.raw_flags["(blank)"], 1);
    assert_eq!(report.summary.bands.len(), 2);
}

#[test]
fn three_source_year_filter_drops_other_year_candidates() {
    let mut config = load_config("three-source.match.toml");
    // keep the 2024 USAT row in the pool so only the year filter can drop it
    config.targets[1].year = None;

    let usat_candidates = |report: &RunReport| {
        report
            .rows
            .iter()
            .find(|r| r.record.record.title == "Boulder Sprint Triathlon")
            .and_then(|r| r.target_match("usat"))
            .map(|m| m.candidate_count)
            .unwrap()
    };

    let report = load_and_run(&config);
    assert!(!report.meta.year_filter);
    assert_eq!(usat_candidates(&report), 3);

    config.year_filter = true;
    let report = load_and_run(&config);
    assert!(report.meta.year_filter);
    assert_eq!(usat_candidates(&report), 2);
    assert_eq!(reason_of(&report, "Lake Tahoe Tri"), SanctionReason::Both);
}
