// Output layout: the run report flattened into worksheets.

use racematch_recon::config::{
    ColumnMapping, FlagSource, MatchConfig, ATTENTION_SHEET, BANDS_SHEET, STATES_SHEET,
};
use racematch_recon::model::{NormalizedRecord, ResolvedRow, RunReport, SanctionReason};
use racematch_recon::report::render_summary;

use crate::xlsx::{Cell, SheetData};

/// Every managed sheet, in write order: data, bands, states, attention, summary.
pub fn managed_sheets(report: &RunReport, config: &MatchConfig) -> Vec<SheetData> {
    vec![
        data_sheet(report, config),
        bands_sheet(report),
        states_sheet(report),
        attention_sheet(report),
        summary_sheet(report, config),
    ]
}

// ---------------------------------------------------------------------------
// Data sheet
// ---------------------------------------------------------------------------

/// A data-sheet column and its glossary text.
struct Column {
    name: String,
    about: String,
}

fn column(name: impl Into<String>, about: impl Into<String>) -> Column {
    Column { name: name.into(), about: about.into() }
}

/// Fixed columns of one record block, before flag and carried columns.
const RECORD_FIXED: usize = 7;

/// Every data-sheet column in order. The header row and the glossary on the
/// summary sheet are both built from this list.
fn data_columns(config: &MatchConfig) -> Vec<Column> {
    let src = &config.source.name;
    let mut cols = Vec::new();
    record_columns(&mut cols, src, &config.source.columns, "source record");
    cols.push(column("month", format!("Month (1-12) of {src}_date")));
    cols.push(column("year", format!("Year of {src}_date")));

    for target in &config.targets {
        let t = &target.name;
        record_columns(&mut cols, t, &target.columns, "best candidate");
        cols.push(column(
            format!("{t}_score"),
            format!("Title similarity to the best {t} candidate, 0-100 ({}); 0 when none", config.scorer),
        ));
        cols.push(column(format!("{t}_band"), format!("Score band of {t}_score")));
        cols.push(column(
            format!("{t}_candidates"),
            format!("Number of {t} records in the same state that were scored"),
        ));
    }

    let flag_about = match config.flag_source() {
        FlagSource::Source => format!("Sanction flag of the {src} record is set"),
        FlagSource::Target(t) => format!("Sanction flag of the best {t} candidate is set"),
        FlagSource::None => "Always FALSE (no flag column configured)".to_string(),
    };
    cols.push(column("flag", flag_about));
    cols.push(column(
        "score_high",
        format!("{}_score is above {}", config.sanction_target(), config.threshold),
    ));
    cols.push(column("sanctioned", "Inferred sanctioning: flag or score_high"));
    cols.push(column("discrepancy", "flag and score_high disagree"));
    cols.push(column("reason", "both, flag_only, score_only or neither (see Reasons)"));
    cols
}

fn record_columns(cols: &mut Vec<Column>, side: &str, mapping: &ColumnMapping, what: &str) {
    cols.push(column(format!("{side}_row"), format!("Data row of the {what} in the {side} input")));
    cols.push(column(format!("{side}_title"), format!("Title as given ({})", mapping.title)));
    cols.push(column(format!("{side}_title_norm"), "Lowercased, trimmed title used for scoring"));
    cols.push(column(format!("{side}_state"), format!("State as given ({})", mapping.state)));
    cols.push(column(format!("{side}_state_code"), "Two-letter state code"));
    cols.push(column(format!("{side}_date_raw"), format!("Date as given ({})", mapping.date)));
    cols.push(column(format!("{side}_date"), "Parsed date, YYYY-MM-DD; blank when unparseable"));
    if let Some(ref flag) = mapping.flag {
        cols.push(column(format!("{side}_flag"), format!("Sanction flag as given ({flag})")));
    }
    for carry in &mapping.carry {
        cols.push(column(format!("{side}_{carry}"), format!("Copied from column {carry}")));
    }
}

/// One row per resolved source record.
pub fn data_sheet(report: &RunReport, config: &MatchConfig) -> SheetData {
    let header: Vec<Cell> = data_columns(config).into_iter().map(|c| c.name.into()).collect();

    let mut rows = vec![header];
    for row in &report.rows {
        rows.push(data_row(row, config));
    }

    SheetData {
        name: config.output.data_sheet.clone(),
        rows,
        bold_header: true,
    }
}

fn data_row(row: &ResolvedRow, config: &MatchConfig) -> Vec<Cell> {
    let rec = &row.record;
    let mut cells: Vec<Cell> = Vec::new();
    record_cells(&mut cells, rec, config.source.columns.flag.is_some());
    cells.push(rec.month.map(|m| Cell::Number(m as f64)).unwrap_or(Cell::Empty));
    cells.push(rec.year.map(|y| Cell::Number(y as f64)).unwrap_or(Cell::Empty));

    for target in &config.targets {
        let has_flag = target.columns.flag.is_some();
        let width = RECORD_FIXED + usize::from(has_flag) + target.columns.carry.len();
        let m = row.target_match(&target.name);
        match m.and_then(|m| m.candidate.as_ref()) {
            Some(candidate) => record_cells(&mut cells, candidate, has_flag),
            None => cells.extend(std::iter::repeat(Cell::Empty).take(width)),
        }
        let score = m.map(|m| m.score).unwrap_or(0);
        cells.push(Cell::Number(score as f64));
        cells.push(m.map(|m| m.band.clone()).unwrap_or_default().into());
        cells.push(m.map(|m| m.candidate_count).unwrap_or(0).into());
    }

    let v = &row.verdict;
    cells.push(Cell::Bool(v.flag));
    cells.push(Cell::Bool(v.score_high));
    cells.push(Cell::Bool(v.inferred));
    cells.push(Cell::Bool(v.discrepancy));
    cells.push(v.reason.to_string().into());
    cells
}

/// Row, raw and normalized fields, optional flag, then carried columns.
fn record_cells(cells: &mut Vec<Cell>, rec: &NormalizedRecord, has_flag: bool) {
    let r = &rec.record;
    cells.push(r.row.into());
    cells.push(r.title.as_str().into());
    cells.push(rec.title_norm.as_str().into());
    cells.push(r.state.as_str().into());
    cells.push(rec.state_code.to_string().into());
    cells.push(r.date.as_str().into());
    cells.push(
        rec.date
            .map(|d| Cell::from(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Cell::Empty),
    );
    if has_flag {
        cells.push(r.flag.clone().unwrap_or_default().into());
    }
    for (_, value) in &r.extra {
        cells.push(value.as_str().into());
    }
}

// ---------------------------------------------------------------------------
// Aggregate sheets
// ---------------------------------------------------------------------------

fn bands_sheet(report: &RunReport) -> SheetData {
    let mut rows: Vec<Vec<Cell>> = vec![vec!["Target".into(), "Band".into(), "Count".into()]];
    for (target, bands) in &report.summary.bands {
        for band in bands {
            rows.push(vec![target.as_str().into(), band.label.as_str().into(), band.count.into()]);
        }
        let total: usize = bands.iter().map(|b| b.count).sum();
        rows.push(vec![target.as_str().into(), "TOTAL".into(), total.into()]);
    }
    SheetData {
        name: BANDS_SHEET.into(),
        rows,
        bold_header: true,
    }
}

fn states_sheet(report: &RunReport) -> SheetData {
    let mut rows: Vec<Vec<Cell>> = vec![vec![
        "State".into(),
        "Total".into(),
        "Sanctioned".into(),
        "Not sanctioned".into(),
    ]];
    for (code, tally) in &report.summary.states {
        rows.push(vec![
            code.as_str().into(),
            tally.total.into(),
            tally.sanctioned.into(),
            tally.not_sanctioned.into(),
        ]);
    }
    let totals = &report.summary.totals;
    rows.push(vec![
        "TOTAL".into(),
        totals.rows.into(),
        totals.sanctioned.into(),
        totals.not_sanctioned.into(),
    ]);
    SheetData {
        name: STATES_SHEET.into(),
        rows,
        bold_header: true,
    }
}

fn attention_sheet(report: &RunReport) -> SheetData {
    let mut rows: Vec<Vec<Cell>> = vec![vec![
        "Source".into(),
        "Loaded".into(),
        "Missing fields".into(),
        "Outside year".into(),
        "Unmapped state".into(),
    ]];
    for (source, ex) in &report.exclusions {
        rows.push(vec![
            source.as_str().into(),
            ex.loaded.into(),
            ex.missing_fields.into(),
            ex.outside_year.into(),
            ex.unmapped_rows().into(),
        ]);
    }

    let attention = report.needs_attention();
    if !attention.is_empty() {
        rows.push(Vec::new());
        rows.push(vec!["Source".into(), "Unmapped value".into(), "Rows".into()]);
        for (source, value, count) in attention {
            rows.push(vec![source.into(), value.into(), count.into()]);
        }
    }

    SheetData {
        name: ATTENTION_SHEET.into(),
        rows,
        bold_header: true,
    }
}

fn reason_about(reason: SanctionReason) -> &'static str {
    match reason {
        SanctionReason::Both => "flag set and score above the threshold",
        SanctionReason::FlagOnly => "flag set, score at or below the threshold",
        SanctionReason::ScoreOnly => "no flag, score above the threshold",
        SanctionReason::Neither => "no flag and score at or below the threshold; not sanctioned",
    }
}

/// Run statistics, then a glossary of the data sheet and the reason table.
fn summary_sheet(report: &RunReport, config: &MatchConfig) -> SheetData {
    let mut rows: Vec<Vec<Cell>> = render_summary(report)
        .into_iter()
        .map(|line| vec![Cell::from(line)])
        .collect();

    rows.push(Vec::new());
    rows.push(vec![format!("Columns of {}", config.output.data_sheet).into()]);
    for col in data_columns(config) {
        rows.push(vec![col.name.into(), col.about.into()]);
    }

    rows.push(Vec::new());
    rows.push(vec!["Reasons".into()]);
    for reason in SanctionReason::ALL {
        rows.push(vec![reason.to_string().into(), reason_about(reason).into()]);
    }

    rows.push(Vec::new());
    rows.push(vec![format!(
        "With update enabled a re-run rewrites only the racematch sheets. \
         Refresh pivot tables built on {} afterwards (Data > Refresh All).",
        config.output.data_sheet
    )
    .into()]);
    rows.push(vec![format!(
        "racematch {} at {}",
        report.meta.engine_version, report.meta.run_at
    )
    .into()]);
    SheetData {
        name: config.output.summary_sheet.clone(),
        rows,
        bold_header: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use racematch_recon::model::{MatchInput, Table};

    const CONFIG: &str = r#"
name = "Trifind vs USAT"

[source]
name = "trifind"
file = "trifind.csv"
[source.columns]
title = "title"
state = "state"
date = "date"
flag = "usat_sanctioned"
carry = ["url"]

[[targets]]
name = "usat"
file = "usat.csv"
[targets.columns]
title = "Name"
state = "2LetterCode"
date = "RaceDate"
carry = ["ApplicationID"]
"#;

    fn report() -> (RunReport, MatchConfig) {
        let config = MatchConfig::from_toml(CONFIG).unwrap();
        let source = Table::new(
            vec!["title".into(), "state".into(), "date".into(), "usat_sanctioned".into(), "url".into()],
            vec![
                vec!["Boulder Sprint Triathlon".into(), "Colorado".into(), "June 21, 2025".into(), "No".into(), "u1".into()],
                vec!["Cheyenne Classic".into(), "Wyoming".into(), "2025-08-02".into(), "Yes".into(), "u2".into()],
                vec!["San Juan Tri".into(), "Puerto Rico".into(), "2025-03-01".into(), "No".into(), "u3".into()],
            ],
        );
        let usat = Table::new(
            vec!["Name".into(), "2LetterCode".into(), "RaceDate".into(), "ApplicationID".into()],
            vec![vec!["Boulder Sprint Tri".into(), "CO".into(), "2025-06-21".into(), "APP-1".into()]],
        );
        let mut targets = BTreeMap::new();
        targets.insert("usat".to_string(), usat);
        let report = racematch_recon::run(&config, &MatchInput { source, targets }).unwrap();
        (report, config)
    }

    #[test]
    fn data_sheet_columns_line_up() {
        let (report, config) = report();
        let sheet = data_sheet(&report, &config);
        assert_eq!(sheet.name, "Matches");
        let width = sheet.rows[0].len();
        assert!(sheet.rows.iter().all(|r| r.len() == width));
        assert_eq!(sheet.rows.len(), 3);

        let table = sheet.to_table();
        let col = |name: &str| table.column_index(name).unwrap();
        let boulder = &table.rows[0];
        assert_eq!(boulder[col("trifind_row")], "1");
        assert_eq!(boulder[col("trifind_title_norm")], "boulder sprint triathlon");
        assert_eq!(boulder[col("trifind_state_code")], "CO");
        assert_eq!(boulder[col("trifind_date_raw")], "June 21, 2025");
        assert_eq!(boulder[col("trifind_date")], "2025-06-21");
        assert_eq!(boulder[col("trifind_url")], "u1");
        assert_eq!(boulder[col("usat_title")], "Boulder Sprint Tri");
        assert_eq!(boulder[col("usat_title_norm")], "boulder sprint tri");
        assert_eq!(boulder[col("usat_date")], "2025-06-21");
        assert_eq!(boulder[col("usat_ApplicationID")], "APP-1");
        assert_eq!(boulder[col("usat_score")], "95");
        assert_eq!(boulder[col("year")], "2025");
        assert_eq!(boulder[col("reason")], "score_only");

        let cheyenne = &table.rows[1];
        assert_eq!(cheyenne[col("usat_title")], "");
        assert_eq!(cheyenne[col("usat_date")], "");
        assert_eq!(cheyenne[col("usat_score")], "0");
        assert_eq!(cheyenne[col("reason")], "flag_only");
    }

    #[test]
    fn source_columns_cannot_clash_with_derived_ones() {
        let config = MatchConfig::from_toml(
            &CONFIG.replace("carry = [\"url\"]", "carry = [\"url\", \"reason\", \"year\"]"),
        )
        .unwrap();
        let headers: Vec<String> = data_columns(&config).into_iter().map(|c| c.name).collect();
        let mut unique = headers.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), headers.len());
        assert!(headers.contains(&"trifind_reason".to_string()));
        assert_eq!(headers.iter().filter(|h| *h == "reason").count(), 1);
    }

    #[test]
    fn summary_glossary_matches_data_header() {
        let (report, config) = report();
        let header: Vec<String> = data_sheet(&report, &config).rows[0]
            .iter()
            .map(Cell::to_text)
            .collect();
        let summary = summary_sheet(&report, &config);

        let start = summary
            .rows
            .iter()
            .position(|r| r.first() == Some(&Cell::from("Columns of Matches")))
            .unwrap();
        let glossary: Vec<String> = summary.rows[start + 1..start + 1 + header.len()]
            .iter()
            .map(|r| r[0].to_text())
            .collect();
        assert_eq!(glossary, header);
        assert!(summary.rows[start + 1..start + 1 + header.len()]
            .iter()
            .all(|r| r.len() == 2 && r[1] != Cell::Empty));

        for reason in ["both", "flag_only", "score_only", "neither"] {
            assert!(summary.rows.iter().any(|r| r.first() == Some(&Cell::from(reason))));
        }
    }

    #[test]
    fn managed_sheet_names_follow_config() {
        let (report, config) = report();
        let names: Vec<String> = managed_sheets(&report, &config).into_iter().map(|s| s.name).collect();
        assert_eq!(names, config.output.managed_sheets().map(String::from).to_vec());
    }

    #[test]
    fn attention_lists_unmapped_values() {
        let (report, _) = report();
        let table = attention_sheet(&report).to_table();
        assert!(table
            .rows
            .iter()
            .any(|r| r.first().map(String::as_str) == Some("trifind") && r.get(1).map(String::as_str) == Some("Puerto Rico")));
    }

    #[test]
    fn states_sheet_ends_with_total() {
        let (report, _) = report();
        let table = states_sheet(&report).to_table();
        let last = table.rows.last().unwrap();
        assert_eq!(last, &vec!["TOTAL", "2", "2", "0"]);
    }
}
