use std::collections::BTreeMap;

use crate::aggregate::{summarize, ScoreBands};
use crate::candidates::{candidates, StateIndex};
use crate::classify::{flag_is_set, resolve_sanction};
use crate::config::{FlagSource, MatchConfig, SourceConfig};
use crate::error::ReconError;
use crate::matcher::best_match;
use crate::model::{
    Exclusions, MatchInput, NormalizedRecord, ResolvedRow, RunMeta, RunReport, SourceRecord,
    Table, TargetMatch,
};
use crate::normalize::normalize_record;
use crate::states::StateTable;

/// Run the matching pipeline over pre-loaded tables.
///
/// Each source record is resolved independently against every configured
/// target. Fails only on structural problems (a missing table or column);
/// bad row values are counted in the report's exclusions.
pub fn run(config: &MatchConfig, input: &MatchInput) -> Result<RunReport, ReconError> {
    let states = StateTable::with_overrides(&config.states);
    let bands = ScoreBands::new(&config.bands);
    let mut exclusions = BTreeMap::new();

    let (sources, source_ex) = load_side(&config.source, &input.source, &states)?;
    exclusions.insert(config.source.name.clone(), source_ex);

    let mut pools: Vec<(&str, Vec<NormalizedRecord>, StateIndex)> = Vec::new();
    for target in &config.targets {
        let table = input.targets.get(&target.name).ok_or_else(|| {
            ReconError::UnknownTarget(format!("no table loaded for target '{}'", target.name))
        })?;
        let (pool, ex) = load_side(target, table, &states)?;
        exclusions.insert(target.name.clone(), ex);
        let index = StateIndex::build(&pool);
        log::info!(
            "target '{}': {} records across {} states",
            target.name,
            pool.len(),
            index.states().count()
        );
        pools.push((target.name.as_str(), pool, index));
    }

    let scorer = config.scorer.scorer();
    let flag_source = config.flag_source();
    let sanction_target = config.sanction_target();
    let truthy = &config.sanction.truthy;

    log::info!(
        "matching {} '{}' records (scorer {}, threshold > {})",
        sources.len(),
        config.source.name,
        config.scorer,
        config.threshold
    );

    let mut rows = Vec::with_capacity(sources.len());
    for record in sources {
        let mut matches = Vec::with_capacity(pools.len());
        for (name, pool, index) in &pools {
            let cands = candidates(&record, pool, index, config.year_filter);
            let result = best_match(&record.title_norm, pool, &cands, &*scorer);
            let candidate = result.best.map(|idx| pool[idx].clone());
            log::debug!(
                "{} row {} '{}' vs {}: {} candidates, best {:?} ({})",
                record.record.source,
                record.record.row,
                record.record.title,
                name,
                cands.len(),
                candidate.as_ref().map(|c| c.record.title.as_str()),
                result.score
            );
            matches.push(TargetMatch {
                target: name.to_string(),
                score: result.score,
                band: bands.band_for(result.score).to_string(),
                candidate_count: cands.len(),
                candidate,
            });
        }

        let flag_raw = match flag_source {
            FlagSource::Source => record.record.flag.clone(),
            FlagSource::Target(target) => matches
                .iter()
                .find(|m| m.target == target)
                .and_then(|m| m.candidate.as_ref())
                .and_then(|c| c.record.flag.clone()),
            FlagSource::None => None,
        };
        let flag = flag_is_set(flag_raw.as_deref(), truthy);
        let score = matches
            .iter()
            .find(|m| m.target == sanction_target)
            .map(|m| m.score)
            .unwrap_or(0);
        let verdict = resolve_sanction(flag, score, config.threshold);

        rows.push(ResolvedRow {
            record,
            matches,
            flag_raw,
            verdict,
        });
    }

    let summary = summarize(&rows, config, &bands);
    log::info!(
        "resolved {} rows: {} sanctioned, {} not sanctioned",
        summary.totals.rows,
        summary.totals.sanctioned,
        summary.totals.not_sanctioned
    );

    Ok(RunReport {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            threshold: config.threshold,
            scorer: config.scorer.to_string(),
            year_filter: config.year_filter,
            sanction_target: sanction_target.to_string(),
            flag_source: flag_source.to_string(),
        },
        summary,
        exclusions,
        rows,
    })
}

fn load_side(
    config: &SourceConfig,
    table: &Table,
    states: &StateTable,
) -> Result<(Vec<NormalizedRecord>, Exclusions), ReconError> {
    let (records, missing) = extract_records(config, table)?;
    let (normalized, mut ex) = prepare(&config.name, records, config.year, states);
    ex.loaded = table.rows.len();
    ex.missing_fields = missing;
    if missing > 0 {
        log::warn!("{}: {missing} rows skipped for missing title, state or date", config.name);
    }
    log::info!("{}: loaded {} rows, {} usable", config.name, ex.loaded, normalized.len());
    Ok((normalized, ex))
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Map a table onto records using the configured columns.
///
/// A configured column absent from the header is an error. Rows with an
/// empty title, state or date are skipped and counted in the second value.
pub fn extract_records(
    config: &SourceConfig,
    table: &Table,
) -> Result<(Vec<SourceRecord>, usize), ReconError> {
    let col = &config.columns;
    let idx = |name: &str| -> Result<usize, ReconError> {
        table.column_index(name).ok_or_else(|| ReconError::MissingColumn {
            source: config.name.clone(),
            column: name.into(),
        })
    };

    let title_idx = idx(&col.title)?;
    let state_idx = idx(&col.state)?;
    let date_idx = idx(&col.date)?;
    let flag_idx = match col.flag {
        Some(ref flag) => Some(idx(flag)?),
        None => None,
    };
    let carry_idx = col
        .carry
        .iter()
        .map(|c| idx(c).map(|i| (c.clone(), i)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut missing = 0;

    for (i, row) in table.rows.iter().enumerate() {
        let cell = |j: usize| row.get(j).map(|s| s.trim()).unwrap_or("");

        let (title, state, date) = (cell(title_idx), cell(state_idx), cell(date_idx));
        if title.is_empty() || state.is_empty() || date.is_empty() {
            missing += 1;
            continue;
        }

        records.push(SourceRecord {
            source: config.name.clone(),
            row: i + 1,
            title: title.to_string(),
            state: state.to_string(),
            date: date.to_string(),
            flag: flag_idx.map(|j| cell(j).to_string()),
            extra: carry_idx
                .iter()
                .map(|(name, j)| (name.clone(), cell(*j).to_string()))
                .collect(),
        });
    }

    Ok((records, missing))
}

// ---------------------------------------------------------------------------
// Normalization + exclusions
// ---------------------------------------------------------------------------

/// Normalize records and drop the ones that cannot take part in matching.
///
/// Rows outside the source-level `year` are dropped first (undated rows
/// included), then rows whose state is unmapped. Unmapped strings are
/// logged once each.
pub fn prepare(
    source: &str,
    records: Vec<SourceRecord>,
    year: Option<i32>,
    states: &StateTable,
) -> (Vec<NormalizedRecord>, Exclusions) {
    let mut ex = Exclusions {
        loaded: records.len(),
        ..Exclusions::default()
    };
    let mut kept = Vec::with_capacity(records.len());

    for record in &records {
        let normalized = normalize_record(record, states);

        if let Some(year) = year {
            if normalized.year != Some(year) {
                ex.outside_year += 1;
                continue;
            }
        }

        if normalized.state_code.is_unmapped() {
            *ex.unmapped.entry(record.state.trim().to_string()).or_insert(0) += 1;
            continue;
        }

        kept.push(normalized);
    }

    for (value, count) in &ex.unmapped {
        log::warn!("{source}: unmapped state \"{value}\" ({count} rows), excluded from matching");
    }

    (kept, ex)
}
