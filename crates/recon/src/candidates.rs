use std::collections::BTreeMap;

use crate::model::NormalizedRecord;

/// Target pool partitioned by canonical state code.
///
/// Each partition lists pool indices in load order. Unmapped records are in
/// no partition, so they can never be offered as candidates.
#[derive(Debug, Default)]
pub struct StateIndex {
    by_state: BTreeMap<String, Vec<usize>>,
}

impl StateIndex {
    pub fn build(pool: &[NormalizedRecord]) -> Self {
        let mut by_state: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, rec) in pool.iter().enumerate() {
            if let Some(code) = rec.state_code.code() {
                by_state.entry(code.to_string()).or_default().push(idx);
            }
        }
        Self { by_state }
    }

    pub fn partition(&self, code: &str) -> &[usize] {
        self.by_state.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.by_state.keys().map(String::as_str)
    }
}

/// Candidates for `source`: same state code, and with `year_filter` the same
/// year unless either side has no parsed year.
pub fn candidates(
    source: &NormalizedRecord,
    pool: &[NormalizedRecord],
    index: &StateIndex,
    year_filter: bool,
) -> Vec<usize> {
    let Some(code) = source.state_code.code() else {
        return Vec::new();
    };

    let partition = index.partition(code);
    if !year_filter {
        return partition.to_vec();
    }

    partition
        .iter()
        .copied()
        .filter(|&idx| match (source.year, pool[idx].year) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceRecord, StateCode};

    fn rec(title: &str, state: StateCode, year: Option<i32>) -> NormalizedRecord {
        NormalizedRecord {
            record: SourceRecord {
                source: "t".into(),
                row: 1,
                title: title.into(),
                state: state.to_string(),
                date: String::new(),
                flag: None,
                extra: Vec::new(),
            },
            title_norm: title.to_lowercase(),
            state_code: state,
            date: None,
            month: None,
            year,
        }
    }

    fn co() -> StateCode {
        StateCode::Code("CO".into())
    }

    fn tx() -> StateCode {
        StateCode::Code("TX".into())
    }

    #[test]
    fn same_state_only_in_pool_order() {
        let pool = vec![
            rec("a", co(), None),
            rec("b", tx(), None),
            rec("c", co(), None),
            rec("d", StateCode::Unmapped, None),
        ];
        let index = StateIndex::build(&pool);
        let source = rec("x", co(), None);
        assert_eq!(candidates(&source, &pool, &index, false), vec![0, 2]);
        assert_eq!(index.states().collect::<Vec<_>>(), vec!["CO", "TX"]);
    }

    #[test]
    fn no_shared_state_is_empty_not_error() {
        let pool = vec![rec("a", tx(), None)];
        let index = StateIndex::build(&pool);
        assert!(candidates(&rec("x", co(), None), &pool, &index, false).is_empty());
    }

    #[test]
    fn unmapped_source_gets_no_candidates() {
        let pool = vec![rec("a", StateCode::Unmapped, None), rec("b", co(), None)];
        let index = StateIndex::build(&pool);
        let source = rec("x", StateCode::Unmapped, None);
        assert!(candidates(&source, &pool, &index, false).is_empty());
    }

    #[test]
    fn year_filter_skips_when_either_year_missing() {
        let pool = vec![
            rec("a", co(), Some(2025)),
            rec("b", co(), Some(2024)),
            rec("c", co(), None),
        ];
        let index = StateIndex::build(&pool);

        let dated = rec("x", co(), Some(2025));
        assert_eq!(candidates(&dated, &pool, &index, true), vec![0, 2]);

        let undated = rec("y", co(), None);
        assert_eq!(candidates(&undated, &pool, &index, true), vec![0, 1, 2]);

        assert_eq!(candidates(&dated, &pool, &index, false), vec![0, 1, 2]);
    }
}
