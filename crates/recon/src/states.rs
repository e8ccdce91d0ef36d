//! Canonical US state table: 50 states plus the District of Columbia.

use std::collections::{BTreeMap, HashMap};

use crate::model::StateCode;

pub const US_STATES: [(&str, &str); 51] = [
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];

/// Exact-match lookup from state name or code to canonical code.
///
/// Both spellings are keys because sources disagree: one export carries
/// full names, another carries codes.
#[derive(Debug, Clone)]
pub struct StateTable {
    entries: HashMap<String, String>,
}

impl Default for StateTable {
    fn default() -> Self {
        let mut entries = HashMap::with_capacity(US_STATES.len() * 2);
        for (name, code) in US_STATES {
            entries.insert(name.to_string(), code.to_string());
            entries.insert(code.to_string(), code.to_string());
        }
        Self { entries }
    }
}

impl StateTable {
    /// Built-in table plus operator-supplied name → code entries.
    pub fn with_overrides(extra: &BTreeMap<String, String>) -> Self {
        let mut table = Self::default();
        for (name, code) in extra {
            let code = code.to_ascii_uppercase();
            table.entries.insert(name.trim().to_string(), code.clone());
            table.entries.insert(code.clone(), code);
        }
        table
    }

    /// Look up a raw state string. Only surrounding whitespace is ignored.
    pub fn lookup(&self, raw: &str) -> StateCode {
        match self.entries.get(raw.trim()) {
            Some(code) => StateCode::Code(code.clone()),
            None => StateCode::Unmapped,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct (name, code) pairs, sorted by name. Codes mapping to themselves are skipped.
    pub fn names(&self) -> Vec<(&str, &str)> {
        let mut names: Vec<(&str, &str)> = self
            .entries
            .iter()
            .filter(|(k, v)| k != v)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_51_names() {
        let table = StateTable::default();
        assert_eq!(table.names().len(), 51);
        assert_eq!(table.len(), 102);
    }

    #[test]
    fn full_names_and_codes_resolve() {
        let table = StateTable::default();
        assert_eq!(table.lookup("Colorado"), StateCode::Code("CO".into()));
        assert_eq!(table.lookup("CO"), StateCode::Code("CO".into()));
        assert_eq!(table.lookup("  Texas "), StateCode::Code("TX".into()));
        assert_eq!(table.lookup("District of Columbia"), StateCode::Code("DC".into()));
    }

    #[test]
    fn lookup_is_exact() {
        let table = StateTable::default();
        assert_eq!(table.lookup("colorado"), StateCode::Unmapped);
        assert_eq!(table.lookup("Co"), StateCode::Unmapped);
        assert_eq!(table.lookup(""), StateCode::Unmapped);
    }

    #[test]
    fn puerto_rico_unmapped_until_configured() {
        let table = StateTable::default();
        assert_eq!(table.lookup("Puerto Rico"), StateCode::Unmapped);

        let mut extra = BTreeMap::new();
        extra.insert("Puerto Rico".to_string(), "pr".to_string());
        let table = StateTable::with_overrides(&extra);
        assert_eq!(table.lookup("Puerto Rico"), StateCode::Code("PR".into()));
        assert_eq!(table.lookup("PR"), StateCode::Code("PR".into()));
    }
}
