use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;
use crate::matcher::ScorerKind;

/// Score strictly above this value confirms sanctioning.
pub const DEFAULT_THRESHOLD: u8 = 90;

/// Inclusive upper bounds of the reporting bands: 0–69, 70–79, 80–89, 90–94, 95–100.
pub const DEFAULT_BAND_BOUNDS: [u8; 5] = [69, 79, 89, 94, 100];

pub const DEFAULT_TOP_STATES: usize = 5;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MatchConfig {
    pub name: String,
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default)]
    pub scorer: ScorerKind,
    /// Require candidate year to equal the source year when both are known.
    #[serde(default)]
    pub year_filter: bool,
    #[serde(default = "default_top_states")]
    pub top_states: usize,
    #[serde(default = "default_bands")]
    pub bands: Vec<u8>,
    /// Extra state name → two-letter code mappings layered over the built-in table.
    #[serde(default)]
    pub states: BTreeMap<String, String>,
    pub source: SourceConfig,
    pub targets: Vec<SourceConfig>,
    #[serde(default)]
    pub sanction: SanctionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

fn default_top_states() -> usize {
    DEFAULT_TOP_STATES
}

fn default_bands() -> Vec<u8> {
    DEFAULT_BAND_BOUNDS.to_vec()
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub file: String,
    /// Worksheet to read for spreadsheet inputs. Defaults to the first sheet.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Keep only rows whose parsed date falls in this year.
    #[serde(default)]
    pub year: Option<i32>,
    pub columns: ColumnMapping,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    pub title: String,
    pub state: String,
    pub date: String,
    #[serde(default)]
    pub flag: Option<String>,
    /// Columns copied verbatim into the output next to the record.
    #[serde(default)]
    pub carry: Vec<String>,
}

impl ColumnMapping {
    /// Every column this mapping reads, required ones first.
    pub fn all_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.title.as_str(), self.state.as_str(), self.date.as_str()];
        if let Some(ref flag) = self.flag {
            cols.push(flag);
        }
        cols.extend(self.carry.iter().map(String::as_str));
        cols
    }
}

// ---------------------------------------------------------------------------
// Sanction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SanctionConfig {
    /// Target whose match score drives the verdict. Defaults to the first target.
    #[serde(default)]
    pub target: Option<String>,
    /// "source", "none", or a target name. Defaults to "source" when the
    /// source maps a flag column, "none" otherwise.
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default = "default_truthy")]
    pub truthy: Vec<String>,
}

impl Default for SanctionConfig {
    fn default() -> Self {
        Self {
            target: None,
            flag: None,
            truthy: default_truthy(),
        }
    }
}

fn default_truthy() -> Vec<String> {
    vec!["yes".into()]
}

/// Where the explicit sanctioning flag is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSource<'a> {
    /// The source record's own flag column.
    Source,
    /// The flag column of the best candidate in the named target.
    Target(&'a str),
    /// No explicit flag; only the score can confirm sanctioning.
    None,
}

impl std::fmt::Display for FlagSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target(name) => write!(f, "{name}"),
            Self::None => write!(f, "none"),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub xlsx: Option<String>,
    /// Keep sheets of an existing workbook that this run does not manage.
    #[serde(default)]
    pub update: bool,
    #[serde(default = "default_data_sheet")]
    pub data_sheet: String,
    #[serde(default = "default_summary_sheet")]
    pub summary_sheet: String,
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub json: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            xlsx: None,
            update: false,
            data_sheet: default_data_sheet(),
            summary_sheet: default_summary_sheet(),
            csv: None,
            json: None,
        }
    }
}

/// Sheets written by every run next to the configurable data and summary sheets.
pub const BANDS_SHEET: &str = "Score Bands";
pub const STATES_SHEET: &str = "States";
pub const ATTENTION_SHEET: &str = "Needs Attention";

impl OutputConfig {
    /// Every sheet a run owns, in write order.
    pub fn managed_sheets(&self) -> [&str; 5] {
        [
            self.data_sheet.as_str(),
            BANDS_SHEET,
            STATES_SHEET,
            ATTENTION_SHEET,
            self.summary_sheet.as_str(),
        ]
    }
}

fn default_data_sheet() -> String {
    "Matches".into()
}

fn default_summary_sheet() -> String {
    "Summary".into()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: MatchConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.threshold > 100 {
            return Err(ReconError::ConfigValidation(format!(
                "threshold must be between 0 and 100, got {}",
                self.threshold
            )));
        }

        if self.top_states == 0 {
            return Err(ReconError::ConfigValidation("top_states must be at least 1".into()));
        }

        validate_bands(&self.bands)?;

        for (name, code) in &self.states {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ReconError::ConfigValidation(format!(
                    "state '{name}': code must be two ASCII letters, got '{code}'"
                )));
            }
        }

        // One target is the classic two-source run, two is the three-source run
        if self.targets.is_empty() || self.targets.len() > 2 {
            return Err(ReconError::ConfigValidation(format!(
                "expected 1 or 2 targets, found {}",
                self.targets.len()
            )));
        }

        let mut names = HashSet::new();
        for source in std::iter::once(&self.source).chain(&self.targets) {
            if !names.insert(source.name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if source.name == "source" || source.name == "none" {
                return Err(ReconError::ConfigValidation(format!(
                    "'{}' is reserved and cannot name a source",
                    source.name
                )));
            }
            for column in source.columns.all_columns() {
                if column.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "source '{}': column names must not be empty",
                        source.name
                    )));
                }
            }
        }

        if let Some(ref target) = self.sanction.target {
            if self.target(target).is_none() {
                return Err(ReconError::UnknownTarget(format!(
                    "sanction target '{target}' not found"
                )));
            }
        }

        match self.sanction.flag.as_deref() {
            None | Some("none") => {}
            Some("source") => {
                if self.source.columns.flag.is_none() {
                    return Err(ReconError::ConfigValidation(
                        "sanction flag = \"source\" requires source.columns.flag".into(),
                    ));
                }
            }
            Some(other) => match self.target(other) {
                None => {
                    return Err(ReconError::UnknownTarget(format!(
                        "sanction flag target '{other}' not found"
                    )));
                }
                Some(t) if t.columns.flag.is_none() => {
                    return Err(ReconError::ConfigValidation(format!(
                        "sanction flag = \"{other}\" requires a flag column on that target"
                    )));
                }
                Some(_) => {}
            },
        }

        if self.sanction.truthy.is_empty() {
            return Err(ReconError::ConfigValidation("sanction.truthy must not be empty".into()));
        }

        validate_sheet_names(&self.output)?;

        Ok(())
    }

    pub fn target(&self, name: &str) -> Option<&SourceConfig> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Name of the target whose score drives the sanction verdict.
    pub fn sanction_target(&self) -> &str {
        self.sanction
            .target
            .as_deref()
            .unwrap_or_else(|| self.targets[0].name.as_str())
    }

    pub fn flag_source(&self) -> FlagSource<'_> {
        match self.sanction.flag.as_deref() {
            Some("source") => FlagSource::Source,
            Some("none") => FlagSource::None,
            Some(name) => FlagSource::Target(name),
            None if self.source.columns.flag.is_some() => FlagSource::Source,
            None => FlagSource::None,
        }
    }
}

fn validate_bands(bands: &[u8]) -> Result<(), ReconError> {
    if bands.is_empty() {
        return Err(ReconError::ConfigValidation("bands must not be empty".into()));
    }
    if bands.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ReconError::ConfigValidation(format!(
            "bands must be strictly increasing, got {bands:?}"
        )));
    }
    if bands.last() != Some(&100) {
        return Err(ReconError::ConfigValidation(format!(
            "last band must end at 100, got {bands:?}"
        )));
    }
    Ok(())
}

/// Excel rejects names over 31 characters or containing any of `[]:*?/\`.
fn validate_sheet_names(output: &OutputConfig) -> Result<(), ReconError> {
    for name in [&output.data_sheet, &output.summary_sheet] {
        if name.trim().is_empty()
            || name.chars().count() > 31
            || name.chars().any(|c| "[]:*?/\\".contains(c))
        {
            return Err(ReconError::ConfigValidation(format!(
                "output sheet name '{name}' is not a valid worksheet name"
            )));
        }
    }

    let managed = output.managed_sheets();
    for (i, name) in managed.iter().enumerate() {
        if managed[..i].iter().any(|m| m.eq_ignore_ascii_case(name)) {
            return Err(ReconError::ConfigValidation(format!(
                "output sheet name '{name}' is used twice"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
