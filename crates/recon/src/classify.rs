use crate::model::{SanctionReason, SanctionVerdict};

/// Combine the explicit flag with the score signal.
///
/// | flag | score > threshold | reason       |
/// |------|-------------------|--------------|
/// | yes  | yes               | `both`       |
/// | yes  | no                | `flag_only`  |
/// | no   | yes               | `score_only` |
/// | no   | no                | `neither`    |
pub fn resolve_sanction(flag: bool, score: u8, threshold: u8) -> SanctionVerdict {
    let score_high = score > threshold;
    let reason = match (flag, score_high) {
        (true, true) => SanctionReason::Both,
        (true, false) => SanctionReason::FlagOnly,
        (false, true) => SanctionReason::ScoreOnly,
        (false, false) => SanctionReason::Neither,
    };

    SanctionVerdict {
        flag,
        score_high,
        inferred: flag || score_high,
        discrepancy: flag != score_high,
        reason,
    }
}

/// Interpret raw flag text ("Yes", "yes ", "No", ...) against the truthy list.
pub fn flag_is_set(raw: Option<&str>, truthy: &[String]) -> bool {
    let Some(raw) = raw else {
        return false;
    };
    let value = raw.trim().to_lowercase();
    truthy.iter().any(|t| t.trim().to_lowercase() == value)
}
