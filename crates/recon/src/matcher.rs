//! Title similarity scoring and best-candidate selection.

use serde::{Deserialize, Serialize};

use crate::model::{MatchResult, NormalizedRecord};

/// Winkler prefix boost: at most four shared leading characters, 0.1 each.
const WINKLER_PREFIX_CAP: usize = 4;
const WINKLER_SCALING: f64 = 0.1;

/// A 0–100 similarity between two normalized titles.
///
/// Implementations must return 100 for equal inputs, be symmetric, and be
/// deterministic.
pub trait Scorer {
    fn score(&self, a: &str, b: &str) -> u8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    #[default]
    JaroWinkler,
    Levenshtein,
    Indel,
}

impl ScorerKind {
    pub fn scorer(self) -> Box<dyn Scorer + Send + Sync> {
        match self {
            Self::JaroWinkler => Box::new(JaroWinkler),
            Self::Levenshtein => Box::new(Levenshtein),
            Self::Indel => Box::new(Indel),
        }
    }
}

impl std::fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JaroWinkler => write!(f, "jaro_winkler"),
            Self::Levenshtein => write!(f, "levenshtein"),
            Self::Indel => write!(f, "indel"),
        }
    }
}

impl std::str::FromStr for ScorerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jaro_winkler" => Ok(Self::JaroWinkler),
            "levenshtein" => Ok(Self::Levenshtein),
            "indel" => Ok(Self::Indel),
            other => Err(format!(
                "unknown scorer \"{other}\" (expected jaro_winkler, levenshtein or indel)"
            )),
        }
    }
}

/// Put the pair in a fixed order so asymmetric internals cannot leak out.
fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn to_score(similarity: f64) -> u8 {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Jaro similarity with the Winkler common-prefix boost.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl Scorer for JaroWinkler {
    fn score(&self, a: &str, b: &str) -> u8 {
        if a == b {
            return 100;
        }
        let (a, b) = ordered(a, b);
        let jaro = strsim::jaro(a, b);
        let prefix = a
            .chars()
            .zip(b.chars())
            .take_while(|(x, y)| x == y)
            .take(WINKLER_PREFIX_CAP)
            .count();
        to_score(jaro + WINKLER_SCALING * prefix as f64 * (1.0 - jaro))
    }
}

/// `1 - levenshtein / max_len`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Levenshtein;

impl Scorer for Levenshtein {
    fn score(&self, a: &str, b: &str) -> u8 {
        if a == b {
            return 100;
        }
        let (a, b) = ordered(a, b);
        to_score(strsim::normalized_levenshtein(a, b))
    }
}

/// Insertion/deletion ratio: `2 * LCS / (len_a + len_b)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Indel;

impl Scorer for Indel {
    fn score(&self, a: &str, b: &str) -> u8 {
        if a == b {
            return 100;
        }
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let total = a.len() + b.len();
        if total == 0 {
            return 100;
        }
        to_score(2.0 * lcs_len(&a, &b) as f64 / total as f64)
    }
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Pick the highest-scoring candidate for `title_norm`.
///
/// `candidates` are indices into `pool`, in pool order. Ties keep the first
/// candidate seen, so the result depends only on pool order.
pub fn best_match(
    title_norm: &str,
    pool: &[NormalizedRecord],
    candidates: &[usize],
    scorer: &dyn Scorer,
) -> MatchResult {
    let mut best: Option<(usize, u8)> = None;

    for &idx in candidates {
        let score = scorer.score(title_norm, &pool[idx].title_norm);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((idx, score)),
        }
        if score == 100 {
            break;
        }
    }

    match best {
        Some((idx, score)) => MatchResult { best: Some(idx), score },
        None => MatchResult::NONE,
    }
}
