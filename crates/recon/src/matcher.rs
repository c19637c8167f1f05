use std::collections::HashSet;

use serde::Serialize;

use crate::model::{Candidate, ConfigurationId};

/// Fuzzy acceptance threshold used when none is configured.
pub const DEFAULT_THRESHOLD: u32 = 85;

/// Superset candidates lose one point per extra token, capped here.
const MAX_EXTRA_PENALTY: usize = 10;

/// Intersections smaller than this are noise, never a match.
const MIN_SHARED_TOKENS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchScore {
    pub id: Option<ConfigurationId>,
    pub score: u32,
}

impl MatchScore {
    pub const NONE: MatchScore = MatchScore { id: None, score: 0 };

    /// The matched id, if the score reaches `threshold`.
    pub fn accepted(&self, threshold: u32) -> Option<ConfigurationId> {
        self.id.filter(|_| self.score >= threshold)
    }
}

/// First candidate whose token-key equals `token_key`.
pub fn find_exact<'a>(token_key: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    candidates
        .iter()
        .find(|c| c.token_key.as_deref() == Some(token_key))
}

/// Score every candidate against `needle` and return the best.
///
/// A candidate whose tokens contain the whole needle scores
/// `100 - min(extra, 10)`, so the tightest superset wins. Otherwise the
/// score is the share of the candidate's tokens covered by the needle,
/// provided at least two tokens are shared. Ties keep the earliest
/// candidate.
pub fn resolve(needle: &[String], candidates: &[Candidate]) -> MatchScore {
    let needle: HashSet<&str> = needle.iter().map(String::as_str).collect();
    let needle_count = needle.len();
    let mut best = MatchScore::NONE;

    if needle_count == 0 {
        return best;
    }

    for cand in candidates {
        let cand_tokens: HashSet<&str> = cand.tokens.iter().map(String::as_str).collect();
        if cand_tokens.is_empty() {
            continue;
        }

        let missing = needle.iter().filter(|t| !cand_tokens.contains(*t)).count();

        let score = if missing == 0 {
            let extra = cand_tokens.len().saturating_sub(needle_count);
            100 - extra.min(MAX_EXTRA_PENALTY) as u32
        } else {
            let hit = cand_tokens.iter().filter(|t| needle.contains(*t)).count();
            if hit < MIN_SHARED_TOKENS {
                continue;
            }
            coverage_score(hit, cand_tokens.len())
        };

        if score > best.score {
            best = MatchScore {
                id: Some(cand.id),
                score,
            };
        }
    }

    best
}

/// `round(100 * hit / total)`, half away from zero.
fn coverage_score(hit: usize, total: usize) -> u32 {
    ((200 * hit + total) / (2 * total)) as u32
}
