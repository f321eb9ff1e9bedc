//! Cross-provider code matching
//!
//! Pure, deterministic comparisons of hierarchical HS codes at two
//! granularities: full precision and the 6-digit family prefix. Because
//! `hs6` is derived from the full code at construction, an exact match
//! always implies a family match.

use std::collections::HashMap;

use crate::models::{ClassificationResult, MatchCell, ProviderId};

/// Full-precision agreement
pub fn exact_match(a: &ClassificationResult, b: &ClassificationResult) -> bool {
    a.code == b.code
}

/// Agreement at the 6-digit family level
pub fn family_match(a: &ClassificationResult, b: &ClassificationResult) -> bool {
    a.hs6 == b.hs6
}

/// Build the N-choose-2 match matrix over the requested providers
///
/// A cell's options are `None` when either side is absent or errored:
/// "no comparison possible" is distinct from "compared and differ".
pub fn match_matrix(
    requested: &[ProviderId],
    classifications: &HashMap<ProviderId, ClassificationResult>,
) -> Vec<MatchCell> {
    let mut cells = Vec::new();
    for (i, &left) in requested.iter().enumerate() {
        for &right in &requested[i + 1..] {
            let pair = (
                classifications.get(&left).filter(|r| r.is_ok()),
                classifications.get(&right).filter(|r| r.is_ok()),
            );
            let (exact, family) = match pair {
                (Some(a), Some(b)) => (Some(exact_match(a, b)), Some(family_match(a, b))),
                _ => (None, None),
            };
            cells.push(MatchCell {
                left,
                right,
                exact,
                family,
            });
        }
    }
    cells
}
