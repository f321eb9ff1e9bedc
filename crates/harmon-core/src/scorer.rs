//! Provider scoring against a reference classification
//!
//! Each provider's result is graded against the configured reference
//! provider (the structured provider by default, treated as closed-book
//! ground truth): a match bonus of 3 for exact agreement or 2 for family
//! agreement, plus the result's own confidence. Errored results score 0.

use std::collections::HashMap;

use crate::matcher::{exact_match, family_match};
use crate::models::{ClassificationResult, ProviderId, Winner};

/// Score one result against the reference
///
/// Monotonically non-decreasing in confidence at a fixed match level. With
/// no usable reference the bonus collapses to 0 and the score is bare
/// confidence.
pub fn score(result: &ClassificationResult, reference: Option<&ClassificationResult>) -> f64 {
    if !result.is_ok() {
        return 0.0;
    }
    let match_bonus = match reference.filter(|r| r.is_ok()) {
        Some(reference) if exact_match(result, reference) => 3.0,
        Some(reference) if family_match(result, reference) => 2.0,
        _ => 0.0,
    };
    match_bonus + result.confidence
}

/// Score every requested provider against the reference provider's result
pub fn score_all(
    requested: &[ProviderId],
    classifications: &HashMap<ProviderId, ClassificationResult>,
    reference_provider: ProviderId,
) -> HashMap<ProviderId, f64> {
    let reference = classifications.get(&reference_provider);
    requested
        .iter()
        .map(|provider| {
            let provider_score = classifications
                .get(provider)
                .map(|result| score(result, reference))
                .unwrap_or(0.0);
            (*provider, provider_score)
        })
        .collect()
}

/// Decide the winning provider from the score map
///
/// Strictly highest score wins; a shared positive maximum is a tie; all-zero
/// scores record no winner at all.
pub fn decide_winner(scores: &HashMap<ProviderId, f64>) -> Option<Winner> {
    let max = scores.values().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return None;
    }
    let leaders: Vec<ProviderId> = scores
        .iter()
        .filter(|(_, &score)| score == max)
        .map(|(&provider, _)| provider)
        .collect();
    match leaders.as_slice() {
        [single] => Some(Winner::Provider(*single)),
        _ => Some(Winner::Tie),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(provider: ProviderId, code: &str, confidence: f64) -> ClassificationResult {
        ClassificationResult::classified(provider, code, "test", confidence)
    }

    #[test]
    fn exact_match_scores_three_plus_confidence() {
        let reference = result(ProviderId::Structured, "64039910", 0.85);
        let scored = result(ProviderId::Reasoning, "64039910", 0.9);
        assert!((score(&scored, Some(&reference)) - 3.9).abs() < 1e-9);
    }

    #[test]
    fn family_match_scores_two_plus_confidence() {
        let reference = result(ProviderId::Structured, "64039990", 0.85);
        let scored = result(ProviderId::Reasoning, "64039910", 0.9);
        assert!((score(&scored, Some(&reference)) - 2.9).abs() < 1e-9);
    }

    #[test]
    fn mismatch_scores_bare_confidence() {
        let reference = result(ProviderId::Structured, "42022100", 0.85);
        let scored = result(ProviderId::Reasoning, "64039910", 0.9);
        assert!((score(&scored, Some(&reference)) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn errored_result_scores_zero() {
        let reference = result(ProviderId::Structured, "64039910", 0.85);
        let failed = ClassificationResult::failed(ProviderId::Reasoning, "timeout");
        assert_eq!(score(&failed, Some(&reference)), 0.0);
    }

    #[test]
    fn errored_reference_drops_match_bonus() {
        let reference = ClassificationResult::failed(ProviderId::Structured, "timeout");
        let scored = result(ProviderId::Reasoning, "64039910", 0.9);
        assert!((score(&scored, Some(&reference)) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn monotone_in_confidence_at_fixed_match_level() {
        let reference = result(ProviderId::Structured, "64039910", 0.85);
        let lower = result(ProviderId::Reasoning, "64039910", 0.4);
        let higher = result(ProviderId::Reasoning, "64039910", 0.8);
        assert!(score(&lower, Some(&reference)) <= score(&higher, Some(&reference)));
    }

    #[test]
    fn higher_score_wins() {
        // Scenario A: same code, confidences 0.9 vs 0.85
        let mut classifications = HashMap::new();
        classifications.insert(
            ProviderId::Reasoning,
            result(ProviderId::Reasoning, "640399", 0.9),
        );
        classifications.insert(
            ProviderId::Structured,
            result(ProviderId::Structured, "640399", 0.85),
        );
        let requested = [ProviderId::Reasoning, ProviderId::Structured];
        let scores = score_all(&requested, &classifications, ProviderId::Structured);
        assert_eq!(
            decide_winner(&scores),
            Some(Winner::Provider(ProviderId::Reasoning))
        );
    }

    #[test]
    fn equal_positive_scores_tie() {
        let mut scores = HashMap::new();
        scores.insert(ProviderId::Reasoning, 3.9);
        scores.insert(ProviderId::Structured, 3.9);
        assert_eq!(decide_winner(&scores), Some(Winner::Tie));
    }

    #[test]
    fn all_zero_scores_record_no_winner() {
        let mut scores = HashMap::new();
        scores.insert(ProviderId::Reasoning, 0.0);
        scores.insert(ProviderId::Structured, 0.0);
        assert_eq!(decide_winner(&scores), None);
    }
}
