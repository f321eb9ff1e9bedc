//! Deterministic comparison summaries
//!
//! Rule-based prose over the analysis facts: agreement level, duty deltas
//! bucketed against the configured threshold, confidence gaps, and honest
//! notes about providers that failed or were never consulted. The output is
//! advisory text for humans and is never re-parsed downstream.

use std::collections::HashMap;

use crate::config::AppConfig;
use crate::models::{ClassificationResult, DutyResult, MatchCell, ProviderId};

/// Everything the summary generator looks at
pub struct SummaryContext<'a> {
    pub requested: &'a [ProviderId],
    pub classifications: &'a HashMap<ProviderId, ClassificationResult>,
    pub duties: &'a HashMap<ProviderId, DutyResult>,
    pub matches: &'a [MatchCell],
    pub duty_deltas: &'a HashMap<String, f64>,
    pub currency: &'a str,
    pub product_value: Option<f64>,
    pub value_estimated: bool,
    pub duty_requested: bool,
}

/// Compose the advisory notes for one comparison
pub fn generate_notes(ctx: &SummaryContext<'_>, config: &AppConfig) -> String {
    let mut notes: Vec<String> = Vec::new();

    // Failed providers first, so partial results are never mistaken for
    // agreement.
    for provider in ctx.requested {
        if let Some(result) = ctx.classifications.get(provider) {
            if !result.is_ok() {
                notes.push(format!(
                    "The {} provider returned no usable classification.",
                    provider
                ));
            }
        }
    }

    if ctx.requested.len() < 2 {
        if let Some(provider) = ctx.requested.first() {
            notes.push(format!(
                "Only the {} provider was consulted; no cross-provider comparison was possible.",
                provider
            ));
        }
    }

    for cell in ctx.matches {
        match (cell.exact, cell.family) {
            (Some(true), _) => {
                if let Some(result) = ctx.classifications.get(&cell.left) {
                    notes.push(format!(
                        "Both providers agree on the full code {}.",
                        result.code
                    ));
                }
            }
            (Some(false), Some(true)) => {
                let left_code = ctx
                    .classifications
                    .get(&cell.left)
                    .map(|r| r.code.as_str())
                    .unwrap_or_default();
                let right_code = ctx
                    .classifications
                    .get(&cell.right)
                    .map(|r| r.code.as_str())
                    .unwrap_or_default();
                let family = ctx
                    .classifications
                    .get(&cell.left)
                    .map(|r| r.hs6.as_str())
                    .unwrap_or_default();
                notes.push(format!(
                    "Providers agree at the 6-digit family {} but differ at full precision ({} vs {}).",
                    family, left_code, right_code
                ));
            }
            (Some(false), _) => {
                let left_code = ctx
                    .classifications
                    .get(&cell.left)
                    .map(|r| r.code.as_str())
                    .unwrap_or_default();
                let right_code = ctx
                    .classifications
                    .get(&cell.right)
                    .map(|r| r.code.as_str())
                    .unwrap_or_default();
                notes.push(format!(
                    "Providers disagree: {} classified {}, {} classified {}.",
                    cell.left, left_code, cell.right, right_code
                ));
            }
            (None, _) => {
                notes.push(format!(
                    "No comparison between {} and {} was possible.",
                    cell.left, cell.right
                ));
            }
        }
    }

    // Confidence gap between successfully classified pairs
    for (i, left) in ctx.requested.iter().enumerate() {
        for right in &ctx.requested[i + 1..] {
            let pair = (
                ctx.classifications.get(left).filter(|r| r.is_ok()),
                ctx.classifications.get(right).filter(|r| r.is_ok()),
            );
            if let (Some(a), Some(b)) = pair {
                let gap = (a.confidence - b.confidence).abs();
                if gap > config.confidence_gap_threshold {
                    notes.push(format!(
                        "Confidence differs markedly: {} at {:.2} vs {} at {:.2}.",
                        left, a.confidence, right, b.confidence
                    ));
                }
            }
        }
    }

    if ctx.value_estimated {
        if let Some(value) = ctx.product_value {
            notes.push(format!(
                "No declared value was supplied; calculations use the reasoning provider's estimate of {:.2} {}.",
                value, ctx.currency
            ));
        }
    } else if ctx.product_value.is_none() && ctx.duty_requested {
        notes.push("No product value was available, so the duty phase was skipped.".to_string());
    }

    for provider in ctx.requested {
        if let Some(duty) = ctx.duties.get(provider) {
            if !duty.is_ok() {
                notes.push(format!(
                    "The {} duty calculation failed; its landed cost defaults to the declared value.",
                    provider
                ));
            }
        }
    }

    // A structured-slot duty entry built from the reasoning code deserves a
    // flag: the figure is real, the classification behind it is borrowed.
    let structured_failed = ctx
        .classifications
        .get(&ProviderId::Structured)
        .map(|r| !r.is_ok())
        .unwrap_or(false);
    if structured_failed {
        if let Some(duty) = ctx.duties.get(&ProviderId::Structured) {
            if duty.is_ok() {
                notes.push(
                    "The structured duty figure was computed from the reasoning provider's code."
                        .to_string(),
                );
            }
        }
    }

    let mut delta_pairs: Vec<(&String, &f64)> = ctx.duty_deltas.iter().collect();
    delta_pairs.sort_by(|a, b| a.0.cmp(b.0));
    for (_, delta) in delta_pairs {
        if *delta > config.duty_delta_threshold {
            notes.push(format!(
                "Duty totals diverge by {:.2} {}, a significant gap.",
                delta, ctx.currency
            ));
        } else {
            notes.push(format!(
                "Duty totals are within {:.2} {} of each other.",
                delta, ctx.currency
            ));
        }
    }

    notes.join(" ")
}
