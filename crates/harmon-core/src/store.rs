//! Comparison result store
//!
//! Process-lifetime keyed storage for aggregate comparison results. The
//! trait is deliberately small — create, get, list — so a durable backing
//! store can replace the in-memory one without touching the orchestrator.
//! Distinct comparisons never write the same key; the lock only guards
//! append/read atomicity of the backing map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AggregateComparisonResult, ProviderId, Winner};

/// Aggregate statistics over all stored comparisons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub total_comparisons: usize,
    /// Comparisons whose providers tied on score
    pub ties: usize,
    /// Win tally per provider
    pub wins: HashMap<ProviderId, usize>,
    /// Mean confidence per provider (errored results count as 0.0)
    pub average_confidence: HashMap<ProviderId, f64>,
    /// Share of determinable match cells involving the provider that agree
    /// at the 6-digit family level
    pub family_match_rate: HashMap<ProviderId, f64>,
}

/// Storage contract for comparison results
#[async_trait]
pub trait ComparisonStore: Send + Sync {
    /// Store one finished comparison
    async fn insert(&self, result: AggregateComparisonResult);

    /// Look up a comparison by id
    async fn get(&self, id: Uuid) -> Option<Arc<AggregateComparisonResult>>;

    /// All stored comparisons, newest first regardless of insertion order
    async fn list(&self) -> Vec<Arc<AggregateComparisonResult>>;

    /// Aggregate statistics over everything stored
    async fn stats(&self) -> ComparisonStats {
        compute_stats(&self.list().await)
    }
}

/// In-memory store backing the default deployment
#[derive(Default)]
pub struct MemoryStore {
    comparisons: RwLock<HashMap<Uuid, Arc<AggregateComparisonResult>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComparisonStore for MemoryStore {
    async fn insert(&self, result: AggregateComparisonResult) {
        let mut comparisons = self.comparisons.write().await;
        comparisons.insert(result.id, Arc::new(result));
    }

    async fn get(&self, id: Uuid) -> Option<Arc<AggregateComparisonResult>> {
        let comparisons = self.comparisons.read().await;
        comparisons.get(&id).cloned()
    }

    async fn list(&self) -> Vec<Arc<AggregateComparisonResult>> {
        let comparisons = self.comparisons.read().await;
        let mut all: Vec<Arc<AggregateComparisonResult>> =
            comparisons.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }
}

/// Compute aggregate statistics over a result set
pub fn compute_stats(comparisons: &[Arc<AggregateComparisonResult>]) -> ComparisonStats {
    let mut ties = 0;
    let mut wins: HashMap<ProviderId, usize> = HashMap::new();
    let mut confidence_sums: HashMap<ProviderId, (f64, usize)> = HashMap::new();
    let mut family_counts: HashMap<ProviderId, (usize, usize)> = HashMap::new();

    for comparison in comparisons {
        match comparison.analysis.winner {
            Some(Winner::Provider(provider)) => *wins.entry(provider).or_default() += 1,
            Some(Winner::Tie) => ties += 1,
            None => {}
        }

        for (provider, result) in &comparison.classifications {
            let entry = confidence_sums.entry(*provider).or_default();
            entry.0 += result.confidence;
            entry.1 += 1;
        }

        for cell in &comparison.analysis.matches {
            if let Some(family) = cell.family {
                for provider in [cell.left, cell.right] {
                    let entry = family_counts.entry(provider).or_default();
                    entry.0 += family as usize;
                    entry.1 += 1;
                }
            }
        }
    }

    let average_confidence = confidence_sums
        .into_iter()
        .map(|(provider, (sum, count))| (provider, sum / count as f64))
        .collect();
    let family_match_rate = family_counts
        .into_iter()
        .map(|(provider, (matched, total))| (provider, matched as f64 / total as f64))
        .collect();

    ComparisonStats {
        total_comparisons: comparisons.len(),
        ties,
        wins,
        average_confidence,
        family_match_rate,
    }
}
