//! The rule engine: cached matching plus payload resolution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::cache::{decision_key, DecisionCache, PayloadCache};
use crate::config::RouterConfig;
use crate::error::PayloadError;
use crate::matcher::Matcher;

/// Outcome of matching one header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Response identifiers to serve, fallback included.
    pub responses: Vec<String>,
    /// False when the fallback response was substituted.
    pub matched: bool,
}

/// Header-rule engine with decision and payload caching.
///
/// Matching consults the decision cache first; misses run the full
/// partitioned evaluation and cache the winner set keyed by the sorted
/// header signature. Fallback decisions never enter the cache, so an
/// unmatched header set is re-evaluated on every request.
pub struct RuleEngine {
    matcher: Matcher,
    decisions: DecisionCache,
    payloads: PayloadCache,
    fallback: String,
    matches_total: AtomicU64,
    cache_hits: AtomicU64,
    fallbacks: AtomicU64,
}

impl RuleEngine {
    /// Build an engine from a loaded rules document.
    pub fn new(mut config: RouterConfig) -> Self {
        config.normalize();

        let partitions = config.settings.partitions;
        let capacity = config.settings.decision_cache_capacity;
        info!(
            rules = config.rules.len(),
            partitions,
            decision_cache_capacity = capacity,
            "Rule engine initialized"
        );

        Self {
            matcher: Matcher::new(config.rules, partitions),
            decisions: DecisionCache::new(capacity),
            payloads: PayloadCache::new(config.settings.payload_dir),
            fallback: config.fallback_response,
            matches_total: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Match a header set to its response identifiers.
    pub async fn match_headers(&self, headers: &HashMap<String, String>) -> MatchOutcome {
        self.matches_total.fetch_add(1, Ordering::Relaxed);

        let key = decision_key(headers);
        if let Some(winners) = self.decisions.get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Decision cache hit");
            return MatchOutcome {
                responses: winners.to_vec(),
                matched: true,
            };
        }

        let evaluation = self.matcher.evaluate(headers).await;
        if evaluation.max_score == 0 {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
            return MatchOutcome {
                responses: vec![self.fallback.clone()],
                matched: false,
            };
        }

        debug!(
            key = %key,
            score = evaluation.max_score,
            winners = evaluation.responses.len(),
            "Decision cached"
        );
        self.decisions
            .insert(key, Arc::from(evaluation.responses.clone()));
        MatchOutcome {
            responses: evaluation.responses,
            matched: true,
        }
    }

    /// Fetch the payload bytes behind a response identifier.
    pub async fn resolve(&self, id: &str) -> Result<Bytes, PayloadError> {
        self.payloads.resolve(id).await
    }

    pub fn rule_count(&self) -> usize {
        self.matcher.rule_count()
    }

    pub fn rules_evaluated(&self) -> u64 {
        self.matcher.rules_evaluated()
    }

    pub fn total_matches(&self) -> u64 {
        self.matches_total.load(Ordering::Relaxed)
    }

    pub fn total_cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn total_fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}
