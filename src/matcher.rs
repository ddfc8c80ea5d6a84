//! Rule scoring and partitioned evaluation.
//!
//! Every rule is scored against the request headers on each uncached
//! evaluation. A rule earns one point per satisfied comparison; the
//! first failing comparison zeroes the rule out entirely. The rule list
//! is split into contiguous partitions that are scored concurrently,
//! and the per-partition results are merged into a single winner set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::error;

use crate::config::Rule;

/// Result of evaluating the full rule list against one header set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Response identifiers of every rule that reached `max_score`.
    pub responses: Vec<String>,
    /// Highest score any rule reached. Zero means nothing matched.
    pub max_score: u32,
}

impl Evaluation {
    /// Fold another partition's result into this one.
    ///
    /// A strictly higher score replaces the winner set; an equal
    /// nonzero score joins it. Zero scores never contribute winners,
    /// so a fallback decision is always an empty set.
    fn merge(&mut self, other: Evaluation) {
        if other.max_score > self.max_score {
            self.max_score = other.max_score;
            self.responses = other.responses;
        } else if other.max_score == self.max_score && other.max_score > 0 {
            self.responses.extend(other.responses);
        }
    }

    /// Record one rule's score.
    fn record(&mut self, score: u32, response: &str) {
        if score > self.max_score {
            self.max_score = score;
            self.responses.clear();
            self.responses.push(response.to_string());
        } else if score == self.max_score && score > 0 {
            self.responses.push(response.to_string());
        }
    }
}

/// Look up a header by its lowercase name, treating absence as empty.
fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> &'a str {
    headers.get(name).map(String::as_str).unwrap_or("")
}

/// Score a single rule: one point per satisfied comparison, zero the
/// moment any comparison fails.
fn score_rule(rule: &Rule, headers: &HashMap<String, String>) -> u32 {
    let mut score = 0;

    for (name, expected) in &rule.conditions.equals {
        if header_value(headers, name) == expected.as_str() {
            score += 1;
        } else {
            return 0;
        }
    }

    for (name, expected) in &rule.conditions.not_equals {
        if header_value(headers, name) != expected.as_str() {
            score += 1;
        } else {
            return 0;
        }
    }

    for (name, expected) in &rule.conditions.contains {
        if header_value(headers, name).contains(expected.as_str()) {
            score += 1;
        } else {
            return 0;
        }
    }

    score
}

/// Score a contiguous slice of the rule list.
fn score_slice(
    rules: &[Rule],
    headers: &HashMap<String, String>,
    evaluated: &AtomicU64,
) -> Evaluation {
    let mut local = Evaluation::default();
    for rule in rules {
        evaluated.fetch_add(1, Ordering::Relaxed);
        local.record(score_rule(rule, headers), &rule.response);
    }
    local
}

/// Concurrent rule matcher.
///
/// The rule list is immutable after construction; evaluation shares it
/// across partition tasks without copying.
pub struct Matcher {
    rules: Arc<[Rule]>,
    partitions: usize,
    evaluated: Arc<AtomicU64>,
}

impl Matcher {
    pub fn new(rules: Vec<Rule>, partitions: usize) -> Self {
        Self {
            rules: Arc::from(rules),
            partitions: partitions.max(1),
            evaluated: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of rules in the list.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Total individual rule scorings performed so far.
    pub fn rules_evaluated(&self) -> u64 {
        self.evaluated.load(Ordering::Relaxed)
    }

    /// Evaluate every rule against the given headers.
    ///
    /// The list is chunked into at most `partitions` contiguous slices,
    /// never more than there are rules, and each chunk is scored on its
    /// own task. Chunk bounds are clamped to the list length so uneven
    /// splits stay in range.
    pub async fn evaluate(&self, headers: &HashMap<String, String>) -> Evaluation {
        let total = self.rules.len();
        if total == 0 {
            return Evaluation::default();
        }

        let workers = self.partitions.min(total);
        let chunk = total.div_ceil(workers);
        let merged = Arc::new(Mutex::new(Evaluation::default()));
        let shared_headers = Arc::new(headers.clone());

        let mut tasks = Vec::with_capacity(workers);
        for i in 0..workers {
            let start = (i * chunk).min(total);
            let end = ((i + 1) * chunk).min(total);
            if start >= end {
                continue;
            }

            let rules = Arc::clone(&self.rules);
            let headers = Arc::clone(&shared_headers);
            let merged = Arc::clone(&merged);
            let evaluated = Arc::clone(&self.evaluated);

            tasks.push(tokio::spawn(async move {
                let local = score_slice(&rules[start..end], &headers, &evaluated);
                merged.lock().await.merge(local);
            }));
        }

        for task in tasks {
            if let Err(err) = task.await {
                error!(error = %err, "Partition worker failed");
            }
        }

        match Arc::try_unwrap(merged) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        }
    }
}
