//! Token usage ledger
//!
//! One ledger per run, injected into the gateway. Totals are additive across
//! calls and only cleared by an explicit [`UsageLedger::reset`]. The ledger
//! is internally locked, so it can be shared across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// One recorded service call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub tokens_used: u64,
    pub cost: f64,
}

/// Aggregate view of the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub calls: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    total_tokens: u64,
    total_cost: f64,
    entries: Vec<UsageEntry>,
}

/// Run-scoped token and cost accounting
#[derive(Debug, Default)]
pub struct UsageLedger {
    state: Mutex<LedgerState>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // A panic while holding the lock cannot leave the totals half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one call's usage and return the derived cost
    pub fn record(&self, model: &str, tokens: u64, cost_per_1k_tokens: f64) -> f64 {
        let cost = tokens as f64 / 1000.0 * cost_per_1k_tokens;

        let mut state = self.lock();
        state.total_tokens += tokens;
        state.total_cost += cost;
        state.entries.push(UsageEntry {
            timestamp: Utc::now(),
            model: model.to_string(),
            tokens_used: tokens,
            cost,
        });

        info!(tokens, cost, model, "Token usage recorded");
        cost
    }

    pub fn summary(&self) -> UsageSummary {
        let state = self.lock();
        UsageSummary {
            total_tokens: state.total_tokens,
            total_cost: state.total_cost,
            calls: state.entries.len(),
        }
    }

    pub fn entries(&self) -> Vec<UsageEntry> {
        self.lock().entries.clone()
    }

    /// Clear all totals and entries
    pub fn reset(&self) {
        *self.lock() = LedgerState::default();
    }
}
