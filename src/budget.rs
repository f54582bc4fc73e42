use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{PipelineError, Result};

/// Per-provider call counters
#[derive(Debug, Clone, Copy, Default)]
pub struct CallMetrics {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    spent: f64,
    calls: HashMap<String, CallMetrics>,
}

/// Shared cost accounting for external provider calls.
///
/// The budget check and the reservation happen under one lock, so two
/// concurrent pipelines can never both pass a stale check and jointly
/// exceed the monthly cap. A reservation made for a call that never
/// incurred cost (all attempts failed) is returned with [`refund`].
///
/// [`refund`]: CostLedger::refund
#[derive(Debug)]
pub struct CostLedger {
    monthly_budget: f64,
    state: Mutex<LedgerState>,
}

impl CostLedger {
    pub fn new(monthly_budget: f64) -> Self {
        Self {
            monthly_budget,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Atomically check the remaining budget and reserve `amount`.
    pub fn try_charge(&self, amount: f64) -> Result<()> {
        let mut state = self.state.lock().expect("cost ledger lock poisoned");
        let remaining = self.monthly_budget - state.spent;
        if amount > remaining {
            return Err(PipelineError::BudgetExceeded {
                requested: amount,
                remaining: remaining.max(0.0),
            });
        }
        state.spent += amount;
        debug!(amount, spent = state.spent, "reserved transcription cost");
        Ok(())
    }

    /// Return a reservation whose call never incurred cost.
    pub fn refund(&self, amount: f64) {
        let mut state = self.state.lock().expect("cost ledger lock poisoned");
        state.spent = (state.spent - amount).max(0.0);
    }

    /// Record one provider call attempt, successful or not.
    pub fn record_call(&self, provider: &str, success: bool) {
        let mut state = self.state.lock().expect("cost ledger lock poisoned");
        let metrics = state.calls.entry(provider.to_string()).or_default();
        metrics.attempts += 1;
        if success {
            metrics.successes += 1;
        } else {
            metrics.failures += 1;
        }
    }

    pub fn spent(&self) -> f64 {
        self.state.lock().expect("cost ledger lock poisoned").spent
    }

    pub fn remaining(&self) -> f64 {
        (self.monthly_budget - self.spent()).max(0.0)
    }

    pub fn metrics(&self, provider: &str) -> CallMetrics {
        self.state
            .lock()
            .expect("cost ledger lock poisoned")
            .calls
            .get(provider)
            .copied()
            .unwrap_or_default()
    }
}
