//! Collects per-record outcomes and derives the batch summary.

use std::collections::BTreeMap;

use serde::Serialize;

use idforge_core::{BatchId, OutcomeRecord, OutcomeStatus};

/// Manual effort estimate per onboarded account, in minutes.
pub const MINUTES_SAVED_PER_ACCOUNT: u64 = 43;

/// A source row that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableRow {
    /// 1-based position in the source.
    pub position: usize,
    pub reason: String,
}

/// Counts derived from the collected outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub run_id: BatchId,
    pub total: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub unreadable: usize,
    /// Failure counts keyed `step:kind`, e.g. `validation:missing_field`,
    /// `assign_entitlement:rate_limited` or `step:group`.
    pub errors_by_kind: BTreeMap<String, usize>,
    pub estimated_minutes_saved: u64,
}

impl BatchSummary {
    pub fn onboarded(&self) -> usize {
        self.succeeded + self.partial
    }

    /// Share of processed records that were onboarded, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.onboarded() as f64 * 100.0 / self.total as f64
    }
}

#[derive(Debug)]
pub struct ResultAggregator {
    run_id: BatchId,
    outcomes: Vec<OutcomeRecord>,
    unreadable: Vec<UnreadableRow>,
}

impl ResultAggregator {
    pub fn new(run_id: BatchId) -> Self {
        Self {
            run_id,
            outcomes: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    pub fn run_id(&self) -> BatchId {
        self.run_id
    }

    pub fn record(&mut self, outcome: OutcomeRecord) {
        self.outcomes.push(outcome);
    }

    pub fn record_unreadable(&mut self, position: usize, reason: impl Into<String>) {
        self.unreadable.push(UnreadableRow {
            position,
            reason: reason.into(),
        });
    }

    /// Outcomes in input order.
    pub fn outcomes(&self) -> &[OutcomeRecord] {
        &self.outcomes
    }

    pub fn unreadable(&self) -> &[UnreadableRow] {
        &self.unreadable
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut succeeded = 0;
        let mut partial = 0;
        let mut failed = 0;
        let mut errors_by_kind: BTreeMap<String, usize> = BTreeMap::new();

        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Success => succeeded += 1,
                OutcomeStatus::PartialSuccess => partial += 1,
                OutcomeStatus::ValidationFailed
                | OutcomeStatus::CreationFailed
                | OutcomeStatus::EntitlementFailedRolledBack => failed += 1,
            }

            if outcome.validation_errors.is_empty() {
                if let Some(error) = &outcome.error {
                    *errors_by_kind
                        .entry(format!("{}:{}", error.step, error.kind))
                        .or_default() += 1;
                }
            } else {
                for error in &outcome.validation_errors {
                    *errors_by_kind
                        .entry(format!("validation:{}", error.kind()))
                        .or_default() += 1;
                }
            }
            for step in outcome.failed_steps() {
                *errors_by_kind
                    .entry(format!("step:{}", step.kind.as_str()))
                    .or_default() += 1;
            }
        }

        BatchSummary {
            run_id: self.run_id,
            total: self.outcomes.len(),
            succeeded,
            partial,
            failed,
            unreadable: self.unreadable.len(),
            errors_by_kind,
            estimated_minutes_saved: (succeeded + partial) as u64 * MINUTES_SAVED_PER_ACCOUNT,
        }
    }

    pub fn into_outcomes(self) -> Vec<OutcomeRecord> {
        self.outcomes
    }
}
