//! Per-record onboarding outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ValidationError;
use crate::id::AccountHandle;
use crate::secret::SecretString;

/// Terminal classification of one record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Account created, entitlement assigned (or not required), every
    /// follow-up step succeeded.
    Success,
    /// Account created and entitled, but at least one group or attribute step
    /// failed. Still counts as onboarded.
    PartialSuccess,
    /// The record failed pre-flight validation; no directory mutation happened.
    ValidationFailed,
    /// Account creation failed; nothing was created.
    CreationFailed,
    /// Entitlement assignment failed and the account was deleted again.
    EntitlementFailedRolledBack,
}

impl OutcomeStatus {
    /// Whether an account for this record exists in the directory afterwards.
    pub fn is_onboarded(self) -> bool {
        matches!(self, OutcomeStatus::Success | OutcomeStatus::PartialSuccess)
    }
}

impl core::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::PartialSuccess => "partial success",
            OutcomeStatus::ValidationFailed => "validation failed",
            OutcomeStatus::CreationFailed => "creation failed",
            OutcomeStatus::EntitlementFailedRolledBack => "entitlement failed (rolled back)",
        };
        f.write_str(label)
    }
}

/// Which non-blocking step produced a [`StepDetail`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Group,
    Attributes,
    Rollback,
    /// Informational follow-up for the operator (never a failure).
    Note,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Group => "group",
            StepKind::Attributes => "attributes",
            StepKind::Rollback => "rollback",
            StepKind::Note => "note",
        }
    }
}

/// Result of one non-blocking step (a group membership, the attribute update,
/// the rollback delete, or an operator note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDetail {
    pub kind: StepKind,
    /// What the step acted on (group name, attribute set, account).
    pub target: String,
    pub success: bool,
    pub detail: String,
}

impl StepDetail {
    pub fn succeeded(kind: StepKind, target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(kind: StepKind, target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            success: false,
            detail: detail.into(),
        }
    }

    /// Step name in `kind:target` form, as shown in reports.
    pub fn step_name(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.target)
    }
}

/// The failure that stopped a record's workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    /// Workflow step that failed (e.g. `create_account`).
    pub step: String,
    /// Machine-readable error kind (e.g. `rate_limited`, `missing_field`).
    pub kind: String,
    pub message: String,
}

impl FailureDetail {
    pub fn new(step: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Terminal artifact for one input record. Built once, never mutated.
#[derive(Debug, Serialize)]
pub struct OutcomeRecord {
    pub principal_name: String,
    pub display_name: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub status: OutcomeStatus,
    /// Directory handle of the created account; present only when onboarded.
    pub account: Option<AccountHandle>,
    /// Generated initial secret; present only when onboarded.
    pub secret: Option<SecretString>,
    pub steps: Vec<StepDetail>,
    pub validation_errors: Vec<ValidationError>,
    pub error: Option<FailureDetail>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn is_onboarded(&self) -> bool {
        self.status.is_onboarded()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepDetail> {
        self.steps.iter().filter(|step| !step.success)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_and_partial_are_onboarded() {
        assert!(OutcomeStatus::Success.is_onboarded());
        assert!(OutcomeStatus::PartialSuccess.is_onboarded());
        assert!(!OutcomeStatus::ValidationFailed.is_onboarded());
        assert!(!OutcomeStatus::CreationFailed.is_onboarded());
        assert!(!OutcomeStatus::EntitlementFailedRolledBack.is_onboarded());
    }

    #[test]
    fn step_name_combines_kind_and_target() {
        let step = StepDetail::failed(StepKind::Group, "Finance", "group not found");
        assert_eq!(step.step_name(), "group:Finance");
        assert!(!step.success);
    }
}
