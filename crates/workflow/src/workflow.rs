//! Per-record onboarding workflow.
//!
//! Orchestrates the flow for one record:
//!
//! ```text
//! Validating ──errors──────────────────────────────────────────► Done (ValidationFailed)
//!   │
//!   ▼
//! Creating ──failure───────────────────────────────────────────► Done (CreationFailed)
//!   │
//!   ▼
//! AssigningEntitlement ──failure (after retries)──► RollingBack ─► Done (EntitlementFailedRolledBack)
//!   │
//!   ▼
//! AssigningGroups ──► ConfiguringAttributes ───────────────────► Done (Success | PartialSuccess)
//! ```
//!
//! Compensating action: delete the account if entitlement assignment fails.
//! Group and attribute failures never roll back; they downgrade the outcome
//! to `PartialSuccess` and are kept as step details.
//!
//! A workflow always runs to `Done` once started.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use idforge_core::{
    AccountHandle, Entitlement, EntitlementCatalog, EntitlementCode, FailureDetail, OnboardingRecord,
    OutcomeRecord, OutcomeStatus, SecretString, StepDetail, StepKind, ValidationError,
};
use idforge_directory::{AccountAttributes, DirectoryClient, DirectoryError, NewAccount};

use crate::config::OnboardingConfig;
use crate::credential::generate_secret;
use crate::retry::Sleeper;
use crate::validator::{KnownPrincipals, validate};

/// Workflow states, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Validating,
    Creating,
    AssigningEntitlement,
    RollingBack,
    AssigningGroups,
    ConfiguringAttributes,
    Done,
}

/// State plus the data that state owns. The account handle moves from state
/// to state, so exactly one place holds it at any time.
enum Step {
    Validating,
    Creating {
        entitlement: Entitlement,
    },
    AssigningEntitlement {
        account: AccountHandle,
        entitlement: Entitlement,
    },
    RollingBack {
        account: AccountHandle,
    },
    AssigningGroups {
        account: AccountHandle,
    },
    ConfiguringAttributes {
        account: AccountHandle,
    },
    Done {
        status: OutcomeStatus,
        account: Option<AccountHandle>,
    },
}

impl Step {
    fn state(&self) -> WorkflowState {
        match self {
            Step::Validating => WorkflowState::Validating,
            Step::Creating { .. } => WorkflowState::Creating,
            Step::AssigningEntitlement { .. } => WorkflowState::AssigningEntitlement,
            Step::RollingBack { .. } => WorkflowState::RollingBack,
            Step::AssigningGroups { .. } => WorkflowState::AssigningGroups,
            Step::ConfiguringAttributes { .. } => WorkflowState::ConfiguringAttributes,
            Step::Done { .. } => WorkflowState::Done,
        }
    }
}

/// Everything accumulated while a record moves through the workflow.
struct Progress {
    record: OnboardingRecord,
    started_at: DateTime<Utc>,
    secret: Option<SecretString>,
    validation_errors: Vec<ValidationError>,
    steps: Vec<StepDetail>,
    error: Option<FailureDetail>,
}

impl Progress {
    fn principal(&self) -> &str {
        self.record.principal_name.trim()
    }

    fn finish(self, status: OutcomeStatus, account: Option<AccountHandle>) -> OutcomeRecord {
        // The secret only means something while its account exists.
        let secret = if status.is_onboarded() { self.secret } else { None };
        let display_name = self.record.resolved_display_name();

        OutcomeRecord {
            principal_name: self.record.principal_name.trim().to_string(),
            display_name,
            department: self.record.department,
            title: self.record.title,
            status,
            account,
            secret,
            steps: self.steps,
            validation_errors: self.validation_errors,
            error: self.error,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Runs the onboarding state machine for one record at a time.
///
/// The catalog and existing-principal set are passed per run; the workflow
/// holds no state between records.
pub struct OnboardingWorkflow<'a, D, S>
where
    D: DirectoryClient + ?Sized,
    S: Sleeper + ?Sized,
{
    directory: &'a D,
    config: &'a OnboardingConfig,
    sleeper: &'a S,
}

impl<'a, D, S> OnboardingWorkflow<'a, D, S>
where
    D: DirectoryClient + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(directory: &'a D, config: &'a OnboardingConfig, sleeper: &'a S) -> Self {
        Self {
            directory,
            config,
            sleeper,
        }
    }

    /// Onboard one record. Never fails: every failure ends up in the outcome.
    pub fn run(
        &self,
        record: OnboardingRecord,
        catalog: &EntitlementCatalog,
        existing_principals: &KnownPrincipals,
    ) -> OutcomeRecord {
        let mut progress = Progress {
            record,
            started_at: Utc::now(),
            secret: None,
            validation_errors: Vec::new(),
            steps: Vec::new(),
            error: None,
        };
        let mut step = Step::Validating;

        loop {
            let from = step.state();
            step = match step {
                Step::Validating => self.validate(&mut progress, catalog, existing_principals),
                Step::Creating { entitlement } => self.create(&mut progress, entitlement),
                Step::AssigningEntitlement {
                    account,
                    entitlement,
                } => self.assign_entitlement(&mut progress, account, entitlement),
                Step::RollingBack { account } => self.roll_back(&mut progress, account),
                Step::AssigningGroups { account } => self.assign_groups(&mut progress, account),
                Step::ConfiguringAttributes { account } => {
                    self.configure_attributes(&mut progress, account)
                }
                Step::Done { status, account } => {
                    info!(principal = %progress.principal(), status = %status, "onboarding finished");
                    return progress.finish(status, account);
                }
            };
            debug!(
                principal = %progress.principal(),
                from = ?from,
                to = ?step.state(),
                "workflow transition"
            );
        }
    }

    fn validate(
        &self,
        progress: &mut Progress,
        catalog: &EntitlementCatalog,
        existing_principals: &KnownPrincipals,
    ) -> Step {
        let errors = validate(&progress.record, existing_principals, catalog);
        let entitlement = catalog.resolve(&progress.record.entitlement);

        match (errors.is_empty(), entitlement) {
            (true, Some(entitlement)) => Step::Creating { entitlement },
            (_, entitlement) => {
                let mut errors = errors;
                if errors.is_empty() && entitlement.is_none() {
                    errors.push(ValidationError::UnknownEntitlement(
                        progress.record.entitlement.trim().to_string(),
                    ));
                }
                let message = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                error!(principal = %progress.principal(), errors = %message, "validation failed");

                progress.error = Some(FailureDetail::new("validate", "validation", message));
                progress.validation_errors = errors;
                Step::Done {
                    status: OutcomeStatus::ValidationFailed,
                    account: None,
                }
            }
        }
    }

    fn create(&self, progress: &mut Progress, entitlement: Entitlement) -> Step {
        let record = &progress.record;
        let account = NewAccount {
            given_name: record.given_name.trim().to_string(),
            family_name: record.family_name.trim().to_string(),
            display_name: record.resolved_display_name(),
            principal_name: record.principal_name.trim().to_string(),
            mail_nickname: record.mail_nickname().to_string(),
            department: non_empty(record.department.as_deref()),
            title: non_empty(record.title.as_deref()),
            usage_location: self.config.usage_location.clone(),
            enabled: true,
        };
        let secret = generate_secret(self.config.secret_length);

        info!(principal = %account.principal_name, "creating account");
        match self
            .directory
            .create_account(&account, &secret, self.config.force_change_on_first_use)
        {
            Ok(handle) => {
                info!(principal = %account.principal_name, account = %handle, "account created");
                progress.secret = Some(secret);
                if !self.config.provisioning_delay.is_zero() {
                    self.sleeper.sleep(self.config.provisioning_delay);
                }
                Step::AssigningEntitlement {
                    account: handle,
                    entitlement,
                }
            }
            Err(err) => {
                error!(principal = %account.principal_name, error = %err, "account creation failed");
                progress.error = Some(failure("create_account", &err, None));
                Step::Done {
                    status: OutcomeStatus::CreationFailed,
                    account: None,
                }
            }
        }
    }

    fn assign_entitlement(
        &self,
        progress: &mut Progress,
        account: AccountHandle,
        entitlement: Entitlement,
    ) -> Step {
        let sku = match entitlement {
            Entitlement::NotRequired => {
                info!(principal = %progress.principal(), "no entitlement requested");
                return Step::AssigningGroups { account };
            }
            Entitlement::Sku(sku) => sku,
        };

        info!(principal = %progress.principal(), sku = %sku, "assigning entitlement");
        let mut attempts = 0u32;
        let result = self.config.retry.execute(
            self.sleeper,
            DirectoryError::is_retryable,
            |_| {
                attempts += 1;
                self.directory.assign_entitlement(&account, &sku)
            },
        );

        match result {
            Ok(()) => {
                info!(principal = %progress.principal(), sku = %sku, attempts, "entitlement assigned");
                Step::AssigningGroups { account }
            }
            Err(err) => {
                error!(
                    principal = %progress.principal(),
                    sku = %sku,
                    attempts,
                    error = %err,
                    "entitlement assignment failed"
                );
                progress.error = Some(failure("assign_entitlement", &err, Some(attempts)));
                Step::RollingBack { account }
            }
        }
    }

    fn roll_back(&self, progress: &mut Progress, account: AccountHandle) -> Step {
        warn!(principal = %progress.principal(), account = %account, "rolling back account creation");

        match self.directory.delete_account(&account) {
            Ok(()) => {
                info!(principal = %progress.principal(), account = %account, "account rolled back");
                progress.steps.push(StepDetail::succeeded(
                    StepKind::Rollback,
                    account.to_string(),
                    "account deleted",
                ));
            }
            Err(err) => {
                error!(
                    principal = %progress.principal(),
                    account = %account,
                    error = %err,
                    "rollback failed; account may be orphaned"
                );
                progress.steps.push(StepDetail::failed(
                    StepKind::Rollback,
                    account.to_string(),
                    format!("orphan risk: {err}"),
                ));
            }
        }

        Step::Done {
            status: OutcomeStatus::EntitlementFailedRolledBack,
            account: None,
        }
    }

    fn assign_groups(&self, progress: &mut Progress, account: AccountHandle) -> Step {
        let principal = progress.record.principal_name.trim();

        for name in progress.record.groups.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
            let detail = match self.directory.find_group(name) {
                Ok(None) => {
                    warn!(principal, group = name, "group not found");
                    StepDetail::failed(StepKind::Group, name, "group not found")
                }
                Err(err) => {
                    warn!(principal, group = name, error = %err, "group lookup failed");
                    StepDetail::failed(StepKind::Group, name, format!("group lookup failed: {err}"))
                }
                Ok(Some(group)) => match self.directory.add_group_member(&group, &account) {
                    Ok(()) => {
                        info!(principal, group = name, "added to group");
                        StepDetail::succeeded(StepKind::Group, name, "member added")
                    }
                    Err(err) => {
                        warn!(principal, group = name, error = %err, "group membership failed");
                        StepDetail::failed(StepKind::Group, name, format!("membership failed: {err}"))
                    }
                },
            };
            progress.steps.push(detail);
        }

        Step::ConfiguringAttributes { account }
    }

    fn configure_attributes(&self, progress: &mut Progress, account: AccountHandle) -> Step {
        let delegate = non_empty(progress.record.delegate.as_deref());
        let attributes = AccountAttributes {
            mailbox_timezone: self.config.mailbox_timezone.clone(),
            delegate: delegate.clone(),
        };

        match self.directory.update_attributes(&account, &attributes) {
            Ok(()) => {
                info!(
                    principal = %progress.principal(),
                    timezone = %attributes.mailbox_timezone,
                    "attributes configured"
                );
                if let Some(delegate) = delegate {
                    progress.steps.push(StepDetail::succeeded(
                        StepKind::Note,
                        delegate,
                        "delegate recorded; grant mailbox delegation in the mail admin center",
                    ));
                }
            }
            Err(err) => {
                warn!(principal = %progress.principal(), error = %err, "attribute update failed");
                progress.steps.push(StepDetail::failed(
                    StepKind::Attributes,
                    "mailbox",
                    format!("attribute update failed: {err}"),
                ));
            }
        }

        if progress.record.entitlement_code() == Some(EntitlementCode::E5) {
            progress.steps.push(StepDetail::succeeded(
                StepKind::Note,
                "litigation_hold",
                "E5 mailbox: enable litigation hold in the mail admin center",
            ));
        }

        let status = if progress.steps.iter().any(|step| !step.success) {
            OutcomeStatus::PartialSuccess
        } else {
            OutcomeStatus::Success
        };
        Step::Done {
            status,
            account: Some(account),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn failure(step: &str, err: &DirectoryError, attempts: Option<u32>) -> FailureDetail {
    let message = match attempts {
        Some(attempts) => format!("{err} (after {attempts} attempt(s))"),
        None => err.to_string(),
    };
    FailureDetail::new(step, err.kind().as_str(), message)
}
