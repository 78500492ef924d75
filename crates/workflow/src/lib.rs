//! Onboarding orchestration: validation, the per-record workflow, retries,
//! batch driving and result export.

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod credential;
pub mod export;
pub mod retry;
pub mod source;
pub mod validator;
pub mod workflow;

pub use aggregator::{BatchSummary, MINUTES_SAVED_PER_ACCOUNT, ResultAggregator, UnreadableRow};
pub use batch::{BatchDriver, BatchError};
pub use config::{ConfigError, OnboardingConfig};
pub use credential::{generate_secret, meets_policy};
pub use export::{ExportError, export_credentials, export_failures, write_credentials, write_failures};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use source::{CsvRecordSource, RecordIter, RecordSource, SourceError, VecRecordSource};
pub use validator::{KnownPrincipals, is_well_formed_principal, validate};
pub use workflow::{OnboardingWorkflow, WorkflowState};

#[cfg(test)]
mod integration_tests;
