//! Batch driver: runs the workflow over every record of a source.
//!
//! Records are processed strictly one at a time, in input order. The
//! entitlement catalog and the existing-principal set are fetched once; the
//! set then grows with every onboarded principal so duplicates inside one
//! input are caught as well.

use thiserror::Error;
use tracing::{error, info, info_span};

use idforge_core::BatchId;
use idforge_directory::{DirectoryClient, DirectoryError};

use crate::aggregator::ResultAggregator;
use crate::config::OnboardingConfig;
use crate::retry::Sleeper;
use crate::source::{RecordSource, SourceError};
use crate::validator::KnownPrincipals;
use crate::workflow::OnboardingWorkflow;

/// Failures that stop a batch before any record is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to load entitlement catalog: {0}")]
    Catalog(#[source] DirectoryError),
    #[error("failed to list existing principals: {0}")]
    Principals(#[source] DirectoryError),
    #[error("failed to open record source: {0}")]
    Source(#[from] SourceError),
}

pub struct BatchDriver<'a, D, S>
where
    D: DirectoryClient + ?Sized,
    S: Sleeper + ?Sized,
{
    directory: &'a D,
    config: &'a OnboardingConfig,
    sleeper: &'a S,
}

impl<'a, D, S> BatchDriver<'a, D, S>
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

    pub fn run<R: RecordSource + ?Sized>(&self, source: &R) -> Result<ResultAggregator, BatchError> {
        self.run_with_id(BatchId::new(), source)
    }

    pub fn run_with_id<R: RecordSource + ?Sized>(
        &self,
        run_id: BatchId,
        source: &R,
    ) -> Result<ResultAggregator, BatchError> {
        let span = info_span!("onboarding_batch", run_id = %run_id);
        let _guard = span.enter();

        let catalog = self
            .directory
            .lookup_entitlement_catalog(&self.config.sku_part_numbers)
            .map_err(BatchError::Catalog)?;
        let mut existing: KnownPrincipals = self
            .directory
            .list_existing_principals()
            .map_err(BatchError::Principals)?
            .into_iter()
            .collect();
        info!(
            entitlements = catalog.len(),
            existing_principals = existing.len(),
            "batch context loaded"
        );

        let workflow = OnboardingWorkflow::new(self.directory, self.config, self.sleeper);
        let mut aggregator = ResultAggregator::new(run_id);
        let mut records = source.records()?.peekable();
        let mut position = 0usize;

        while let Some(item) = records.next() {
            position += 1;
            let record = match item {
                Ok(record) => record,
                Err(err) => {
                    error!(position, error = %err, "skipping unreadable record");
                    aggregator.record_unreadable(position, err.to_string());
                    continue;
                }
            };

            info!(position, principal = %record.principal_name.trim(), "processing record");
            let outcome = workflow.run(record, &catalog, &existing);
            if outcome.is_onboarded() {
                existing.insert(&outcome.principal_name);
            }
            aggregator.record(outcome);

            if records.peek().is_some() && !self.config.inter_record_delay.is_zero() {
                self.sleeper.sleep(self.config.inter_record_delay);
            }
        }

        let summary = aggregator.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            partial = summary.partial,
            failed = summary.failed,
            unreadable = summary.unreadable,
            "batch finished"
        );
        Ok(aggregator)
    }
}
