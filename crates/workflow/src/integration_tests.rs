//! Integration tests for the full onboarding pipeline.
//!
//! Tests: RecordSource → BatchDriver → OnboardingWorkflow → InMemoryDirectory
//!
//! Verifies:
//! - Invalid records never mutate the directory
//! - Entitlement failure rolls the account back completely
//! - Retries follow the configured backoff exactly
//! - Group failures stay isolated from the rest of the record

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use idforge_core::{
        EntitlementCatalog, EntitlementCode, OnboardingRecord, OutcomeStatus, SkuId, StepKind,
        ValidationError,
    };
    use idforge_directory::{DirectoryCall, DirectoryClient, DirectoryError, InMemoryDirectory, Operation};
    use proptest::prelude::*;

    use crate::batch::BatchDriver;
    use crate::config::OnboardingConfig;
    use crate::retry::{RecordingSleeper, RetryPolicy};
    use crate::source::VecRecordSource;
    use crate::validator::KnownPrincipals;
    use crate::workflow::OnboardingWorkflow;

    fn test_config() -> OnboardingConfig {
        OnboardingConfig {
            retry: RetryPolicy::exponential(3, Duration::from_millis(200)),
            inter_record_delay: Duration::ZERO,
            provisioning_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn tenant() -> InMemoryDirectory {
        InMemoryDirectory::new()
            .with_sku("SPE_E3", "sku-e3", 25)
            .with_sku("SPE_E5", "sku-e5", 5)
            .with_group("Sales")
            .with_group("Engineering")
            .with_principal("existing@example.com")
    }

    fn catalog_for(directory: &InMemoryDirectory, config: &OnboardingConfig) -> EntitlementCatalog {
        directory
            .lookup_entitlement_catalog(&config.sku_part_numbers)
            .unwrap()
    }

    fn principals(directory: &InMemoryDirectory) -> KnownPrincipals {
        directory.list_existing_principals().unwrap().into_iter().collect()
    }

    #[test]
    fn no_entitlement_record_succeeds_without_entitlement_call() {
        let dir = tenant();
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        let outcome = workflow.run(
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "NONE"),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(outcome.steps.is_empty());
        assert!(outcome.secret.is_some());
        assert_eq!(dir.calls_to(Operation::AssignEntitlement), 0);
        assert_eq!(dir.calls_to(Operation::FindGroup), 0);
    }

    #[test]
    fn duplicate_principal_fails_validation_without_creating() {
        let dir = tenant();
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        let outcome = workflow.run(
            OnboardingRecord::new("Eve", "Existing", "Existing@Example.com", "E3"),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert_eq!(outcome.status, OutcomeStatus::ValidationFailed);
        assert_eq!(
            outcome.validation_errors,
            vec![ValidationError::DuplicatePrincipal("Existing@Example.com".to_string())]
        );
        assert!(outcome.secret.is_none());
        assert!(dir.mutating_calls().is_empty());
    }

    #[test]
    fn code_missing_from_catalog_is_unknown() {
        let dir = InMemoryDirectory::new().with_sku("SPE_E3", "sku-e3", 25);
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        let outcome = workflow.run(
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E5"),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert_eq!(outcome.status, OutcomeStatus::ValidationFailed);
        assert!(
            outcome
                .validation_errors
                .contains(&ValidationError::UnknownEntitlement("E5".to_string()))
        );
        let error = outcome.error.unwrap();
        assert_eq!(error.step, "validate");
        assert_eq!(error.kind, "validation");
    }

    #[test]
    fn permanent_entitlement_failure_rolls_back_once() {
        let dir = tenant();
        dir.fail_always(Operation::AssignEntitlement, DirectoryError::from_status(403, "forbidden"));
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        let outcome = workflow.run(
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E3").with_groups(["Sales"]),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert_eq!(outcome.status, OutcomeStatus::EntitlementFailedRolledBack);
        assert_eq!(dir.calls_to(Operation::AssignEntitlement), 1);
        assert_eq!(dir.calls_to(Operation::DeleteAccount), 1);
        assert_eq!(dir.calls_to(Operation::FindGroup), 0);
        assert!(outcome.secret.is_none());
        assert!(outcome.account.is_none());
        assert!(sleeper.slept().is_empty());

        let rollback = &outcome.steps[0];
        assert_eq!(rollback.kind, StepKind::Rollback);
        assert!(rollback.success);
        assert_eq!(outcome.error.unwrap().kind, "forbidden");
    }

    #[test]
    fn transient_entitlement_failure_is_retried_with_exponential_backoff() {
        let dir = tenant();
        dir.fail_always(Operation::AssignEntitlement, DirectoryError::rate_limited("too many requests"));
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        let outcome = workflow.run(
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E3"),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert_eq!(outcome.status, OutcomeStatus::EntitlementFailedRolledBack);
        assert_eq!(dir.calls_to(Operation::AssignEntitlement), 3);
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );

        // All attempts happen before the rollback starts.
        let operations: Vec<Operation> = dir.mutating_calls().iter().map(DirectoryCall::operation).collect();
        assert_eq!(
            operations,
            vec![
                Operation::CreateAccount,
                Operation::AssignEntitlement,
                Operation::AssignEntitlement,
                Operation::AssignEntitlement,
                Operation::DeleteAccount,
            ]
        );
    }

    #[test]
    fn rolled_back_principal_is_gone_from_directory() {
        let dir = tenant();
        dir.fail_always(Operation::AssignEntitlement, DirectoryError::bad_request("no licenses left"));
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        workflow.run(
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E5"),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert!(!principals(&dir).contains("ada@example.com"));
        assert!(dir.account("ada@example.com").is_none());
    }

    #[test]
    fn group_failures_are_isolated() {
        let dir = tenant();
        dir.fail_group_lookup("Sales", DirectoryError::from_status(500, "lookup exploded"));
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        let outcome = workflow.run(
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E3")
                .with_groups(["Sales", "Engineering"]),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert_eq!(outcome.status, OutcomeStatus::PartialSuccess);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.steps[0].target, "Sales");
        assert!(!outcome.steps[0].success);
        assert_eq!(outcome.steps[1].target, "Engineering");
        assert!(outcome.steps[1].success);
        assert!(outcome.secret.is_some());
        assert_eq!(dir.members_of("Engineering"), vec!["ada@example.com".to_string()]);
        assert_eq!(dir.calls_to(Operation::DeleteAccount), 0);
    }

    #[test]
    fn unknown_group_is_recorded_and_processing_continues() {
        let dir = tenant();
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);

        let outcome = workflow.run(
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E3")
                .with_groups(["Marketing", "Sales"]),
            &catalog_for(&dir, &config),
            &principals(&dir),
        );

        assert_eq!(outcome.status, OutcomeStatus::PartialSuccess);
        assert_eq!(outcome.steps[0].detail, "group not found");
        assert_eq!(dir.calls_to(Operation::UpdateAttributes), 1);
    }

    #[test]
    fn batch_keeps_going_after_failures() {
        let dir = tenant();
        dir.fail_next(Operation::CreateAccount, DirectoryError::from_status(409, "conflict"));
        let config = OnboardingConfig {
            inter_record_delay: Duration::from_secs(1),
            ..test_config()
        };
        let sleeper = RecordingSleeper::new();
        let source = VecRecordSource::new(vec![
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E3"),
            OnboardingRecord::new("", "Nobody", "nobody", "E3"),
            OnboardingRecord::new("Grace", "Hopper", "grace@example.com", "E5").with_groups(["Engineering"]),
        ]);

        let aggregator = BatchDriver::new(&dir, &config, &sleeper).run(&source).unwrap();
        let summary = aggregator.summary();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.errors_by_kind.get("create_account:conflict"), Some(&1));
        assert_eq!(summary.errors_by_kind.get("validation:missing_field"), Some(&1));
        assert_eq!(summary.errors_by_kind.get("validation:malformed_principal"), Some(&1));
        assert_eq!(summary.estimated_minutes_saved, 43);
        assert_eq!(sleeper.total(), Duration::from_secs(2));

        let order: Vec<&str> = aggregator.outcomes().iter().map(|o| o.principal_name.as_str()).collect();
        assert_eq!(order, vec!["ada@example.com", "nobody", "grace@example.com"]);
    }

    #[test]
    fn secret_appears_only_in_its_own_outcome() {
        let dir = tenant();
        let config = test_config();
        let sleeper = RecordingSleeper::new();
        let source = VecRecordSource::new(vec![
            OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E3"),
            OnboardingRecord::new("Grace", "Hopper", "grace@example.com", "E3"),
        ]);

        let outcomes = BatchDriver::new(&dir, &config, &sleeper)
            .run(&source)
            .unwrap()
            .into_outcomes();

        let first = outcomes[0].secret.as_ref().unwrap().expose().clone();
        let second = outcomes[1].secret.as_ref().unwrap().expose().clone();
        assert_ne!(first, second);

        let json = serde_json::to_string(&outcomes[0]).unwrap();
        assert!(!json.contains(&first));
        assert!(!format!("{:?}", outcomes[0]).contains(&first));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: a record that fails validation never causes a mutating
        /// directory call.
        #[test]
        fn invalid_records_never_mutate(
            given in prop::sample::select(vec!["", "Ada"]),
            principal in prop::sample::select(vec!["", "bad", "existing@example.com", "ada@example.com"]),
            entitlement in prop::sample::select(vec!["", "E7", "INTUNE", "E3"]),
            manager in proptest::option::of(prop::sample::select(vec!["ghost@example.com", "existing@example.com"])),
        ) {
            let dir = tenant();
            let config = test_config();
            let sleeper = RecordingSleeper::new();
            let workflow = OnboardingWorkflow::new(&dir, &config, &sleeper);
            let catalog = EntitlementCatalog::new().with_entry(EntitlementCode::E3, SkuId::new("sku-e3"));

            let mut record = OnboardingRecord::new(given, "Lovelace", principal, entitlement);
            record.manager = manager.map(str::to_string);
            let outcome = workflow.run(record, &catalog, &principals(&dir));

            if outcome.status == OutcomeStatus::ValidationFailed {
                prop_assert!(!outcome.validation_errors.is_empty());
                prop_assert!(dir.mutating_calls().is_empty());
            } else {
                prop_assert!(outcome.validation_errors.is_empty());
            }
        }
    }
}
