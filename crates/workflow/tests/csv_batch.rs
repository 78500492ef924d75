//! Black-box run: CSV in, credential and failure exports out.

use std::time::Duration;

use idforge_core::OutcomeStatus;
use idforge_directory::{InMemoryDirectory, Operation};
use idforge_workflow::{
    BatchDriver, CsvRecordSource, OnboardingConfig, RecordingSleeper, export_credentials, export_failures,
};

const INPUT: &str = "\
first_name,last_name,display_name,user_principal_name,department,job_title,manager_email,license_type,groups,mailbox_delegation
Ada,Lovelace,,ada@contoso.com,Engineering,Engineer,,E3,Engineering;Sales,
Grace,Hopper,Rear Admiral Hopper,grace@contoso.com,Engineering,Director,ada@contoso.com,E5,Finance,assistant@contoso.com
Dup,User,,taken@contoso.com,Sales,,,E3,,
Lin,Nolicense,,lin@contoso.com,Support,,,NONE,,
";

#[test]
fn csv_batch_end_to_end() {
    let dir = InMemoryDirectory::new()
        .with_sku("SPE_E3", "sku-e3", 10)
        .with_sku("SPE_E5", "sku-e5", 10)
        .with_group("Engineering")
        .with_group("Sales")
        .with_principal("taken@contoso.com");
    let config = OnboardingConfig {
        provisioning_delay: Duration::ZERO,
        ..OnboardingConfig::default()
    };
    let sleeper = RecordingSleeper::new();

    let aggregator = BatchDriver::new(&dir, &config, &sleeper)
        .run(&CsvRecordSource::from_string(INPUT))
        .unwrap();

    let statuses: Vec<OutcomeStatus> = aggregator.outcomes().iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Success,
            OutcomeStatus::PartialSuccess,
            OutcomeStatus::ValidationFailed,
            OutcomeStatus::Success,
        ]
    );

    let grace = &aggregator.outcomes()[1];
    assert_eq!(grace.display_name, "Rear Admiral Hopper");
    assert_eq!(grace.failed_steps().count(), 1);

    let summary = aggregator.summary();
    assert_eq!(summary.onboarded(), 3);
    assert_eq!(summary.estimated_minutes_saved, 129);
    assert_eq!(sleeper.slept(), vec![Duration::from_secs(1); 3]);
    assert_eq!(dir.calls_to(Operation::AssignEntitlement), 2);

    let out = tempfile::tempdir().unwrap();
    let credentials = out.path().join("output").join("secure_credentials.csv");
    let failures = out.path().join("output").join("failed_users.csv");

    assert_eq!(export_credentials(&credentials, aggregator.outcomes()).unwrap(), 3);
    assert_eq!(export_failures(&failures, aggregator.outcomes()).unwrap(), 2);

    let exported = std::fs::read_to_string(&credentials).unwrap();
    let lines: Vec<&str> = exported.lines().collect();
    assert_eq!(lines[0], "upn,display_name,temp_password,department,job_title");
    assert!(lines[1].starts_with("ada@contoso.com,Ada Lovelace,"));
    assert!(!exported.contains("taken@contoso.com"));

    let failed = std::fs::read_to_string(&failures).unwrap();
    assert!(failed.contains("group:Finance"));
    assert!(failed.contains("taken@contoso.com"));
}
