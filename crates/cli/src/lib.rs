//! `idforge` command line: CSV in, Microsoft 365 accounts and exports out.

pub mod report;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use idforge_core::OutcomeRecord;
use idforge_directory::{DirectoryClient, GraphCredentials, GraphDirectory};
use idforge_workflow::{
    BatchDriver, BatchSummary, CsvRecordSource, OnboardingConfig, Sleeper, ThreadSleeper,
    export_credentials, export_failures,
};

/// Bulk-onboard Microsoft 365 accounts from a CSV file.
#[derive(Parser, Debug, Clone)]
#[command(name = "idforge", version)]
#[command(about = "Bulk-onboard Microsoft 365 accounts from a CSV file")]
pub struct Args {
    /// Input CSV with one account per row
    #[arg(long, short = 'i', default_value = "./input/users_to_onboard.csv")]
    pub input: PathBuf,

    /// Where to write the initial credentials of onboarded accounts
    #[arg(long, default_value = "./output/secure_credentials.csv")]
    pub credentials_out: PathBuf,

    /// Where to write failed records and failed steps
    #[arg(long, default_value = "./output/failed_users.csv")]
    pub failures_out: PathBuf,

    /// Optional JSON report with every outcome (secrets redacted)
    #[arg(long)]
    pub report_out: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short = 'c', env = "IDFORGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a BatchSummary,
    outcomes: &'a [OutcomeRecord],
}

/// Run a batch against Microsoft Graph with credentials from the environment.
pub fn run(args: &Args) -> anyhow::Result<BatchSummary> {
    let config = OnboardingConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let credentials = GraphCredentials::from_env().context("missing directory credentials")?;
    let directory = GraphDirectory::new(credentials).context("failed to build directory client")?;

    run_with(args, &config, &directory, &ThreadSleeper)
}

/// Run a batch against any directory and write the exports.
pub fn run_with<D, S>(args: &Args, config: &OnboardingConfig, directory: &D, sleeper: &S) -> anyhow::Result<BatchSummary>
where
    D: DirectoryClient + ?Sized,
    S: Sleeper + ?Sized,
{
    info!(input = %args.input.display(), "processing users");
    let source = CsvRecordSource::from_path(&args.input);
    let aggregator = BatchDriver::new(directory, config, sleeper)
        .run(&source)
        .context("batch aborted")?;
    let summary = aggregator.summary();

    let exported = export_credentials(&args.credentials_out, aggregator.outcomes())
        .with_context(|| format!("failed to write {}", args.credentials_out.display()))?;
    info!(rows = exported, path = %args.credentials_out.display(), "credentials exported");

    let failures = export_failures(&args.failures_out, aggregator.outcomes())
        .with_context(|| format!("failed to write {}", args.failures_out.display()))?;
    info!(rows = failures, path = %args.failures_out.display(), "failures exported");

    if let Some(path) = &args.report_out {
        write_json_report(path, &summary, aggregator.outcomes())?;
        info!(path = %path.display(), "report written");
    }

    Ok(summary)
}

fn write_json_report(path: &Path, summary: &BatchSummary, outcomes: &[OutcomeRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let report = JsonReport { summary, outcomes };
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use idforge_directory::InMemoryDirectory;
    use idforge_workflow::RecordingSleeper;

    const INPUT: &str = "\
first_name,last_name,display_name,user_principal_name,department,job_title,manager_email,license_type,groups,mailbox_delegation
Ada,Lovelace,,ada@contoso.com,Engineering,Engineer,,E3,Engineering,
Bob,,,bob@contoso.com,Sales,,,E3,,
";

    #[test]
    fn args_have_documented_defaults() {
        let args = Args::parse_from(["idforge"]);
        assert_eq!(args.input, PathBuf::from("./input/users_to_onboard.csv"));
        assert_eq!(args.credentials_out, PathBuf::from("./output/secure_credentials.csv"));
        assert!(args.report_out.is_none());
    }

    #[test]
    fn run_with_writes_all_exports() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).display().to_string();
        let (input, creds, failed, report) = (
            path("users.csv"),
            path("out/creds.csv"),
            path("out/failed.csv"),
            path("out/report.json"),
        );
        fs::write(&input, INPUT).unwrap();

        let args = Args::parse_from([
            "idforge",
            "--input",
            input.as_str(),
            "--credentials-out",
            creds.as_str(),
            "--failures-out",
            failed.as_str(),
            "--report-out",
            report.as_str(),
        ]);

        let directory = InMemoryDirectory::new()
            .with_sku("SPE_E3", "sku-e3", 5)
            .with_group("Engineering");
        let config = OnboardingConfig {
            provisioning_delay: Duration::ZERO,
            ..Default::default()
        };
        let sleeper = RecordingSleeper::new();

        let summary = run_with(&args, &config, &directory, &sleeper).unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(fs::read_to_string(&creds).unwrap().lines().count(), 2);
        assert!(fs::read_to_string(&failed).unwrap().contains("bob@contoso.com"));

        let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(report["summary"]["succeeded"], 1);
        assert_eq!(report["outcomes"][0]["secret"], "[REDACTED]");
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(1)]);
    }
}
