//! CSV exports of a finished batch.
//!
//! The credential export is the only place a generated secret leaves the
//! process in plain text.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use idforge_core::OutcomeRecord;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Write `upn,display_name,temp_password,department,job_title` for every
/// onboarded outcome. Returns the number of rows written.
pub fn write_credentials<W: Write>(writer: W, outcomes: &[OutcomeRecord]) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["upn", "display_name", "temp_password", "department", "job_title"])?;

    let mut written = 0;
    for outcome in outcomes.iter().filter(|o| o.is_onboarded()) {
        let Some(secret) = &outcome.secret else {
            continue;
        };
        csv.write_record([
            outcome.principal_name.as_str(),
            outcome.display_name.as_str(),
            secret.expose().as_str(),
            outcome.department.as_deref().unwrap_or(""),
            outcome.title.as_deref().unwrap_or(""),
        ])?;
        written += 1;
    }
    csv.flush()?;
    Ok(written)
}

/// Write `upn,display_name,status,step,error` for every record that was not
/// onboarded, plus one row per failed step of partially onboarded records.
pub fn write_failures<W: Write>(writer: W, outcomes: &[OutcomeRecord]) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["upn", "display_name", "status", "step", "error"])?;

    let mut written = 0;
    for outcome in outcomes {
        let status = outcome.status.to_string();
        if let Some(error) = &outcome.error {
            csv.write_record([
                outcome.principal_name.as_str(),
                outcome.display_name.as_str(),
                status.as_str(),
                error.step.as_str(),
                error.message.as_str(),
            ])?;
            written += 1;
        }
        for step in outcome.failed_steps() {
            csv.write_record([
                outcome.principal_name.as_str(),
                outcome.display_name.as_str(),
                status.as_str(),
                step.step_name().as_str(),
                step.detail.as_str(),
            ])?;
            written += 1;
        }
    }
    csv.flush()?;
    Ok(written)
}

/// Create `path` (and its parent directories) and write the credential export.
pub fn export_credentials(path: &Path, outcomes: &[OutcomeRecord]) -> Result<usize, ExportError> {
    write_credentials(create(path)?, outcomes)
}

pub fn export_failures(path: &Path, outcomes: &[OutcomeRecord]) -> Result<usize, ExportError> {
    write_failures(create(path)?, outcomes)
}

fn create(path: &Path) -> Result<File, ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}
