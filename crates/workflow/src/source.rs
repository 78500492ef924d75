//! Record sources.
//!
//! A source yields records lazily and in input order. A row that cannot be
//! read surfaces as an `Err` item; the batch keeps going.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use idforge_core::{OnboardingRecord, parse_group_list};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read header: {0}")]
    Header(#[source] csv::Error),
    #[error("row {position}: {source}")]
    Row {
        position: usize,
        #[source]
        source: csv::Error,
    },
}

pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<OnboardingRecord, SourceError>> + 'a>;

pub trait RecordSource {
    /// Start reading. Fails only when the source as a whole is unusable.
    fn records(&self) -> Result<RecordIter<'_>, SourceError>;
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct VecRecordSource {
    records: Vec<OnboardingRecord>,
}

impl VecRecordSource {
    pub fn new(records: Vec<OnboardingRecord>) -> Self {
        Self { records }
    }
}

impl From<Vec<OnboardingRecord>> for VecRecordSource {
    fn from(records: Vec<OnboardingRecord>) -> Self {
        Self::new(records)
    }
}

impl RecordSource for VecRecordSource {
    fn records(&self) -> Result<RecordIter<'_>, SourceError> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}

/// One CSV row. Columns that are absent from the header read as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    first_name: String,
    last_name: String,
    display_name: String,
    user_principal_name: String,
    department: String,
    job_title: String,
    manager_email: String,
    license_type: String,
    groups: String,
    mailbox_delegation: String,
}

impl From<CsvRow> for OnboardingRecord {
    fn from(row: CsvRow) -> Self {
        OnboardingRecord {
            given_name: row.first_name,
            family_name: row.last_name,
            display_name: non_empty(row.display_name),
            principal_name: row.user_principal_name,
            department: non_empty(row.department),
            title: non_empty(row.job_title),
            manager: non_empty(row.manager_email),
            entitlement: row.license_type,
            groups: parse_group_list(&row.groups),
            delegate: non_empty(row.mailbox_delegation),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

#[derive(Debug, Clone)]
enum CsvOrigin {
    Path(PathBuf),
    Text(String),
}

/// Comma-separated input with a header row.
///
/// Expected columns: `first_name`, `last_name`, `display_name`,
/// `user_principal_name`, `department`, `job_title`, `manager_email`,
/// `license_type`, `groups` (`;`-separated) and `mailbox_delegation`.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    origin: CsvOrigin,
}

impl CsvRecordSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            origin: CsvOrigin::Path(path.as_ref().to_path_buf()),
        }
    }

    pub fn from_string(text: impl Into<String>) -> Self {
        Self {
            origin: CsvOrigin::Text(text.into()),
        }
    }

    fn reader_builder() -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.trim(csv::Trim::All).flexible(true);
        builder
    }
}

impl RecordSource for CsvRecordSource {
    fn records(&self) -> Result<RecordIter<'_>, SourceError> {
        match &self.origin {
            CsvOrigin::Path(path) => {
                let file = File::open(path).map_err(|source| SourceError::Open {
                    path: path.clone(),
                    source,
                })?;
                rows(Self::reader_builder().from_reader(file))
            }
            CsvOrigin::Text(text) => rows(Self::reader_builder().from_reader(text.as_bytes())),
        }
    }
}

fn rows<'a, R: std::io::Read + 'a>(mut reader: csv::Reader<R>) -> Result<RecordIter<'a>, SourceError> {
    reader.headers().map_err(SourceError::Header)?;
    Ok(Box::new(
        reader
            .into_deserialize::<CsvRow>()
            .enumerate()
            .map(|(index, row)| {
                row.map(OnboardingRecord::from).map_err(|source| SourceError::Row {
                    position: index + 1,
                    source,
                })
            }),
    ))
}
