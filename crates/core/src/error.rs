//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::RequiredField;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures (parsing, invariants).
/// Directory failures live in `idforge-directory`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. empty or parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// A single pre-flight validation failure for an onboarding record.
///
/// Validation reports every violation at once, so these are collected into a
/// list rather than returned one at a time.
#[derive(Debug, Error, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(RequiredField),

    #[error("malformed principal name: {0}")]
    MalformedPrincipal(String),

    #[error("principal already exists: {0}")]
    DuplicatePrincipal(String),

    #[error("unknown entitlement: {0}")]
    UnknownEntitlement(String),

    #[error("manager not found: {0}")]
    ManagerNotFound(String),
}

impl ValidationError {
    /// Stable snake_case tag, used for per-kind error counts.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::MalformedPrincipal(_) => "malformed_principal",
            ValidationError::DuplicatePrincipal(_) => "duplicate_principal",
            ValidationError::UnknownEntitlement(_) => "unknown_entitlement",
            ValidationError::ManagerNotFound(_) => "manager_not_found",
        }
    }
}
