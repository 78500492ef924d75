//! `idforge-core`: domain types for identity onboarding.
//!
//! This crate contains **pure domain** types (no directory IO). The directory
//! adapters and the onboarding workflow build on top of it.

pub mod catalog;
pub mod error;
pub mod id;
pub mod outcome;
pub mod record;
pub mod secret;

pub use catalog::{Entitlement, EntitlementCatalog, SkuPartNumbers, SubscribedSku};
pub use error::{DomainError, DomainResult, ValidationError};
pub use id::{AccountHandle, BatchId, GroupHandle, SkuId};
pub use outcome::{FailureDetail, OutcomeRecord, OutcomeStatus, StepDetail, StepKind};
pub use record::{EntitlementCode, OnboardingRecord, RequiredField, parse_group_list};
pub use secret::{REDACTED, Secret, SecretString};
