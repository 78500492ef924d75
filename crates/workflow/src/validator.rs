//! Pre-flight validation of onboarding records.
//!
//! Validation is pure: it reads the record, the existing-principal set and the
//! entitlement catalog (both fetched once per batch) and reports every
//! violation at once. A record with any error never reaches the directory.

use std::collections::HashSet;

use idforge_core::{EntitlementCatalog, OnboardingRecord, RequiredField, ValidationError};

/// Principal names already taken in the directory.
///
/// Names are lower-cased on the way in, so every lookup is case-insensitive
/// whatever casing the directory reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownPrincipals(HashSet<String>);

impl KnownPrincipals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the principal was already known.
    pub fn insert(&mut self, principal: &str) -> bool {
        self.0.insert(principal.trim().to_ascii_lowercase())
    }

    pub fn contains(&self, principal: &str) -> bool {
        self.0.contains(&principal.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KnownPrincipals {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut known = Self::new();
        for principal in iter {
            known.insert(principal.as_ref());
        }
        known
    }
}

/// Validate one record. Returns an empty list when the record may proceed.
pub fn validate(
    record: &OnboardingRecord,
    existing_principals: &KnownPrincipals,
    catalog: &EntitlementCatalog,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let required = [
        (RequiredField::GivenName, record.given_name.as_str()),
        (RequiredField::FamilyName, record.family_name.as_str()),
        (RequiredField::PrincipalName, record.principal_name.as_str()),
        (RequiredField::Entitlement, record.entitlement.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::MissingField(field));
        }
    }

    let principal = record.principal_name.trim();
    if !principal.is_empty() {
        if !is_well_formed_principal(principal) {
            errors.push(ValidationError::MalformedPrincipal(principal.to_string()));
        }
        if existing_principals.contains(principal) {
            errors.push(ValidationError::DuplicatePrincipal(principal.to_string()));
        }
    }

    let entitlement = record.entitlement.trim();
    if !entitlement.is_empty() && catalog.resolve(entitlement).is_none() {
        errors.push(ValidationError::UnknownEntitlement(entitlement.to_string()));
    }

    if let Some(manager) = record.manager.as_deref().map(str::trim) {
        if !manager.is_empty() && !existing_principals.contains(manager) {
            errors.push(ValidationError::ManagerNotFound(manager.to_string()));
        }
    }

    errors
}

/// `local@domain.tld` with no whitespace, a single `@`, and a dotted domain
/// made of non-empty alphanumeric/hyphen labels.
pub fn is_well_formed_principal(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || local.starts_with('.') || local.ends_with('.') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
