//! Onboarding input records.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Entitlement tiers an input record may request.
///
/// `NoEntitlement` is the sentinel for "create the account without a license".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntitlementCode {
    #[serde(rename = "E3")]
    E3,
    #[serde(rename = "E5")]
    E5,
    #[serde(rename = "INTUNE")]
    Intune,
    #[serde(rename = "NONE")]
    NoEntitlement,
}

impl EntitlementCode {
    pub const ALL: [EntitlementCode; 4] = [
        EntitlementCode::E3,
        EntitlementCode::E5,
        EntitlementCode::Intune,
        EntitlementCode::NoEntitlement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntitlementCode::E3 => "E3",
            EntitlementCode::E5 => "E5",
            EntitlementCode::Intune => "INTUNE",
            EntitlementCode::NoEntitlement => "NONE",
        }
    }
}

impl core::fmt::Display for EntitlementCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntitlementCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        EntitlementCode::ALL
            .into_iter()
            .find(|code| code.as_str() == upper)
            .ok_or_else(|| DomainError::validation(format!("unknown entitlement code: {s}")))
    }
}

/// Record fields that must be present before any directory call is made.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    GivenName,
    FamilyName,
    PrincipalName,
    Entitlement,
}

impl core::fmt::Display for RequiredField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            RequiredField::GivenName => "given_name",
            RequiredField::FamilyName => "family_name",
            RequiredField::PrincipalName => "principal_name",
            RequiredField::Entitlement => "entitlement",
        };
        f.write_str(name)
    }
}

/// One account to onboard, as read from the input source.
///
/// Text fields are kept exactly as read; an empty string means "not supplied".
/// The entitlement stays a raw string so an unrecognised code surfaces as a
/// validation error instead of a read failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnboardingRecord {
    pub given_name: String,
    pub family_name: String,
    pub display_name: Option<String>,
    pub principal_name: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub manager: Option<String>,
    pub entitlement: String,
    pub groups: Vec<String>,
    pub delegate: Option<String>,
}

impl OnboardingRecord {
    pub fn new(
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        principal_name: impl Into<String>,
        entitlement: impl Into<String>,
    ) -> Self {
        Self {
            given_name: given_name.into(),
            family_name: family_name.into(),
            principal_name: principal_name.into(),
            entitlement: entitlement.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = Some(manager.into());
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delegate(mut self, delegate: impl Into<String>) -> Self {
        self.delegate = Some(delegate.into());
        self
    }

    /// Display name, falling back to "given family" when none was supplied.
    pub fn resolved_display_name(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{} {}", self.given_name.trim(), self.family_name.trim()),
        }
    }

    /// Local part of the principal name, used as the mail nickname.
    pub fn mail_nickname(&self) -> &str {
        let principal = self.principal_name.trim();
        principal.split('@').next().unwrap_or(principal)
    }

    /// Parsed entitlement code, if the raw value is one of the known codes.
    pub fn entitlement_code(&self) -> Option<EntitlementCode> {
        self.entitlement.parse().ok()
    }
}

/// Split a `;`-separated group list, dropping blank entries.
pub fn parse_group_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entitlement_code_parses_case_insensitively() {
        assert_eq!("e5".parse::<EntitlementCode>().unwrap(), EntitlementCode::E5);
        assert_eq!(" Intune ".parse::<EntitlementCode>().unwrap(), EntitlementCode::Intune);
        assert_eq!("none".parse::<EntitlementCode>().unwrap(), EntitlementCode::NoEntitlement);
        assert!("E7".parse::<EntitlementCode>().is_err());
    }

    #[test]
    fn display_name_falls_back_to_given_and_family() {
        let record = OnboardingRecord::new("Ada", "Lovelace", "ada@example.com", "E3");
        assert_eq!(record.resolved_display_name(), "Ada Lovelace");

        let record = record.with_display_name("Countess Ada");
        assert_eq!(record.resolved_display_name(), "Countess Ada");

        let record = record.with_display_name("  ");
        assert_eq!(record.resolved_display_name(), "Ada Lovelace");
    }

    #[test]
    fn mail_nickname_is_local_part() {
        let record = OnboardingRecord::new("Ada", "Lovelace", "ada.lovelace@example.com", "E3");
        assert_eq!(record.mail_nickname(), "ada.lovelace");
    }

    #[test]
    fn group_list_drops_blanks() {
        assert_eq!(
            parse_group_list(" Sales ; ;Engineering;"),
            vec!["Sales".to_string(), "Engineering".to_string()]
        );
        assert!(parse_group_list("").is_empty());
    }
}
