//! Directory capability interface.
//!
//! The onboarding workflow only talks to the directory through this trait.
//! Every call is blocking from the caller's point of view and fails with a
//! classified [`DirectoryError`].

use std::collections::HashSet;

use serde::Serialize;

use idforge_core::{
    AccountHandle, EntitlementCatalog, GroupHandle, SecretString, SkuId, SkuPartNumbers,
    SubscribedSku,
};

use crate::error::DirectoryResult;

/// Fields of an account to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAccount {
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub principal_name: String,
    pub mail_nickname: String,
    pub department: Option<String>,
    pub title: Option<String>,
    /// Two-letter country code; required by the directory before a license
    /// can be assigned.
    pub usage_location: String,
    pub enabled: bool,
}

/// Attributes applied after the account is entitled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountAttributes {
    pub mailbox_timezone: String,
    /// Principal that should receive delegate access to the mailbox.
    pub delegate: Option<String>,
}

pub trait DirectoryClient: Send + Sync {
    /// License subscriptions of the tenant.
    fn subscribed_skus(&self) -> DirectoryResult<Vec<SubscribedSku>>;

    /// Entitlement catalog for this tenant, resolved through `part_numbers`.
    fn lookup_entitlement_catalog(
        &self,
        part_numbers: &SkuPartNumbers,
    ) -> DirectoryResult<EntitlementCatalog> {
        let subscriptions = self.subscribed_skus()?;
        Ok(EntitlementCatalog::from_subscriptions(&subscriptions, part_numbers))
    }

    /// Principal names of every existing account.
    fn list_existing_principals(&self) -> DirectoryResult<HashSet<String>>;

    fn create_account(
        &self,
        account: &NewAccount,
        secret: &SecretString,
        force_change: bool,
    ) -> DirectoryResult<AccountHandle>;

    fn delete_account(&self, handle: &AccountHandle) -> DirectoryResult<()>;

    fn assign_entitlement(&self, handle: &AccountHandle, sku: &SkuId) -> DirectoryResult<()>;

    /// Look a group up by display name. `Ok(None)` when no such group exists.
    fn find_group(&self, name: &str) -> DirectoryResult<Option<GroupHandle>>;

    /// Add the account to the group. Already being a member is a success.
    fn add_group_member(&self, group: &GroupHandle, handle: &AccountHandle) -> DirectoryResult<()>;

    fn update_attributes(
        &self,
        handle: &AccountHandle,
        attributes: &AccountAttributes,
    ) -> DirectoryResult<()>;
}
