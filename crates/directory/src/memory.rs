//! In-memory directory for tests and dry runs.
//!
//! Keeps accounts, groups and subscriptions in memory, records every call in
//! order, and can be scripted to fail specific operations.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use idforge_core::{AccountHandle, GroupHandle, SecretString, SkuId, SubscribedSku};

use crate::client::{AccountAttributes, DirectoryClient, NewAccount};
use crate::error::{DirectoryError, DirectoryResult, ErrorKind};

/// Directory operation, used to script failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    SubscribedSkus,
    ListExistingPrincipals,
    CreateAccount,
    DeleteAccount,
    AssignEntitlement,
    FindGroup,
    AddGroupMember,
    UpdateAttributes,
}

/// One observed call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    SubscribedSkus,
    ListExistingPrincipals,
    CreateAccount { principal: String, force_change: bool },
    DeleteAccount { account: String },
    AssignEntitlement { account: String, sku: String },
    FindGroup { name: String },
    AddGroupMember { group: String, account: String },
    UpdateAttributes { account: String },
}

impl DirectoryCall {
    pub fn operation(&self) -> Operation {
        match self {
            DirectoryCall::SubscribedSkus => Operation::SubscribedSkus,
            DirectoryCall::ListExistingPrincipals => Operation::ListExistingPrincipals,
            DirectoryCall::CreateAccount { .. } => Operation::CreateAccount,
            DirectoryCall::DeleteAccount { .. } => Operation::DeleteAccount,
            DirectoryCall::AssignEntitlement { .. } => Operation::AssignEntitlement,
            DirectoryCall::FindGroup { .. } => Operation::FindGroup,
            DirectoryCall::AddGroupMember { .. } => Operation::AddGroupMember,
            DirectoryCall::UpdateAttributes { .. } => Operation::UpdateAttributes,
        }
    }

    /// Whether the call changes directory state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            DirectoryCall::CreateAccount { .. }
                | DirectoryCall::DeleteAccount { .. }
                | DirectoryCall::AssignEntitlement { .. }
                | DirectoryCall::AddGroupMember { .. }
                | DirectoryCall::UpdateAttributes { .. }
        )
    }
}

/// Snapshot of an account held by [`InMemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub id: String,
    pub principal_name: String,
    pub display_name: String,
    pub force_change: bool,
    pub entitlements: Vec<SkuId>,
    pub attributes: Option<AccountAttributes>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    preexisting: BTreeSet<String>,
    accounts: BTreeMap<String, StoredAccount>,
    skus: Vec<SubscribedSku>,
    groups: BTreeMap<String, GroupHandle>,
    memberships: BTreeSet<(String, String)>,
    queued_failures: HashMap<Operation, VecDeque<DirectoryError>>,
    persistent_failures: HashMap<Operation, DirectoryError>,
    group_lookup_failures: HashMap<String, DirectoryError>,
    calls: Vec<DirectoryCall>,
}

impl State {
    fn record(&mut self, call: DirectoryCall) -> DirectoryResult<()> {
        let operation = call.operation();
        self.calls.push(call);

        if let Some(err) = self
            .queued_failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        match self.persistent_failures.get(&operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn principal_taken(&self, principal: &str) -> bool {
        let key = principal.to_ascii_lowercase();
        self.preexisting.contains(&key)
            || self
                .accounts
                .values()
                .any(|account| account.principal_name.eq_ignore_ascii_case(principal))
    }

    fn account_mut(&mut self, handle: &AccountHandle) -> DirectoryResult<&mut StoredAccount> {
        self.accounts
            .get_mut(handle.as_str())
            .ok_or_else(|| DirectoryError::not_found(format!("account {handle} does not exist")))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<State>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a principal that already exists (not created through this client).
    pub fn with_principal(self, principal: impl Into<String>) -> Self {
        self.state().preexisting.insert(principal.into().to_ascii_lowercase());
        self
    }

    pub fn with_sku(self, part_number: impl Into<String>, sku_id: impl Into<String>, enabled_units: u32) -> Self {
        self.state().skus.push(SubscribedSku {
            part_number: part_number.into(),
            sku_id: SkuId::new(sku_id),
            enabled_units,
            consumed_units: 0,
        });
        self
    }

    pub fn with_group(self, name: impl Into<String>) -> Self {
        {
            let mut state = self.state();
            let name = name.into();
            let handle = GroupHandle::new(format!("group-{}", state.groups.len() + 1));
            state.groups.insert(name, handle);
        }
        self
    }

    /// Fail the next call of `operation` with `err`. Queued failures are
    /// consumed in order before any persistent failure applies.
    pub fn fail_next(&self, operation: Operation, err: DirectoryError) {
        self.state()
            .queued_failures
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    /// Fail every call of `operation` with `err`.
    pub fn fail_always(&self, operation: Operation, err: DirectoryError) {
        self.state().persistent_failures.insert(operation, err);
    }

    /// Fail lookups of one specific group name.
    pub fn fail_group_lookup(&self, name: impl Into<String>, err: DirectoryError) {
        self.state().group_lookup_failures.insert(name.into(), err);
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state().calls.clone()
    }

    pub fn calls_to(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn mutating_calls(&self) -> Vec<DirectoryCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_mutating())
            .cloned()
            .collect()
    }

    pub fn account(&self, principal: &str) -> Option<StoredAccount> {
        self.state()
            .accounts
            .values()
            .find(|account| account.principal_name.eq_ignore_ascii_case(principal))
            .cloned()
    }

    /// Principal names of the members of a group.
    pub fn members_of(&self, group_name: &str) -> Vec<String> {
        let state = self.state();
        let Some(group) = state.groups.get(group_name) else {
            return Vec::new();
        };
        state
            .memberships
            .iter()
            .filter(|(g, _)| g == group.as_str())
            .filter_map(|(_, account)| state.accounts.get(account))
            .map(|account| account.principal_name.clone())
            .collect()
    }
}

impl DirectoryClient for InMemoryDirectory {
    fn subscribed_skus(&self) -> DirectoryResult<Vec<SubscribedSku>> {
        let mut state = self.state();
        state.record(DirectoryCall::SubscribedSkus)?;
        Ok(state.skus.clone())
    }

    fn list_existing_principals(&self) -> DirectoryResult<HashSet<String>> {
        let mut state = self.state();
        state.record(DirectoryCall::ListExistingPrincipals)?;
        let mut principals: HashSet<String> = state.preexisting.iter().cloned().collect();
        principals.extend(
            state
                .accounts
                .values()
                .map(|account| account.principal_name.to_ascii_lowercase()),
        );
        Ok(principals)
    }

    fn create_account(
        &self,
        account: &NewAccount,
        _secret: &SecretString,
        force_change: bool,
    ) -> DirectoryResult<AccountHandle> {
        let mut state = self.state();
        state.record(DirectoryCall::CreateAccount {
            principal: account.principal_name.clone(),
            force_change,
        })?;

        if state.principal_taken(&account.principal_name) {
            return Err(DirectoryError::classify(
                ErrorKind::Conflict,
                format!("principal {} already exists", account.principal_name),
            ));
        }

        state.next_id += 1;
        let id = format!("account-{}", state.next_id);
        state.accounts.insert(
            id.clone(),
            StoredAccount {
                id: id.clone(),
                principal_name: account.principal_name.clone(),
                display_name: account.display_name.clone(),
                force_change,
                entitlements: Vec::new(),
                attributes: None,
            },
        );
        Ok(AccountHandle::new(id))
    }

    fn delete_account(&self, handle: &AccountHandle) -> DirectoryResult<()> {
        let mut state = self.state();
        state.record(DirectoryCall::DeleteAccount {
            account: handle.to_string(),
        })?;

        if state.accounts.remove(handle.as_str()).is_none() {
            return Err(DirectoryError::not_found(format!("account {handle} does not exist")));
        }
        state.memberships.retain(|(_, account)| account != handle.as_str());
        Ok(())
    }

    fn assign_entitlement(&self, handle: &AccountHandle, sku: &SkuId) -> DirectoryResult<()> {
        let mut state = self.state();
        state.record(DirectoryCall::AssignEntitlement {
            account: handle.to_string(),
            sku: sku.to_string(),
        })?;

        if !state.skus.iter().any(|s| &s.sku_id == sku) {
            return Err(DirectoryError::bad_request(format!("sku {sku} is not subscribed")));
        }
        let account = state.account_mut(handle)?;
        if !account.entitlements.contains(sku) {
            account.entitlements.push(sku.clone());
        }
        Ok(())
    }

    fn find_group(&self, name: &str) -> DirectoryResult<Option<GroupHandle>> {
        let mut state = self.state();
        state.record(DirectoryCall::FindGroup {
            name: name.to_string(),
        })?;

        if let Some(err) = state.group_lookup_failures.get(name) {
            return Err(err.clone());
        }
        Ok(state.groups.get(name).cloned())
    }

    fn add_group_member(&self, group: &GroupHandle, handle: &AccountHandle) -> DirectoryResult<()> {
        let mut state = self.state();
        state.record(DirectoryCall::AddGroupMember {
            group: group.to_string(),
            account: handle.to_string(),
        })?;

        if !state.groups.values().any(|g| g == group) {
            return Err(DirectoryError::not_found(format!("group {group} does not exist")));
        }
        state.account_mut(handle)?;
        state
            .memberships
            .insert((group.to_string(), handle.to_string()));
        Ok(())
    }

    fn update_attributes(
        &self,
        handle: &AccountHandle,
        attributes: &AccountAttributes,
    ) -> DirectoryResult<()> {
        let mut state = self.state();
        state.record(DirectoryCall::UpdateAttributes {
            account: handle.to_string(),
        })?;

        state.account_mut(handle)?.attributes = Some(attributes.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(principal: &str) -> NewAccount {
        NewAccount {
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            display_name: "Ada Lovelace".to_string(),
            principal_name: principal.to_string(),
            mail_nickname: "ada".to_string(),
            department: None,
            title: None,
            usage_location: "NL".to_string(),
            enabled: true,
        }
    }

    fn secret() -> SecretString {
        SecretString::from("Xy7!abcdefghijkl")
    }

    #[test]
    fn created_accounts_appear_in_principal_listing_until_deleted() {
        let dir = InMemoryDirectory::new().with_principal("Existing@Example.com");
        let handle = dir.create_account(&new_account("ada@example.com"), &secret(), true).unwrap();

        let principals = dir.list_existing_principals().unwrap();
        assert!(principals.contains("existing@example.com"));
        assert!(principals.contains("ada@example.com"));

        dir.delete_account(&handle).unwrap();
        assert!(!dir.list_existing_principals().unwrap().contains("ada@example.com"));
    }

    #[test]
    fn duplicate_principal_is_a_permanent_conflict() {
        let dir = InMemoryDirectory::new().with_principal("ada@example.com");
        let err = dir
            .create_account(&new_account("ADA@example.com"), &secret(), true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn queued_failures_are_consumed_before_persistent_ones() {
        let dir = InMemoryDirectory::new().with_sku("SPE_E3", "sku-e3", 10);
        dir.fail_next(Operation::SubscribedSkus, DirectoryError::rate_limited("slow down"));

        assert!(dir.subscribed_skus().unwrap_err().is_retryable());
        assert_eq!(dir.subscribed_skus().unwrap().len(), 1);

        dir.fail_always(Operation::SubscribedSkus, DirectoryError::bad_request("nope"));
        assert!(dir.subscribed_skus().is_err());
        assert!(dir.subscribed_skus().is_err());
        assert_eq!(dir.calls_to(Operation::SubscribedSkus), 4);
    }

    #[test]
    fn group_membership_is_tracked() {
        let dir = InMemoryDirectory::new().with_group("Sales");
        let handle = dir.create_account(&new_account("ada@example.com"), &secret(), true).unwrap();

        let group = dir.find_group("Sales").unwrap().unwrap();
        dir.add_group_member(&group, &handle).unwrap();
        assert!(dir.find_group("Marketing").unwrap().is_none());
        assert_eq!(dir.members_of("Sales"), vec!["ada@example.com".to_string()]);

        let mutating: Vec<Operation> = dir.mutating_calls().iter().map(DirectoryCall::operation).collect();
        assert_eq!(mutating, vec![Operation::CreateAccount, Operation::AddGroupMember]);
    }

    #[test]
    fn assigning_an_unsubscribed_sku_fails_permanently() {
        let dir = InMemoryDirectory::new();
        let handle = dir.create_account(&new_account("ada@example.com"), &secret(), true).unwrap();
        let err = dir.assign_entitlement(&handle, &SkuId::new("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}
