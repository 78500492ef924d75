//! Entitlement catalog: requested codes resolved to subscribed SKUs.
//!
//! The catalog is built once per batch from the tenant's subscriptions and is
//! read-only afterwards. Resolution happens in two steps: the entitlement code
//! maps to a SKU part number (static table), and the part number maps to the
//! SKU id the directory assigned to this tenant's subscription.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::SkuId;
use crate::record::EntitlementCode;

/// A license subscription as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribedSku {
    pub part_number: String,
    pub sku_id: SkuId,
    pub enabled_units: u32,
    pub consumed_units: u32,
}

impl SubscribedSku {
    pub fn available_units(&self) -> u32 {
        self.enabled_units.saturating_sub(self.consumed_units)
    }
}

/// Static mapping from entitlement code to SKU part number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuPartNumbers(BTreeMap<EntitlementCode, String>);

impl Default for SkuPartNumbers {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(EntitlementCode::E3, "SPE_E3".to_string());
        map.insert(EntitlementCode::E5, "SPE_E5".to_string());
        map.insert(EntitlementCode::Intune, "INTUNE_A_D".to_string());
        Self(map)
    }
}

impl SkuPartNumbers {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, code: EntitlementCode, part_number: impl Into<String>) -> Self {
        self.0.insert(code, part_number.into());
        self
    }

    pub fn part_number(&self, code: EntitlementCode) -> Option<&str> {
        self.0.get(&code).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntitlementCode, &str)> {
        self.0.iter().map(|(code, part)| (*code, part.as_str()))
    }
}

/// What a record's entitlement resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entitlement {
    /// Assign this SKU after creating the account.
    Sku(SkuId),
    /// The record asked for no license.
    NotRequired,
}

/// Entitlement code → SKU id, for the codes this tenant is subscribed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementCatalog {
    entries: BTreeMap<EntitlementCode, SkuId>,
}

impl EntitlementCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the SKU for a code.
    ///
    /// `NoEntitlement` always resolves to [`Entitlement::NotRequired`]; an entry
    /// for it is ignored.
    pub fn with_entry(mut self, code: EntitlementCode, sku_id: SkuId) -> Self {
        if code != EntitlementCode::NoEntitlement {
            self.entries.insert(code, sku_id);
        }
        self
    }

    /// Build the catalog from the tenant's subscriptions.
    ///
    /// Codes whose part number is not subscribed are left out and will fail
    /// validation as unknown.
    pub fn from_subscriptions(subscriptions: &[SubscribedSku], part_numbers: &SkuPartNumbers) -> Self {
        let mut catalog = Self::new();
        for (code, part_number) in part_numbers.iter() {
            match subscriptions
                .iter()
                .find(|sku| sku.part_number.eq_ignore_ascii_case(part_number))
            {
                Some(sku) => {
                    tracing::info!(
                        code = %code,
                        part_number = %sku.part_number,
                        sku_id = %sku.sku_id,
                        available = sku.available_units(),
                        "entitlement available"
                    );
                    catalog = catalog.with_entry(code, sku.sku_id.clone());
                }
                None => {
                    tracing::warn!(code = %code, part_number, "entitlement not subscribed in tenant");
                }
            }
        }
        catalog
    }

    /// Resolve a raw entitlement code. `None` means the code is unknown or not
    /// subscribed.
    pub fn resolve(&self, raw_code: &str) -> Option<Entitlement> {
        let code: EntitlementCode = raw_code.parse().ok()?;
        if code == EntitlementCode::NoEntitlement {
            return Some(Entitlement::NotRequired);
        }
        self.entries.get(&code).cloned().map(Entitlement::Sku)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku(part: &str, id: &str) -> SubscribedSku {
        SubscribedSku {
            part_number: part.to_string(),
            sku_id: SkuId::new(id),
            enabled_units: 25,
            consumed_units: 20,
        }
    }

    #[test]
    fn none_resolves_to_not_required_even_on_empty_catalog() {
        let catalog = EntitlementCatalog::new();
        assert_eq!(catalog.resolve("none"), Some(Entitlement::NotRequired));
        assert_eq!(catalog.resolve("E3"), None);
    }

    #[test]
    fn subscriptions_map_through_part_numbers() {
        let subs = vec![sku("SPE_E3", "sku-e3"), sku("FLOW_FREE", "sku-flow")];
        let catalog = EntitlementCatalog::from_subscriptions(&subs, &SkuPartNumbers::default());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.resolve("e3"), Some(Entitlement::Sku(SkuId::new("sku-e3"))));
        assert_eq!(catalog.resolve("E5"), None);
        assert_eq!(catalog.resolve("bogus"), None);
    }

    #[test]
    fn available_units_saturate() {
        let mut s = sku("SPE_E5", "x");
        s.consumed_units = 40;
        assert_eq!(s.available_units(), 0);
    }
}
