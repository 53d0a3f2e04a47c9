use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use forgeship_core::{RuleId, ShopGroupId, ShopId};

/// A validation rule as stored by the back office.
///
/// `conditions` and `actions` are the JSON documents written by the admin forms;
/// they are loosely typed (ids may be numbers, numeric strings or comma
/// separated lists). Use [`crate::normalize`] before evaluating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: RuleId,
    pub name: String,
    /// Lower values are evaluated first.
    pub priority: i32,
    pub active: bool,
    pub shop_id: Option<ShopId>,
    pub shop_group_id: Option<ShopGroupId>,
    #[serde(default)]
    pub conditions: JsonValue,
    #[serde(default)]
    pub actions: JsonValue,
}

/// Where a rule applies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuleScope {
    Shop(ShopId),
    ShopGroup(ShopGroupId),
    Global,
}

impl ValidationRule {
    /// Scope is exclusive: a shop id wins over a shop-group id.
    pub fn scope(&self) -> RuleScope {
        match (self.shop_id, self.shop_group_id) {
            (Some(shop), _) => RuleScope::Shop(shop),
            (None, Some(group)) => RuleScope::ShopGroup(group),
            (None, None) => RuleScope::Global,
        }
    }

    /// Whether the rule is visible from the given shop / shop-group scope.
    pub fn applies_to(&self, shop_id: Option<ShopId>, shop_group_id: Option<ShopGroupId>) -> bool {
        match self.scope() {
            RuleScope::Shop(shop) => shop_id == Some(shop),
            RuleScope::ShopGroup(group) => shop_group_id == Some(group),
            RuleScope::Global => true,
        }
    }
}
