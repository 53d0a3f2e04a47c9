//! Normalization of stored rules into an evaluation-ready form.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use forgeship_core::{CarrierId, CategoryId, CountryId, ProductId, RuleId, ZoneId};

use crate::rule::ValidationRule;

/// Conditions of a normalized rule. An empty list (or absent bound) does not
/// constrain the match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    pub product_ids: Vec<ProductId>,
    pub category_ids: Vec<CategoryId>,
    pub zone_ids: Vec<ZoneId>,
    pub country_ids: Vec<CountryId>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
}

/// Actions of a normalized rule; each list keeps the declared order. An empty
/// list is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActions {
    pub allow: Vec<CarrierId>,
    pub deny: Vec<CarrierId>,
    pub add: Vec<CarrierId>,
    pub prefer: Vec<CarrierId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRule {
    pub id: RuleId,
    pub name: String,
    pub priority: i32,
    pub conditions: RuleConditions,
    pub actions: RuleActions,
}

/// Normalize a stored rule. The source rule is left untouched.
pub fn normalize(rule: &ValidationRule) -> NormalizedRule {
    let conditions = &rule.conditions;
    let actions = &rule.actions;

    NormalizedRule {
        id: rule.id,
        name: rule.name.clone(),
        priority: rule.priority,
        conditions: RuleConditions {
            product_ids: id_list(conditions.get("product_ids")),
            category_ids: id_list(conditions.get("category_ids")),
            zone_ids: id_list(conditions.get("zone_ids")),
            country_ids: id_list(conditions.get("country_ids")),
            min_weight: conditions.get("min_weight").and_then(number),
            max_weight: conditions.get("max_weight").and_then(number),
        },
        actions: RuleActions {
            allow: id_list(actions.get("allow")),
            deny: id_list(actions.get("deny")),
            add: id_list(actions.get("add")),
            prefer: id_list(actions.get("prefer")),
        },
    }
}

/// Stable ascending sort by priority; ties keep their input order.
pub fn sort_by_priority(rules: &mut [NormalizedRule]) {
    rules.sort_by_key(|r| r.priority);
}

/// Parse a loosely-typed id list: arrays, single scalars and comma separated
/// strings are accepted. Non-numeric entries are dropped, numbers are coerced to
/// non-negative integers, duplicates removed keeping the first occurrence.
fn id_list<T: From<u32> + PartialEq>(value: Option<&JsonValue>) -> Vec<T> {
    let raw: Vec<u32> = match value {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items.iter().filter_map(coerce_id).collect(),
        Some(JsonValue::String(s)) => s
            .split(',')
            .filter_map(|part| coerce_id(&JsonValue::String(part.to_string())))
            .collect(),
        Some(other) => coerce_id(other).into_iter().collect(),
    };

    let mut out: Vec<T> = Vec::with_capacity(raw.len());
    for id in raw {
        let id = T::from(id);
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn coerce_id(value: &JsonValue) -> Option<u32> {
    let n = number(value)?;
    let n = n.abs().trunc();
    if n > f64::from(u32::MAX) {
        return None;
    }
    Some(n as u32)
}

fn number(value: &JsonValue) -> Option<f64> {
    let n = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}
