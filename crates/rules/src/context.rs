use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use forgeship_core::{CategoryId, CountryId, ProductId, ZoneId};

/// One product line of a cart package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageLine {
    pub product_id: ProductId,
    pub default_category_id: Option<CategoryId>,
    /// Unit weight.
    pub weight: f64,
    pub quantity: u32,
}

/// What a rule's conditions are checked against. Built per package, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    pub product_ids: BTreeSet<ProductId>,
    pub category_ids: BTreeSet<CategoryId>,
    pub zone_id: Option<ZoneId>,
    pub country_id: Option<CountryId>,
    pub weight: f64,
}

impl MatchContext {
    /// Scan the package lines: unique product ids, unique default categories,
    /// total weight as the sum of `weight * quantity`.
    pub fn from_lines<'a>(
        lines: impl IntoIterator<Item = &'a PackageLine>,
        zone_id: Option<ZoneId>,
        country_id: Option<CountryId>,
    ) -> Self {
        let mut ctx = Self {
            zone_id,
            country_id,
            ..Self::default()
        };

        for line in lines {
            ctx.product_ids.insert(line.product_id);
            if let Some(category) = line.default_category_id {
                ctx.category_ids.insert(category);
            }
            ctx.weight += line.weight * f64::from(line.quantity);
        }

        ctx
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}
