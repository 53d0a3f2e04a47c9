use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use forgeship_core::{RepositoryError, ShopGroupId, ShopId};
use forgeship_rules::{NormalizedRule, normalize, sort_by_priority};

use crate::repository::RuleRepository;

/// `(shop_group_id, shop_id)`, `0` standing for "none".
type ScopeKey = (u32, u32);

/// Loads the active rules of a scope once and serves them from memory after.
///
/// The cache lives as long as the provider; rules are never written back.
#[derive(Debug)]
pub struct RuleProvider<R> {
    repository: R,
    cache: RwLock<HashMap<ScopeKey, Arc<[NormalizedRule]>>>,
}

impl<R> RuleProvider<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached scope.
    pub fn invalidate(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl<R: RuleRepository> RuleProvider<R> {
    /// Active rules for the scope, normalized and sorted by ascending priority
    /// (ties keep repository order).
    pub fn active_rules(
        &self,
        shop_id: Option<ShopId>,
        shop_group_id: Option<ShopGroupId>,
    ) -> Result<Arc<[NormalizedRule]>, RepositoryError> {
        let key = (
            shop_group_id.map_or(0, ShopGroupId::get),
            shop_id.map_or(0, ShopId::get),
        );

        {
            let cache = self
                .cache
                .read()
                .map_err(|_| RepositoryError::backend("rule cache lock poisoned"))?;
            if let Some(rules) = cache.get(&key) {
                return Ok(Arc::clone(rules));
            }
        }

        let mut rules: Vec<NormalizedRule> = self
            .repository
            .find_active_rules_for_context(shop_id, shop_group_id)?
            .iter()
            .filter(|rule| rule.active)
            .map(normalize)
            .collect();
        sort_by_priority(&mut rules);
        debug!(
            shop_id = key.1,
            shop_group_id = key.0,
            rule_count = rules.len(),
            "validation rules loaded"
        );

        let rules: Arc<[NormalizedRule]> = rules.into();
        self.cache
            .write()
            .map_err(|_| RepositoryError::backend("rule cache lock poisoned"))?
            .insert(key, Arc::clone(&rules));
        Ok(rules)
    }
}
