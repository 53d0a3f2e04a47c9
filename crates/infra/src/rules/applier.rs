//! Applies the active validation rules to every package of a cart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use forgeship_core::{AddressId, RepositoryError, RequestContext};
use forgeship_rules::{CandidateList, MatchContext, PackageLine, RuleEvaluation, evaluate};

use crate::repository::{AddressResolver, RuleRepository};

use super::provider::RuleProvider;

/// One package of a cart: its product lines and the carriers offered for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPackage {
    pub lines: Vec<PackageLine>,
    pub carriers: CandidateList,
}

/// Cart packages grouped by delivery address.
pub type PackagesByAddress = BTreeMap<AddressId, Vec<CartPackage>>;

/// Evaluation of one package, positioned like the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageEvaluation {
    pub address_id: AddressId,
    pub package_index: usize,
    pub evaluation: RuleEvaluation,
}

#[derive(Debug)]
pub struct RuleApplier<R, A> {
    provider: RuleProvider<R>,
    addresses: A,
}

impl<R, A> RuleApplier<R, A> {
    pub fn new(provider: RuleProvider<R>, addresses: A) -> Self {
        Self {
            provider,
            addresses,
        }
    }

    pub fn provider(&self) -> &RuleProvider<R> {
        &self.provider
    }
}

impl<R, A> RuleApplier<R, A>
where
    R: RuleRepository,
    A: AddressResolver,
{
    /// Filter and reorder the carriers of every package. Packages come back
    /// untouched when the cart's scope has no active rules.
    pub fn apply(
        &self,
        mut packages: PackagesByAddress,
        ctx: &RequestContext,
    ) -> Result<PackagesByAddress, RepositoryError> {
        for report in self.evaluate(&packages, ctx)? {
            if let Some(package) = packages
                .get_mut(&report.address_id)
                .and_then(|list| list.get_mut(report.package_index))
            {
                package.carriers = report.evaluation.candidates;
            }
        }
        Ok(packages)
    }

    /// Per-package evaluation details (matched rules, fallback) without
    /// modifying the input.
    pub fn evaluate(
        &self,
        packages: &PackagesByAddress,
        ctx: &RequestContext,
    ) -> Result<Vec<PackageEvaluation>, RepositoryError> {
        let rules = self
            .provider
            .active_rules(ctx.shop_id(), ctx.shop_group_id())?;

        let mut reports = Vec::new();
        for (address_id, list) in packages {
            let resolved = if rules.is_empty() {
                Default::default()
            } else {
                self.addresses.resolve(*address_id)?
            };

            for (package_index, package) in list.iter().enumerate() {
                let evaluation = if rules.is_empty() {
                    RuleEvaluation {
                        candidates: package.carriers.clone(),
                        matched_rules: Vec::new(),
                        fallback_applied: false,
                    }
                } else {
                    let match_ctx = MatchContext::from_lines(
                        &package.lines,
                        resolved.zone_id,
                        resolved.country_id,
                    );
                    evaluate(&rules, &match_ctx, &package.carriers)
                };

                debug!(
                    address_id = %address_id,
                    package_index,
                    matched = evaluation.matched_rules.len(),
                    fallback = evaluation.fallback_applied,
                    "carrier rules evaluated"
                );
                reports.push(PackageEvaluation {
                    address_id: *address_id,
                    package_index,
                    evaluation,
                });
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forgeship_core::{CarrierId, CountryId, ProductId, RuleId, ShopGroupId, ShopId, ZoneId};
    use forgeship_rules::ValidationRule;
    use serde_json::{Value, json};

    use crate::repository::{InMemoryAddressResolver, InMemoryRuleRepository, ResolvedAddress};

    fn carriers(ids: &[u32]) -> CandidateList {
        ids.iter().copied().map(CarrierId::new).collect()
    }

    fn package(product: u32, weight: f64, ids: &[u32]) -> CartPackage {
        CartPackage {
            lines: vec![PackageLine {
                product_id: ProductId::new(product),
                default_category_id: None,
                weight,
                quantity: 1,
            }],
            carriers: carriers(ids),
        }
    }

    fn rule(id: u32, priority: i32, conditions: Value, actions: Value) -> ValidationRule {
        ValidationRule {
            id: RuleId::new(id),
            name: format!("rule {id}"),
            priority,
            active: true,
            shop_id: None,
            shop_group_id: None,
            conditions,
            actions,
        }
    }

    fn applier(
        rules: Vec<ValidationRule>,
    ) -> RuleApplier<Arc<InMemoryRuleRepository>, Arc<InMemoryAddressResolver>> {
        let repo = Arc::new(InMemoryRuleRepository::new());
        for r in rules {
            repo.insert(r).unwrap();
        }
        let addresses = Arc::new(InMemoryAddressResolver::new());
        addresses
            .insert(
                AddressId::new(1),
                ResolvedAddress {
                    zone_id: Some(ZoneId::new(7)),
                    country_id: Some(CountryId::new(6)),
                },
            )
            .unwrap();
        RuleApplier::new(RuleProvider::new(repo), addresses)
    }

    fn ctx() -> RequestContext {
        RequestContext::for_shop(ShopId::new(1), ShopGroupId::new(1))
    }

    #[test]
    fn no_rules_returns_input_unchanged() {
        let applier = applier(vec![]);
        let mut input = PackagesByAddress::new();
        input.insert(AddressId::new(1), vec![package(1, 1.0, &[3, 2, 1])]);

        assert_eq!(applier.apply(input.clone(), &ctx()).unwrap(), input);
    }

    #[test]
    fn zone_condition_uses_resolved_address() {
        let applier = applier(vec![rule(
            1,
            0,
            json!({ "zone_ids": [7] }),
            json!({ "deny": [2] }),
        )]);
        let mut input = PackagesByAddress::new();
        input.insert(AddressId::new(1), vec![package(1, 1.0, &[1, 2, 3])]);
        input.insert(AddressId::new(2), vec![package(1, 1.0, &[1, 2, 3])]);

        let out = applier.apply(input, &ctx()).unwrap();

        assert_eq!(out[&AddressId::new(1)][0].carriers, carriers(&[1, 3]));
        assert_eq!(out[&AddressId::new(2)][0].carriers, carriers(&[1, 2, 3]));
    }

    #[test]
    fn rules_fold_in_priority_order_per_package() {
        let applier = applier(vec![
            rule(1, 10, json!({}), json!({ "prefer": [3] })),
            rule(2, 1, json!({ "max_weight": 5 }), json!({ "allow": [1, 2, 3], "add": [4] })),
        ]);
        let mut input = PackagesByAddress::new();
        input.insert(
            AddressId::new(1),
            vec![package(1, 2.0, &[1, 2, 5]), package(1, 9.0, &[1, 2, 5])],
        );

        let reports = applier.evaluate(&input, &ctx()).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].evaluation.candidates, carriers(&[1, 2, 4]));
        assert_eq!(
            reports[0].evaluation.matched_rules,
            vec![RuleId::new(2), RuleId::new(1)]
        );
        assert_eq!(reports[1].evaluation.candidates, carriers(&[1, 2, 5]));
    }

    #[test]
    fn emptied_list_falls_back_to_original() {
        let applier = applier(vec![rule(1, 0, json!({}), json!({ "deny": [1, 2] }))]);
        let mut input = PackagesByAddress::new();
        input.insert(AddressId::new(1), vec![package(1, 1.0, &[1, 2])]);

        let reports = applier.evaluate(&input, &ctx()).unwrap();
        assert!(reports[0].evaluation.fallback_applied);
        assert_eq!(reports[0].evaluation.candidates, carriers(&[1, 2]));
    }
}
