//! Ordered rule evaluation over a candidate list.
//!
//! Rules are folded in priority order. A matching rule applies its actions in a
//! fixed sequence: `allow` (intersect), `add` (union), `deny` (subtract), then
//! `prefer` (reorder). `add` can bring back ids a stricter `allow` removed, but
//! `deny` always wins over `add`.
//!
//! A package must never be left without carriers: if the fold empties the list,
//! the original list is restored.

use serde::Serialize;

use forgeship_core::RuleId;

use crate::candidates::CandidateList;
use crate::context::MatchContext;
use crate::normalize::{NormalizedRule, RuleActions};

/// Outcome of evaluating a rule set for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEvaluation {
    pub candidates: CandidateList,
    /// Rules whose conditions matched, in evaluation order.
    pub matched_rules: Vec<RuleId>,
    /// True when the rules emptied the list and the original was restored.
    pub fallback_applied: bool,
}

/// Whether every condition present on the rule holds for `ctx`.
pub fn rule_matches(rule: &NormalizedRule, ctx: &MatchContext) -> bool {
    let c = &rule.conditions;

    if !c.product_ids.is_empty() && !c.product_ids.iter().any(|id| ctx.product_ids.contains(id)) {
        return false;
    }
    if !c.category_ids.is_empty()
        && !c.category_ids.iter().any(|id| ctx.category_ids.contains(id))
    {
        return false;
    }
    if !c.zone_ids.is_empty() && !ctx.zone_id.is_some_and(|zone| c.zone_ids.contains(&zone)) {
        return false;
    }
    if !c.country_ids.is_empty()
        && !ctx.country_id.is_some_and(|country| c.country_ids.contains(&country))
    {
        return false;
    }
    if c.min_weight.is_some_and(|min| ctx.weight < min) {
        return false;
    }
    if c.max_weight.is_some_and(|max| ctx.weight > max) {
        return false;
    }

    true
}

/// Apply a rule's actions: allow -> add -> deny -> prefer.
pub fn apply_actions(actions: &RuleActions, list: &mut CandidateList) {
    if !actions.allow.is_empty() {
        list.allow(&actions.allow);
    }
    if !actions.add.is_empty() {
        list.add(actions.add.iter().copied());
    }
    if !actions.deny.is_empty() {
        list.deny(&actions.deny);
    }
    if !actions.prefer.is_empty() {
        list.prefer(&actions.prefer);
    }
}

/// Fold `rules` (already sorted by priority) over `original`.
pub fn evaluate(
    rules: &[NormalizedRule],
    ctx: &MatchContext,
    original: &CandidateList,
) -> RuleEvaluation {
    let mut candidates = original.clone();
    let mut matched_rules = Vec::new();

    for rule in rules {
        if !rule_matches(rule, ctx) {
            continue;
        }
        apply_actions(&rule.actions, &mut candidates);
        matched_rules.push(rule.id);
    }

    let fallback_applied = candidates.is_empty() && !original.is_empty();
    if fallback_applied {
        candidates = original.clone();
    }

    RuleEvaluation {
        candidates,
        matched_rules,
        fallback_applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RuleConditions;
    use forgeship_core::{CarrierId, CategoryId, CountryId, ProductId, ZoneId};

    fn ids(raw: &[u32]) -> Vec<CarrierId> {
        raw.iter().copied().map(CarrierId::new).collect()
    }

    fn rule(id: u32, conditions: RuleConditions, actions: RuleActions) -> NormalizedRule {
        NormalizedRule {
            id: RuleId::new(id),
            name: format!("rule-{id}"),
            priority: id as i32,
            conditions,
            actions,
        }
    }

    fn weight_ctx(weight: f64) -> MatchContext {
        MatchContext::default().with_weight(weight)
    }

    #[test]
    fn actions_apply_in_allow_add_deny_order() {
        let r = rule(
            1,
            RuleConditions::default(),
            RuleActions {
                allow: ids(&[1, 2]),
                add: ids(&[4]),
                deny: ids(&[2]),
                prefer: vec![],
            },
        );
        let out = evaluate(&[r], &weight_ctx(1.0), &CandidateList::new(ids(&[1, 2, 3])));
        assert_eq!(out.candidates.into_vec(), ids(&[1, 4]));
        assert_eq!(out.matched_rules, vec![RuleId::new(1)]);
        assert!(!out.fallback_applied);
    }

    #[test]
    fn deny_wins_over_add_in_the_same_rule() {
        let r = rule(
            1,
            RuleConditions::default(),
            RuleActions {
                add: ids(&[5]),
                deny: ids(&[5]),
                ..RuleActions::default()
            },
        );
        let out = evaluate(&[r], &weight_ctx(1.0), &CandidateList::new(ids(&[1])));
        assert_eq!(out.candidates.into_vec(), ids(&[1]));
    }

    #[test]
    fn prefer_runs_after_set_operations() {
        let r = rule(
            1,
            RuleConditions::default(),
            RuleActions {
                add: ids(&[7]),
                prefer: ids(&[7, 2]),
                ..RuleActions::default()
            },
        );
        let out = evaluate(&[r], &weight_ctx(1.0), &CandidateList::new(ids(&[1, 2, 3])));
        assert_eq!(out.candidates.into_vec(), ids(&[7, 2, 1, 3]));
    }

    #[test]
    fn emptied_list_falls_back_to_original() {
        let r = rule(
            1,
            RuleConditions::default(),
            RuleActions {
                deny: ids(&[1, 2, 3]),
                ..RuleActions::default()
            },
        );
        let original = CandidateList::new(ids(&[3, 1, 2]));
        let out = evaluate(&[r], &weight_ctx(1.0), &original);
        assert_eq!(out.candidates, original);
        assert!(out.fallback_applied);
    }

    #[test]
    fn later_rule_can_repopulate_an_intermediate_empty_list() {
        let deny_all = rule(
            1,
            RuleConditions::default(),
            RuleActions {
                deny: ids(&[1, 2]),
                ..RuleActions::default()
            },
        );
        let add_back = rule(
            2,
            RuleConditions::default(),
            RuleActions {
                add: ids(&[9]),
                ..RuleActions::default()
            },
        );
        let out = evaluate(
            &[deny_all, add_back],
            &weight_ctx(1.0),
            &CandidateList::new(ids(&[1, 2])),
        );
        assert_eq!(out.candidates.into_vec(), ids(&[9]));
        assert!(!out.fallback_applied);
    }

    #[test]
    fn weight_bounds_are_inclusive() {
        let r = rule(
            1,
            RuleConditions {
                min_weight: Some(2.0),
                max_weight: Some(5.0),
                ..RuleConditions::default()
            },
            RuleActions::default(),
        );
        assert!(rule_matches(&r, &weight_ctx(2.0)));
        assert!(rule_matches(&r, &weight_ctx(5.0)));
        assert!(rule_matches(&r, &weight_ctx(3.3)));
        assert!(!rule_matches(&r, &weight_ctx(1.999)));
        assert!(!rule_matches(&r, &weight_ctx(5.001)));
    }

    #[test]
    fn single_bound_leaves_other_side_open() {
        let r = rule(
            1,
            RuleConditions {
                min_weight: Some(10.0),
                ..RuleConditions::default()
            },
            RuleActions::default(),
        );
        assert!(rule_matches(&r, &weight_ctx(10_000.0)));
        assert!(!rule_matches(&r, &weight_ctx(9.0)));
    }

    #[test]
    fn all_present_conditions_must_hold() {
        let r = rule(
            1,
            RuleConditions {
                product_ids: vec![ProductId::new(1), ProductId::new(2)],
                category_ids: vec![CategoryId::new(10)],
                zone_ids: vec![ZoneId::new(3)],
                country_ids: vec![CountryId::new(6)],
                ..RuleConditions::default()
            },
            RuleActions::default(),
        );

        let mut ctx = MatchContext {
            zone_id: Some(ZoneId::new(3)),
            country_id: Some(CountryId::new(6)),
            ..MatchContext::default()
        };
        ctx.product_ids.insert(ProductId::new(2));
        ctx.category_ids.insert(CategoryId::new(10));
        assert!(rule_matches(&r, &ctx));

        let mut wrong_zone = ctx.clone();
        wrong_zone.zone_id = Some(ZoneId::new(4));
        assert!(!rule_matches(&r, &wrong_zone));

        let mut unresolved_country = ctx.clone();
        unresolved_country.country_id = None;
        assert!(!rule_matches(&r, &unresolved_country));

        let mut no_product = ctx.clone();
        no_product.product_ids.clear();
        assert!(!rule_matches(&r, &no_product));

        let mut other_category = ctx;
        other_category.category_ids = [CategoryId::new(11)].into_iter().collect();
        assert!(!rule_matches(&r, &other_category));
    }

    #[test]
    fn non_matching_rule_has_no_effect() {
        let r = rule(
            1,
            RuleConditions {
                zone_ids: vec![ZoneId::new(1)],
                ..RuleConditions::default()
            },
            RuleActions {
                deny: ids(&[1]),
                ..RuleActions::default()
            },
        );
        let original = CandidateList::new(ids(&[1, 2]));
        let out = evaluate(&[r], &weight_ctx(1.0), &original);
        assert_eq!(out.candidates, original);
        assert!(out.matched_rules.is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn carrier_vec() -> impl Strategy<Value = Vec<CarrierId>> {
            prop::collection::vec(1u32..12, 0..6)
                .prop_map(|raw| raw.into_iter().map(CarrierId::new).collect())
        }

        fn arb_rule() -> impl Strategy<Value = NormalizedRule> {
            (
                0u32..1000,
                -5i32..5,
                prop::option::of(0.0f64..10.0),
                prop::option::of(0.0f64..10.0),
                carrier_vec(),
                carrier_vec(),
                carrier_vec(),
                carrier_vec(),
            )
                .prop_map(|(id, priority, min, max, allow, deny, add, prefer)| NormalizedRule {
                    id: RuleId::new(id),
                    name: format!("generated-{id}"),
                    priority,
                    conditions: RuleConditions {
                        min_weight: min,
                        max_weight: max,
                        ..RuleConditions::default()
                    },
                    actions: RuleActions {
                        allow,
                        deny,
                        add,
                        prefer,
                    },
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: evaluating the same rules twice yields the same list, order included.
            #[test]
            fn evaluation_is_deterministic(
                rules in prop::collection::vec(arb_rule(), 0..6),
                original in carrier_vec(),
                weight in 0.0f64..12.0,
            ) {
                let original = CandidateList::new(original);
                let ctx = weight_ctx(weight);
                let first = evaluate(&rules, &ctx, &original);
                let second = evaluate(&rules, &ctx, &original);
                prop_assert_eq!(first, second);
            }

            /// Property: a non-empty candidate list never comes out empty.
            #[test]
            fn non_empty_input_never_ends_empty(
                rules in prop::collection::vec(arb_rule(), 0..6),
                original in carrier_vec().prop_filter("non-empty", |v| !v.is_empty()),
                weight in 0.0f64..12.0,
            ) {
                let original = CandidateList::new(original);
                let out = evaluate(&rules, &weight_ctx(weight), &original);
                prop_assert!(!out.candidates.is_empty());
                if out.fallback_applied {
                    prop_assert_eq!(out.candidates, original);
                }
            }

            /// Property: prefer is a permutation of the input.
            #[test]
            fn prefer_is_a_permutation(
                original in carrier_vec(),
                prefer in carrier_vec(),
            ) {
                let mut list = CandidateList::new(original);
                let mut before = list.clone().into_vec();
                list.prefer(&prefer);
                let mut after = list.into_vec();
                before.sort();
                after.sort();
                prop_assert_eq!(before, after);
            }
        }
    }
}
