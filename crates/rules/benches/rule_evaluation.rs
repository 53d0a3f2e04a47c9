use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use forgeship_core::{CarrierId, CategoryId, ProductId, RuleId};
use forgeship_rules::{
    CandidateList, MatchContext, NormalizedRule, PackageLine, RuleActions, RuleConditions, evaluate,
};

fn build_rules(count: u32) -> Vec<NormalizedRule> {
    (0..count)
        .map(|i| NormalizedRule {
            id: RuleId::new(i),
            name: format!("bench-{i}"),
            priority: i as i32,
            conditions: RuleConditions {
                category_ids: vec![CategoryId::new(i % 7)],
                max_weight: Some(f64::from(i % 30) + 1.0),
                ..RuleConditions::default()
            },
            actions: RuleActions {
                deny: vec![CarrierId::new(i % 11)],
                add: vec![CarrierId::new((i + 3) % 11)],
                prefer: vec![CarrierId::new((i + 5) % 11)],
                ..RuleActions::default()
            },
        })
        .collect()
}

fn build_context() -> MatchContext {
    let lines: Vec<PackageLine> = (0..20)
        .map(|i| PackageLine {
            product_id: ProductId::new(i),
            default_category_id: Some(CategoryId::new(i % 7)),
            weight: 0.25,
            quantity: 2,
        })
        .collect();
    MatchContext::from_lines(&lines, None, None)
}

fn bench_rule_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_evaluation");
    let ctx = build_context();
    let candidates = CandidateList::new((1..=10).map(CarrierId::new));

    for size in [10u32, 100, 1_000] {
        let rules = build_rules(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &rules, |b, rules| {
            b.iter(|| evaluate(black_box(rules), black_box(&ctx), black_box(&candidates)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rule_evaluation);
criterion_main!(benches);
