//! 规则引擎性能基准测试
//!
//! 测试覆盖：
//! - 逻辑串解析
//! - 两阶段逻辑求值
//! - 表格规则执行

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rule_engine::{ConditionSpec, LogicEvaluator, Rule, RuleContext, TableRule, logic};
use serde_json::json;
use std::hint::black_box;

fn create_context(fields: usize) -> RuleContext {
    let mut ctx = RuleContext::new();
    for i in 0..fields {
        ctx.set(format!("field_{i}"), i as i64);
    }
    ctx
}

fn create_specs(count: usize) -> Vec<ConditionSpec> {
    (0..count)
        .map(|i| ConditionSpec::field(format!("field_{i}.gte"), 0))
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("logic_parse");

    for count in [2, 8, 32] {
        let logic = LogicEvaluator::default_logic(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &logic, |b, logic| {
            b.iter(|| logic::parse(black_box(logic)))
        });
    }

    group.bench_function("nested", |b| {
        b.iter(|| logic::parse(black_box("1 & (2 | ~3) ^ ~(4 & (5 | 6)) | 7")))
    });

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("logic_evaluate");

    for count in [2, 8, 32] {
        let ctx = create_context(count);
        let evaluator = LogicEvaluator::new(None, &create_specs(count)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &ctx, |b, ctx| {
            b.iter(|| evaluator.evaluate(black_box(ctx)))
        });
    }

    group.finish();
}

fn bench_table_rule(c: &mut Criterion) {
    let rule = TableRule::from_json(
        &json!({
            "rules": [
                {"if": ["context.distance > 0"], "then": ["context.distance * 20"], "target": ["fare"]},
                {"if": {"logic": "1 & ~2", "conditions": ["context.distance", {"weekend": 1}]},
                 "then": ["context.fare * 4"], "target": ["fare"]},
                {"if": ["context.day == 'sunday'"], "then": ["context.fare * 1.5"], "target": ["fare"]}
            ]
        })
        .to_string(),
    )
    .unwrap();
    let base = RuleContext::from_json(r#"{"distance": 10, "weekend": 0, "day": "sunday"}"#).unwrap();

    c.bench_function("table_rule_perform", |b| {
        b.iter(|| {
            let mut ctx = base.clone();
            rule.perform(black_box(&mut ctx))
        })
    });
}

criterion_group!(benches, bench_parse, bench_evaluate, bench_table_rule);
criterion_main!(benches);
