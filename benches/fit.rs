//! Benchmark for the random-intercept model fit and a full evaluation batch.
//!
//! Run with:
//! ```bash
//! cargo bench --bench fit
//!
//! # single-threaded evaluation
//! cargo bench --bench fit --no-default-features
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mixedpower::evaluation::CONDITION_TERM;
use mixedpower::sampling::{HierarchicalSampler, LongRow, SamplingDesign};
use mixedpower::{Config, FitMethod, MixedModel, SignificanceEvaluator, VarianceParameters, WaldReference};

fn sampler(groups: usize) -> HierarchicalSampler {
    let design = SamplingDesign::new(4, groups, 1.0).expect("valid design");
    let variances = VarianceParameters::from_std(1.0, 2.0).expect("valid variances");
    HierarchicalSampler::new(design, variances)
}

fn bench_single_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_fit");
    for groups in [15, 60, 240] {
        let data = sampler(groups).sample(1, 1);
        let mut rows: Vec<LongRow> = data.experiment_rows(0).collect();
        mixedpower::evaluation::relabel_groups(&mut rows);
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        let condition: Vec<f64> = rows.iter().map(|r| r.condition as f64).collect();
        let ids: Vec<usize> = rows.iter().map(|r| r.group).collect();

        group.bench_with_input(BenchmarkId::from_parameter(groups), &groups, |b, _| {
            b.iter(|| {
                let model = MixedModel::with_predictor(&values, &condition, CONDITION_TERM, &ids)
                    .expect("model");
                black_box(model.fit(FitMethod::Reml, WaldReference::Normal))
            })
        });
    }
    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let config = Config::new().with_experiments(100).with_seed(1);
    let evaluator = SignificanceEvaluator::new(&config);
    let data = sampler(60).sample(100, 1);

    c.bench_function("evaluate_100_experiments", |b| {
        b.iter(|| black_box(evaluator.evaluate(&data)))
    });
}

criterion_group!(benches, bench_single_fit, bench_evaluation);
criterion_main!(benches);
