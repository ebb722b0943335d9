// Fitness evaluation and generation throughput.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use melody_ga::config::EvolutionConfig;
use melody_ga::evolution::{Evolver, GenerationReport};
use melody_ga::operators::{PitchSampler, random_melody};
use melody_ga::scoring::FitnessEvaluator;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;

fn bench_evaluate(c: &mut Criterion) {
    let config = EvolutionConfig::default();
    let evaluator = FitnessEvaluator::from_config(&config);
    let sampler = PitchSampler::from_config(&config);
    let mut rng = StdRng::seed_from_u64(1);
    let melodies: Vec<_> = (0..256)
        .map(|_| random_melody(config.total_steps, &sampler, &mut rng))
        .collect();

    let mut group = c.benchmark_group("evaluate");
    group.throughput(Throughput::Elements(melodies.len() as u64));
    group.bench_function("default_weights", |b| {
        b.iter(|| {
            for m in &melodies {
                black_box(evaluator.evaluate(black_box(m)).ok());
            }
        })
    });
    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    for (label, parallel) in [("serial", false), ("parallel", true)] {
        for population in [100usize, 400] {
            let config = EvolutionConfig {
                population_size: population,
                parallel_evaluation: parallel,
                ..Default::default()
            };
            group.throughput(Throughput::Elements(population as u64));
            group.bench_with_input(BenchmarkId::new(label, population), &config, |b, config| {
                b.iter_batched(
                    || Evolver::new(config.clone(), StdRng::seed_from_u64(7)).ok(),
                    |evolver| {
                        if let Some(mut evolver) = evolver {
                            black_box(evolver.step(&mut |_: &GenerationReport| {}).ok());
                        }
                    },
                    criterion::BatchSize::SmallInput,
                )
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_generation);
criterion_main!(benches);
