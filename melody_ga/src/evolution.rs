// The generational loop.
//
// Each generation runs EVALUATE → RANK → ADAPT, then either COLLAPSE or
// REPRODUCE:
//
// - EVALUATE scores every melody (on the rayon pool when
//   `parallel_evaluation` is set). All scores are collected before ranking.
// - RANK sorts by descending fitness. The sort is stable; equal scores keep
//   population order.
// - ADAPT updates `EvolutionState`: an improvement larger than epsilon
//   resets the stagnation counter, anything else increments it. The
//   mutation rate follows the escalation tiers in `StagnationConfig`.
// - COLLAPSE fires once stagnation passes `collapse_after`: the top few
//   survive, the rest is resampled, and the state returns to base. No
//   reproduction happens on a collapse cycle.
// - REPRODUCE builds the next population from distinct elites (padded with
//   random melodies if there are too few), a fixed share of random
//   immigrants, and tournament-selected children (crossover + mutation).
//
// The final generation of a run (budget spent or target reached) is only
// evaluated and ranked; its best melody is the result.
//
// Run state is held per `Evolver`, so independent runs never interfere.
// Progress is reported through `GenerationObserver` once per generation, with
// `log` records for notable events.
//
// Depends on scoring.rs (fitness), operators.rs (sampling, crossover,
// mutation) and config.rs (every size, rate and threshold).

use crate::config::{EvolutionConfig, StagnationConfig};
use crate::error::{ConfigError, EvolutionError};
use crate::melody::Melody;
use crate::operators::{Mutator, PitchSampler, crossover, random_melody};
use crate::scoring::{DISQUALIFIED, FitnessEvaluator};
use log::{debug, info, warn};
use rand::Rng;
use rand::seq::IndexedRandom;
use rayon::prelude::*;
use std::collections::HashSet;

/// An improvement after more stagnant generations than this is reported as
/// a breakthrough.
const BREAKTHROUGH_STREAK: u32 = 5;

/// A melody paired with its fitness.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMelody {
    pub melody: Melody,
    pub fitness: f64,
}

/// Per-run adaptive state, carried across generations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionState {
    /// Generations completed so far.
    pub generation: usize,
    /// Generations since the last improvement.
    pub stagnation_counter: u32,
    pub last_best_score: f64,
    pub current_mutation_rate: f64,
}

impl EvolutionState {
    pub fn new(base_rate: f64) -> Self {
        EvolutionState {
            generation: 0,
            stagnation_counter: 0,
            last_best_score: DISQUALIFIED,
            current_mutation_rate: base_rate,
        }
    }

    /// Fold in this generation's best score. Returns whether it counted as
    /// an improvement.
    pub fn adapt(&mut self, best: f64, stagnation: &StagnationConfig, base_rate: f64) -> bool {
        // NaN (both scores disqualified) compares false, which counts as no
        // improvement.
        let improved = best - self.last_best_score > stagnation.epsilon;
        if improved {
            self.stagnation_counter = 0;
            self.last_best_score = best;
        } else {
            self.stagnation_counter += 1;
        }
        self.current_mutation_rate = stagnation.rate_for(self.stagnation_counter, base_rate);
        improved
    }

    /// Back to base after a collapse. The best score is kept: the survivors
    /// still hold it.
    pub fn reset_after_collapse(&mut self, base_rate: f64) {
        self.stagnation_counter = 0;
        self.current_mutation_rate = base_rate;
    }
}

/// What a generation did after ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// A new population was bred.
    Reproduced,
    /// Stagnation passed the collapse threshold; the population was resampled
    /// around a few survivors.
    Collapsed,
    /// The run ends here; the population was left as ranked.
    Final,
}

/// Per-generation summary handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub generation: usize,
    pub best_score: f64,
    /// Mean over melodies that were not disqualified.
    pub mean_score: f64,
    pub stagnation_counter: u32,
    /// Rate used to mutate this generation's children.
    pub mutation_rate: f64,
    pub improved: bool,
    pub breakthrough: bool,
    pub target_reached: bool,
    pub outcome: GenerationOutcome,
}

/// Receives one report per generation.
pub trait GenerationObserver {
    fn on_generation(&mut self, report: &GenerationReport);
}

impl<F: FnMut(&GenerationReport)> GenerationObserver for F {
    fn on_generation(&mut self, report: &GenerationReport) {
        self(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    TargetReached,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub best: ScoredMelody,
    pub generations_run: usize,
    pub stop_reason: StopReason,
    pub collapses: usize,
}

/// The evolution controller.
pub struct Evolver<R: Rng> {
    config: EvolutionConfig,
    evaluator: FitnessEvaluator,
    sampler: PitchSampler,
    mutator: Mutator,
    state: EvolutionState,
    population: Vec<Melody>,
    champion: Option<ScoredMelody>,
    collapses: usize,
    rng: R,
}

impl<R: Rng> Evolver<R> {
    /// Validate `config` and sample the initial population.
    pub fn new(config: EvolutionConfig, mut rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let sampler = PitchSampler::from_config(&config);
        let population = (0..config.population_size)
            .map(|_| random_melody(config.total_steps, &sampler, &mut rng))
            .collect();
        Ok(Self::assemble(config, population, rng))
    }

    /// Start from a given population instead of a random one.
    pub fn with_population(
        config: EvolutionConfig,
        population: Vec<Melody>,
        rng: R,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        if population.len() != config.population_size {
            return Err(EvolutionError::PopulationSize {
                expected: config.population_size,
                found: population.len(),
            });
        }
        Ok(Self::assemble(config, population, rng))
    }

    fn assemble(config: EvolutionConfig, population: Vec<Melody>, rng: R) -> Self {
        Evolver {
            evaluator: FitnessEvaluator::from_config(&config),
            sampler: PitchSampler::from_config(&config),
            mutator: Mutator::from_config(&config),
            state: EvolutionState::new(config.base_mutation_rate),
            population,
            champion: None,
            collapses: 0,
            config,
            rng,
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    pub fn state(&self) -> &EvolutionState {
        &self.state
    }

    pub fn population(&self) -> &[Melody] {
        &self.population
    }

    /// Best melody of the most recent ranking.
    pub fn best(&self) -> Option<&ScoredMelody> {
        self.champion.as_ref()
    }

    pub fn collapses(&self) -> usize {
        self.collapses
    }

    /// Run one generation and breed (or collapse) into the next.
    pub fn step(
        &mut self,
        observer: &mut impl GenerationObserver,
    ) -> Result<GenerationReport, EvolutionError> {
        self.advance(false, observer).map(|(report, _)| report)
    }

    /// Run until the generation budget is spent or the target score is hit.
    pub fn run(
        &mut self,
        observer: &mut impl GenerationObserver,
    ) -> Result<EvolutionOutcome, EvolutionError> {
        let budget = self.config.generations;
        info!(
            "evolving {} melodies of {} steps for up to {} generations",
            self.config.population_size, self.config.total_steps, budget
        );
        let mut generations_run = 0;
        loop {
            generations_run += 1;
            let (report, ranked) = self.advance(generations_run >= budget, observer)?;
            if report.outcome != GenerationOutcome::Final {
                continue;
            }
            let best = ranked
                .into_iter()
                .next()
                .ok_or(EvolutionError::EmptyPopulation)?;
            let stop_reason = if report.target_reached {
                StopReason::TargetReached
            } else {
                StopReason::BudgetExhausted
            };
            info!(
                "finished after {} generations ({:?}), best fitness {:.2}, {} collapses",
                generations_run, stop_reason, best.fitness, self.collapses
            );
            return Ok(EvolutionOutcome {
                best,
                generations_run,
                stop_reason,
                collapses: self.collapses,
            });
        }
    }

    /// Score every melody. Fails on the first malformed one.
    pub fn evaluate_population(&self) -> Result<Vec<f64>, EvolutionError> {
        let evaluator = &self.evaluator;
        let score = |(index, melody): (usize, &Melody)| {
            evaluator
                .evaluate(melody)
                .map_err(|source| EvolutionError::CorruptIndividual { index, source })
        };
        if self.config.parallel_evaluation {
            self.population.par_iter().enumerate().map(score).collect()
        } else {
            self.population.iter().enumerate().map(score).collect()
        }
    }

    /// The current population, scored and sorted best-first.
    pub fn rank_population(&self) -> Result<Vec<ScoredMelody>, EvolutionError> {
        let scores = self.evaluate_population()?;
        let mut ranked: Vec<ScoredMelody> = self
            .population
            .iter()
            .cloned()
            .zip(scores)
            .map(|(melody, fitness)| ScoredMelody { melody, fitness })
            .collect();
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        Ok(ranked)
    }

    fn advance(
        &mut self,
        finishing: bool,
        observer: &mut impl GenerationObserver,
    ) -> Result<(GenerationReport, Vec<ScoredMelody>), EvolutionError> {
        let ranked = self.rank_population()?;
        let best_score = ranked.first().map_or(DISQUALIFIED, |s| s.fitness);
        self.champion = ranked.first().cloned();

        let prior_streak = self.state.stagnation_counter;
        let improved = self.state.adapt(
            best_score,
            &self.config.stagnation,
            self.config.base_mutation_rate,
        );
        let breakthrough = improved && prior_streak > BREAKTHROUGH_STREAK;
        if breakthrough {
            info!(
                "generation {}: broke a {}-generation plateau, best now {:.2}",
                self.state.generation, prior_streak, best_score
            );
        }

        let target_reached = self
            .config
            .target_score
            .is_some_and(|target| best_score >= target);
        let stagnation_counter = self.state.stagnation_counter;
        let mutation_rate = self.state.current_mutation_rate;

        let outcome = if finishing || target_reached {
            GenerationOutcome::Final
        } else if stagnation_counter > self.config.stagnation.collapse_after {
            self.collapse(&ranked);
            GenerationOutcome::Collapsed
        } else {
            self.reproduce(&ranked);
            GenerationOutcome::Reproduced
        };

        let report = GenerationReport {
            generation: self.state.generation,
            best_score,
            mean_score: mean_score(&ranked),
            stagnation_counter,
            mutation_rate,
            improved,
            breakthrough,
            target_reached,
            outcome,
        };
        debug!(
            "generation {}: best {:.2}, mean {:.2}, stagnation {}, mutation rate {:.2}, {:?}",
            report.generation,
            report.best_score,
            report.mean_score,
            report.stagnation_counter,
            report.mutation_rate,
            report.outcome
        );
        self.state.generation += 1;
        observer.on_generation(&report);
        Ok((report, ranked))
    }

    /// Keep the top survivors and resample everything else.
    fn collapse(&mut self, ranked: &[ScoredMelody]) {
        let size = self.config.population_size;
        let survivors = self.config.stagnation.collapse_survivors.min(ranked.len());
        let mut next: Vec<Melody> = ranked[..survivors]
            .iter()
            .map(|s| s.melody.clone())
            .collect();
        while next.len() < size {
            next.push(random_melody(self.config.total_steps, &self.sampler, &mut self.rng));
        }
        info!(
            "generation {}: no improvement for {} generations, collapsing to {} survivors",
            self.state.generation, self.state.stagnation_counter, survivors
        );
        self.population = next;
        self.state.reset_after_collapse(self.config.base_mutation_rate);
        self.collapses += 1;
    }

    /// Distinct elites, then immigrants, then tournament offspring.
    fn reproduce(&mut self, ranked: &[ScoredMelody]) {
        let size = self.config.population_size;
        let elitism = self.config.elitism_count;
        let len = self.config.total_steps;
        let mut next: Vec<Melody> = Vec::with_capacity(size);

        let mut seen: HashSet<&Melody> = HashSet::with_capacity(elitism);
        for scored in ranked {
            if next.len() >= elitism {
                break;
            }
            if seen.insert(&scored.melody) {
                next.push(scored.melody.clone());
            }
        }
        if next.len() < elitism {
            warn!(
                "generation {}: only {} distinct elites, padding with random melodies",
                self.state.generation,
                next.len()
            );
            while next.len() < elitism {
                next.push(random_melody(len, &self.sampler, &mut self.rng));
            }
        }

        for _ in 0..self.config.immigrant_count() {
            next.push(random_melody(len, &self.sampler, &mut self.rng));
        }

        let tournament_size = self.config.selection.tournament_size;
        let rate = self.state.current_mutation_rate;
        while next.len() < size {
            let a = tournament(ranked, tournament_size, &mut self.rng);
            let b = tournament(ranked, tournament_size, &mut self.rng);
            let (c1, c2) = crossover(a, b, &mut self.rng);
            next.push(self.mutator.mutate(&c1, rate, &mut self.rng));
            if next.len() < size {
                next.push(self.mutator.mutate(&c2, rate, &mut self.rng));
            }
        }

        self.population = next;
    }
}

/// Fittest of `size` distinct individuals drawn at random.
fn tournament<'a>(ranked: &'a [ScoredMelody], size: usize, rng: &mut impl Rng) -> &'a Melody {
    ranked
        .choose_multiple(rng, size)
        .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
        .map_or(&ranked[0].melody, |s| &s.melody)
}

fn mean_score(ranked: &[ScoredMelody]) -> f64 {
    let (sum, count) = ranked
        .iter()
        .filter(|s| s.fitness.is_finite())
        .fold((0.0, 0usize), |(sum, count), s| (sum + s.fitness, count + 1));
    if count == 0 {
        DISQUALIFIED
    } else {
        sum / count as f64
    }
}
