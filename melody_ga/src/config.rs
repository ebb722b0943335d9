// Run configuration for the melody generator.
//
// Every tunable parameter lives in `EvolutionConfig`, loaded from JSON or
// taken from `Default`. The evolution loop reads sizes, rates and thresholds
// from here and never uses magic numbers of its own. Fields missing from a
// JSON file fall back to their defaults, so a config file only needs to list
// what it changes.
//
// Parameters are grouped:
// - top level: population/generation budget, pitch bounds, meter, harmony
//   and backing schedules, output tempo
// - `SelectionConfig`: tournament size and immigration share
// - `StagnationConfig`: improvement epsilon, mutation-rate escalation tiers,
//   collapse threshold and survivor count
// - `MutationConfig`: the disruptive/local strategy split and shift size
// - `ScoringConfig`: comfort range, climax register and the weight table
//
// `validate` rejects unusable parameter sets up front so the loop itself
// never has to fail on configuration.
//
// See also: scoring.rs (`ScoringWeights`), evolution.rs (the consumer).

use crate::error::ConfigError;
use crate::melody::MAX_MIDI_PITCH;
use crate::midi::check_timing;
use crate::scoring::ScoringWeights;
use crate::theory::{Chord, pop_progression};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parent selection and diversity injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Individuals drawn per tournament; the fittest becomes a parent.
    pub tournament_size: usize,
    /// Share of each new generation filled with fresh random melodies.
    pub immigration_fraction: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            tournament_size: 2,
            immigration_fraction: 0.05,
        }
    }
}

impl SelectionConfig {
    /// Immigrants per generation for a population of `population_size`.
    /// Any non-zero fraction yields at least one.
    pub fn immigrant_count(&self, population_size: usize) -> usize {
        let count = (population_size as f64 * self.immigration_fraction).round() as usize;
        if self.immigration_fraction > 0.0 {
            count.max(1)
        } else {
            count
        }
    }
}

/// Once the stagnation counter exceeds `after`, mutate at `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationTier {
    pub after: u32,
    pub rate: f64,
}

/// Stagnation detection and the responses to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagnationConfig {
    /// A new best must beat the previous best by more than this to count as
    /// an improvement.
    pub epsilon: f64,
    /// Mutation-rate tiers, ordered by strictly increasing `after`.
    pub escalation: Vec<EscalationTier>,
    /// Collapse the population once stagnation exceeds this many generations.
    pub collapse_after: u32,
    /// Elites kept through a collapse.
    pub collapse_survivors: usize,
}

impl Default for StagnationConfig {
    fn default() -> Self {
        StagnationConfig {
            epsilon: 1e-6,
            escalation: vec![
                EscalationTier { after: 10, rate: 0.1 },
                EscalationTier { after: 20, rate: 0.2 },
            ],
            collapse_after: 50,
            collapse_survivors: 5,
        }
    }
}

impl StagnationConfig {
    /// Mutation rate for the given stagnation count: the highest tier that
    /// has been passed, or `base_rate` if none has.
    pub fn rate_for(&self, stagnation: u32, base_rate: f64) -> f64 {
        self.escalation
            .iter()
            .rev()
            .find(|tier| stagnation > tier.after)
            .map_or(base_rate, |tier| tier.rate)
    }
}

/// Per-position mutation strategy mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Probability that a mutating position is reset (rest or fresh pitch)
    /// rather than nudged.
    pub disruptive_share: f64,
    /// Largest semitone shift of a local nudge.
    pub max_shift: u8,
}

impl Default for MutationConfig {
    fn default() -> Self {
        MutationConfig {
            disruptive_share: 0.3,
            max_shift: 2,
        }
    }
}

/// Fitness parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub comfort_low: u8,
    pub comfort_high: u8,
    /// Climax register starts this many semitones below `comfort_high`.
    pub high_register_offset: u8,
    pub weights: ScoringWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            comfort_low: 60,
            comfort_high: 84,
            high_register_offset: 5,
            weights: ScoringWeights::default(),
        }
    }
}

/// The full parameter set for one run. Read-only for the run's duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Distinct top-ranked melodies carried unchanged into each generation.
    pub elitism_count: usize,
    pub base_mutation_rate: f64,
    /// Chance that a sampled step is a rest.
    pub rest_probability: f64,
    /// Inclusive pitch bounds for sampling and mutation.
    pub pitch_min: u8,
    pub pitch_max: u8,
    pub beats_per_bar: usize,
    pub steps_per_beat: usize,
    /// Melody length in steps.
    pub total_steps: usize,
    /// Chord per bar, used for scoring.
    pub harmony: Vec<Chord>,
    /// MIDI roots of the backing chords, one per `chord_duration_beats`.
    pub backing_roots: Vec<u8>,
    pub chord_duration_beats: u32,
    pub tempo_bpm: u16,
    pub selection: SelectionConfig,
    pub stagnation: StagnationConfig,
    pub mutation: MutationConfig,
    pub scoring: ScoringConfig,
    /// Stop as soon as the best fitness reaches this value.
    pub target_score: Option<f64>,
    /// Score each generation on the rayon thread pool.
    pub parallel_evaluation: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            population_size: 200,
            generations: 500,
            elitism_count: 10,
            base_mutation_rate: 0.05,
            rest_probability: 0.15,
            pitch_min: 60,
            pitch_max: 84,
            beats_per_bar: 4,
            steps_per_beat: 4,
            total_steps: 64,
            harmony: pop_progression(),
            // C3, G2, A2, F2
            backing_roots: vec![48, 43, 45, 41],
            chord_duration_beats: 4,
            tempo_bpm: 120,
            selection: SelectionConfig::default(),
            stagnation: StagnationConfig::default(),
            mutation: MutationConfig::default(),
            scoring: ScoringConfig::default(),
            target_score: None,
            parallel_evaluation: false,
        }
    }
}

impl EvolutionConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parse and validate a JSON config string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EvolutionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn steps_per_bar(&self) -> usize {
        self.beats_per_bar * self.steps_per_beat
    }

    pub fn immigrant_count(&self) -> usize {
        self.selection.immigrant_count(self.population_size)
    }

    /// Check every invariant the evolution loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pitch_min == 0 || self.pitch_min > self.pitch_max || self.pitch_max > MAX_MIDI_PITCH {
            return Err(ConfigError::InvalidPitchBounds {
                min: self.pitch_min,
                max: self.pitch_max,
            });
        }

        for (name, value) in [
            ("total_steps", self.total_steps),
            ("steps_per_beat", self.steps_per_beat),
            ("beats_per_bar", self.beats_per_bar),
            ("population_size", self.population_size),
            ("generations", self.generations),
            ("tournament_size", self.selection.tournament_size),
            ("collapse_survivors", self.stagnation.collapse_survivors),
            ("max_shift", self.mutation.max_shift as usize),
            ("chord_duration_beats", self.chord_duration_beats as usize),
            ("tempo_bpm", self.tempo_bpm as usize),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }

        let required = self.elitism_count + self.immigrant_count() + 2;
        if self.population_size < required {
            return Err(ConfigError::PopulationTooSmall {
                population: self.population_size,
                required,
            });
        }

        let mut probabilities = vec![
            ("base_mutation_rate", self.base_mutation_rate),
            ("rest_probability", self.rest_probability),
            ("immigration_fraction", self.selection.immigration_fraction),
            ("disruptive_share", self.mutation.disruptive_share),
        ];
        probabilities.extend(
            self.stagnation
                .escalation
                .iter()
                .map(|tier| ("escalation rate", tier.rate)),
        );
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value });
            }
        }

        if self.selection.tournament_size > self.population_size {
            return Err(ConfigError::InvalidTournamentSize {
                size: self.selection.tournament_size,
                population: self.population_size,
            });
        }

        if self.stagnation.collapse_survivors > self.population_size {
            return Err(ConfigError::TooManySurvivors {
                survivors: self.stagnation.collapse_survivors,
                population: self.population_size,
            });
        }

        if !self.stagnation.epsilon.is_finite() || self.stagnation.epsilon < 0.0 {
            return Err(ConfigError::InvalidEpsilon(self.stagnation.epsilon));
        }

        let collapse_after = self.stagnation.collapse_after;
        let increasing = self
            .stagnation
            .escalation
            .windows(2)
            .all(|w| w[0].after < w[1].after);
        let below_collapse = self
            .stagnation
            .escalation
            .iter()
            .all(|tier| tier.after < collapse_after);
        if !increasing || !below_collapse {
            return Err(ConfigError::InvalidEscalation { collapse_after });
        }

        if self.harmony.is_empty() {
            return Err(ConfigError::EmptyHarmony);
        }
        if self.backing_roots.is_empty() {
            return Err(ConfigError::EmptyBacking);
        }
        if let Some(&root) = self.backing_roots.iter().find(|&&r| r > MAX_MIDI_PITCH - 7) {
            return Err(ConfigError::BackingRootTooHigh { root });
        }

        check_timing(self.steps_per_beat, self.tempo_bpm)?;

        if self.scoring.comfort_low > self.scoring.comfort_high {
            return Err(ConfigError::InvalidComfortRange {
                low: self.scoring.comfort_low,
                high: self.scoring.comfort_high,
            });
        }
        if self.scoring.weights.is_empty() {
            return Err(ConfigError::NoHeuristics);
        }
        if let Some((heuristic, value)) = self
            .scoring
            .weights
            .iter()
            .find(|&(_, w)| !w.is_finite() || w <= 0.0)
        {
            return Err(ConfigError::InvalidWeight { heuristic, value });
        }

        Ok(())
    }
}
