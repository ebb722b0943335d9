// Error types for the melody generator.
//
// Three families:
// - `MelodyError`: a malformed individual reached the fitness evaluator.
//   This is a programming error upstream and aborts the run.
// - `ConfigError`: a parameter set that cannot drive a run. Raised by
//   `EvolutionConfig::validate` before generation 0, never mid-loop.
// - `EvolutionError`: what `Evolver` surfaces to its caller.
//
// An all-rest melody is not an error; scoring.rs gives it the disqualified
// fitness instead.

use crate::scoring::Heuristic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MelodyError {
    #[error("melody has {found} steps, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("step {index} holds {value}, which is not a MIDI pitch")]
    PitchOutOfDomain { index: usize, value: u8 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pitch bounds {min}..={max} are invalid (need 1 <= min <= max <= 127)")]
    InvalidPitchBounds { min: u8, max: u8 },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("population of {population} cannot hold {required} individuals (elites + immigrants + one child pair)")]
    PopulationTooSmall { population: usize, required: usize },

    #[error("{name} = {value} is outside [0, 1]")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("tournament size {size} must be between 1 and the population size {population}")]
    InvalidTournamentSize { size: usize, population: usize },

    #[error("collapse keeps {survivors} survivors but the population holds {population}")]
    TooManySurvivors { survivors: usize, population: usize },

    #[error("harmony schedule is empty")]
    EmptyHarmony,

    #[error("backing chord schedule is empty")]
    EmptyBacking,

    #[error("backing chord root {root} leaves no room for its fifth")]
    BackingRootTooHigh { root: u8 },

    #[error("weight table has no heuristics")]
    NoHeuristics,

    #[error("weight {value} for {heuristic:?} must be finite and positive")]
    InvalidWeight { heuristic: Heuristic, value: f64 },

    #[error("stagnation epsilon {0} must be finite and non-negative")]
    InvalidEpsilon(f64),

    #[error("escalation tiers must have strictly increasing thresholds below the collapse threshold {collapse_after}")]
    InvalidEscalation { collapse_after: u32 },

    #[error("{steps_per_beat} steps per beat do not divide the {ticks} MIDI ticks of a beat")]
    StepsPerBeatTicks { steps_per_beat: usize, ticks: u32 },

    #[error("tempo {tempo_bpm} BPM is below the MIDI minimum of {min} BPM")]
    TempoTooSlow { tempo_bpm: u16, min: u16 },

    #[error("comfort range {low}..={high} is inverted")]
    InvalidComfortRange { low: u8, high: u8 },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("individual {index} is corrupt: {source}")]
    CorruptIndividual {
        index: usize,
        #[source]
        source: MelodyError,
    },

    #[error("seed population has {found} melodies, expected {expected}")]
    PopulationSize { expected: usize, found: usize },

    #[error("population is empty")]
    EmptyPopulation,
}
