// Melody GA
//
// A genetic-algorithm melody generator. A population of fixed-length
// melodies (rests and MIDI pitches on a step grid) evolves against a fixed
// chord progression. Fitness is a weighted ensemble of small rule-based
// heuristics. An adaptive controller raises mutation pressure while the best
// score stalls and resamples the population when it stalls for too long.
//
// Architecture:
// - melody.rs: The melody type (rest/pitch steps) and its validation
// - theory.rs: Scale membership, triads, the per-bar harmony schedule
// - config.rs: Run parameters (serde/JSON) and their validation
// - error.rs: Melody, config and evolution error enums
// - scoring.rs: Heuristic registry, weight table, fitness aggregation
// - operators.rs: Random sampling, uniform crossover, two-strategy mutation
// - evolution.rs: The generational loop with stagnation tracking, mutation
//   escalation, collapse and immigration
// - midi.rs: MIDI file output of the best melody over its backing chords
//
// Runs are deterministic given a seed.

pub mod config;
pub mod error;
pub mod evolution;
pub mod melody;
pub mod midi;
pub mod operators;
pub mod scoring;
pub mod theory;
