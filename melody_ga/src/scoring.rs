// Fitness: a weighted ensemble of independent melodic heuristics.
//
// Each heuristic is a pure function `(&Melody, &ScoringContext) -> f64`
// covering one musical concern:
//
// - Chord fit: on-beat notes should be chord tones, everything should stay
//   in the scale. On-beat chromatic notes carry a penalty large enough to
//   dominate the total.
// - Interval smoothness: steps beat skips, skips beat leaps.
// - Repetition: long runs of one pitch are dull.
// - Cadence: the last step should land on the tonic.
// - Leap compensation: after a leap, turn around (or hold).
// - Melodic inertia: small motions should keep their direction rather than
//   wobble back and forth.
// - Range control: stay inside the comfortable register.
// - Rhythm density: leave some room to breathe, but not too much.
// - Climax control: a few high notes make a peak; too many flatten it.
//
// `Heuristic` is the registry of these functions and `ScoringWeights` the
// weight table. The aggregator (`FitnessEvaluator`) walks the table in a
// fixed order, so adding or dropping a heuristic is a table edit, not a
// code change. An all-rest melody bypasses every heuristic and scores
// `DISQUALIFIED`.
//
// Consumed by evolution.rs, which ranks each generation by these scores.

use crate::config::EvolutionConfig;
use crate::error::MelodyError;
use crate::melody::{Melody, REST};
use crate::theory::{DOMINANT_PC, HarmonySchedule, MEDIANT_PC, TONIC_PC, in_scale, pitch_class};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fitness of a melody that never sounds. Lower than any finite aggregate,
/// so it loses every comparison against a melody with at least one note.
pub const DISQUALIFIED: f64 = f64::NEG_INFINITY;

// Chord fit.
const ON_BEAT_CHORD_TONE: f64 = 10.0;
const ON_BEAT_SCALE_TONE: f64 = 2.0;
const ON_BEAT_OUT_OF_SCALE: f64 = -50.0;
const OFF_BEAT_CHORD_TONE: f64 = 6.0;
const OFF_BEAT_SCALE_TONE: f64 = 4.0;
const OFF_BEAT_OUT_OF_SCALE: f64 = -5.0;

// Interval smoothness.
const STEP_REWARD: f64 = 5.0;
const SKIP_REWARD: f64 = 3.0;
const LEAP_PENALTY: f64 = -5.0;
const WIDE_LEAP_PENALTY: f64 = -20.0;

// Repetition.
const MAX_REPEATED_RUN: usize = 3;
const REPETITION_PENALTY: f64 = -5.0;

// Cadence.
const CADENCE_TONIC: f64 = 20.0;
const CADENCE_STABLE: f64 = 5.0;
const CADENCE_UNRESOLVED: f64 = -10.0;
const CADENCE_ON_REST: f64 = -10.0;

// Leap compensation.
const LEAP_THRESHOLD: u8 = 5;
const LEAP_COMPENSATION: f64 = 10.0;

// Melodic inertia.
const INERTIA_MAX_INTERVAL: u8 = 4;
const INERTIA_REWARD: f64 = 10.0;
const WOBBLE_PENALTY: f64 = -4.0;

// Range control.
const OUT_OF_RANGE_PENALTY: f64 = -2.0;

// Rhythm density.
const DENSITY_REWARD: f64 = 10.0;
const DENSITY_PENALTY: f64 = -10.0;

// Climax control.
const CLIMAX_REWARD: f64 = 10.0;
const CLIMAX_EXCESS_PENALTY: f64 = -10.0;
const CLIMAX_ABSENT_PENALTY: f64 = -5.0;

/// Read-only musical context shared by every heuristic.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub harmony: HarmonySchedule,
    /// Steps per beat; a step is on-beat when `step % steps_per_beat == 0`.
    /// Zero is read as one (every step on-beat).
    pub steps_per_beat: usize,
    /// Comfortable register, inclusive on both ends.
    pub comfort_low: u8,
    pub comfort_high: u8,
    /// Notes strictly above `comfort_high - high_register_offset` count as
    /// high-register notes for climax control.
    pub high_register_offset: u8,
}

impl ScoringContext {
    pub fn from_config(config: &EvolutionConfig) -> Self {
        ScoringContext {
            harmony: HarmonySchedule::new(&config.harmony, config.steps_per_bar()),
            steps_per_beat: config.steps_per_beat,
            comfort_low: config.scoring.comfort_low,
            comfort_high: config.scoring.comfort_high,
            high_register_offset: config.scoring.high_register_offset,
        }
    }

    fn high_register_threshold(&self) -> u8 {
        self.comfort_high.saturating_sub(self.high_register_offset)
    }
}

/// Signature shared by all heuristics.
pub type ScorerFn = fn(&Melody, &ScoringContext) -> f64;

/// The registry of heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    ChordFit,
    IntervalSmoothness,
    Repetition,
    Cadence,
    LeapCompensation,
    MelodicInertia,
    RangeControl,
    RhythmDensity,
    ClimaxControl,
}

impl Heuristic {
    pub const ALL: [Heuristic; 9] = [
        Heuristic::ChordFit,
        Heuristic::IntervalSmoothness,
        Heuristic::Repetition,
        Heuristic::Cadence,
        Heuristic::LeapCompensation,
        Heuristic::MelodicInertia,
        Heuristic::RangeControl,
        Heuristic::RhythmDensity,
        Heuristic::ClimaxControl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Heuristic::ChordFit => "chord fit",
            Heuristic::IntervalSmoothness => "interval smoothness",
            Heuristic::Repetition => "repetition",
            Heuristic::Cadence => "cadence",
            Heuristic::LeapCompensation => "leap compensation",
            Heuristic::MelodicInertia => "melodic inertia",
            Heuristic::RangeControl => "range control",
            Heuristic::RhythmDensity => "rhythm density",
            Heuristic::ClimaxControl => "climax control",
        }
    }

    pub fn scorer(self) -> ScorerFn {
        match self {
            Heuristic::ChordFit => score_chord_fit,
            Heuristic::IntervalSmoothness => score_intervals,
            Heuristic::Repetition => score_repetition,
            Heuristic::Cadence => score_cadence,
            Heuristic::LeapCompensation => score_leap_compensation,
            Heuristic::MelodicInertia => score_melodic_inertia,
            Heuristic::RangeControl => score_range,
            Heuristic::RhythmDensity => score_rhythm_density,
            Heuristic::ClimaxControl => score_climax,
        }
    }

    pub fn score(self, melody: &Melody, ctx: &ScoringContext) -> f64 {
        (self.scorer())(melody, ctx)
    }
}

/// Weight table. Heuristics missing from the table are not evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringWeights(BTreeMap<Heuristic, f64>);

impl ScoringWeights {
    pub fn new(weights: impl IntoIterator<Item = (Heuristic, f64)>) -> Self {
        ScoringWeights(weights.into_iter().collect())
    }

    /// The eight-heuristic table: chord fit and inertia lead, with a strong
    /// cadence term and light range/repetition terms.
    pub fn classic() -> Self {
        ScoringWeights::new([
            (Heuristic::ChordFit, 3.0),
            (Heuristic::IntervalSmoothness, 1.2),
            (Heuristic::Repetition, 0.5),
            (Heuristic::Cadence, 2.0),
            (Heuristic::LeapCompensation, 1.5),
            (Heuristic::MelodicInertia, 3.0),
            (Heuristic::RangeControl, 0.5),
            (Heuristic::RhythmDensity, 0.8),
        ])
    }

    /// Adds climax control and leans harder on rhythm density.
    pub fn with_climax() -> Self {
        ScoringWeights::new([
            (Heuristic::ChordFit, 3.0),
            (Heuristic::IntervalSmoothness, 1.0),
            (Heuristic::Repetition, 0.5),
            (Heuristic::Cadence, 2.0),
            (Heuristic::LeapCompensation, 1.5),
            (Heuristic::MelodicInertia, 3.0),
            (Heuristic::RangeControl, 0.5),
            (Heuristic::RhythmDensity, 2.5),
            (Heuristic::ClimaxControl, 1.2),
        ])
    }

    pub fn get(&self, heuristic: Heuristic) -> Option<f64> {
        self.0.get(&heuristic).copied()
    }

    pub fn set(&mut self, heuristic: Heuristic, weight: f64) {
        self.0.insert(heuristic, weight);
    }

    pub fn remove(&mut self, heuristic: Heuristic) -> Option<f64> {
        self.0.remove(&heuristic)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (Heuristic, f64)> + '_ {
        self.0.iter().map(|(&h, &w)| (h, w))
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights::with_climax()
    }
}

/// One heuristic's share of a fitness value.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicScore {
    pub heuristic: Heuristic,
    pub raw: f64,
    pub weight: f64,
    pub weighted: f64,
}

/// Per-heuristic view of a fitness value.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessBreakdown {
    pub components: Vec<HeuristicScore>,
    pub total: f64,
    pub disqualified: bool,
}

/// The fitness aggregator. Pure: holds only read-only context and weights.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    context: ScoringContext,
    weights: ScoringWeights,
    melody_len: usize,
}

impl FitnessEvaluator {
    pub fn new(context: ScoringContext, weights: ScoringWeights, melody_len: usize) -> Self {
        FitnessEvaluator {
            context,
            weights,
            melody_len,
        }
    }

    pub fn from_config(config: &EvolutionConfig) -> Self {
        FitnessEvaluator::new(
            ScoringContext::from_config(config),
            config.scoring.weights.clone(),
            config.total_steps,
        )
    }

    pub fn context(&self) -> &ScoringContext {
        &self.context
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Total fitness of a melody.
    pub fn evaluate(&self, melody: &Melody) -> Result<f64, MelodyError> {
        melody.validate(self.melody_len)?;
        if melody.is_silent() {
            return Ok(DISQUALIFIED);
        }
        Ok(self
            .weights
            .iter()
            .map(|(h, w)| w * h.score(melody, &self.context))
            .sum::<f64>())
    }

    /// Fitness with each heuristic's contribution listed.
    pub fn breakdown(&self, melody: &Melody) -> Result<FitnessBreakdown, MelodyError> {
        melody.validate(self.melody_len)?;
        if melody.is_silent() {
            return Ok(FitnessBreakdown {
                components: Vec::new(),
                total: DISQUALIFIED,
                disqualified: true,
            });
        }
        let components: Vec<HeuristicScore> = self
            .weights
            .iter()
            .map(|(heuristic, weight)| {
                let raw = heuristic.score(melody, &self.context);
                HeuristicScore {
                    heuristic,
                    raw,
                    weight,
                    weighted: weight * raw,
                }
            })
            .collect();
        let total: f64 = components.iter().map(|c| c.weighted).sum();
        Ok(FitnessBreakdown {
            components,
            total,
            disqualified: false,
        })
    }
}

// ── Heuristics ──

/// Chord and scale membership, weighted by metric position.
pub fn score_chord_fit(melody: &Melody, ctx: &ScoringContext) -> f64 {
    let steps_per_beat = ctx.steps_per_beat.max(1);
    let mut score = 0.0;
    for (step, &pitch) in melody.steps().iter().enumerate() {
        if pitch == REST {
            continue;
        }
        let on_beat = step % steps_per_beat == 0;
        let chord_tone = ctx.harmony.is_chord_tone(step, pitch);
        let scale_tone = in_scale(pitch);

        score += match (on_beat, chord_tone, scale_tone) {
            (true, true, _) => ON_BEAT_CHORD_TONE,
            (true, false, true) => ON_BEAT_SCALE_TONE,
            (true, false, false) => ON_BEAT_OUT_OF_SCALE,
            (false, true, _) => OFF_BEAT_CHORD_TONE,
            (false, false, true) => OFF_BEAT_SCALE_TONE,
            (false, false, false) => OFF_BEAT_OUT_OF_SCALE,
        };
    }
    score
}

/// Interval sizes between consecutive sounding notes.
pub fn score_intervals(melody: &Melody, _ctx: &ScoringContext) -> f64 {
    let pitches = melody.sounding_pitches();
    if pitches.len() < 2 {
        return 0.0;
    }
    pitches
        .windows(2)
        .map(|w| match w[0].abs_diff(w[1]) {
            0..=2 => STEP_REWARD,
            3..=4 => SKIP_REWARD,
            5..=7 => 0.0,
            8..=12 => LEAP_PENALTY,
            _ => WIDE_LEAP_PENALTY,
        })
        .sum()
}

/// Penalize every step of a run of more than `MAX_REPEATED_RUN` identical
/// sounding pitches. A rest or a change of pitch ends the run.
pub fn score_repetition(melody: &Melody, _ctx: &ScoringContext) -> f64 {
    let mut score = 0.0;
    let mut run = 0usize;
    let mut prev = REST;
    for &step in melody.steps() {
        if step == REST {
            run = 0;
        } else if step == prev {
            run += 1;
        } else {
            run = 1;
        }
        prev = step;
        if run > MAX_REPEATED_RUN {
            score += REPETITION_PENALTY;
        }
    }
    score
}

/// How the last step resolves.
pub fn score_cadence(melody: &Melody, _ctx: &ScoringContext) -> f64 {
    let Some(last) = melody.last() else {
        return 0.0;
    };
    if last == REST {
        return CADENCE_ON_REST;
    }
    match pitch_class(last) {
        TONIC_PC => CADENCE_TONIC,
        MEDIANT_PC | DOMINANT_PC => CADENCE_STABLE,
        _ => CADENCE_UNRESOLVED,
    }
}

/// After a leap wider than `LEAP_THRESHOLD`, the next motion must reverse
/// direction or hold.
pub fn score_leap_compensation(melody: &Melody, _ctx: &ScoringContext) -> f64 {
    let pitches = melody.sounding_pitches();
    let mut score = 0.0;
    for w in pitches.windows(3) {
        let d1 = w[1] as i16 - w[0] as i16;
        if d1.unsigned_abs() <= LEAP_THRESHOLD as u16 {
            continue;
        }
        let d2 = w[2] as i16 - w[1] as i16;
        if d1 * d2 < 0 || d2 == 0 {
            score += LEAP_COMPENSATION;
        } else {
            score -= LEAP_COMPENSATION;
        }
    }
    score
}

/// Among small motions, reward continuing direction and penalize wobbling.
/// Leaps are left to leap compensation.
pub fn score_melodic_inertia(melody: &Melody, _ctx: &ScoringContext) -> f64 {
    let pitches = melody.sounding_pitches();
    let mut score = 0.0;
    for w in pitches.windows(3) {
        let d1 = w[1] as i16 - w[0] as i16;
        let d2 = w[2] as i16 - w[1] as i16;
        let small = INERTIA_MAX_INTERVAL as u16;
        if d1.unsigned_abs() > small || d2.unsigned_abs() > small {
            continue;
        }
        let product = d1 * d2;
        if product > 0 {
            score += INERTIA_REWARD;
        } else if product < 0 {
            score += WOBBLE_PENALTY;
        }
    }
    score
}

/// Linear penalty per sounding note outside the comfort range.
pub fn score_range(melody: &Melody, ctx: &ScoringContext) -> f64 {
    let outside = melody
        .steps()
        .iter()
        .filter(|&&p| p != REST && (p < ctx.comfort_low || p > ctx.comfort_high))
        .count();
    outside as f64 * OUT_OF_RANGE_PENALTY
}

/// Share of sounding steps.
pub fn score_rhythm_density(melody: &Melody, _ctx: &ScoringContext) -> f64 {
    if melody.is_empty() {
        return 0.0;
    }
    let density = melody.sounding_count() as f64 / melody.len() as f64;
    if (0.6..=0.9).contains(&density) {
        DENSITY_REWARD
    } else if density > 0.95 || density < 0.4 {
        DENSITY_PENALTY
    } else {
        0.0
    }
}

/// Share of sounding notes in the high register.
pub fn score_climax(melody: &Melody, ctx: &ScoringContext) -> f64 {
    let pitches = melody.sounding_pitches();
    if pitches.is_empty() {
        return 0.0;
    }
    let threshold = ctx.high_register_threshold();
    let high = pitches.iter().filter(|&&p| p > threshold).count();
    if high == 0 {
        return CLIMAX_ABSENT_PENALTY;
    }
    let ratio = high as f64 / pitches.len() as f64;
    if (0.05..=0.15).contains(&ratio) {
        CLIMAX_REWARD
    } else if ratio > 0.25 {
        CLIMAX_EXCESS_PENALTY
    } else {
        0.0
    }
}
