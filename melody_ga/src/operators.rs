// Genetic operators: sampling, crossover and mutation.
//
// - `random_melody`: independent per-step sampling, a rest with the
//   configured probability, else a uniform pitch in the configured bounds.
//   Used for the initial population, elitism padding, immigration and
//   collapse refill.
// - `crossover`: uniform crossover. Each position independently goes
//   A→child1/B→child2 or swapped, with equal odds.
// - `mutate`: each position mutates with probability `rate`, by one of two
//   strategies. The minority case resets the step (rest or fresh pitch);
//   the common case nudges an existing pitch by a small signed shift. A nudge
//   that would leave the pitch bounds is dropped and the step stays as is.
//
// All operators return new melodies and leave their inputs untouched.

use crate::config::{EvolutionConfig, MutationConfig};
use crate::melody::{Melody, REST};
use rand::Rng;

/// Sampling bounds shared by the sampler and the mutation operator.
#[derive(Debug, Clone, Copy)]
pub struct PitchSampler {
    pub pitch_min: u8,
    pub pitch_max: u8,
    pub rest_probability: f64,
}

impl PitchSampler {
    pub fn from_config(config: &EvolutionConfig) -> Self {
        PitchSampler {
            pitch_min: config.pitch_min,
            pitch_max: config.pitch_max,
            rest_probability: config.rest_probability,
        }
    }

    /// A rest or a uniform pitch.
    pub fn sample_step(&self, rng: &mut impl Rng) -> u8 {
        if rng.random_bool(self.rest_probability) {
            REST
        } else {
            self.sample_pitch(rng)
        }
    }

    /// A uniform pitch between the bounds, inclusive. Inverted bounds are
    /// read in order.
    pub fn sample_pitch(&self, rng: &mut impl Rng) -> u8 {
        let (low, high) = self.bounds();
        rng.random_range(low..=high)
    }

    pub fn contains(&self, pitch: i16) -> bool {
        let (low, high) = self.bounds();
        (low as i16..=high as i16).contains(&pitch)
    }

    fn bounds(&self) -> (u8, u8) {
        (
            self.pitch_min.min(self.pitch_max),
            self.pitch_min.max(self.pitch_max),
        )
    }
}

/// Sample a melody of `len` independent steps.
pub fn random_melody(len: usize, sampler: &PitchSampler, rng: &mut impl Rng) -> Melody {
    Melody::new((0..len).map(|_| sampler.sample_step(rng)).collect())
}

/// Uniform crossover of two equal-length parents.
pub fn crossover(a: &Melody, b: &Melody, rng: &mut impl Rng) -> (Melody, Melody) {
    debug_assert_eq!(a.len(), b.len(), "crossover parents differ in length");
    let mut child1 = Vec::with_capacity(a.len());
    let mut child2 = Vec::with_capacity(a.len());
    for (&x, &y) in a.steps().iter().zip(b.steps()) {
        if rng.random_bool(0.5) {
            child1.push(x);
            child2.push(y);
        } else {
            child1.push(y);
            child2.push(x);
        }
    }
    (Melody::new(child1), Melody::new(child2))
}

/// Mutation operator: the strategy mix plus sampling bounds.
#[derive(Debug, Clone, Copy)]
pub struct Mutator {
    pub sampler: PitchSampler,
    pub disruptive_share: f64,
    pub max_shift: u8,
}

impl Mutator {
    pub fn new(sampler: PitchSampler, params: &MutationConfig) -> Self {
        Mutator {
            sampler,
            disruptive_share: params.disruptive_share,
            max_shift: params.max_shift,
        }
    }

    pub fn from_config(config: &EvolutionConfig) -> Self {
        Mutator::new(PitchSampler::from_config(config), &config.mutation)
    }

    /// Copy of `melody` with each position mutated with probability `rate`.
    pub fn mutate(&self, melody: &Melody, rate: f64, rng: &mut impl Rng) -> Melody {
        let steps = melody
            .steps()
            .iter()
            .map(|&step| {
                if !rng.random_bool(rate) {
                    step
                } else if rng.random_bool(self.disruptive_share) {
                    self.sampler.sample_step(rng)
                } else {
                    self.nudge(step, rng)
                }
            })
            .collect();
        Melody::new(steps)
    }

    /// Shift a pitch by ±1..=max_shift semitones (at least one). A rest has
    /// nothing to shift, so it gets a fresh pitch instead.
    fn nudge(&self, step: u8, rng: &mut impl Rng) -> u8 {
        if step == REST {
            return self.sampler.sample_pitch(rng);
        }
        let magnitude = rng.random_range(1..=self.max_shift.max(1)) as i16;
        let shift = if rng.random_bool(0.5) { magnitude } else { -magnitude };
        let shifted = step as i16 + shift;
        if self.sampler.contains(shifted) {
            shifted as u8
        } else {
            step
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sampler() -> PitchSampler {
        PitchSampler {
            pitch_min: 60,
            pitch_max: 84,
            rest_probability: 0.15,
        }
    }

    fn mutator() -> Mutator {
        Mutator::new(sampler(), &MutationConfig::default())
    }

    #[test]
    fn random_melody_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = random_melody(500, &sampler(), &mut rng);
        assert_eq!(m.len(), 500);
        let rests = m.steps().iter().filter(|&&s| s == REST).count();
        assert!(m.steps().iter().all(|&s| s == REST || (60..=84).contains(&s)));
        // ~15% rests
        assert!((30..=120).contains(&rests), "unexpected rest count {rests}");
    }

    #[test]
    fn crossover_children_take_parent_values() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = random_melody(64, &sampler(), &mut rng);
        let b = random_melody(64, &sampler(), &mut rng);
        let a_before = a.clone();
        let b_before = b.clone();

        for _ in 0..50 {
            let (c1, c2) = crossover(&a, &b, &mut rng);
            assert_eq!(c1.len(), a.len());
            assert_eq!(c2.len(), a.len());
            for i in 0..a.len() {
                let (x, y) = (a.steps()[i], b.steps()[i]);
                let (p, q) = (c1.steps()[i], c2.steps()[i]);
                assert!((p == x && q == y) || (p == y && q == x), "position {i} not inherited");
            }
        }
        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }

    #[test]
    fn zero_rate_is_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        let m = random_melody(64, &sampler(), &mut rng);
        for _ in 0..20 {
            assert_eq!(mutator().mutate(&m, 0.0, &mut rng), m);
        }
    }

    #[test]
    fn full_rate_changes_nearly_everything() {
        let mut rng = StdRng::seed_from_u64(5);
        // Mid-range pitches so every nudge stays in bounds.
        let m = Melody::new((0..64).map(|i| 66 + (i % 12) as u8).collect());
        let mut changed = 0;
        let mut total = 0;
        for _ in 0..200 {
            let mutated = mutator().mutate(&m, 1.0, &mut rng);
            changed += mutated
                .steps()
                .iter()
                .zip(m.steps())
                .filter(|(a, b)| a != b)
                .count();
            total += m.len();
        }
        let share = changed as f64 / total as f64;
        assert!(share > 0.95, "only {:.1}% of positions changed", share * 100.0);
    }

    #[test]
    fn nudge_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        let local = Mutator {
            disruptive_share: 0.0,
            ..mutator()
        };
        let edge = Melody::new(vec![60, 84, 60, 84]);
        for _ in 0..200 {
            let mutated = local.mutate(&edge, 1.0, &mut rng);
            for (&after, &before) in mutated.steps().iter().zip(edge.steps()) {
                assert!((60..=84).contains(&after));
                assert!(after.abs_diff(before) <= 2);
            }
        }
    }

    #[test]
    fn nudge_fills_rests() {
        let mut rng = StdRng::seed_from_u64(13);
        let local = Mutator {
            disruptive_share: 0.0,
            ..mutator()
        };
        let rests = Melody::silent(16);
        let mutated = local.mutate(&rests, 1.0, &mut rng);
        assert!(mutated.steps().iter().all(|&s| (60..=84).contains(&s)));
    }

    #[test]
    fn zero_shift_still_moves_by_a_semitone() {
        let mut rng = StdRng::seed_from_u64(19);
        let stiff = Mutator {
            disruptive_share: 0.0,
            max_shift: 0,
            ..mutator()
        };
        let m = Melody::new(vec![70; 32]);
        let mutated = stiff.mutate(&m, 1.0, &mut rng);
        assert!(mutated.steps().iter().all(|&s| s == 69 || s == 71));
    }

    #[test]
    fn inverted_bounds_are_reordered() {
        let mut rng = StdRng::seed_from_u64(23);
        let inverted = PitchSampler {
            pitch_min: 72,
            pitch_max: 64,
            rest_probability: 0.0,
        };
        for _ in 0..100 {
            assert!((64..=72).contains(&inverted.sample_pitch(&mut rng)));
        }
        assert!(inverted.contains(68));
        assert!(!inverted.contains(73));
    }

    #[test]
    fn mutation_leaves_input_untouched() {
        let mut rng = StdRng::seed_from_u64(17);
        let m = random_melody(64, &sampler(), &mut rng);
        let before = m.clone();
        let _ = mutator().mutate(&m, 0.5, &mut rng);
        assert_eq!(m, before);
    }
}
