// The melody: the unit of evolution.
//
// A melody is a fixed-length row of steps. Each step holds either a rest
// (`REST`, value 0) or an absolute MIDI pitch. There is no separate attack
// flag: consecutive equal pitches are read as one sustained note by the MIDI
// writer (midi.rs) and as repeated notes by the scorers (scoring.rs).
//
// Melodies are plain values. Crossover and mutation (operators.rs) always
// build new melodies rather than editing a parent, so no two population slots
// ever share storage.

use crate::error::MelodyError;
use serde::{Deserialize, Serialize};

/// Step value used for silence.
pub const REST: u8 = 0;

/// Highest value a sounding step may hold (top of the MIDI key range).
pub const MAX_MIDI_PITCH: u8 = 127;

/// An ordered, fixed-length sequence of rest/pitch steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Melody {
    steps: Vec<u8>,
}

impl Melody {
    pub fn new(steps: Vec<u8>) -> Self {
        Melody { steps }
    }

    /// An all-rest melody of the given length.
    pub fn silent(len: usize) -> Self {
        Melody {
            steps: vec![REST; len],
        }
    }

    pub fn steps(&self) -> &[u8] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<u8> {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_rest(&self, step: usize) -> bool {
        self.steps[step] == REST
    }

    /// True when no step sounds. Such a melody is disqualified by the
    /// fitness aggregator.
    pub fn is_silent(&self) -> bool {
        self.steps.iter().all(|&s| s == REST)
    }

    /// The sounding pitches in order, with rests dropped.
    pub fn sounding_pitches(&self) -> Vec<u8> {
        self.steps.iter().copied().filter(|&s| s != REST).collect()
    }

    /// Number of steps that sound.
    pub fn sounding_count(&self) -> usize {
        self.steps.iter().filter(|&&s| s != REST).count()
    }

    /// The final step, if any.
    pub fn last(&self) -> Option<u8> {
        self.steps.last().copied()
    }

    /// Check that the melody has `expected_len` steps and every step is a rest
    /// or a MIDI pitch.
    pub fn validate(&self, expected_len: usize) -> Result<(), MelodyError> {
        if self.steps.len() != expected_len {
            return Err(MelodyError::LengthMismatch {
                expected: expected_len,
                found: self.steps.len(),
            });
        }
        if let Some((index, &value)) = self
            .steps
            .iter()
            .enumerate()
            .find(|&(_, &v)| v > MAX_MIDI_PITCH)
        {
            return Err(MelodyError::PitchOutOfDomain { index, value });
        }
        Ok(())
    }
}

impl From<Vec<u8>> for Melody {
    fn from(steps: Vec<u8>) -> Self {
        Melody::new(steps)
    }
}
