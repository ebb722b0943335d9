// Pitch-class and chord model.
//
// The generator works in C major over a fixed I–V–vi–IV progression. This
// module provides:
// - The diatonic scale as a pitch-class membership table
// - Triad pitch-class sets for a chord symbol (root + quality)
// - `HarmonySchedule`, mapping a step index to the chord sounding there
//
// Pitch classes are integers in 0..12 (C = 0). Membership tables are
// `[bool; 12]` indexed by pitch class, so lookups are a single index.
//
// Used by scoring.rs for chord fit and cadence scoring.

use serde::{Deserialize, Serialize};

/// Semitone offsets of the C major scale.
pub const DIATONIC_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Tonic pitch class (C).
pub const TONIC_PC: u8 = 0;

/// Mediant pitch class (E).
pub const MEDIANT_PC: u8 = 4;

/// Dominant pitch class (G).
pub const DOMINANT_PC: u8 = 7;

/// Pitch class of a MIDI pitch.
pub fn pitch_class(pitch: u8) -> u8 {
    pitch % 12
}

/// Whether a pitch belongs to the diatonic scale.
pub fn in_scale(pitch: u8) -> bool {
    DIATONIC_SCALE.contains(&pitch_class(pitch))
}

/// Triad quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Major,
    Minor,
}

impl Quality {
    /// Semitone offsets of root, third and fifth.
    pub fn intervals(self) -> [u8; 3] {
        match self {
            Quality::Major => [0, 4, 7],
            Quality::Minor => [0, 3, 7],
        }
    }
}

/// A chord symbol: root pitch class plus triad quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    /// Root pitch class (0 = C, 7 = G, ...).
    pub root: u8,
    pub quality: Quality,
}

impl Chord {
    pub fn new(root: u8, quality: Quality) -> Self {
        Chord {
            root: root % 12,
            quality,
        }
    }

    pub fn major(root: u8) -> Self {
        Chord::new(root, Quality::Major)
    }

    pub fn minor(root: u8) -> Self {
        Chord::new(root, Quality::Minor)
    }

    /// The chord's pitch classes as a membership table.
    pub fn pitch_classes(&self) -> [bool; 12] {
        let mut pcs = [false; 12];
        for iv in self.quality.intervals() {
            pcs[((self.root % 12 + iv) % 12) as usize] = true;
        }
        pcs
    }

    /// Whether a MIDI pitch is a tone of this chord.
    pub fn contains(&self, pitch: u8) -> bool {
        self.pitch_classes()[pitch_class(pitch) as usize]
    }
}

/// The I–V–vi–IV progression in C: C, G, Am, F.
pub fn pop_progression() -> Vec<Chord> {
    vec![
        Chord::major(0),
        Chord::major(7),
        Chord::minor(9),
        Chord::major(5),
    ]
}

/// Membership table of an empty schedule: nothing is a chord tone.
const NO_CHORD: [bool; 12] = [false; 12];

/// One chord per bar. Bars past the end of the list fall back to the first
/// chord.
#[derive(Debug, Clone)]
pub struct HarmonySchedule {
    chords: Vec<[bool; 12]>,
    steps_per_bar: usize,
}

impl HarmonySchedule {
    /// A `steps_per_bar` of zero is read as one step per bar. An empty chord
    /// list yields a schedule with no chord tones anywhere.
    pub fn new(chords: &[Chord], steps_per_bar: usize) -> Self {
        HarmonySchedule {
            chords: chords.iter().map(Chord::pitch_classes).collect(),
            steps_per_bar: steps_per_bar.max(1),
        }
    }

    /// Chord pitch classes sounding at `step`.
    pub fn chord_for_step(&self, step: usize) -> &[bool; 12] {
        let bar = step / self.steps_per_bar;
        self.chords
            .get(bar)
            .or_else(|| self.chords.first())
            .unwrap_or(&NO_CHORD)
    }

    /// Whether `pitch` is a tone of the chord at `step`.
    pub fn is_chord_tone(&self, step: usize, pitch: u8) -> bool {
        self.chord_for_step(step)[pitch_class(pitch) as usize]
    }

    pub fn steps_per_bar(&self) -> usize {
        self.steps_per_bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_major_scale_membership() {
        // C4..B4
        for p in [60, 62, 64, 65, 67, 69, 71] {
            assert!(in_scale(p), "{p} should be in C major");
        }
        for p in [61, 63, 66, 68, 70] {
            assert!(!in_scale(p), "{p} should not be in C major");
        }
    }

    #[test]
    fn minor_triad_pitch_classes() {
        let am = Chord::minor(9);
        assert!(am.contains(69)); // A
        assert!(am.contains(72)); // C
        assert!(am.contains(76)); // E
        assert!(!am.contains(73)); // C#
    }

    #[test]
    fn schedule_follows_bars() {
        let schedule = HarmonySchedule::new(&pop_progression(), 16);
        // Bar 0: C
        assert!(schedule.is_chord_tone(0, 60));
        assert!(schedule.is_chord_tone(15, 67));
        // Bar 1: G (B is a chord tone, C is not)
        assert!(schedule.is_chord_tone(16, 71));
        assert!(!schedule.is_chord_tone(16, 60));
        // Bar 2: Am
        assert!(schedule.is_chord_tone(40, 69));
        // Bar 3: F
        assert!(schedule.is_chord_tone(63, 65));
    }

    #[test]
    fn degenerate_schedules_do_not_panic() {
        let empty = HarmonySchedule::new(&[], 16);
        assert!(!empty.is_chord_tone(0, 60));
        assert!(!empty.is_chord_tone(100, 67));

        let zero_bar = HarmonySchedule::new(&pop_progression(), 0);
        assert_eq!(zero_bar.steps_per_bar(), 1);
        // One step per bar: step 1 is G.
        assert!(zero_bar.is_chord_tone(1, 71));
    }

    #[test]
    fn bars_past_schedule_use_first_chord() {
        let schedule = HarmonySchedule::new(&pop_progression(), 16);
        assert_eq!(schedule.chord_for_step(64), schedule.chord_for_step(0));
        assert_eq!(schedule.chord_for_step(1000), schedule.chord_for_step(3));
    }
}
