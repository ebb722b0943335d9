// MIDI output for an evolved melody.
//
// An `Arrangement` pairs the melody with the fixed backing progression. It
// flattens both into `NoteEvent`s measured in ticks:
// - Melody: consecutive identical pitches merge into one sustained note.
//   Rests are silent.
// - Backing: each scheduled root sounds root, root+4 and root+7 together for
//   `chord_duration_beats` beats.
//
// A beat is a quarter note. `write_midi` emits SMF Format 1 with three
// tracks: tempo, melody (channel 0) and backing (channel 1).
//
// Uses the `midly` crate for MIDI writing.

use crate::config::EvolutionConfig;
use crate::error::ConfigError;
use crate::melody::{Melody, REST};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note (one beat) in MIDI output.
pub const TICKS_PER_BEAT: u32 = 480;

/// Slowest tempo whose microseconds-per-beat still fits the 24-bit MIDI
/// tempo field.
pub const MIN_TEMPO_BPM: u16 = 4;

const MICROSECONDS_PER_MINUTE: u32 = 60_000_000;

const MELODY_VELOCITY: u8 = 100;
const BACKING_VELOCITY: u8 = 70;

/// Backing chord shape: root, major third, fifth.
const BACKING_INTERVALS: [u8; 3] = [0, 4, 7];

/// A single note, timed in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start: u32,
    pub duration: u32,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end(&self) -> u32 {
        self.start + self.duration
    }
}

/// Everything the MIDI writer needs from a run.
#[derive(Debug, Clone)]
pub struct Arrangement {
    pub melody: Melody,
    pub steps_per_beat: usize,
    /// MIDI roots of the backing chords, in order.
    pub chord_roots: Vec<u8>,
    pub chord_duration_beats: u32,
    pub tempo_bpm: u16,
}

impl Arrangement {
    pub fn from_config(melody: Melody, config: &EvolutionConfig) -> Self {
        Arrangement {
            melody,
            steps_per_beat: config.steps_per_beat,
            chord_roots: config.backing_roots.clone(),
            chord_duration_beats: config.chord_duration_beats,
            tempo_bpm: config.tempo_bpm,
        }
    }

    pub fn ticks_per_step(&self) -> u32 {
        TICKS_PER_BEAT / self.steps_per_beat.max(1) as u32
    }

    /// Melody notes with repeated pitches merged.
    pub fn melody_notes(&self) -> Vec<NoteEvent> {
        let step_ticks = self.ticks_per_step();
        let mut notes: Vec<NoteEvent> = Vec::new();
        let mut previous = REST;
        for (i, &pitch) in self.melody.steps().iter().enumerate() {
            if pitch != REST {
                match notes.last_mut() {
                    Some(note) if pitch == previous => note.duration += step_ticks,
                    _ => notes.push(NoteEvent {
                        pitch,
                        start: i as u32 * step_ticks,
                        duration: step_ticks,
                        velocity: MELODY_VELOCITY,
                    }),
                }
            }
            previous = pitch;
        }
        notes
    }

    /// Three simultaneous notes per scheduled root.
    pub fn backing_notes(&self) -> Vec<NoteEvent> {
        let chord_ticks = self.chord_duration_beats * TICKS_PER_BEAT;
        self.chord_roots
            .iter()
            .enumerate()
            .flat_map(|(i, &root)| {
                BACKING_INTERVALS.into_iter().map(move |iv| NoteEvent {
                    pitch: root.saturating_add(iv),
                    start: i as u32 * chord_ticks,
                    duration: chord_ticks,
                    velocity: BACKING_VELOCITY,
                })
            })
            .collect()
    }

    /// Build the in-memory SMF. Fails if the step grid or tempo cannot be
    /// represented exactly.
    pub fn to_smf(&self) -> Result<Smf<'static>, ConfigError> {
        check_timing(self.steps_per_beat, self.tempo_bpm)?;
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(TICKS_PER_BEAT as u16)),
        ));

        let tempo_microseconds = MICROSECONDS_PER_MINUTE / u32::from(self.tempo_bpm);
        smf.tracks.push(vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
            },
            end_of_track(),
        ]);

        smf.tracks
            .push(note_track("Melody", u4::new(0), &self.melody_notes()));
        smf.tracks
            .push(note_track("Backing", u4::new(1), &self.backing_notes()));
        Ok(smf)
    }
}

/// Check that a step grid and tempo can be written without losing timing:
/// every step must span a whole number of ticks, and the tempo must fit the
/// MIDI tempo field.
pub fn check_timing(steps_per_beat: usize, tempo_bpm: u16) -> Result<(), ConfigError> {
    if steps_per_beat == 0 || TICKS_PER_BEAT as usize % steps_per_beat != 0 {
        return Err(ConfigError::StepsPerBeatTicks {
            steps_per_beat,
            ticks: TICKS_PER_BEAT,
        });
    }
    if tempo_bpm < MIN_TEMPO_BPM {
        return Err(ConfigError::TempoTooSlow {
            tempo_bpm,
            min: MIN_TEMPO_BPM,
        });
    }
    Ok(())
}

/// Render `arrangement` and write it to `path`.
pub fn write_midi(arrangement: &Arrangement, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let smf = arrangement.to_smf()?;
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

fn end_of_track() -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

/// Turn possibly overlapping notes into a delta-timed track. At equal ticks
/// note-offs come before note-ons, so a repeated chord tone re-attacks.
fn note_track(name: &'static str, channel: u4, notes: &[NoteEvent]) -> Track<'static> {
    let mut edges: Vec<(u32, bool, NoteEvent)> = notes
        .iter()
        .flat_map(|&note| [(note.start, true, note), (note.end(), false, note)])
        .collect();
    edges.sort_by_key(|&(tick, is_on, note)| (tick, is_on, note.pitch));

    let mut track: Track<'static> = Vec::with_capacity(edges.len() + 2);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    });

    let mut last_tick = 0;
    for (tick, is_on, note) in edges {
        let key = u7::new(note.pitch.min(127));
        let message = if is_on {
            MidiMessage::NoteOn {
                key,
                vel: u7::new(note.velocity.min(127)),
            }
        } else {
            MidiMessage::NoteOff {
                key,
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(end_of_track());
    track
}
