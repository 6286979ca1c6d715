//! Per-track playback state — tempo, default length, volume, time cursor.
//!
//! The track's octave lives in its [`FrequencyTable`](crate::mml::FrequencyTable),
//! which the scheduler owns alongside this state for the length of a run.

use serde::{Deserialize, Serialize};

use crate::mml::duration::DurationExpr;
use crate::mml::pitch::REFERENCE_OCTAVE;

/// Seconds in one whole note at a tempo of one beat per minute.
pub const WHOLE_NOTE_BEAT_SECONDS: f64 = 240.0;

/// Loudest volume on the MML 0–100 scale.
pub const MAX_VOLUME: u32 = 100;

/// Starting values for every track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    pub octave: i32,
    /// Quarter notes per minute.
    pub tempo: u32,
    /// Denominator used when a note has no explicit length (1 = whole note).
    pub length: u32,
    pub volume: u32,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            octave: REFERENCE_OCTAVE,
            tempo: 100,
            length: 1,
            volume: MAX_VOLUME,
        }
    }
}

/// Mutable state for one track, created when its scheduling starts.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    tempo: u32,
    length: u32,
    volume: u32,
    cursor: f64,
}

impl PlaybackState {
    /// Fresh state at `origin` seconds. Zero tempo or length in `defaults`
    /// fall back to the built-in values.
    pub fn new(defaults: &PlaybackDefaults, origin: f64) -> Self {
        let builtin = PlaybackDefaults::default();
        Self {
            tempo: nonzero_or(defaults.tempo, builtin.tempo),
            length: nonzero_or(defaults.length, builtin.length),
            volume: defaults.volume.min(MAX_VOLUME),
            cursor: origin,
        }
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn volume(&self) -> u32 {
        self.volume
    }

    /// Absolute time of the next note or rest.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Returns `false` (and leaves the tempo alone) for zero.
    pub fn set_tempo(&mut self, tempo: u32) -> bool {
        if tempo == 0 {
            return false;
        }
        self.tempo = tempo;
        true
    }

    /// Returns `false` (and leaves the length alone) for zero.
    pub fn set_length(&mut self, length: u32) -> bool {
        if length == 0 {
            return false;
        }
        self.length = length;
        true
    }

    /// Clamped to [`MAX_VOLUME`].
    pub fn set_volume(&mut self, volume: u32) {
        self.volume = volume.min(MAX_VOLUME);
    }

    /// Length of a whole note at the current tempo.
    pub fn whole_note_seconds(&self) -> f64 {
        WHOLE_NOTE_BEAT_SECONDS / self.tempo as f64
    }

    /// Seconds a duration expression lasts under the current state.
    pub fn seconds(&self, duration: &DurationExpr) -> f64 {
        duration.resolve(self.length) * self.whole_note_seconds()
    }

    pub fn advance(&mut self, seconds: f64) {
        self.cursor += seconds;
    }
}

fn nonzero_or(value: u32, fallback: u32) -> u32 {
    if value == 0 {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn defaults() {
        let d = PlaybackDefaults::default();
        assert_eq!(d.octave, 4);
        assert_eq!(d.tempo, 100);
        assert_eq!(d.length, 1);
        assert_eq!(d.volume, 100);
    }

    #[test]
    fn whole_note_at_tempo_100() {
        let s = PlaybackState::new(&PlaybackDefaults::default(), 0.0);
        assert_approx_eq!(s.whole_note_seconds(), 2.4);
    }

    #[test]
    fn seconds_uses_default_length() {
        let mut s = PlaybackState::new(&PlaybackDefaults::default(), 0.0);
        assert!(s.set_length(8));
        assert_approx_eq!(s.seconds(&DurationExpr::default()), 0.3);
        assert_approx_eq!(s.seconds(&DurationExpr::new("4")), 0.6);
    }

    #[test]
    fn zero_tempo_and_length_rejected() {
        let mut s = PlaybackState::new(&PlaybackDefaults::default(), 0.0);
        assert!(!s.set_tempo(0));
        assert!(!s.set_length(0));
        assert_eq!(s.tempo(), 100);
        assert_eq!(s.length(), 1);
    }

    #[test]
    fn zero_defaults_fall_back() {
        let defaults = PlaybackDefaults {
            tempo: 0,
            length: 0,
            ..PlaybackDefaults::default()
        };
        let s = PlaybackState::new(&defaults, 0.0);
        assert_eq!(s.tempo(), 100);
        assert_eq!(s.length(), 1);
    }

    #[test]
    fn volume_clamped() {
        let mut s = PlaybackState::new(&PlaybackDefaults::default(), 0.0);
        s.set_volume(250);
        assert_eq!(s.volume(), 100);
        s.set_volume(30);
        assert_eq!(s.volume(), 30);
    }

    #[test]
    fn cursor_advances_from_origin() {
        let mut s = PlaybackState::new(&PlaybackDefaults::default(), 3.0);
        s.advance(0.5);
        assert_approx_eq!(s.cursor(), 3.5);
    }

    #[test]
    fn defaults_deserialize_partial() {
        let d: PlaybackDefaults = serde_yaml::from_str("tempo: 140\n").unwrap();
        assert_eq!(d.tempo, 140);
        assert_eq!(d.length, 1);
    }
}
