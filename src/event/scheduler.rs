//! Track scheduler — turns one token sequence into absolute-time instructions.
//!
//! Tokens are processed strictly in order against a single time cursor.
//! Notes and rests advance the cursor; every other token changes the state
//! that later notes and rests are measured with.

use tracing::{debug, warn};

use super::state::{PlaybackDefaults, PlaybackState};
use super::types::Instruction;
use crate::mml::pitch::{FrequencyTable, REFERENCE_OCTAVE};
use crate::mml::token::Token;

/// Schedules tracks from a fixed set of starting values.
#[derive(Debug, Clone, Default)]
pub struct TrackScheduler {
    defaults: PlaybackDefaults,
}

impl TrackScheduler {
    pub fn new(defaults: PlaybackDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &PlaybackDefaults {
        &self.defaults
    }

    /// Schedule a track starting at `origin` seconds with its own table.
    pub fn schedule(&self, tokens: &[Token], origin: f64) -> Vec<Instruction> {
        let mut table = FrequencyTable::new();
        self.schedule_with(tokens, origin, &mut table)
    }

    /// Schedule a track against a caller-provided table.
    ///
    /// The table is returned to the reference octave when scheduling ends.
    pub fn schedule_with(
        &self,
        tokens: &[Token],
        origin: f64,
        table: &mut FrequencyTable,
    ) -> Vec<Instruction> {
        let mut table = table.scope();
        if !table.transpose(self.defaults.octave) {
            warn!(
                octave = self.defaults.octave,
                "default octave out of range; using {REFERENCE_OCTAVE}"
            );
        }
        let mut state = PlaybackState::new(&self.defaults, origin);
        let mut instructions = Vec::new();

        for token in tokens {
            instructions.extend(step(token, &mut state, &mut table));
        }

        debug!(
            tokens = tokens.len(),
            instructions = instructions.len(),
            end = state.cursor(),
            "track scheduled"
        );
        instructions
    }
}

/// Apply one token, returning the instruction it produces, if any.
fn step(token: &Token, state: &mut PlaybackState, table: &mut FrequencyTable) -> Option<Instruction> {
    match token {
        Token::Note { pitch, duration } => {
            let seconds = timed(state.seconds(duration), token)?;
            let frequency = table.frequency(*pitch);
            let instruction = if frequency.is_finite() && frequency > 0.0 {
                Instruction::Play {
                    frequency,
                    start: state.cursor(),
                    duration: seconds,
                    volume: state.volume(),
                }
            } else {
                warn!(%token, frequency, "unplayable pitch; scheduled as a rest");
                Instruction::Rest {
                    start: state.cursor(),
                    duration: seconds,
                }
            };
            state.advance(seconds);
            Some(instruction)
        }
        Token::Rest { duration } => {
            let seconds = timed(state.seconds(duration), token)?;
            let instruction = Instruction::Rest {
                start: state.cursor(),
                duration: seconds,
            };
            state.advance(seconds);
            Some(instruction)
        }
        Token::OctaveUp | Token::OctaveDown => {
            let delta = if *token == Token::OctaveUp { 1 } else { -1 };
            if !table.shift(delta) {
                warn!(octave = table.octave(), "{token} out of range; ignored");
            }
            None
        }
        Token::OctaveSet(octave) => {
            let moved = i32::try_from(*octave).is_ok_and(|target| table.transpose(target));
            if !moved {
                warn!("octave {octave} out of range; ignored");
            }
            None
        }
        Token::Length(length) => {
            if !state.set_length(*length) {
                warn!("length 0 ignored");
            }
            None
        }
        Token::Tempo(tempo) => {
            if !state.set_tempo(*tempo) {
                warn!("tempo 0 ignored");
            }
            None
        }
        Token::Volume(volume) => {
            state.set_volume(*volume);
            None
        }
    }
}

/// Only positive, finite durations are scheduled.
fn timed(seconds: f64, token: &Token) -> Option<f64> {
    if seconds.is_finite() && seconds > 0.0 {
        Some(seconds)
    } else {
        warn!(%token, seconds, "unschedulable duration; token skipped");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mml::lexer::tokenize;
    use crate::mml::pitch::{Letter, Pitch, MAX_OCTAVE, MIN_OCTAVE};
    use assert_approx_eq::assert_approx_eq;

    fn schedule(src: &str) -> Vec<Instruction> {
        TrackScheduler::default().schedule(&tokenize(src), 0.0)
    }

    fn plays(instructions: &[Instruction]) -> Vec<(f64, f64, f64, u32)> {
        instructions
            .iter()
            .filter_map(|i| match *i {
                Instruction::Play {
                    frequency,
                    start,
                    duration,
                    volume,
                } => Some((frequency, start, duration, volume)),
                Instruction::Rest { .. } => None,
            })
            .collect()
    }

    #[test]
    fn octave_up_doubles_frequency() {
        let p = plays(&schedule("c4>c4"));
        assert_eq!(p.len(), 2);
        assert_approx_eq!(p[1].0, 2.0 * p[0].0, 1e-9);
    }

    #[test]
    fn length_and_rest_timing() {
        let out = schedule("l8cr4c");
        assert_eq!(out.len(), 3);
        let eighth = 240.0 / 100.0 / 8.0;
        let quarter = 240.0 / 100.0 / 4.0;

        assert!(out[0].is_play());
        assert_approx_eq!(out[0].duration(), eighth);
        assert!(!out[1].is_play());
        assert_approx_eq!(out[1].start(), eighth);
        assert_approx_eq!(out[1].duration(), quarter);
        assert!(out[2].is_play());
        assert_approx_eq!(out[2].start(), eighth + quarter);
        assert_approx_eq!(out[2].duration(), eighth);
    }

    #[test]
    fn default_length_is_whole_note() {
        let out = schedule("c");
        assert_approx_eq!(out[0].duration(), 2.4);
    }

    #[test]
    fn tempo_changes_later_notes_only() {
        let out = schedule("c4t200c4");
        assert_approx_eq!(out[0].duration(), 0.6);
        assert_approx_eq!(out[1].duration(), 0.3);
        assert_approx_eq!(out[1].start(), 0.6);
    }

    #[test]
    fn volume_applies_to_later_notes() {
        let p = plays(&schedule("c v40 c v250 c"));
        assert_eq!(p[0].3, 100);
        assert_eq!(p[1].3, 40);
        assert_eq!(p[2].3, 100);
    }

    #[test]
    fn octave_set_is_absolute() {
        let p = plays(&schedule("a o2 a >> a"));
        assert_approx_eq!(p[0].0, 440.0, 1e-9);
        assert_approx_eq!(p[1].0, 110.0, 1e-9);
        assert_approx_eq!(p[2].0, 440.0, 1e-9);
    }

    #[test]
    fn zero_settings_are_ignored() {
        let out = schedule("l0 t0 c4");
        assert_approx_eq!(out[0].duration(), 0.6);
    }

    #[test]
    fn starts_at_origin_and_never_goes_back() {
        let tokens = tokenize("t150 l16 cdefgab>c r8 c8.&16 <<g2");
        let origin = 12.5;
        let out = TrackScheduler::default().schedule(&tokens, origin);
        assert_approx_eq!(out[0].start(), origin);
        for pair in out.windows(2) {
            assert!(pair[1].start() > pair[0].start());
            assert_approx_eq!(pair[1].start(), pair[0].end(), 1e-9);
        }
        for i in &out {
            assert!(i.duration() > 0.0);
            assert!(i.start() >= origin);
        }
    }

    #[test]
    fn tied_note_is_one_play() {
        let out = schedule("l4 c&c8");
        assert_eq!(out.len(), 1);
        assert_approx_eq!(out[0].duration(), 2.4 * (0.25 + 0.125));
    }

    #[test]
    fn table_returns_to_reference_octave() {
        let mut table = FrequencyTable::new();
        let tokens = tokenize("o6 c >>> c");
        let out = TrackScheduler::default().schedule_with(&tokens, 0.0, &mut table);
        assert_eq!(out.len(), 2);
        assert_eq!(table.octave(), REFERENCE_OCTAVE);
    }

    #[test]
    fn default_octave_from_config() {
        let scheduler = TrackScheduler::new(PlaybackDefaults {
            octave: 5,
            ..PlaybackDefaults::default()
        });
        let p = plays(&scheduler.schedule(&tokenize("a"), 0.0));
        assert_approx_eq!(p[0].0, 880.0, 1e-9);
    }

    #[test]
    fn settings_only_track_is_empty() {
        assert!(schedule("t120 o5 l8 v50 <>").is_empty());
    }

    #[test]
    fn out_of_range_octave_set_is_ignored() {
        let p = plays(&schedule("o2147483647>c o1100 c o4294967295 a"));
        assert_eq!(p.len(), 3);
        let c5 = FrequencyTable::at_octave(5).frequency(Pitch::natural(Letter::C));
        assert_approx_eq!(p[0].0, c5, 1e-9);
        assert_approx_eq!(p[1].0, c5, 1e-9);
        assert_approx_eq!(p[2].0, 880.0, 1e-9);
    }

    #[test]
    fn octave_shifts_stop_at_the_range_edges() {
        let up = ">".repeat((MAX_OCTAVE - REFERENCE_OCTAVE + 3) as usize);
        let p = plays(&schedule(&format!("{up}a<a")));
        let top = FrequencyTable::at_octave(MAX_OCTAVE).get(crate::mml::PitchClass::A);
        assert_approx_eq!(p[0].0, top, 1e-6);
        assert_approx_eq!(p[1].0, top / 2.0, 1e-6);

        let down = "<".repeat((REFERENCE_OCTAVE - MIN_OCTAVE + 3) as usize);
        let p = plays(&schedule(&format!("{down}a")));
        assert_approx_eq!(p[0].0, 27.5, 1e-9);
    }

    #[test]
    fn unplayable_pitch_becomes_rest() {
        let sharps = "+".repeat(20_000);
        let out = schedule(&format!("l4 c{sharps} d"));
        assert_eq!(out.len(), 2);
        assert!(!out[0].is_play());
        assert_approx_eq!(out[0].duration(), 0.6);
        assert!(out[1].is_play());
        assert_approx_eq!(out[1].start(), 0.6);
    }

    #[test]
    fn out_of_range_default_octave_falls_back() {
        let scheduler = TrackScheduler::new(PlaybackDefaults {
            octave: 99,
            ..PlaybackDefaults::default()
        });
        let p = plays(&scheduler.schedule(&tokenize("a"), 0.0));
        assert_approx_eq!(p[0].0, 440.0, 1e-9);
    }
}
