//! MML compiler — text → tokens → timed instructions, per track.

pub mod duration;
pub mod error;
pub mod lexer;
pub mod pitch;
pub mod token;

pub use duration::{resolve, DurationExpr};
pub use error::MmlError;
pub use lexer::{tokenize, Lexer};
pub use pitch::{FrequencyTable, Letter, Pitch, PitchClass, REFERENCE_OCTAVE};
pub use token::{Token, TokenKind};

use crate::event::{Instruction, PlaybackDefaults, TrackId, TrackScheduler};

/// Character separating parallel tracks in a composite input.
pub const TRACK_SEPARATOR: char = ',';

/// One compiled track.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTrack {
    pub id: TrackId,
    pub tokens: Vec<Token>,
    pub instructions: Vec<Instruction>,
}

impl CompiledTrack {
    /// Time at which the track's last note or rest ends.
    pub fn end(&self) -> Option<f64> {
        self.instructions.last().map(Instruction::end)
    }
}

/// The result of compiling a composite MML input.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSong {
    pub origin: f64,
    pub tracks: Vec<CompiledTrack>,
}

impl CompiledSong {
    /// Time at which the longest track finishes.
    pub fn end(&self) -> f64 {
        self.tracks
            .iter()
            .filter_map(CompiledTrack::end)
            .fold(self.origin, f64::max)
    }

    /// Total number of tones across all tracks.
    pub fn play_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| &t.instructions)
            .filter(|i| i.is_play())
            .count()
    }
}

/// The MML compiler.
///
/// Compilation never fails: unknown characters are skipped and malformed
/// durations fall back to the default length, so a damaged track still
/// plays as far as it makes sense and its siblings are unaffected.
pub struct Compiler;

impl Compiler {
    /// Split composite input into its track sources.
    pub fn split_tracks(source: &str) -> impl Iterator<Item = &str> {
        source.split(TRACK_SEPARATOR)
    }

    /// Tokenize every track of a composite input.
    pub fn tokenize(source: &str) -> Vec<Vec<Token>> {
        Self::split_tracks(source).map(tokenize).collect()
    }

    /// Tokenize and schedule every track from the same `origin`.
    pub fn compile(source: &str, defaults: PlaybackDefaults, origin: f64) -> CompiledSong {
        Self::schedule(Self::tokenize(source), defaults, origin)
    }

    /// Schedule already tokenized tracks from the same `origin`.
    pub fn schedule(
        tracks: Vec<Vec<Token>>,
        defaults: PlaybackDefaults,
        origin: f64,
    ) -> CompiledSong {
        let scheduler = TrackScheduler::new(defaults);
        let tracks = tracks
            .into_iter()
            .enumerate()
            .map(|(idx, tokens)| {
                let instructions = scheduler.schedule(&tokens, origin);
                CompiledTrack {
                    id: TrackId(idx as u32),
                    tokens,
                    instructions,
                }
            })
            .collect();
        CompiledSong { origin, tracks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn split_on_comma() {
        let parts: Vec<_> = Compiler::split_tracks("cde,efg").collect();
        assert_eq!(parts, vec!["cde", "efg"]);
        assert_eq!(Compiler::split_tracks("").count(), 1);
    }

    #[test]
    fn two_tracks_share_origin() {
        let song = Compiler::compile("cde,efg", PlaybackDefaults::default(), 5.0);
        assert_eq!(song.tracks.len(), 2);
        assert_eq!(song.tracks[0].id, TrackId(0));
        assert_eq!(song.tracks[1].id, TrackId(1));
        for track in &song.tracks {
            assert_eq!(track.instructions.len(), 3);
            assert_approx_eq!(track.instructions[0].start(), 5.0);
        }
        assert_eq!(song.play_count(), 6);
    }

    #[test]
    fn octave_changes_stay_in_their_track() {
        let song = Compiler::compile(">>a,a", PlaybackDefaults::default(), 0.0);
        let freq = |t: usize| match song.tracks[t].instructions[0] {
            Instruction::Play { frequency, .. } => frequency,
            other => panic!("expected Play, got {other:?}"),
        };
        assert_approx_eq!(freq(0), 1760.0, 1e-9);
        assert_approx_eq!(freq(1), 440.0, 1e-9);
    }

    #[test]
    fn song_end_is_longest_track() {
        let song = Compiler::compile("l4 c, l4 cc", PlaybackDefaults::default(), 1.0);
        assert_approx_eq!(song.end(), 1.0 + 1.2);
    }

    #[test]
    fn empty_track_has_no_end() {
        let song = Compiler::compile(",c4", PlaybackDefaults::default(), 0.0);
        assert_eq!(song.tracks[0].end(), None);
        assert!(song.tracks[0].instructions.is_empty());
        assert_approx_eq!(song.end(), 0.6);
    }

    #[test]
    fn damaged_track_does_not_affect_siblings() {
        let song = Compiler::compile("c4 @@ x&&& , d4", PlaybackDefaults::default(), 0.0);
        assert_eq!(song.tracks[1].instructions.len(), 1);
        assert!(!song.tracks[0].instructions.is_empty());
    }
}
