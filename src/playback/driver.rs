//! Multi-track driver — the host-facing entry point.
//!
//! Splits a composite input into comma-separated tracks, compiles each one
//! independently, and hands every track's instructions to the playback
//! engine from one shared origin so the tracks sound together.

use tracing::{info, warn};

use super::envelope::NoteEnvelope;
use super::{PlaybackEngine, PlaybackError, ToneDevice};
use crate::event::PlaybackDefaults;
use crate::mml::{CompiledSong, Compiler, Token};

/// Knobs for a [`Player`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerOptions {
    pub defaults: PlaybackDefaults,
    pub envelope: NoteEnvelope,
    /// Seconds between the `compile_and_play` call and the shared origin.
    pub lead_in: f64,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            defaults: PlaybackDefaults::default(),
            envelope: NoteEnvelope::default(),
            lead_in: 0.0,
        }
    }
}

/// Compiles MML and plays it on a tone device.
pub struct Player<D: ToneDevice> {
    engine: PlaybackEngine<D>,
    defaults: PlaybackDefaults,
    lead_in: f64,
}

impl<D: ToneDevice> Player<D> {
    pub fn new(device: D, options: PlayerOptions) -> Self {
        Self {
            engine: PlaybackEngine::new(device, options.envelope),
            defaults: options.defaults,
            lead_in: options.lead_in.max(0.0),
        }
    }

    pub fn engine(&self) -> &PlaybackEngine<D> {
        &self.engine
    }

    pub fn device(&self) -> &D {
        self.engine.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.engine.device_mut()
    }

    /// The origin a call made now would use.
    pub fn origin(&self) -> f64 {
        self.engine.device().current_time() + self.lead_in
    }

    /// Compile `source` against the device clock without playing it.
    pub fn compile(&self, source: &str) -> CompiledSong {
        Compiler::compile(source, self.defaults, self.origin())
    }

    /// Compile every track of `source` and schedule it on the device.
    pub fn compile_and_play(&mut self, source: &str) -> Result<CompiledSong, PlaybackError> {
        let song = self.compile(source);
        self.play_song(&song)?;
        Ok(song)
    }

    /// Schedule already tokenized tracks from a common origin.
    pub fn play_tokens(&mut self, tracks: Vec<Vec<Token>>) -> Result<CompiledSong, PlaybackError> {
        let song = Compiler::schedule(tracks, self.defaults, self.origin());
        self.play_song(&song)?;
        Ok(song)
    }

    /// Issue device calls for every Play instruction of `song`.
    ///
    /// A tone the device refuses is logged and skipped; the rest of the song
    /// still plays. Returns the number of tones scheduled, or the first error
    /// when no tone could be scheduled at all.
    pub fn play_song(&mut self, song: &CompiledSong) -> Result<usize, PlaybackError> {
        let mut tones = 0;
        let mut failed = 0;
        let mut first_error = None;
        for track in &song.tracks {
            for instruction in &track.instructions {
                match self.engine.perform(instruction) {
                    Ok(Some(_)) => tones += 1,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(track = %track.id, "{instruction} skipped: {e}");
                        failed += 1;
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        if let Some(e) = first_error.filter(|_| tones == 0) {
            return Err(e);
        }
        info!(
            tracks = song.tracks.len(),
            tones,
            failed,
            origin = song.origin,
            end = song.end(),
            "song scheduled"
        );
        Ok(tones)
    }

    /// Silence everything that is sounding or scheduled.
    pub fn stop_all(&mut self) -> usize {
        self.engine.stop_all()
    }
}
