//! Messages between the control thread and the audio thread.
//!
//! Tone scheduling flows to the audio thread as [`AudioCommand`]s; finished
//! tones flow back as bare [`ToneId`]s on a second ring buffer.

use super::tone::ToneId;

/// Commands sent from the control thread to the audio thread via ring buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCommand {
    /// Allocate a silent tone.
    Create { id: ToneId, frequency: f64 },

    /// Add a gain automation point (absolute seconds).
    Gain { id: ToneId, time: f64, value: f64 },

    /// Start sounding at `time`.
    Start { id: ToneId, time: f64 },

    /// Stop at `time`, replacing any earlier stop time.
    Stop { id: ToneId, time: f64 },

    /// Drop the tone immediately, without an end notification.
    Release(ToneId),

    /// Set master volume (0.0 to 1.0).
    SetVolume(f32),
}

impl AudioCommand {
    /// The tone this command addresses, if any.
    pub fn tone(&self) -> Option<ToneId> {
        match *self {
            AudioCommand::Create { id, .. }
            | AudioCommand::Gain { id, .. }
            | AudioCommand::Start { id, .. }
            | AudioCommand::Stop { id, .. }
            | AudioCommand::Release(id) => Some(id),
            AudioCommand::SetVolume(_) => None,
        }
    }
}
