//! Note envelope — the gain ramps that keep note edges click-free.
//!
//! Every tone fades in from silence over a short ramp, holds at its volume,
//! and fades back out over the same ramp before it stops. Notes shorter than
//! two ramps get a triangle: the ramp is clamped to half the duration.

/// Default ramp length: a 64th note at tempo 100.
pub const INTER_NOTE: f64 = 240.0 / (100.0 * 64.0);

/// A gain value the device should reach at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainPoint {
    pub time: f64,
    pub value: f64,
}

/// Attack/release shaping applied to every scheduled tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEnvelope {
    ramp: f64,
}

impl NoteEnvelope {
    /// Negative or non-finite ramps are treated as zero.
    pub fn new(ramp: f64) -> Self {
        Self {
            ramp: if ramp.is_finite() { ramp.max(0.0) } else { 0.0 },
        }
    }

    pub fn ramp(&self) -> f64 {
        self.ramp
    }

    /// The ramp actually used for a note of `duration` seconds.
    pub fn ramp_for(&self, duration: f64) -> f64 {
        self.ramp.min(duration.max(0.0) / 2.0)
    }

    /// Peak gain for a 0–100 volume.
    pub fn peak(volume: u32) -> f64 {
        f64::from(volume.min(100)) / 100.0
    }

    /// Gain automation for one note: silent at `start`, at peak after the
    /// attack ramp, still at peak when the release begins, silent at the end.
    pub fn points(&self, start: f64, duration: f64, volume: u32) -> [GainPoint; 4] {
        let ramp = self.ramp_for(duration);
        let end = start + duration.max(0.0);
        let peak = Self::peak(volume);
        let release = (end - ramp).max(start + ramp);
        [
            GainPoint {
                time: start,
                value: 0.0,
            },
            GainPoint {
                time: start + ramp,
                value: peak,
            },
            GainPoint {
                time: release,
                value: peak,
            },
            GainPoint {
                time: end,
                value: 0.0,
            },
        ]
    }
}

impl Default for NoteEnvelope {
    fn default() -> Self {
        Self::new(INTER_NOTE)
    }
}
