//! Instruction data model — what the scheduler hands to playback.
//!
//! An [`Instruction`] is either a tone to sound or a silent advance of the
//! track's time cursor. Times are absolute seconds on the device clock.

use std::fmt;

/// Identifies a track in a composite (comma-separated) input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u32);

/// One timed step of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    /// Sound `frequency` Hz from `start` for `duration` seconds.
    Play {
        frequency: f64,
        start: f64,
        duration: f64,
        /// Loudness on the 0–100 scale.
        volume: u32,
    },
    /// Silence; only moves the cursor.
    Rest { start: f64, duration: f64 },
}

impl Instruction {
    pub fn start(&self) -> f64 {
        match *self {
            Instruction::Play { start, .. } | Instruction::Rest { start, .. } => start,
        }
    }

    pub fn duration(&self) -> f64 {
        match *self {
            Instruction::Play { duration, .. } | Instruction::Rest { duration, .. } => duration,
        }
    }

    /// Time at which the next instruction of the same track begins.
    pub fn end(&self) -> f64 {
        self.start() + self.duration()
    }

    pub fn is_play(&self) -> bool {
        matches!(self, Instruction::Play { .. })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Play {
                frequency,
                start,
                duration,
                volume,
            } => write!(
                f,
                "{start:>8.3}s  play {frequency:>9.3} Hz  {duration:.3}s  v{volume}"
            ),
            Instruction::Rest { start, duration } => {
                write!(f, "{start:>8.3}s  rest {:>12}  {duration:.3}s", "")
            }
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_accessors() {
        let i = Instruction::Play {
            frequency: 440.0,
            start: 1.0,
            duration: 0.5,
            volume: 80,
        };
        assert_eq!(i.start(), 1.0);
        assert_eq!(i.duration(), 0.5);
        assert_eq!(i.end(), 1.5);
        assert!(i.is_play());
    }

    #[test]
    fn rest_accessors() {
        let i = Instruction::Rest {
            start: 2.0,
            duration: 0.25,
        };
        assert_eq!(i.end(), 2.25);
        assert!(!i.is_play());
    }

    #[test]
    fn track_id_equality() {
        assert_eq!(TrackId(0), TrackId(0));
        assert_ne!(TrackId(0), TrackId(1));
    }

    #[test]
    fn display() {
        let play = Instruction::Play {
            frequency: 440.0,
            start: 0.0,
            duration: 0.6,
            volume: 100,
        };
        assert_eq!(play.to_string(), "   0.000s  play   440.000 Hz  0.600s  v100");
        let rest = Instruction::Rest {
            start: 1.5,
            duration: 0.25,
        };
        assert_eq!(rest.to_string(), "   1.500s  rest               0.250s");
        assert_eq!(TrackId(2).to_string(), "track 2");
    }
}
