//! Master bus — output volume followed by a hard limiter.

/// Default limiter ceiling.
pub const DEFAULT_CEILING: f32 = 0.95;

/// Scales the mixed output and clamps it to `[-ceiling, ceiling]`.
///
/// Overlapping tones sum linearly, so several loud tracks can exceed full
/// scale before this stage.
#[derive(Debug, Clone)]
pub struct MasterBus {
    volume: f32,
    ceiling: f32,
}

impl MasterBus {
    /// `volume` is clamped to `0.0..=1.0`; `ceiling` should be in `(0.0, 1.0]`.
    pub fn new(volume: f32, ceiling: f32) -> Self {
        debug_assert!(ceiling > 0.0 && ceiling <= 1.0);
        Self {
            volume: volume.clamp(0.0, 1.0),
            ceiling,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    #[inline]
    pub fn process(&self, sample: f32) -> f32 {
        (sample * self.volume).clamp(-self.ceiling, self.ceiling)
    }

    /// Apply volume and limiter to a buffer in place.
    #[inline]
    pub fn process_block(&self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

impl Default for MasterBus {
    fn default() -> Self {
        Self::new(1.0, DEFAULT_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_within_range() {
        let bus = MasterBus::default();
        assert_eq!(bus.process(0.5), 0.5);
        assert_eq!(bus.process(-0.95), -0.95);
    }

    #[test]
    fn test_clamps_to_ceiling() {
        let bus = MasterBus::default();
        assert_eq!(bus.process(2.5), 0.95);
        assert_eq!(bus.process(f32::MIN), -0.95);
    }

    #[test]
    fn test_volume_applied_before_limiter() {
        let mut bus = MasterBus::default();
        bus.set_volume(0.5);
        let mut buffer = vec![0.4, -0.4, 3.0];
        bus.process_block(&mut buffer);
        assert!((buffer[0] - 0.2).abs() < 1e-6);
        assert!((buffer[1] + 0.2).abs() < 1e-6);
        assert!((buffer[2] - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_volume_clamps_to_range() {
        let mut bus = MasterBus::new(1.5, 0.5);
        assert_eq!(bus.volume(), 1.0);
        bus.set_volume(-1.0);
        assert_eq!(bus.volume(), 0.0);
        assert_eq!(bus.ceiling(), 0.5);
    }
}
