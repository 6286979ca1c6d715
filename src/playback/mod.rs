//! Playback engine — turns scheduled instructions into tone-device calls.
//!
//! The engine never renders audio itself. It talks to a [`ToneDevice`]: an
//! oscillator/gain abstraction that starts and stops tones and applies gain
//! automation at absolute timestamps. Every tone handed to the device is kept
//! in a registry until it ends, so [`PlaybackEngine::stop_all`] can silence
//! everything that is still sounding or scheduled.

pub mod driver;
pub mod envelope;

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use crate::event::Instruction;

pub use driver::{Player, PlayerOptions};
pub use envelope::{GainPoint, NoteEnvelope, INTER_NOTE};

/// Callback run by the device once a tone has finished sounding.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Playback errors.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No tone device could be acquired.
    #[error("tone device unavailable: {0}")]
    DeviceUnavailable(String),
    /// Failed to query device configuration.
    #[error("device config error: {0}")]
    DeviceConfig(String),
    /// Failed to build the audio stream.
    #[error("stream build error: {0}")]
    StreamBuild(String),
    /// Failed to start or pause the audio stream.
    #[error("stream play error: {0}")]
    StreamPlay(String),
    /// Ring buffer is full; the audio thread is not draining fast enough.
    #[error("audio command ring buffer is full")]
    BufferFull,
    /// Writing rendered audio failed.
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The tone generator the engine drives.
///
/// All times are absolute seconds on the device's own clock, as reported by
/// [`ToneDevice::current_time`].
pub trait ToneDevice {
    type Handle: Copy + Eq + Hash + fmt::Debug + Send + 'static;

    /// Allocate a periodic tone at `frequency` Hz. It stays silent until started.
    fn create_tone(&mut self, frequency: f64) -> Result<Self::Handle, PlaybackError>;

    /// Reach `value` (0.0–1.0) at `time`, ramping linearly from the previous point.
    fn schedule_gain(
        &mut self,
        handle: Self::Handle,
        time: f64,
        value: f64,
    ) -> Result<(), PlaybackError>;

    fn start(&mut self, handle: Self::Handle, time: f64) -> Result<(), PlaybackError>;

    /// Stop the tone at `time`. A later call replaces an earlier stop time.
    fn stop(&mut self, handle: Self::Handle, time: f64) -> Result<(), PlaybackError>;

    /// Run `callback` once the tone has stopped.
    fn on_ended(
        &mut self,
        handle: Self::Handle,
        callback: EndedCallback,
    ) -> Result<(), PlaybackError>;

    /// Free the tone now and drop its pending end callback.
    fn release(&mut self, handle: Self::Handle) -> Result<(), PlaybackError>;

    /// Monotonic device time in seconds.
    fn current_time(&self) -> f64;
}

/// Handles that were started and have not ended yet.
type Registry<H> = Arc<Mutex<HashSet<H>>>;

/// Issues envelope-shaped tones to a device and tracks them until they end.
pub struct PlaybackEngine<D: ToneDevice> {
    device: D,
    envelope: NoteEnvelope,
    active: Registry<D::Handle>,
}

impl<D: ToneDevice> PlaybackEngine<D> {
    pub fn new(device: D, envelope: NoteEnvelope) -> Self {
        Self {
            device,
            envelope,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Schedule one tone from `start` for `duration` seconds at a 0–100 volume.
    ///
    /// If any device call after `create_tone` fails, the tone is released
    /// and dropped from the registry before the error is returned.
    pub fn play(
        &mut self,
        frequency: f64,
        start: f64,
        duration: f64,
        volume: u32,
    ) -> Result<D::Handle, PlaybackError> {
        let handle = self.device.create_tone(frequency)?;
        let end = start + duration;
        if let Err(e) = self.arm(handle, start, end, volume) {
            lock(&self.active).remove(&handle);
            if let Err(release) = self.device.release(handle) {
                warn!(?handle, "release after failed schedule failed: {release}");
            }
            warn!(?handle, "tone abandoned: {e}");
            return Err(e);
        }

        debug!(?handle, frequency, start, end, volume, "tone scheduled");
        Ok(handle)
    }

    fn arm(
        &mut self,
        handle: D::Handle,
        start: f64,
        end: f64,
        volume: u32,
    ) -> Result<(), PlaybackError> {
        for point in self.envelope.points(start, end - start, volume) {
            self.device.schedule_gain(handle, point.time, point.value)?;
        }
        self.device.start(handle, start)?;
        self.device.stop(handle, end)?;

        lock(&self.active).insert(handle);
        let active = Arc::clone(&self.active);
        self.device.on_ended(
            handle,
            Box::new(move || {
                lock(&active).remove(&handle);
            }),
        )
    }

    /// Schedule a Play instruction; rests produce no device calls.
    pub fn perform(&mut self, instruction: &Instruction) -> Result<Option<D::Handle>, PlaybackError> {
        match *instruction {
            Instruction::Play {
                frequency,
                start,
                duration,
                volume,
            } => self.play(frequency, start, duration, volume).map(Some),
            Instruction::Rest { .. } => Ok(None),
        }
    }

    /// Number of tones started and not yet ended.
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn is_active(&self, handle: D::Handle) -> bool {
        lock(&self.active).contains(&handle)
    }

    /// Silence and release every tracked tone immediately.
    ///
    /// Returns the number of tones stopped. Device errors are logged and do
    /// not prevent the remaining tones from being stopped.
    pub fn stop_all(&mut self) -> usize {
        let handles: Vec<D::Handle> = lock(&self.active).drain().collect();
        let now = self.device.current_time();
        for &handle in &handles {
            if let Err(e) = self.device.stop(handle, now) {
                warn!(?handle, "stop failed: {e}");
            }
            if let Err(e) = self.device.release(handle) {
                warn!(?handle, "release failed: {e}");
            }
        }
        debug!(count = handles.len(), "all tones stopped");
        handles.len()
    }
}

fn lock<H>(registry: &Mutex<HashSet<H>>) -> std::sync::MutexGuard<'_, HashSet<H>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Records calls; tones end only when `finish` is called.
    #[derive(Default)]
    pub(crate) struct FakeDevice {
        pub next: u32,
        pub now: f64,
        pub gains: Vec<(u32, f64, f64)>,
        pub started: Vec<(u32, f64)>,
        pub stopped: Vec<(u32, f64)>,
        pub released: Vec<u32>,
        pub callbacks: HashMap<u32, EndedCallback>,
        pub fail_create: bool,
        /// Refuse `stop` for this many calls, like a full command queue.
        pub fail_stops: usize,
        pub fail_on_ended: bool,
    }

    impl FakeDevice {
        pub fn finish(&mut self, handle: u32) {
            if let Some(cb) = self.callbacks.remove(&handle) {
                cb();
            }
        }
    }

    impl ToneDevice for FakeDevice {
        type Handle = u32;

        fn create_tone(&mut self, _frequency: f64) -> Result<u32, PlaybackError> {
            if self.fail_create {
                return Err(PlaybackError::DeviceUnavailable("unplugged".into()));
            }
            self.next += 1;
            Ok(self.next)
        }

        fn schedule_gain(&mut self, h: u32, time: f64, value: f64) -> Result<(), PlaybackError> {
            self.gains.push((h, time, value));
            Ok(())
        }

        fn start(&mut self, h: u32, time: f64) -> Result<(), PlaybackError> {
            self.started.push((h, time));
            Ok(())
        }

        fn stop(&mut self, h: u32, time: f64) -> Result<(), PlaybackError> {
            if self.fail_stops > 0 {
                self.fail_stops -= 1;
                return Err(PlaybackError::BufferFull);
            }
            self.stopped.push((h, time));
            Ok(())
        }

        fn on_ended(&mut self, h: u32, callback: EndedCallback) -> Result<(), PlaybackError> {
            if self.fail_on_ended {
                return Err(PlaybackError::BufferFull);
            }
            self.callbacks.insert(h, callback);
            Ok(())
        }

        fn release(&mut self, h: u32) -> Result<(), PlaybackError> {
            self.callbacks.remove(&h);
            self.released.push(h);
            Ok(())
        }

        fn current_time(&self) -> f64 {
            self.now
        }
    }

    fn engine() -> PlaybackEngine<FakeDevice> {
        PlaybackEngine::new(FakeDevice::default(), NoteEnvelope::new(0.05))
    }

    #[test]
    fn play_issues_envelope_start_and_stop() {
        let mut e = engine();
        let h = e.play(440.0, 1.0, 0.5, 50).unwrap();
        let d = e.device();
        assert_eq!(d.gains.len(), 4);
        assert!(d.gains.iter().all(|&(gh, _, _)| gh == h));
        assert_eq!(d.gains[1].2, 0.5);
        assert_eq!(d.started, vec![(h, 1.0)]);
        assert_eq!(d.stopped, vec![(h, 1.5)]);
        assert!(e.is_active(h));
    }

    #[test]
    fn ended_tone_leaves_registry() {
        let mut e = engine();
        let a = e.play(440.0, 0.0, 0.5, 100).unwrap();
        let b = e.play(220.0, 0.5, 0.5, 100).unwrap();
        assert_eq!(e.active_count(), 2);
        e.device_mut().finish(a);
        assert_eq!(e.active_count(), 1);
        assert!(!e.is_active(a));
        assert!(e.is_active(b));
    }

    #[test]
    fn stop_all_stops_and_releases_everything() {
        let mut e = engine();
        let handles: Vec<u32> = (0..3)
            .map(|i| e.play(440.0, i as f64, 1.0, 100).unwrap())
            .collect();
        e.device_mut().now = 0.7;

        assert_eq!(e.stop_all(), 3);
        assert_eq!(e.active_count(), 0);

        let d = e.device();
        for h in &handles {
            assert!(d.stopped.contains(&(*h, 0.7)), "no immediate stop for {h}");
            assert!(d.released.contains(h), "no release for {h}");
        }
        assert!(d.callbacks.is_empty());
    }

    #[test]
    fn stop_all_with_nothing_active() {
        let mut e = engine();
        assert_eq!(e.stop_all(), 0);
        assert!(e.device().released.is_empty());
    }

    #[test]
    fn rest_makes_no_device_calls() {
        let mut e = engine();
        let out = e
            .perform(&Instruction::Rest {
                start: 0.0,
                duration: 1.0,
            })
            .unwrap();
        assert_eq!(out, None);
        assert!(e.device().started.is_empty());
    }

    #[test]
    fn device_failure_is_reported() {
        let mut e = engine();
        e.device_mut().fail_create = true;
        let err = e.play(440.0, 0.0, 1.0, 100).unwrap_err();
        assert!(matches!(err, PlaybackError::DeviceUnavailable(_)));
        assert_eq!(e.active_count(), 0);
    }

    #[test]
    fn failed_stop_releases_started_tone() {
        let mut e = engine();
        e.device_mut().fail_stops = 1;
        let err = e.play(440.0, 0.0, 1.0, 100).unwrap_err();
        assert!(matches!(err, PlaybackError::BufferFull));

        let d = e.device();
        assert_eq!(d.started.len(), 1);
        assert_eq!(d.released, vec![d.started[0].0]);
        assert_eq!(e.active_count(), 0);
    }

    #[test]
    fn failed_end_hook_leaves_no_registry_entry() {
        let mut e = engine();
        e.device_mut().fail_on_ended = true;
        let err = e.play(440.0, 0.0, 1.0, 100).unwrap_err();
        assert!(matches!(err, PlaybackError::BufferFull));
        assert_eq!(e.active_count(), 0);
        assert_eq!(e.device().released.len(), 1);
        assert_eq!(e.stop_all(), 0);
    }

    #[test]
    fn engine_recovers_after_failed_tone() {
        let mut e = engine();
        e.device_mut().fail_stops = 1;
        assert!(e.play(440.0, 0.0, 1.0, 100).is_err());
        let h = e.play(440.0, 1.0, 1.0, 100).unwrap();
        assert!(e.is_active(h));
        assert_eq!(e.stop_all(), 1);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            PlaybackError::BufferFull.to_string(),
            "audio command ring buffer is full"
        );
        assert_eq!(
            PlaybackError::DeviceUnavailable("none".into()).to_string(),
            "tone device unavailable: none"
        );
    }
}
