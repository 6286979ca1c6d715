//! Audio devices — tone generators the playback engine drives.
//!
//! [`SynthDevice`] owns a cpal output stream and talks to it over two
//! lock-free ring buffers: scheduling commands go to the audio thread, ids of
//! finished tones come back. [`OfflineDevice`] renders the same tone bank to
//! PCM on a virtual clock.

pub mod callback;
pub mod command;
pub mod master;
pub mod offline;
pub mod tone;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use tracing::{debug, error, info};

pub use command::AudioCommand;
pub use master::MasterBus;
pub use offline::{DeviceCall, OfflineDevice};
pub use tone::{GainCurve, ToneBank, ToneId, Waveform};

use crate::playback::{EndedCallback, PlaybackError, ToneDevice};
use callback::AudioCallback;

/// Ring buffer capacity (number of commands). A note costs seven.
const RING_BUFFER_CAPACITY: usize = 1 << 16;

/// Capacity of the ended-tone return queue.
const ENDED_CAPACITY: usize = 4096;

/// Real-time tone device on the default cpal output.
///
/// Device time is the number of frames the audio thread has rendered, so
/// [`ToneDevice::current_time`] advances only while the stream runs.
pub struct SynthDevice {
    stream: cpal::Stream,
    producer: HeapProd<AudioCommand>,
    ended_rx: HeapCons<ToneId>,
    clock: Arc<AtomicU64>,
    callbacks: HashMap<ToneId, EndedCallback>,
    next_id: u64,
    sample_rate: u32,
    channels: u16,
}

impl SynthDevice {
    /// Open the default output device.
    ///
    /// `sample_rate` overrides the device's preferred rate when given.
    pub fn new(
        waveform: Waveform,
        master_volume: f32,
        sample_rate: Option<u32>,
    ) -> Result<Self, PlaybackError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            PlaybackError::DeviceUnavailable("no audio output device found".into())
        })?;

        let config = device
            .default_output_config()
            .map_err(|e| PlaybackError::DeviceConfig(e.to_string()))?;

        let sample_rate = sample_rate.unwrap_or(config.sample_rate().0);
        let channels = config.channels();

        Self::build_with_device(&device, waveform, master_volume, sample_rate, channels)
    }

    fn build_with_device(
        device: &cpal::Device,
        waveform: Waveform,
        master_volume: f32,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, PlaybackError> {
        let (producer, consumer) = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY).split();
        let (ended_tx, ended_rx) = HeapRb::<ToneId>::new(ENDED_CAPACITY).split();
        let clock = Arc::new(AtomicU64::new(0));

        let mut audio_callback = AudioCallback::new(
            consumer,
            ended_tx,
            Arc::clone(&clock),
            waveform,
            MasterBus::new(master_volume, master::DEFAULT_CEILING),
            channels,
            sample_rate,
        );

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            error!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| PlaybackError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PlaybackError::StreamPlay(e.to_string()))?;

        info!(sample_rate, channels, ?waveform, "audio stream started");

        Ok(Self {
            stream,
            producer,
            ended_rx,
            clock,
            callbacks: HashMap::new(),
            next_id: 0,
            sample_rate,
            channels,
        })
    }

    fn send(&mut self, cmd: AudioCommand) -> Result<(), PlaybackError> {
        self.producer
            .try_push(cmd)
            .map_err(|_| PlaybackError::BufferFull)
    }

    /// Run the end callbacks of every tone the audio thread has finished.
    ///
    /// Returns the number of callbacks run. Call this periodically from the
    /// thread that owns the device.
    pub fn poll_ended(&mut self) -> usize {
        let mut ran = 0;
        while let Some(id) = self.ended_rx.try_pop() {
            if let Some(callback) = self.callbacks.remove(&id) {
                callback();
                ran += 1;
            }
        }
        if ran > 0 {
            debug!(count = ran, "tones ended");
        }
        ran
    }

    /// Set master volume (clamped to 0.0..=1.0 on the audio thread).
    pub fn set_volume(&mut self, volume: f32) -> Result<(), PlaybackError> {
        self.send(AudioCommand::SetVolume(volume))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Pause the audio stream. The device clock stops with it.
    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.stream
            .pause()
            .map_err(|e| PlaybackError::StreamPlay(e.to_string()))
    }

    /// Resume the audio stream.
    pub fn resume(&self) -> Result<(), PlaybackError> {
        self.stream
            .play()
            .map_err(|e| PlaybackError::StreamPlay(e.to_string()))
    }
}

impl ToneDevice for SynthDevice {
    type Handle = ToneId;

    fn create_tone(&mut self, frequency: f64) -> Result<ToneId, PlaybackError> {
        let id = ToneId(self.next_id);
        self.send(AudioCommand::Create { id, frequency })?;
        self.next_id += 1;
        Ok(id)
    }

    fn schedule_gain(&mut self, id: ToneId, time: f64, value: f64) -> Result<(), PlaybackError> {
        self.send(AudioCommand::Gain { id, time, value })
    }

    fn start(&mut self, id: ToneId, time: f64) -> Result<(), PlaybackError> {
        self.send(AudioCommand::Start { id, time })
    }

    fn stop(&mut self, id: ToneId, time: f64) -> Result<(), PlaybackError> {
        self.send(AudioCommand::Stop { id, time })
    }

    fn on_ended(&mut self, id: ToneId, callback: EndedCallback) -> Result<(), PlaybackError> {
        self.callbacks.insert(id, callback);
        Ok(())
    }

    fn release(&mut self, id: ToneId) -> Result<(), PlaybackError> {
        self.callbacks.remove(&id);
        self.send(AudioCommand::Release(id))
    }

    fn current_time(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{NoteEnvelope, PlaybackEngine};

    #[test]
    #[ignore] // Requires audio device — run manually with `cargo test -- --ignored`
    fn test_synth_device_creation() {
        let device = SynthDevice::new(Waveform::Sine, 0.5, None);
        assert!(device.is_ok(), "SynthDevice::new() failed: {:?}", device.err());
        let device = device.unwrap();
        assert!(device.sample_rate() > 0);
        assert!(device.channels() > 0);
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_tone_ends_and_leaves_registry() {
        let device = SynthDevice::new(Waveform::Sine, 0.2, None).expect("no audio device");
        let mut engine = PlaybackEngine::new(device, NoteEnvelope::default());
        let now = engine.device().current_time();
        engine.play(440.0, now, 0.1, 50).unwrap();
        assert_eq!(engine.active_count(), 1);

        std::thread::sleep(std::time::Duration::from_millis(400));
        engine.device_mut().poll_ended();
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_stop_all_silences() {
        let device = SynthDevice::new(Waveform::Square, 0.2, None).expect("no audio device");
        let mut engine = PlaybackEngine::new(device, NoteEnvelope::default());
        let now = engine.device().current_time();
        for i in 0..4 {
            engine.play(220.0 * (i + 1) as f64, now, 5.0, 50).unwrap();
        }
        assert_eq!(engine.stop_all(), 4);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_pause_and_resume() {
        let device = SynthDevice::new(Waveform::Sine, 0.5, None).expect("no audio device");
        assert!(device.pause().is_ok());
        assert!(device.resume().is_ok());
    }

    #[test]
    fn test_ring_buffer_fits_many_notes() {
        assert!(RING_BUFFER_CAPACITY / 7 >= 4096);
    }
}
