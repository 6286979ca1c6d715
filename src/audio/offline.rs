//! Offline device — renders scheduled tones to PCM without a sound card.
//!
//! Time is virtual: it starts at zero and advances only as blocks are
//! rendered. Every device call is also logged, which makes the device a
//! convenient probe for what the playback engine asked for.

use std::collections::HashMap;
use std::io::{Seek, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::master::MasterBus;
use super::tone::{ToneBank, ToneId, Waveform};
use crate::playback::{EndedCallback, PlaybackError, ToneDevice};

/// Frames rendered per block.
pub const BLOCK_FRAMES: usize = 1024;

/// One call received by an [`OfflineDevice`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCall {
    Create { id: ToneId, frequency: f64 },
    Gain { id: ToneId, time: f64, value: f64 },
    Start { id: ToneId, time: f64 },
    Stop { id: ToneId, time: f64 },
    OnEnded(ToneId),
    Release(ToneId),
}

/// A tone device that renders into memory.
pub struct OfflineDevice {
    bank: ToneBank,
    master: MasterBus,
    frame: u64,
    sample_rate: u32,
    channels: u16,
    next_id: u64,
    calls: Vec<DeviceCall>,
    callbacks: HashMap<ToneId, EndedCallback>,
}

impl OfflineDevice {
    pub fn new(waveform: Waveform, sample_rate: u32, channels: u16) -> Self {
        Self {
            bank: ToneBank::new(waveform),
            master: MasterBus::default(),
            frame: 0,
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            next_id: 0,
            calls: Vec::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Replace the master bus (volume and limiter).
    pub fn with_master(mut self, master: MasterBus) -> Self {
        self.master = master;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Tones created and not yet finished or released.
    pub fn pending_tones(&self) -> usize {
        self.bank.len()
    }

    /// Render until every tone has finished.
    ///
    /// Tones that were never given a stop time would sound forever; rendering
    /// ends at the last known stop time instead.
    pub fn render(&mut self) -> Vec<f32> {
        match self.bank.finish_time() {
            Some(end) => self.render_until(end),
            None if self.bank.is_empty() => Vec::new(),
            None => {
                warn!(
                    tones = self.bank.len(),
                    "tones without a stop time; rendering nothing"
                );
                Vec::new()
            }
        }
    }

    /// Render interleaved samples from the current time up to `time`.
    pub fn render_until(&mut self, time: f64) -> Vec<f32> {
        let target = (time.max(0.0) * f64::from(self.sample_rate)).ceil() as u64;
        let channels = self.channels as usize;
        let mut out = Vec::with_capacity(target.saturating_sub(self.frame) as usize * channels);
        let mut ended = Vec::new();

        while self.frame < target {
            let frames = ((target - self.frame) as usize).min(BLOCK_FRAMES);
            let offset = out.len();
            out.resize(offset + frames * channels, 0.0);
            let block = &mut out[offset..];

            self.bank
                .render(block, channels, self.frame, self.sample_rate, &mut ended);
            self.master.process_block(block);
            self.frame += frames as u64;

            for id in ended.drain(..) {
                if let Some(callback) = self.callbacks.remove(&id) {
                    callback();
                }
            }
        }

        debug!(frames = out.len() / channels, now = self.current_time(), "rendered");
        out
    }

    /// Render everything and encode it as 16-bit PCM WAV.
    ///
    /// Returns the number of frames written.
    pub fn write_wav<W: Write + Seek>(&mut self, writer: W) -> Result<usize, PlaybackError> {
        let samples = self.render();
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut wav = hound::WavWriter::new(writer, spec)?;
        for &s in &samples {
            wav.write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
        }
        wav.finalize()?;
        Ok(samples.len() / self.channels as usize)
    }

    /// [`write_wav`](Self::write_wav) into a file at `path`.
    pub fn save_wav(&mut self, path: impl AsRef<Path>) -> Result<usize, PlaybackError> {
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write_wav(file)
    }
}

impl ToneDevice for OfflineDevice {
    type Handle = ToneId;

    fn create_tone(&mut self, frequency: f64) -> Result<ToneId, PlaybackError> {
        let id = ToneId(self.next_id);
        self.next_id += 1;
        self.bank.create(id, frequency);
        self.calls.push(DeviceCall::Create { id, frequency });
        Ok(id)
    }

    fn schedule_gain(&mut self, id: ToneId, time: f64, value: f64) -> Result<(), PlaybackError> {
        self.bank.schedule_gain(id, time, value);
        self.calls.push(DeviceCall::Gain { id, time, value });
        Ok(())
    }

    fn start(&mut self, id: ToneId, time: f64) -> Result<(), PlaybackError> {
        self.bank.start(id, time);
        self.calls.push(DeviceCall::Start { id, time });
        Ok(())
    }

    fn stop(&mut self, id: ToneId, time: f64) -> Result<(), PlaybackError> {
        self.bank.stop(id, time);
        self.calls.push(DeviceCall::Stop { id, time });
        Ok(())
    }

    fn on_ended(&mut self, id: ToneId, callback: EndedCallback) -> Result<(), PlaybackError> {
        self.callbacks.insert(id, callback);
        self.calls.push(DeviceCall::OnEnded(id));
        Ok(())
    }

    fn release(&mut self, id: ToneId) -> Result<(), PlaybackError> {
        self.bank.release(id);
        self.callbacks.remove(&id);
        self.calls.push(DeviceCall::Release(id));
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.frame as f64 / f64::from(self.sample_rate)
    }
}
