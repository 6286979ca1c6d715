//! Audio callback — runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, renders every live tone, applies the
//! master bus, advances the shared frame clock, and reports finished tones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};

use super::command::AudioCommand;
use super::master::MasterBus;
use super::tone::{ToneBank, ToneId, Waveform};

/// Initial capacity of the per-block list of finished tones.
const ENDED_CAPACITY: usize = 256;

/// Tones the audio thread holds before its tone map has to grow. Creating a
/// tone beyond this allocates inside the callback.
pub const VOICE_CAPACITY: usize = 4096;

/// State that lives on the audio thread. Accessed only from the cpal callback.
///
/// Nothing here allocates while fewer than [`VOICE_CAPACITY`] tones are held:
/// gain points are stored inline and the tone map is sized up front.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    ended_tx: HeapProd<ToneId>,
    bank: ToneBank,
    master: MasterBus,
    clock: Arc<AtomicU64>,
    ended: Vec<ToneId>,
    channels: u16,
    sample_rate: u32,
}

impl AudioCallback {
    pub fn new(
        consumer: HeapCons<AudioCommand>,
        ended_tx: HeapProd<ToneId>,
        clock: Arc<AtomicU64>,
        waveform: Waveform,
        master: MasterBus,
        channels: u16,
        sample_rate: u32,
    ) -> Self {
        Self {
            consumer,
            ended_tx,
            bank: ToneBank::with_capacity(waveform, VOICE_CAPACITY),
            master,
            clock,
            ended: Vec::with_capacity(ENDED_CAPACITY),
            channels,
            sample_rate,
        }
    }

    /// Called by cpal for each output buffer.
    pub fn process(&mut self, output: &mut [f32]) {
        // 1. Drain all pending commands from the ring buffer.
        while let Some(cmd) = self.consumer.try_pop() {
            self.apply(cmd);
        }

        // 2. Render tones from the current frame.
        output.fill(0.0);
        let first_frame = self.clock.load(Ordering::Acquire);
        self.bank.render(
            output,
            self.channels as usize,
            first_frame,
            self.sample_rate,
            &mut self.ended,
        );

        // 3. Master volume and limiter.
        self.master.process_block(output);

        // 4. Advance the clock.
        let frames = (output.len() / self.channels.max(1) as usize) as u64;
        self.clock.store(first_frame + frames, Ordering::Release);

        // 5. Report finished tones; whatever does not fit is retried next block.
        let mut sent = 0;
        for &id in &self.ended {
            if self.ended_tx.try_push(id).is_err() {
                break;
            }
            sent += 1;
        }
        self.ended.drain(..sent);
    }

    fn apply(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Create { id, frequency } => self.bank.create(id, frequency),
            AudioCommand::Gain { id, time, value } => self.bank.schedule_gain(id, time, value),
            AudioCommand::Start { id, time } => self.bank.start(id, time),
            AudioCommand::Stop { id, time } => self.bank.stop(id, time),
            AudioCommand::Release(id) => {
                self.bank.release(id);
            }
            AudioCommand::SetVolume(v) => self.master.set_volume(v),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of tones currently held on the audio thread.
    pub fn tone_count(&self) -> usize {
        self.bank.len()
    }
}
