//! Tone bank — the oscillators behind the audio devices.
//!
//! Each tone is a single oscillator with a start time, a stop time, and a
//! piecewise-linear gain curve. The bank mixes every live tone into an
//! interleaved buffer and reports the tones that have finished.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Identifies a tone inside a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToneId(pub u64);

/// Available waveform shapes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Saw,
    Triangle,
}

impl Waveform {
    /// One sample at `phase` in `[0.0, 1.0)`, in `[-1.0, 1.0]`.
    pub fn sample(self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (phase * 2.0 * PI).sin(),
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
        }
    }
}

/// Most automation points a single tone can hold. A note envelope uses four.
pub const GAIN_POINTS: usize = 8;

/// Gain automation: values at absolute times, linear in between.
///
/// Before the first point the curve holds the first value; after the last it
/// holds the last. An empty curve is unity gain. Points live inline so the
/// audio thread never allocates for them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GainCurve {
    points: [(f64, f64); GAIN_POINTS],
    len: usize,
}

impl GainCurve {
    /// Add a point, keeping points ordered by time. Points at equal times
    /// keep their insertion order. Returns `false` once the curve is full.
    pub fn insert(&mut self, time: f64, value: f64) -> bool {
        if self.len == GAIN_POINTS {
            return false;
        }
        let pos = self.points().partition_point(|&(t, _)| t <= time);
        self.points.copy_within(pos..self.len, pos + 1);
        self.points[pos] = (time, value);
        self.len += 1;
        true
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn value_at(&self, time: f64) -> f64 {
        let points = self.points();
        let Some(&(first_t, first_v)) = points.first() else {
            return 1.0;
        };
        if time <= first_t {
            return first_v;
        }
        let next = points.partition_point(|&(t, _)| t <= time);
        if next >= points.len() {
            return points[points.len() - 1].1;
        }
        let (t0, v0) = points[next - 1];
        let (t1, v1) = points[next];
        v0 + (v1 - v0) * (time - t0) / (t1 - t0)
    }
}

/// One oscillator and its schedule.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    frequency: f64,
    phase: f64,
    start: Option<f64>,
    stop: Option<f64>,
    gain: GainCurve,
}

impl Voice {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            phase: 0.0,
            start: None,
            stop: None,
            gain: GainCurve::default(),
        }
    }

    fn sounding_at(&self, time: f64) -> bool {
        match self.start {
            Some(start) => time >= start && self.stop.map_or(true, |stop| time < stop),
            None => false,
        }
    }
}

/// All tones of one device.
#[derive(Debug, Clone, Default)]
pub struct ToneBank {
    waveform: Waveform,
    voices: HashMap<ToneId, Voice>,
}

impl ToneBank {
    pub fn new(waveform: Waveform) -> Self {
        Self::with_capacity(waveform, 0)
    }

    /// A bank that holds `capacity` tones before its map grows.
    pub fn with_capacity(waveform: Waveform, capacity: usize) -> Self {
        Self {
            waveform,
            voices: HashMap::with_capacity(capacity),
        }
    }

    /// Tones the bank holds without reallocating.
    pub fn capacity(&self) -> usize {
        self.voices.capacity()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn contains(&self, id: ToneId) -> bool {
        self.voices.contains_key(&id)
    }

    pub fn create(&mut self, id: ToneId, frequency: f64) {
        self.voices.insert(id, Voice::new(frequency));
    }

    /// Non-finite points, and points past [`GAIN_POINTS`], are dropped.
    pub fn schedule_gain(&mut self, id: ToneId, time: f64, value: f64) {
        if !(time.is_finite() && value.is_finite()) {
            return;
        }
        if let Some(voice) = self.voices.get_mut(&id) {
            voice.gain.insert(time, value.clamp(0.0, 1.0));
        }
    }

    pub fn start(&mut self, id: ToneId, time: f64) {
        if let Some(voice) = self.voices.get_mut(&id) {
            voice.start = Some(time);
        }
    }

    pub fn stop(&mut self, id: ToneId, time: f64) {
        if let Some(voice) = self.voices.get_mut(&id) {
            voice.stop = Some(time);
        }
    }

    pub fn release(&mut self, id: ToneId) -> bool {
        self.voices.remove(&id).is_some()
    }

    /// Latest stop time of any tone, if every tone has one.
    pub fn finish_time(&self) -> Option<f64> {
        self.voices
            .values()
            .map(|v| v.stop)
            .try_fold(f64::NEG_INFINITY, |acc, stop| stop.map(|s| acc.max(s)))
            .filter(|t| t.is_finite())
    }

    /// Mix all tones into `output` (interleaved, `channels` wide) starting at
    /// absolute frame `first_frame`. Tones whose stop time falls within the
    /// block are removed and their ids appended to `ended`. A tone without a
    /// finite positive frequency stays silent.
    pub fn render(
        &mut self,
        output: &mut [f32],
        channels: usize,
        first_frame: u64,
        sample_rate: u32,
        ended: &mut Vec<ToneId>,
    ) {
        let channels = channels.max(1);
        let frames = output.len() / channels;
        let rate = f64::from(sample_rate);
        let waveform = self.waveform;

        for voice in self.voices.values_mut() {
            let step = voice.frequency / rate;
            if !(step.is_finite() && step > 0.0) {
                continue;
            }
            for frame in 0..frames {
                let time = (first_frame + frame as u64) as f64 / rate;
                if !voice.sounding_at(time) {
                    continue;
                }
                let value = (waveform.sample(voice.phase) * voice.gain.value_at(time)) as f32;
                for sample in &mut output[frame * channels..(frame + 1) * channels] {
                    *sample += value;
                }
                voice.phase = (voice.phase + step).fract();
            }
        }

        let block_end = (first_frame + frames as u64) as f64 / rate;
        let before = ended.len();
        self.voices.retain(|&id, voice| match voice.stop {
            Some(stop) if stop <= block_end => {
                ended.push(id);
                false
            }
            _ => true,
        });
        ended[before..].sort();
    }
}
