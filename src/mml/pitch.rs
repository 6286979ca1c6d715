//! Pitch names and the per-track frequency table.
//!
//! MML spells pitches as a lowercase letter followed by any number of `+`
//! (sharp) or `-` (flat) characters. Frequencies are equal-tempered around
//! concert A (A4 = 440 Hz) and scaled by powers of two per octave.

use std::ops::{Deref, DerefMut};

/// The octave every track starts in, and the one the table returns to.
pub const REFERENCE_OCTAVE: i32 = 4;

/// Frequency of A in the reference octave.
pub const CONCERT_A: f64 = 440.0;

/// Lowest octave a table can be moved to (C0 is about 16 Hz).
pub const MIN_OCTAVE: i32 = 0;

/// Highest octave a table can be moved to.
pub const MAX_OCTAVE: i32 = 10;

/// The seven natural note letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    /// Parse a lowercase MML note letter.
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            'c' => Some(Letter::C),
            'd' => Some(Letter::D),
            'e' => Some(Letter::E),
            'f' => Some(Letter::F),
            'g' => Some(Letter::G),
            'a' => Some(Letter::A),
            'b' => Some(Letter::B),
            _ => None,
        }
    }

    /// Half-steps above C.
    pub fn semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Letter::C => 'c',
            Letter::D => 'd',
            Letter::E => 'e',
            Letter::F => 'f',
            Letter::G => 'g',
            Letter::A => 'a',
            Letter::B => 'b',
        }
    }
}

/// One of the twelve chromatic pitch classes.
///
/// Sharps are canonical; flats parse to the same variant, so `c+` and `d-`
/// are indistinguishable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class for a half-step count above C, wrapping at the octave.
    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    /// Half-steps above C (0–11).
    pub fn semitone(self) -> i32 {
        self as i32
    }

    /// Parse an MML name such as `c`, `f+` or `b-`.
    pub fn parse(name: &str) -> Option<Self> {
        Pitch::parse(name).map(Pitch::pitch_class)
    }

    /// Frequency of this pitch class in the reference octave.
    pub fn base_frequency(self) -> f64 {
        half_steps_from_concert_a(self.semitone() - Letter::A.semitone())
    }
}

/// A note as written: a letter plus its accumulated accidentals.
///
/// Accidentals stack, so `c++` is two half-steps above `c` and `b+` crosses
/// into the next octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub letter: Letter,
    pub accidental: i32,
}

impl Pitch {
    pub fn new(letter: Letter, accidental: i32) -> Self {
        Self { letter, accidental }
    }

    pub fn natural(letter: Letter) -> Self {
        Self::new(letter, 0)
    }

    /// Parse a letter followed by zero or more `+`/`-` characters.
    pub fn parse(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let letter = Letter::from_char(chars.next()?)?;
        let mut accidental = 0;
        for ch in chars {
            accidental = accidental_step(ch)?.saturating_add(accidental);
        }
        Some(Self { letter, accidental })
    }

    /// Half-steps relative to A in the same octave.
    pub fn half_steps_from_a(self) -> i32 {
        (self.letter.semitone() - Letter::A.semitone()).saturating_add(self.accidental)
    }

    pub fn pitch_class(self) -> PitchClass {
        PitchClass::from_semitone(self.accidental.rem_euclid(12) + self.letter.semitone())
    }
}

/// `+1` for a sharp, `-1` for a flat.
pub fn accidental_step(ch: char) -> Option<i32> {
    match ch {
        '+' => Some(1),
        '-' => Some(-1),
        _ => None,
    }
}

fn half_steps_from_concert_a(steps: i32) -> f64 {
    CONCERT_A * 2f64.powf(steps as f64 / 12.0)
}

/// Pitch-to-frequency mapping for one track.
///
/// The table is parameterized by its current octave; every entry is the
/// reference-octave frequency scaled by `2^(octave - REFERENCE_OCTAVE)`.
/// Each track owns its own table so octave changes never leak between
/// concurrently playing tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyTable {
    octave: i32,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::at_octave(REFERENCE_OCTAVE)
    }

    /// A table at `octave`, clamped to [`MIN_OCTAVE`]..=[`MAX_OCTAVE`].
    pub fn at_octave(octave: i32) -> Self {
        Self {
            octave: octave.clamp(MIN_OCTAVE, MAX_OCTAVE),
        }
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    /// Rescale the whole table to `target` in one step.
    ///
    /// Returns `false` (and leaves the table alone) outside
    /// [`MIN_OCTAVE`]..=[`MAX_OCTAVE`].
    pub fn transpose(&mut self, target: i32) -> bool {
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&target) {
            return false;
        }
        self.octave = target;
        true
    }

    /// Move the table up (positive) or down (negative) by whole octaves.
    ///
    /// Returns `false` (and leaves the table alone) if the result would
    /// leave the octave range.
    pub fn shift(&mut self, delta: i32) -> bool {
        match self.octave.checked_add(delta) {
            Some(target) => self.transpose(target),
            None => false,
        }
    }

    /// Multiplier applied to reference-octave frequencies.
    pub fn scale(&self) -> f64 {
        2f64.powi(self.octave - REFERENCE_OCTAVE)
    }

    /// Frequency of a pitch class in the current octave.
    pub fn get(&self, pitch_class: PitchClass) -> f64 {
        pitch_class.base_frequency() * self.scale()
    }

    /// Frequency of a written pitch, honoring stacked accidentals.
    pub fn frequency(&self, pitch: Pitch) -> f64 {
        half_steps_from_concert_a(pitch.half_steps_from_a()) * self.scale()
    }

    /// All twelve entries in chromatic order.
    pub fn entries(&self) -> impl Iterator<Item = (PitchClass, f64)> + '_ {
        PitchClass::ALL.iter().map(move |&pc| (pc, self.get(pc)))
    }

    /// Borrow the table for a scheduling run.
    ///
    /// When the returned scope is dropped the table is back at
    /// [`REFERENCE_OCTAVE`], whichever way the run ended.
    pub fn scope(&mut self) -> OctaveScope<'_> {
        OctaveScope { table: self }
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`FrequencyTable::scope`].
pub struct OctaveScope<'a> {
    table: &'a mut FrequencyTable,
}

impl Deref for OctaveScope<'_> {
    type Target = FrequencyTable;

    fn deref(&self) -> &FrequencyTable {
        self.table
    }
}

impl DerefMut for OctaveScope<'_> {
    fn deref_mut(&mut self) -> &mut FrequencyTable {
        self.table
    }
}

impl Drop for OctaveScope<'_> {
    fn drop(&mut self) {
        self.table.octave = REFERENCE_OCTAVE;
    }
}
