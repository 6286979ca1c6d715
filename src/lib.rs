//! mmlplay — a Music Macro Language compiler and tone player.
//!
//! Text is tokenized by [`mml`], scheduled into timed instructions by
//! [`event`], and played on a [`playback::ToneDevice`] such as the cpal
//! backed [`audio::SynthDevice`] or the WAV-rendering
//! [`audio::OfflineDevice`].

pub mod audio;
pub mod config;
pub mod event;
pub mod mml;
pub mod playback;
