//! Event scheduling — per-track state and the token-to-instruction scheduler.
//!
//! The [`TrackScheduler`] sits between the MML lexer and the playback engine.
//! It walks a track's tokens with a [`PlaybackState`] and produces
//! [`Instruction`]s at absolute times. It never touches a device, so all
//! scheduling logic is testable without audio hardware.

pub mod scheduler;
pub mod state;
pub mod types;

pub use scheduler::TrackScheduler;
pub use state::{PlaybackDefaults, PlaybackState, MAX_VOLUME};
pub use types::{Instruction, TrackId};
