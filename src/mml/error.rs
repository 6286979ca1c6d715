//! Error types for the MML compiler.
//!
//! The grammar is permissive: none of these errors abort compilation. The
//! lexer and resolver produce them internally, log them, and fall back.

use thiserror::Error;

/// A recoverable problem found while compiling MML text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmlError {
    /// A character does not start any command.
    #[error("unknown command character: '{0}'")]
    UnknownCommand(char),

    /// A duration component is not a positive integer denominator.
    #[error("malformed duration component: {0:?}")]
    MalformedDuration(String),
}
