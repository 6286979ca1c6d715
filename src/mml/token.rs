//! Token types for the MML lexer.

use std::fmt;

use super::duration::DurationExpr;
use super::error::MmlError;
use super::pitch::{Letter, Pitch};

/// A token produced by the lexer. Immutable once emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Note {
        pitch: Pitch,
        duration: DurationExpr,
    },
    Rest {
        duration: DurationExpr,
    },
    OctaveUp,
    OctaveDown,
    OctaveSet(u32),
    Length(u32),
    Tempo(u32),
    Volume(u32),
}

/// The kind of token, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Note,
    Rest,
    OctaveUp,
    OctaveDown,
    OctaveSet,
    Length,
    Tempo,
    Volume,
}

impl TokenKind {
    /// The command a character starts, if any.
    pub fn from_command(ch: char) -> Result<Self, MmlError> {
        match ch {
            '>' => Ok(TokenKind::OctaveUp),
            '<' => Ok(TokenKind::OctaveDown),
            'r' => Ok(TokenKind::Rest),
            'o' => Ok(TokenKind::OctaveSet),
            'l' => Ok(TokenKind::Length),
            't' => Ok(TokenKind::Tempo),
            'v' => Ok(TokenKind::Volume),
            _ if Letter::from_char(ch).is_some() => Ok(TokenKind::Note),
            _ => Err(MmlError::UnknownCommand(ch)),
        }
    }

    /// Whether the command takes characters after its name.
    pub fn accumulates(self) -> bool {
        !matches!(self, TokenKind::OctaveUp | TokenKind::OctaveDown)
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Note { .. } => TokenKind::Note,
            Token::Rest { .. } => TokenKind::Rest,
            Token::OctaveUp => TokenKind::OctaveUp,
            Token::OctaveDown => TokenKind::OctaveDown,
            Token::OctaveSet(_) => TokenKind::OctaveSet,
            Token::Length(_) => TokenKind::Length,
            Token::Tempo(_) => TokenKind::Tempo,
            Token::Volume(_) => TokenKind::Volume,
        }
    }

    pub fn note(pitch: Pitch, duration: impl Into<DurationExpr>) -> Self {
        Token::Note {
            pitch,
            duration: duration.into(),
        }
    }

    pub fn rest(duration: impl Into<DurationExpr>) -> Self {
        Token::Rest {
            duration: duration.into(),
        }
    }

    /// The duration expression of a note or rest.
    pub fn duration(&self) -> Option<&DurationExpr> {
        match self {
            Token::Note { duration, .. } | Token::Rest { duration } => Some(duration),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Note { pitch, duration } => {
                let accidentals = (if pitch.accidental >= 0 { "+" } else { "-" })
                    .repeat(pitch.accidental.unsigned_abs() as usize);
                write!(
                    f,
                    "NOTE({}{accidentals}, {:?})",
                    pitch.letter.as_char(),
                    duration.as_str()
                )
            }
            Token::Rest { duration } => write!(f, "REST({:?})", duration.as_str()),
            Token::OctaveUp => f.write_str("OCTAVE_UP"),
            Token::OctaveDown => f.write_str("OCTAVE_DOWN"),
            Token::OctaveSet(n) => write!(f, "OCTAVE_SET({n})"),
            Token::Length(n) => write!(f, "LENGTH({n})"),
            Token::Tempo(n) => write!(f, "TEMPO({n})"),
            Token::Volume(n) => write!(f, "VOLUME({n})"),
        }
    }
}
