//! Lexer for MML text.
//!
//! A single left-to-right scan with two kinds of state: *open* (between
//! tokens) and *accumulating* (inside a command, collecting accidentals and
//! duration characters). A character that cannot extend the current command
//! ends it and is then dispatched again from the open state without being
//! consumed. Characters that start no command are skipped.

use tracing::{debug, trace, warn};

use super::duration::DurationExpr;
use super::pitch::{accidental_step, Letter, Pitch};
use super::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current: Option<TokenBuilder> = None;

        while let Some(ch) = self.peek() {
            match current.as_mut() {
                None => {
                    self.advance();
                    match TokenKind::from_command(ch) {
                        Ok(kind) => {
                            let builder = TokenBuilder::start(kind, ch);
                            if kind.accumulates() {
                                current = Some(builder);
                            } else {
                                tokens.extend(builder.finish());
                            }
                        }
                        Err(e) => trace!(pos = self.pos - 1, "skipped: {e}"),
                    }
                }
                Some(builder) => {
                    if builder.accept(ch) {
                        self.advance();
                        if ch == '&' {
                            self.skip_tie_continuation();
                        }
                    } else {
                        // `ch` is left in place and re-dispatched as open.
                        tokens.extend(current.take().and_then(TokenBuilder::finish));
                    }
                }
            }
        }

        tokens.extend(current.take().and_then(TokenBuilder::finish));
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Skip the note name written after a tie: one character, plus one
    /// accidental if present. A tie always keeps the first note's pitch.
    fn skip_tie_continuation(&mut self) {
        if self.peek().is_none() {
            return;
        }
        self.advance();
        if self.peek().and_then(accidental_step).is_some() {
            self.advance();
        }
    }
}

/// The command being accumulated.
struct TokenBuilder {
    kind: TokenKind,
    letter: Option<Letter>,
    accidental: i32,
    duration: DurationExpr,
}

impl TokenBuilder {
    fn start(kind: TokenKind, ch: char) -> Self {
        Self {
            kind,
            letter: Letter::from_char(ch).filter(|_| kind == TokenKind::Note),
            accidental: 0,
            duration: DurationExpr::default(),
        }
    }

    /// Take `ch` into the token if it can extend it.
    fn accept(&mut self, ch: char) -> bool {
        if let Some(step) = accidental_step(ch) {
            // Only meaningful on notes; other commands ignore it.
            self.accidental = self.accidental.saturating_add(step);
            return true;
        }
        match ch {
            '.' | '&' | '0'..='9' => {
                self.duration.push(ch);
                true
            }
            _ => false,
        }
    }

    fn finish(self) -> Option<Token> {
        match self.kind {
            TokenKind::Note => Some(Token::Note {
                pitch: Pitch::new(self.letter?, self.accidental),
                duration: self.duration,
            }),
            TokenKind::Rest => Some(Token::Rest {
                duration: self.duration,
            }),
            TokenKind::OctaveUp => Some(Token::OctaveUp),
            TokenKind::OctaveDown => Some(Token::OctaveDown),
            TokenKind::OctaveSet => self.setting().map(Token::OctaveSet),
            TokenKind::Length => self.setting().map(Token::Length),
            TokenKind::Tempo => self.setting().map(Token::Tempo),
            TokenKind::Volume => self.setting().map(Token::Volume),
        }
    }

    /// Integer payload of a setting command: its leading digits.
    fn setting(&self) -> Option<u32> {
        let digits: String = self
            .duration
            .as_str()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            debug!(kind = ?self.kind, "setting without a value ignored");
            return None;
        }
        match digits.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(kind = ?self.kind, "setting value {digits} ignored: {e}");
                None
            }
        }
    }
}

/// Tokenize one track of MML text.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}
