//! Duration expressions — `4`, `8.`, `4&8`, or empty — resolved to whole notes.
//!
//! An expression is `component ('&' component)*` where a component is an
//! optional integer denominator followed by an optional dot. Components
//! without a denominator take the track's current default length, each on
//! its own, so `l8 c&4` is an eighth tied to a quarter.

use std::fmt;

use tracing::warn;

use super::error::MmlError;

/// Multiplier for a dotted component.
pub const DOT_FACTOR: f64 = 1.5;

/// The raw, unresolved duration text of a note or rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationExpr(String);

impl DurationExpr {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the expression inherits the default length entirely.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, ch: char) {
        self.0.push(ch);
    }

    /// The `&`-separated components, in order. An empty expression has one
    /// empty component.
    pub fn components(&self) -> impl Iterator<Item = Component<'_>> {
        self.0.split('&').map(Component::parse)
    }

    /// Length in whole notes, given the current default denominator.
    pub fn resolve(&self, default_length: u32) -> f64 {
        resolve(&self.0, default_length)
    }
}

impl fmt::Display for DurationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DurationExpr {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// One tied piece of a duration expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component<'a> {
    /// Text before the first dot; empty means "use the default length".
    pub denominator: &'a str,
    pub dotted: bool,
}

impl<'a> Component<'a> {
    pub fn parse(text: &'a str) -> Self {
        match text.split_once('.') {
            Some((denominator, _)) => Self {
                denominator,
                dotted: true,
            },
            None => Self {
                denominator: text,
                dotted: false,
            },
        }
    }

    /// The explicit denominator, if one was written.
    pub fn denominator(&self) -> Result<Option<u32>, MmlError> {
        if self.denominator.is_empty() {
            return Ok(None);
        }
        match self.denominator.parse::<u32>() {
            Ok(0) | Err(_) => Err(MmlError::MalformedDuration(self.denominator.to_string())),
            Ok(d) => Ok(Some(d)),
        }
    }

    /// Length of this component in whole notes.
    ///
    /// Malformed denominators fall back to `default_length`.
    pub fn whole_notes(&self, default_length: u32) -> f64 {
        let denominator = match self.denominator() {
            Ok(d) => d.unwrap_or(default_length),
            Err(e) => {
                warn!("{e}; using default length {default_length}");
                default_length
            }
        };
        let base = 1.0 / denominator.max(1) as f64;
        if self.dotted {
            base * DOT_FACTOR
        } else {
            base
        }
    }
}

/// Resolve a raw duration expression to whole notes.
pub fn resolve(expr: &str, default_length: u32) -> f64 {
    expr.split('&')
        .map(|part| Component::parse(part).whole_notes(default_length))
        .sum()
}
