//! Validated probabilities and fixed-point probability keys.
//!
//! Every probability entering the simulator (transmission `p`, jump `q`) is
//! a [`Probability`]: a finite `f64` in `[0, 1]`. Construction is the only
//! place the range is checked, so downstream code never re-validates.
//!
//! Result stores group samples by probability. Floating-point values make
//! poor map keys (`0.1 + 0.2 != 0.3`), so samples are keyed by
//! [`ProbabilityKey`], the probability rounded to parts per million. Keys
//! are totally ordered and render with six decimals (`"0.100000"`).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Resolution of [`ProbabilityKey`]: one key unit is one millionth.
const KEY_SCALE: f64 = 1_000_000.0;

/// Errors produced when constructing a probability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbabilityError {
    /// The value is NaN, infinite, or outside `[0, 1]`.
    #[error("probability must be a finite value in [0, 1], got {value}")]
    OutOfRange {
        /// The rejected value.
        value: f64,
    },

    /// A textual key could not be parsed as a number.
    #[error("invalid probability key {text:?}")]
    InvalidKey {
        /// The rejected text.
        text: String,
    },
}

/// A probability in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    /// Probability zero: the event never happens.
    pub const ZERO: Self = Self(0.0);

    /// Probability one: the event always happens.
    pub const ONE: Self = Self(1.0);

    /// Validate and wrap a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`ProbabilityError::OutOfRange`] for NaN, infinities, and
    /// values outside `[0, 1]`.
    pub fn new(value: f64) -> Result<Self, ProbabilityError> {
        Self::checked(value).ok_or(ProbabilityError::OutOfRange { value })
    }

    /// Validate a raw value in a const context. Returns `None` where
    /// [`Probability::new`] would fail.
    #[allow(clippy::manual_range_contains)]
    pub const fn checked(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 && value <= 1.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Return the raw value.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Return the fixed-point key for this probability.
    pub fn key(self) -> ProbabilityKey {
        ProbabilityKey::from(self)
    }
}

impl TryFrom<f64> for Probability {
    type Error = ProbabilityError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(p: Probability) -> Self {
        p.0
    }
}

impl core::fmt::Display for Probability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A probability rounded to parts per million, usable as an ordered map key.
///
/// Serialized as its six-decimal string form so it can key JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProbabilityKey(u32);

impl ProbabilityKey {
    /// Build a key directly from a count of millionths.
    ///
    /// # Errors
    ///
    /// Returns [`ProbabilityError::OutOfRange`] if `millionths` exceeds one
    /// million.
    pub fn from_millionths(millionths: u32) -> Result<Self, ProbabilityError> {
        if millionths > 1_000_000 {
            return Err(ProbabilityError::OutOfRange {
                value: f64::from(millionths) / KEY_SCALE,
            });
        }
        Ok(Self(millionths))
    }

    /// Return the key as a count of millionths.
    pub const fn millionths(self) -> u32 {
        self.0
    }

    /// Return the probability this key stands for.
    pub fn probability(self) -> Probability {
        // In range by construction.
        Probability(f64::from(self.0) / KEY_SCALE)
    }
}

impl From<Probability> for ProbabilityKey {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(p: Probability) -> Self {
        // p is in [0, 1], so the rounded product is in [0, 1_000_000].
        Self((p.value() * KEY_SCALE).round() as u32)
    }
}

impl core::fmt::Display for ProbabilityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.6}", self.probability().value())
    }
}

impl FromStr for ProbabilityKey {
    type Err = ProbabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s.trim().parse().map_err(|_parse_err: core::num::ParseFloatError| {
            ProbabilityError::InvalidKey { text: s.to_owned() }
        })?;
        Probability::new(value).map(Self::from)
    }
}

impl TryFrom<String> for ProbabilityKey {
    type Error = ProbabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProbabilityKey> for String {
    fn from(key: ProbabilityKey) -> Self {
        key.to_string()
    }
}
