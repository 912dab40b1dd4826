//! Ordering of behaviors and examples.
//!
//! An [`OrderProvider`] permutes a slice without touching it. Declaration
//! order is the identity; random order is a Fisher-Yates shuffle driven by a
//! ChaCha stream seeded from a [`Seed`]. Every call reseeds the stream, so the
//! same seed and the same length always produce the same permutation.
//!
//! Seeds print as short base-32 strings (`-` prefixed when negative) so a
//! failing run can be replayed by passing the printed seed back in.
//!
//! # Example
//!
//! ```ignore
//! let order = OrderProvider::from_seed_str("3f0k1")?;
//! let shuffled = order.order(&behaviors);
//! ```

use crate::result::{ComprobarError, ComprobarResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Reproducible shuffle seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed(i64);

impl Seed {
    /// Create a seed from a raw value
    #[must_use]
    pub const fn from_i64(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw seed value
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Generate a fresh seed from the clock mixed with OS entropy.
    ///
    /// Generated seeds stay within 32 bits so their encoding is at most seven
    /// characters.
    #[must_use]
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mixed = nanos ^ rand::random::<u64>();
        Self(i64::from(mixed as i32))
    }

    /// Encode as sign-prefixed base-32 text
    #[must_use]
    pub fn encode(self) -> String {
        let mut magnitude = self.0.unsigned_abs();
        let mut digits = Vec::new();
        loop {
            digits.push(ALPHABET[(magnitude % 32) as usize]);
            magnitude /= 32;
            if magnitude == 0 {
                break;
            }
        }
        if self.0 < 0 {
            digits.push(b'-');
        }
        digits.iter().rev().map(|&b| char::from(b)).collect()
    }

    /// Decode text produced by [`Seed::encode`].
    ///
    /// Accepts an optional `+` or `-` prefix and either letter case.
    pub fn parse(text: &str) -> ComprobarResult<Self> {
        let invalid = |reason: &str| ComprobarError::InvalidSeed {
            seed: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if digits.is_empty() {
            return Err(invalid("no digits"));
        }

        let mut magnitude: u64 = 0;
        for ch in digits.chars() {
            let digit = ch
                .to_digit(32)
                .ok_or_else(|| invalid("not a base-32 digit"))?;
            magnitude = magnitude
                .checked_mul(32)
                .and_then(|m| m.checked_add(u64::from(digit)))
                .ok_or_else(|| invalid("out of range"))?;
        }

        let value = if negative {
            if magnitude > i64::MIN.unsigned_abs() {
                return Err(invalid("out of range"));
            }
            0_i64.wrapping_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).map_err(|_| invalid("out of range"))?
        };
        Ok(Self(value))
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Seed {
    type Err = ComprobarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Permutation strategy for behaviors and examples.
///
/// Serialized as `{ kind: declaration }` or `{ kind: random, seed: "k3j9" }`.
/// A random order read without a seed gets a fresh one at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "OrderSetting", into = "OrderSetting")]
pub enum OrderProvider {
    /// Declaration order
    #[default]
    Declaration,
    /// Seeded Fisher-Yates shuffle
    Random(Seed),
}

impl OrderProvider {
    /// Random order with a freshly generated seed
    #[must_use]
    pub fn random() -> Self {
        Self::Random(Seed::generate())
    }

    /// Random order replaying an encoded seed
    pub fn from_seed_str(seed: &str) -> ComprobarResult<Self> {
        Ok(Self::Random(Seed::parse(seed)?))
    }

    /// The seed, when ordering randomly
    #[must_use]
    pub const fn seed(&self) -> Option<Seed> {
        match self {
            Self::Declaration => None,
            Self::Random(seed) => Some(*seed),
        }
    }

    /// Text identifying the order, printed at run start
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Declaration => "declaration order".to_string(),
            Self::Random(seed) => format!("random order with seed {seed}"),
        }
    }

    /// Index permutation for a slice of `len` items
    #[must_use]
    pub fn permutation(&self, len: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..len).collect();
        if let Self::Random(seed) = self {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.value() as u64);
            for i in (1..len).rev() {
                let j = rng.gen_range(0..=i);
                indices.swap(i, j);
            }
        }
        indices
    }

    /// Borrow `items` in this order
    #[must_use]
    pub fn order<'a, T>(&self, items: &'a [T]) -> Vec<&'a T> {
        self.permutation(items.len())
            .into_iter()
            .map(|index| &items[index])
            .collect()
    }
}

/// Serialized form of [`OrderProvider`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OrderSetting {
    Declaration,
    Random {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<String>,
    },
}

impl TryFrom<OrderSetting> for OrderProvider {
    type Error = ComprobarError;

    fn try_from(setting: OrderSetting) -> Result<Self, Self::Error> {
        match setting {
            OrderSetting::Declaration => Ok(Self::Declaration),
            OrderSetting::Random { seed: None } => Ok(Self::random()),
            OrderSetting::Random { seed: Some(seed) } => Self::from_seed_str(&seed),
        }
    }
}

impl From<OrderProvider> for OrderSetting {
    fn from(order: OrderProvider) -> Self {
        match order {
            OrderProvider::Declaration => Self::Declaration,
            OrderProvider::Random(seed) => Self::Random {
                seed: Some(seed.encode()),
            },
        }
    }
}
