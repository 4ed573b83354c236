//! Discretized observation used as a learning-table key

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ArenaError;

/// Number of fields in a state, and the length of [`State::to_vector`]
pub const STATE_FIELDS: usize = 8;

/// Delimiter between fields in [`State::to_key`]
pub const KEY_DELIMITER: char = '_';

/// Snapshot of the agent's and its target's observables.
///
/// Every field is pre-quantized so that equal observations hash and
/// serialize identically. Field order here is the order used by
/// [`State::to_key`] and [`State::to_vector`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// Own health, 0 to 100
    pub health_percent: u8,
    /// Target health, 0 to 100
    pub target_health_percent: u8,
    /// Remaining heal items
    pub heals_left: u8,
    /// Target within attack radius
    pub in_attack_range: bool,
    /// Target is mid-attack
    pub target_attacking: bool,
    /// Target is guarding
    pub target_guarding: bool,
    /// Target is dodging
    pub target_dodging: bool,
    /// Agent took a hit within the hit-recency window
    pub was_hit_recently: bool,
}

/// Truncates a normalized fraction to an integer percentage in `0..=100`.
///
/// Non-finite input maps to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize_percent(fraction: f32) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction * 100.0).trunc().clamp(0.0, 100.0) as u8
}

impl State {
    /// Canonical string key: the eight fields joined by `_`, booleans as 0/1
    #[must_use]
    pub fn to_key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}_{}_{}",
            self.health_percent,
            self.target_health_percent,
            self.heals_left,
            u8::from(self.in_attack_range),
            u8::from(self.target_attacking),
            u8::from(self.target_guarding),
            u8::from(self.target_dodging),
            u8::from(self.was_hit_recently),
        )
    }

    /// Decodes a key produced by [`State::to_key`].
    ///
    /// Fails on the wrong field count, on non-numeric fields, on booleans
    /// other than 0/1, and on keys that are not in canonical form (such as
    /// leading zeros), so no state is ever partially populated.
    pub fn from_key(key: &str) -> crate::Result<Self> {
        let malformed = |reason: String| ArenaError::MalformedStateKey {
            key: key.to_string(),
            reason,
        };

        let parts: Vec<&str> = key.split(KEY_DELIMITER).collect();
        if parts.len() != STATE_FIELDS {
            return Err(malformed(format!(
                "expected {STATE_FIELDS} fields, got {}",
                parts.len()
            )));
        }

        let number = |i: usize| -> crate::Result<u8> {
            parts[i]
                .parse::<u8>()
                .map_err(|e| malformed(format!("field {i} ({:?}): {e}", parts[i])))
        };
        let flag = |i: usize| -> crate::Result<bool> {
            match parts[i] {
                "0" => Ok(false),
                "1" => Ok(true),
                other => Err(malformed(format!("field {i} ({other:?}) is not 0 or 1"))),
            }
        };

        let state = State {
            health_percent: number(0)?,
            target_health_percent: number(1)?,
            heals_left: number(2)?,
            in_attack_range: flag(3)?,
            target_attacking: flag(4)?,
            target_guarding: flag(5)?,
            target_dodging: flag(6)?,
            was_hit_recently: flag(7)?,
        };

        if state.to_key() != key {
            return Err(malformed("key is not in canonical form".to_string()));
        }
        Ok(state)
    }

    /// Dense feature vector for an external policy: percentages as-is,
    /// booleans as 0.0 / 1.0
    #[must_use]
    pub fn to_vector(&self) -> [f32; STATE_FIELDS] {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        [
            f32::from(self.health_percent),
            f32::from(self.target_health_percent),
            f32::from(self.heals_left),
            flag(self.in_attack_range),
            flag(self.target_attacking),
            flag(self.target_guarding),
            flag(self.target_dodging),
            flag(self.was_hit_recently),
        ]
    }
}

impl FromStr for State {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::from_key(s)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}
