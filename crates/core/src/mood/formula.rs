//! Mood formula
//!
//! `decay = floor(elapsed / interval) * decay_per_interval`,
//! `boost = completed * boost_per_task`, then combined by the configured
//! [`MoodPolicy`] and clamped to `0..=100`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How boost and decay combine into a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodPolicy {
    /// `round(50 + clamp(boost - decay, -100, 100) / 2)`
    #[default]
    SymmetricOffset,
    /// `clamp(100 - decay + boost, 0, 100)`
    Absolute,
}

/// Whether a session writes its mood back to the group record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodPersistence {
    /// Mood is derived per viewer and never persisted
    #[default]
    Ephemeral,
    /// Each completion writes the viewer's mood to the group (last write wins)
    WriteBack,
}

/// Mood constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodSettings {
    pub policy: MoodPolicy,
    pub interval_secs: u64,
    pub decay_per_interval: u64,
    pub boost_per_task: u64,
    /// Shown when the creation time is unknown or the session is unseeded
    pub neutral_default: u8,
    pub persistence: MoodPersistence,
}

impl Default for MoodSettings {
    fn default() -> Self {
        Self {
            policy: MoodPolicy::SymmetricOffset,
            interval_secs: 15,
            decay_per_interval: 10,
            boost_per_task: 20,
            neutral_default: 50,
            persistence: MoodPersistence::Ephemeral,
        }
    }
}

impl MoodSettings {
    /// Absolute policy with the default constants
    pub fn absolute() -> Self {
        Self {
            policy: MoodPolicy::Absolute,
            neutral_default: 100,
            ..Self::default()
        }
    }

    /// Tick period (never zero)
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Decay units accumulated over `elapsed_secs`
    pub fn decay_units(&self, elapsed_secs: i64) -> u64 {
        if elapsed_secs <= 0 {
            return 0;
        }
        (elapsed_secs as u64 / self.interval_secs.max(1)).saturating_mul(self.decay_per_interval)
    }

    /// Boost units for `completed` tasks
    pub fn boost_units(&self, completed: u64) -> u64 {
        completed.saturating_mul(self.boost_per_task)
    }

    /// Combine counters into a mood percentage
    pub fn combine(&self, boost_units: u64, decay_units: u64) -> u8 {
        let diff = (i128::from(boost_units) - i128::from(decay_units))
            .clamp(-200, 200) as i64;

        match self.policy {
            MoodPolicy::SymmetricOffset => {
                let d = diff.clamp(-100, 100);
                // (100 + d) is in 0..=200; +1 rounds halves up
                ((100 + d + 1) / 2) as u8
            }
            MoodPolicy::Absolute => (100 + diff).clamp(0, 100) as u8,
        }
    }
}

/// Seconds between creation and now; zero when `created_at` is in the future
pub fn elapsed_seconds(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_seconds().max(0)
}

/// Mood of a group from scratch
pub fn mood_at(
    settings: &MoodSettings,
    created_at: Option<DateTime<Utc>>,
    completed: u64,
    now: DateTime<Utc>,
) -> u8 {
    let Some(created_at) = created_at else {
        return settings.neutral_default.min(100);
    };

    let decay = settings.decay_units(elapsed_seconds(created_at, now));
    let boost = settings.boost_units(completed);
    settings.combine(boost, decay)
}
