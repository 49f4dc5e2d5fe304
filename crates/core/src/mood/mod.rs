//! Creature mood engine
//!
//! - **formula**: pure function of creation time, completed count and now
//! - **reconciler**: per-session counters seeded from history and advanced
//!   by ticks and completion events
//! - **creature**: face and bar selection for display

pub mod creature;
pub mod formula;
pub mod reconciler;

pub use creature::{mood_bar, CreatureFace};
pub use formula::{elapsed_seconds, mood_at, MoodPersistence, MoodPolicy, MoodSettings};
pub use reconciler::{seed_counters, MoodCounters, MoodEvent, MoodReconciler};

/// Maximum spread between boost and decay counters
pub const MAX_SPREAD: u64 = 100;
