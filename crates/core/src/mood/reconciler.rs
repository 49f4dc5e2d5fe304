//! Mood reconciler
//!
//! Holds the running decay/boost counters for one viewing session. Counters
//! are seeded once both the group's creation time and its completed-task
//! count are known, then advanced by [`MoodEvent::Tick`] and completion
//! events. A freshly seeded group always shows 100: idle time before the
//! viewer opened the group is not held against it.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::formula::{elapsed_seconds, MoodSettings};
use super::MAX_SPREAD;
use crate::invariants::assert_mood_counters;

/// Inputs the reconciler consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodEvent {
    /// Group record fetched for this session
    GroupLoaded { created_at: DateTime<Utc> },
    /// Historical completed-task count fetched
    HistoryLoaded { completed: u64 },
    /// Completed-task fetch failed; seeding stays deferred
    HistoryFailed,
    /// One decay interval elapsed
    Tick,
    /// This client completed a task (optimistic)
    TaskCompleted,
    /// A task in the group changed; carries the fresh completed count
    TasksChanged { completed: u64 },
    /// The group record changed; counters are re-seeded
    GroupChanged { created_at: DateTime<Utc> },
}

/// Running counters of a seeded session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodCounters {
    pub decay_units: u64,
    pub boost_units: u64,
}

/// Compute seed counters from history
///
/// Pure function of its inputs, so seeding twice with the same data yields
/// the same counters.
pub fn seed_counters(
    settings: &MoodSettings,
    created_at: DateTime<Utc>,
    completed: u64,
    now: DateTime<Utc>,
) -> MoodCounters {
    let elapsed_decay = settings.decay_units(elapsed_seconds(created_at, now));
    let historical_boost = settings.boost_units(completed);

    let boost_units = historical_boost.max(elapsed_decay.saturating_add(MAX_SPREAD));
    let decay_units = elapsed_decay.max(boost_units.saturating_sub(MAX_SPREAD));

    MoodCounters {
        decay_units,
        boost_units,
    }
}

/// Per-session mood state machine
#[derive(Debug, Clone)]
pub struct MoodReconciler {
    settings: MoodSettings,
    created_at: Option<DateTime<Utc>>,
    /// Completed tasks already credited (or seeded from)
    completed: Option<u64>,
    counters: Option<MoodCounters>,
}

impl MoodReconciler {
    pub fn new(settings: MoodSettings) -> Self {
        Self {
            settings,
            created_at: None,
            completed: None,
            counters: None,
        }
    }

    pub fn settings(&self) -> &MoodSettings {
        &self.settings
    }

    pub fn is_seeded(&self) -> bool {
        self.counters.is_some()
    }

    pub fn counters(&self) -> Option<MoodCounters> {
        self.counters
    }

    /// Completed tasks the session knows about
    pub fn known_completed(&self) -> Option<u64> {
        self.completed
    }

    /// Displayed mood; neutral default until seeded
    pub fn mood(&self) -> u8 {
        match self.counters {
            Some(c) => self.settings.combine(c.boost_units, c.decay_units),
            None => self.settings.neutral_default.min(100),
        }
    }

    /// Drop all counters (view unmounted or group switched)
    pub fn reset(&mut self) {
        self.created_at = None;
        self.completed = None;
        self.counters = None;
    }

    /// Apply an event and return the mood to display
    pub fn apply(&mut self, event: MoodEvent, now: DateTime<Utc>) -> u8 {
        match event {
            MoodEvent::GroupLoaded { created_at } => {
                if self.counters.is_none() {
                    self.created_at = Some(created_at);
                    self.try_seed(now);
                }
            }
            MoodEvent::HistoryLoaded { completed } | MoodEvent::TasksChanged { completed } => {
                if self.counters.is_some() {
                    self.credit_up_to(completed);
                } else {
                    self.completed = Some(completed);
                    self.try_seed(now);
                }
            }
            MoodEvent::HistoryFailed => {
                if self.counters.is_none() {
                    warn!("Completed-task history unavailable; mood stays unseeded");
                }
            }
            MoodEvent::Tick => self.tick(),
            MoodEvent::TaskCompleted => {
                if let Some(known) = self.completed {
                    self.credit_up_to(known.saturating_add(1));
                }
            }
            MoodEvent::GroupChanged { created_at } => {
                self.created_at = Some(created_at);
                self.counters = None;
                self.try_seed(now);
            }
        }

        self.mood()
    }

    fn try_seed(&mut self, now: DateTime<Utc>) {
        let (Some(created_at), Some(completed)) = (self.created_at, self.completed) else {
            return;
        };

        let counters = seed_counters(&self.settings, created_at, completed, now);
        debug!(
            decay = counters.decay_units,
            boost = counters.boost_units,
            completed,
            "Seeded mood counters"
        );
        self.counters = Some(counters);
    }

    fn tick(&mut self) {
        let Some(c) = self.counters.as_mut() else {
            return;
        };

        let next = c
            .decay_units
            .saturating_add(self.settings.decay_per_interval)
            .min(c.boost_units.saturating_add(MAX_SPREAD));
        c.decay_units = c.decay_units.max(next);
        assert_mood_counters(c.decay_units, c.boost_units);
    }

    /// Credit one boost per completion beyond the known count
    fn credit_up_to(&mut self, completed: u64) {
        let known = self.completed.unwrap_or(0);
        if completed <= known {
            return;
        }

        if let Some(c) = self.counters.as_mut() {
            let credit = (completed - known).saturating_mul(self.settings.boost_per_task);
            let next = c
                .boost_units
                .saturating_add(credit)
                .min(c.decay_units.saturating_add(MAX_SPREAD));
            c.boost_units = c.boost_units.max(next);
            assert_mood_counters(c.decay_units, c.boost_units);
        }
        self.completed = Some(completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::formula::MoodPolicy;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn seeded(settings: MoodSettings, age_secs: i64, completed: u64) -> MoodReconciler {
        let mut r = MoodReconciler::new(settings);
        let now = t0() + Duration::seconds(age_secs);
        r.apply(MoodEvent::GroupLoaded { created_at: t0() }, now);
        r.apply(MoodEvent::HistoryLoaded { completed }, now);
        r
    }

    #[test]
    fn test_unseeded_shows_neutral_default() {
        let mut r = MoodReconciler::new(MoodSettings::default());
        assert!(!r.is_seeded());
        assert_eq!(r.mood(), 50);

        // Group alone is not enough
        let mood = r.apply(MoodEvent::GroupLoaded { created_at: t0() }, t0());
        assert_eq!(mood, 50);
        assert!(!r.is_seeded());

        // Ticks before seeding do nothing
        r.apply(MoodEvent::Tick, t0());
        assert!(r.counters().is_none());
    }

    #[test]
    fn test_seeding_in_either_order() {
        let now = t0() + Duration::seconds(60);
        let mut a = MoodReconciler::new(MoodSettings::default());
        a.apply(MoodEvent::GroupLoaded { created_at: t0() }, now);
        a.apply(MoodEvent::HistoryLoaded { completed: 2 }, now);

        let mut b = MoodReconciler::new(MoodSettings::default());
        b.apply(MoodEvent::HistoryLoaded { completed: 2 }, now);
        b.apply(MoodEvent::GroupLoaded { created_at: t0() }, now);

        assert_eq!(a.counters(), b.counters());
        assert!(a.is_seeded());
    }

    #[test]
    fn test_seeding_is_idempotent() {
        let s = MoodSettings::default();
        let now = t0() + Duration::seconds(1_234);
        let first = seed_counters(&s, t0(), 3, now);
        let second = seed_counters(&s, t0(), 3, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeding_floor_for_idle_group() {
        // Created a day ago, nothing completed
        for settings in [MoodSettings::default(), MoodSettings::absolute()] {
            let r = seeded(settings, 86_400, 0);
            let c = r.counters().unwrap();
            assert_eq!(c.decay_units, 57_600);
            assert_eq!(c.boost_units, c.decay_units + 100);
            assert_eq!(r.mood(), 100);
        }
    }

    #[test]
    fn test_seeding_with_large_history_caps_spread() {
        let s = MoodSettings::default();
        // 15s old: decay 10; 50 tasks: boost 1000
        let c = seed_counters(&s, t0(), 50, t0() + Duration::seconds(15));
        assert_eq!(c.boost_units, 1_000);
        assert_eq!(c.decay_units, 900);
    }

    #[test]
    fn test_tick_decays_symmetric() {
        let mut r = seeded(MoodSettings::default(), 0, 0);
        assert_eq!(r.mood(), 100);
        assert_eq!(r.apply(MoodEvent::Tick, t0()), 95);
        assert_eq!(r.apply(MoodEvent::Tick, t0()), 90);
    }

    #[test]
    fn test_decay_is_capped_relative_to_boost() {
        let mut r = seeded(MoodSettings::default(), 0, 0);
        for _ in 0..100 {
            r.apply(MoodEvent::Tick, t0());
        }
        let c = r.counters().unwrap();
        assert_eq!(c.decay_units, c.boost_units + 100);
        assert_eq!(r.mood(), 0);

        // One completion lifts the mood right away
        assert_eq!(r.apply(MoodEvent::TaskCompleted, t0()), 10);
    }

    #[test]
    fn test_boost_is_capped_relative_to_decay() {
        let mut r = seeded(MoodSettings::default(), 0, 0);
        let before = r.counters().unwrap();
        r.apply(MoodEvent::TaskCompleted, t0());
        assert_eq!(r.counters().unwrap(), before);
        assert_eq!(r.mood(), 100);
    }

    #[test]
    fn test_local_completion_not_double_counted() {
        let mut r = seeded(MoodSettings::default(), 0, 0);
        for _ in 0..4 {
            r.apply(MoodEvent::Tick, t0());
        }
        assert_eq!(r.mood(), 80);

        r.apply(MoodEvent::TaskCompleted, t0());
        assert_eq!(r.mood(), 90);

        // Change notification reports the same completion
        r.apply(MoodEvent::TasksChanged { completed: 1 }, t0());
        assert_eq!(r.mood(), 90);
        assert_eq!(r.known_completed(), Some(1));
    }

    #[test]
    fn test_remote_completions_credit_delta() {
        let mut r = seeded(MoodSettings::default(), 0, 1);
        for _ in 0..6 {
            r.apply(MoodEvent::Tick, t0());
        }
        let mood = r.mood();
        r.apply(MoodEvent::TasksChanged { completed: 3 }, t0());
        assert_eq!(r.mood(), mood + 20);

        // Counts never move the boost backwards
        let c = r.counters().unwrap();
        r.apply(MoodEvent::TasksChanged { completed: 0 }, t0());
        assert_eq!(r.counters().unwrap(), c);
    }

    #[test]
    fn test_huge_completion_delta_is_capped() {
        let mut r = seeded(MoodSettings::default(), 0, 0);
        for _ in 0..20 {
            r.apply(MoodEvent::Tick, t0());
        }
        assert_eq!(r.mood(), 0);

        r.apply(MoodEvent::TasksChanged { completed: u64::MAX }, t0());
        let c = r.counters().unwrap();
        assert_eq!(c.boost_units, c.decay_units + 100);
        assert_eq!(r.mood(), 100);
        assert_eq!(r.known_completed(), Some(u64::MAX));
    }

    #[test]
    fn test_counters_never_decrease() {
        let mut r = seeded(MoodSettings::default(), 600, 2);
        let mut last = r.counters().unwrap();
        let events = [
            MoodEvent::Tick,
            MoodEvent::TaskCompleted,
            MoodEvent::Tick,
            MoodEvent::TasksChanged { completed: 1 },
            MoodEvent::TasksChanged { completed: 9 },
            MoodEvent::Tick,
            MoodEvent::HistoryFailed,
        ];
        for event in events {
            r.apply(event, t0());
            let c = r.counters().unwrap();
            assert!(c.decay_units >= last.decay_units);
            assert!(c.boost_units >= last.boost_units);
            last = c;
        }
    }

    #[test]
    fn test_history_failure_keeps_unseeded() {
        let mut r = MoodReconciler::new(MoodSettings::default());
        r.apply(MoodEvent::GroupLoaded { created_at: t0() }, t0());
        let mood = r.apply(MoodEvent::HistoryFailed, t0());
        assert!(!r.is_seeded());
        assert_eq!(mood, 50);

        // A later successful load seeds normally
        r.apply(MoodEvent::HistoryLoaded { completed: 0 }, t0());
        assert!(r.is_seeded());
    }

    #[test]
    fn test_group_changed_reseeds() {
        let mut r = seeded(MoodSettings::default(), 0, 0);
        for _ in 0..5 {
            r.apply(MoodEvent::Tick, t0());
        }
        assert_eq!(r.mood(), 75);

        let now = t0() + Duration::seconds(30);
        let mood = r.apply(MoodEvent::GroupChanged { created_at: t0() }, now);
        assert_eq!(mood, 100);
        assert_eq!(r.counters(), Some(seed_counters(r.settings(), t0(), 0, now)));
    }

    #[test]
    fn test_group_loaded_does_not_reseed() {
        let mut r = seeded(MoodSettings::default(), 0, 0);
        r.apply(MoodEvent::Tick, t0());
        let c = r.counters();
        r.apply(
            MoodEvent::GroupLoaded {
                created_at: t0() - Duration::days(3),
            },
            t0(),
        );
        assert_eq!(r.counters(), c);
    }

    #[test]
    fn test_reset_discards_counters() {
        let mut r = seeded(MoodSettings::default(), 0, 4);
        r.reset();
        assert!(!r.is_seeded());
        assert_eq!(r.known_completed(), None);
        assert_eq!(r.mood(), 50);
    }

    #[test]
    fn test_absolute_policy_grace_before_decay_shows() {
        let settings = MoodSettings {
            policy: MoodPolicy::Absolute,
            ..MoodSettings::default()
        };
        let mut r = seeded(settings, 0, 0);
        for _ in 0..10 {
            assert_eq!(r.apply(MoodEvent::Tick, t0()), 100);
        }
        assert_eq!(r.apply(MoodEvent::Tick, t0()), 90);
    }
}
