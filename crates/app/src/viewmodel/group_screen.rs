//! Group screen view model
//!
//! Owns the mood reconciler for one viewed group. Mounting loads the group
//! record and its completed-task count, then starts the decay ticker; the
//! ticker lives exactly as long as the screen is mounted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use huddle_core::{
    CreatureFace, GroupService, MoodEvent, MoodPersistence, MoodReconciler, Task, TaskService,
};
use huddle_net::Change;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::state::AppState;

type SharedReconciler = Arc<Mutex<MoodReconciler>>;

fn lock(reconciler: &SharedReconciler) -> MutexGuard<'_, MoodReconciler> {
    reconciler.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct GroupScreen {
    state: Arc<AppState>,
    group_id: Uuid,
    reconciler: SharedReconciler,
    mood_tx: Arc<watch::Sender<u8>>,
    ticker: Option<JoinHandle<()>>,
}

impl GroupScreen {
    /// Load the group and start ticking. Must run inside a tokio runtime.
    ///
    /// Load failures leave the neutral mood showing rather than failing.
    pub fn mount(state: Arc<AppState>, group_id: Uuid) -> AppResult<Self> {
        let settings = state.config.mood;
        let mut reconciler = MoodReconciler::new(settings);
        let now = Utc::now();

        let group = {
            let db = state.db();
            GroupService::new(&*db).find_group(group_id)
        };
        match group {
            Ok(group) => {
                reconciler.apply(
                    MoodEvent::GroupLoaded {
                        created_at: group.created_at,
                    },
                    now,
                );
            }
            // Stays unseeded until a group change arrives
            Err(e) => warn!(%group_id, error = %e, "Failed to load group"),
        }

        let history = {
            let db = state.db();
            TaskService::new(&*db).completed_count(group_id)
        };
        let mood = match history {
            Ok(completed) => reconciler.apply(MoodEvent::HistoryLoaded { completed }, now),
            Err(e) => {
                warn!(%group_id, error = %e, "Failed to load completed tasks");
                reconciler.apply(MoodEvent::HistoryFailed, now)
            }
        };

        let (mood_tx, _) = watch::channel(mood);
        let reconciler = Arc::new(Mutex::new(reconciler));
        let mood_tx = Arc::new(mood_tx);
        let ticker = spawn_ticker(settings.interval(), reconciler.clone(), mood_tx.clone());

        info!(%group_id, mood, "Group screen mounted");
        Ok(Self {
            state,
            group_id,
            reconciler,
            mood_tx,
            ticker: Some(ticker),
        })
    }

    pub fn group_id(&self) -> Uuid {
        self.group_id
    }

    pub fn is_mounted(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn is_seeded(&self) -> bool {
        lock(&self.reconciler).is_seeded()
    }

    /// Current displayed mood
    pub fn mood(&self) -> u8 {
        *self.mood_tx.borrow()
    }

    pub fn face(&self) -> CreatureFace {
        CreatureFace::for_mood(self.mood())
    }

    /// Receiver notified on every mood update
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.mood_tx.subscribe()
    }

    /// Feed an event to the reconciler and publish the result
    pub fn apply(&self, event: MoodEvent) -> u8 {
        let mood = lock(&self.reconciler).apply(event, Utc::now());
        self.mood_tx.send_replace(mood);
        mood
    }

    /// React to a feed change; `None` when it does not concern this screen
    pub fn handle_change(&self, change: &Change) -> AppResult<Option<u8>> {
        if change.group_id() != self.group_id {
            return Ok(None);
        }

        let event = match change {
            Change::TaskChanged { .. } => {
                let completed = {
                    let db = self.state.db();
                    TaskService::new(&*db).completed_count(self.group_id)?
                };
                MoodEvent::TasksChanged { completed }
            }
            Change::GroupChanged { created_at, .. } => MoodEvent::GroupChanged {
                created_at: *created_at,
            },
            Change::MembersChanged { .. } | Change::Nudged { .. } => return Ok(None),
        };

        debug!(group_id = %self.group_id, ?event, "Applying feed change");
        Ok(Some(self.apply(event)))
    }

    /// Complete one of the viewer's tasks and credit the creature
    pub fn complete_task(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        photo: &[u8],
        ext: Option<&str>,
    ) -> AppResult<Task> {
        let task = {
            let db = self.state.db();
            TaskService::new(&*db).complete_task(task_id, user_id, photo, ext, &self.state.photos)?
        };

        if task.group_id == self.group_id {
            let mood = self.apply(MoodEvent::TaskCompleted);
            if self.state.config.mood.persistence == MoodPersistence::WriteBack {
                let db = self.state.db();
                GroupService::new(&*db).set_creature_mood(self.group_id, mood)?;
            }
        }
        Ok(task)
    }

    /// Stop ticking and discard the counters
    pub fn unmount(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            lock(&self.reconciler).reset();
            info!(group_id = %self.group_id, "Group screen unmounted");
        }
    }
}

impl Drop for GroupScreen {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn spawn_ticker(
    period: Duration,
    reconciler: SharedReconciler,
    mood_tx: Arc<watch::Sender<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            let mood = lock(&reconciler).apply(MoodEvent::Tick, Utc::now());
            mood_tx.send_replace(mood);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{signed_in, state};
    use huddle_core::{Config, Group, GroupRepository, MoodSettings};

    fn setup(config: Config) -> (Arc<AppState>, tempfile::TempDir, Uuid, Group) {
        let (state, dir) = state(config);
        let user = signed_in(&state, "alice");
        let group = {
            let db = state.db();
            GroupService::new(&*db).create_group("Walkers", user.id).unwrap()
        };
        (Arc::new(state), dir, user.id, group)
    }

    fn add_task(state: &AppState, group_id: Uuid, user_id: Uuid) -> Task {
        let db = state.db();
        TaskService::new(&*db)
            .add_task(group_id, user_id, "Stretch")
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_group_starts_happy_and_decays() {
        let (state, _dir, _user, group) = setup(Config::default());
        let screen = GroupScreen::mount(state, group.id).unwrap();
        let mut rx = screen.subscribe();

        assert_eq!(screen.mood(), 100);
        assert_eq!(screen.face(), CreatureFace::Happy);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 95);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 90);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_boosts_mood() {
        let (state, _dir, user, group) = setup(Config::default());
        let task = add_task(&state, group.id, user);
        let screen = GroupScreen::mount(state, group.id).unwrap();

        for _ in 0..3 {
            screen.apply(MoodEvent::Tick);
        }
        assert_eq!(screen.mood(), 85);

        screen
            .complete_task(task.id, user, b"jpeg-bytes", Some("jpg"))
            .unwrap();
        assert_eq!(screen.mood(), 95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_completion_credited_once() {
        let (state, _dir, alice, group) = setup(Config::default());
        let bob = signed_in(&state, "bobby");
        {
            let db = state.db();
            GroupService::new(&*db)
                .join_group(group.invite_code.as_str(), bob.id)
                .unwrap();
        }
        let task = add_task(&state, group.id, bob.id);
        let screen = GroupScreen::mount(state.clone(), group.id).unwrap();
        for _ in 0..3 {
            screen.apply(MoodEvent::Tick);
        }

        {
            let db = state.db();
            TaskService::new(&*db)
                .complete_task(task.id, bob.id, b"png", Some("png"), &state.photos)
                .unwrap();
        }
        let change = Change::TaskChanged {
            group_id: group.id,
            task_id: task.id,
            completed: true,
        };
        assert_eq!(screen.handle_change(&change).unwrap(), Some(95));
        // A repeated notification finds nothing new
        assert_eq!(screen.handle_change(&change).unwrap(), Some(95));

        let elsewhere = Change::TaskChanged {
            group_id: Uuid::new_v4(),
            task_id: task.id,
            completed: true,
        };
        assert_eq!(screen.handle_change(&elsewhere).unwrap(), None);
        let nudge = Change::Nudged {
            group_id: group.id,
            from_user: alice,
            to_user: bob.id,
        };
        assert_eq!(screen.handle_change(&nudge).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_back_persists_mood() {
        let config = Config {
            mood: MoodSettings {
                persistence: MoodPersistence::WriteBack,
                ..MoodSettings::default()
            },
            ..Config::default()
        };
        let (state, _dir, user, group) = setup(config);
        let task = add_task(&state, group.id, user);
        let screen = GroupScreen::mount(state.clone(), group.id).unwrap();
        for _ in 0..5 {
            screen.apply(MoodEvent::Tick);
        }

        screen
            .complete_task(task.id, user, b"jpeg-bytes", None)
            .unwrap();
        let stored = state.db().find_group_by_id(group.id).unwrap().unwrap();
        assert_eq!(stored.creature_mood, screen.mood());
        assert_eq!(stored.creature_mood, 85);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ephemeral_leaves_group_record_alone() {
        let (state, _dir, user, group) = setup(Config::default());
        let task = add_task(&state, group.id, user);
        let screen = GroupScreen::mount(state.clone(), group.id).unwrap();
        for _ in 0..5 {
            screen.apply(MoodEvent::Tick);
        }
        screen
            .complete_task(task.id, user, b"jpeg-bytes", None)
            .unwrap();

        let stored = state.db().find_group_by_id(group.id).unwrap().unwrap();
        assert_eq!(stored.creature_mood, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_group_mounts_neutral() {
        let (state, _dir, _user, _group) = setup(Config::default());
        let group_id = Uuid::new_v4();
        let screen = GroupScreen::mount(state, group_id).unwrap();

        assert!(screen.is_mounted());
        assert!(!screen.is_seeded());
        assert_eq!(screen.mood(), 50);
        assert_eq!(screen.face(), CreatureFace::Neutral);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(screen.mood(), 50);

        let change = Change::GroupChanged {
            group_id,
            created_at: Utc::now(),
            creature_mood: 100,
        };
        assert_eq!(screen.handle_change(&change).unwrap(), Some(100));
        assert!(screen.is_seeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_ticker() {
        let (state, _dir, _user, group) = setup(Config::default());
        let mut screen = GroupScreen::mount(state, group.id).unwrap();
        let rx = screen.subscribe();
        assert!(screen.is_mounted());

        screen.unmount();
        assert!(!screen.is_mounted());

        time::sleep(Duration::from_secs(60)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(screen.mood(), 100);
    }
}
