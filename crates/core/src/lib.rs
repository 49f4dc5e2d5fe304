//! Huddle Core Library
//!
//! Core models, the creature mood engine, storage, accounts and services for
//! the Huddle group accountability app.

pub mod accounts;
pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod mood;
pub mod photos;
pub mod services;
pub mod storage;

pub use accounts::{Accounts, SignedIn};
pub use config::Config;
pub use error::{Error, Result};
pub use models::*;
pub use mood::{
    mood_at, mood_bar, seed_counters, CreatureFace, MoodCounters, MoodEvent, MoodPersistence,
    MoodPolicy, MoodReconciler, MoodSettings,
};
pub use photos::{Bucket, PhotoStore};
pub use services::{GroupService, NudgeService, ProfileService, TaskService};
pub use storage::{
    Database, GroupRepository, NudgeRepository, PreferencesStore, Storage, TaskFilter,
    TaskRepository, UserPreferences, UserRepository,
};
