//! Command handlers

mod account;
mod config;
mod group;
mod live;
mod social;
mod task;

use std::sync::Arc;

use huddle_core::{GroupService, MemberInfo, Storage};
use uuid::Uuid;

use crate::cli::Command;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub use config::run as run_config;

/// Dispatch a command that needs application state
pub async fn run(command: Command, state: Arc<AppState>) -> AppResult<()> {
    match command {
        Command::Register(creds) => account::register(&state, &creds),
        Command::Login(creds) => account::login(&state, &creds),
        Command::Logout => account::logout(&state),
        Command::Whoami => account::whoami(&state),
        Command::Group(cmd) => group::run(&state, cmd).await,
        Command::Task(cmd) => task::run(&state, cmd).await,
        Command::Nudge(cmd) => social::nudge(&state, cmd).await,
        Command::Profile(cmd) => social::profile(&state, cmd),
        Command::PushToken { token } => social::push_token(&state, &token),
        Command::Mood(arg) => live::mood(&state, arg.group),
        Command::Watch(arg) => live::watch(state, arg.group).await,
        Command::Feed(cmd) => live::feed(&state, cmd).await,
        Command::Config(_) => Err(AppError::Usage(
            "config commands do not need application state".into(),
        )),
    }
}

/// Find a member of `group_id` by username (case-insensitive)
fn find_member<S: Storage + ?Sized>(
    store: &S,
    group_id: Uuid,
    username: &str,
) -> AppResult<MemberInfo> {
    let username = username.trim();
    GroupService::new(store)
        .members(group_id)?
        .into_iter()
        .find(|m| m.username.eq_ignore_ascii_case(username))
        .ok_or_else(|| AppError::Usage(format!("No member named {username} in this group")))
}
