//! Group commands

use chrono::Utc;
use huddle_core::{mood_bar, CreatureFace, GroupService};
use huddle_net::Change;

use crate::cli::GroupCommand;
use crate::clipboard::copy_to_clipboard;
use crate::error::AppResult;
use crate::feed::announce;
use crate::state::AppState;

pub async fn run(state: &AppState, cmd: GroupCommand) -> AppResult<()> {
    let user = state.require_user()?;

    match cmd {
        GroupCommand::Create { name, copy } => {
            let group = {
                let db = state.db();
                GroupService::new(&*db).create_group(&name, user.id)?
            };
            state.select_group(user.id, group.id)?;
            println!("Created {} ({})", group.name, group.id);
            println!("Invite code: {}", group.invite_code);
            if copy {
                copy_to_clipboard(group.invite_code.as_str())?;
                println!("Invite code copied to clipboard");
            }
        }
        GroupCommand::Join { code } => {
            let group = {
                let db = state.db();
                GroupService::new(&*db).join_group(&code, user.id)?
            };
            state.select_group(user.id, group.id)?;
            println!("Joined {}", group.name);
            announce(
                &state.config,
                Change::MembersChanged {
                    group_id: group.id,
                    user_id: user.id,
                },
            )
            .await;
        }
        GroupCommand::List => {
            let summaries = {
                let db = state.db();
                GroupService::new(&*db).summaries(user.id, &state.config.mood, Utc::now())?
            };
            if summaries.is_empty() {
                println!("No groups yet. Create one or join with an invite code.");
            }
            for s in summaries {
                println!(
                    "{}  {:<20} {} {:>3}%  {}  {} done  joined {}",
                    s.group.id,
                    s.group.name,
                    mood_bar(s.mood, 10),
                    s.mood,
                    CreatureFace::for_mood(s.mood),
                    s.completed_tasks,
                    s.joined_at.format("%b %-d"),
                );
            }
        }
        GroupCommand::Use { group } => {
            let group = state.current_group(user.id, Some(group))?;
            state.select_group(user.id, group.id)?;
            println!("Now using {}", group.name);
        }
        GroupCommand::Members(arg) => {
            let group = state.current_group(user.id, arg.group)?;
            let members = {
                let db = state.db();
                GroupService::new(&*db).members(group.id)?
            };
            println!("{} ({} members)", group.name, members.len());
            for m in members {
                let marker = if m.user_id == group.created_by { " *" } else { "" };
                println!("  {}{}  joined {}", m.username, marker, m.joined_at.format("%b %-d"));
            }
        }
        GroupCommand::Invite { group, copy } => {
            let group = state.current_group(user.id, group.group)?;
            println!("Invite code for {}: {}", group.name, group.invite_code);
            if copy {
                copy_to_clipboard(group.invite_code.as_str())?;
                println!("Copied to clipboard");
            }
        }
    }
    Ok(())
}
