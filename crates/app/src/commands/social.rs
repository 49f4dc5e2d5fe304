//! Nudges, profiles and push registration

use std::fs;

use chrono::Utc;
use huddle_core::{NudgeService, ProfileService, ProfileUpdate, UserRepository};
use huddle_net::{Change, ExpoPushClient, PushMessage, PushSender};
use tracing::warn;

use super::find_member;
use crate::cli::{NudgeCommand, ProfileCommand};
use crate::error::{AppError, AppResult};
use crate::feed::announce;
use crate::state::AppState;

pub async fn nudge(state: &AppState, cmd: NudgeCommand) -> AppResult<()> {
    let user = state.require_user()?;
    let cooldown = state.config.nudge.cooldown_secs;

    match cmd {
        NudgeCommand::Send { username, group } => {
            let group = state.current_group(user.id, group.group)?;
            let (target, nudge, token) = {
                let db = state.db();
                let target = find_member(&*db, group.id, &username)?;
                let service = NudgeService::with_cooldown(&*db, cooldown);
                let nudge = service.send_nudge(user.id, target.user_id, group.id, Utc::now())?;
                let token = service.push_token_for(target.user_id)?;
                (target, nudge, token)
            };
            println!("Nudged {}", target.username);

            match token {
                Some(token) => {
                    let message = PushMessage::nudge(token, &user.username, &group.name);
                    let sent = match ExpoPushClient::from_env() {
                        Ok(client) => client.send(&message).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = sent {
                        warn!(to = %target.user_id, error = %e, "Push notification failed");
                    }
                }
                None => println!("{} has no device registered for notifications", target.username),
            }

            announce(
                &state.config,
                Change::Nudged {
                    group_id: nudge.group_id,
                    from_user: nudge.from_user,
                    to_user: nudge.to_user,
                },
            )
            .await;
        }
        NudgeCommand::Status { username, group } => {
            let group = state.current_group(user.id, group.group)?;
            let db = state.db();
            let target = find_member(&*db, group.id, &username)?;
            let status = NudgeService::with_cooldown(&*db, cooldown).can_nudge(
                user.id,
                target.user_id,
                group.id,
                Utc::now(),
            )?;
            if status.allowed {
                println!("You can nudge {} now", target.username);
            } else {
                println!("Wait {}s before nudging {} again", status.seconds_left, target.username);
            }
        }
        NudgeCommand::Inbox { limit } => {
            let db = state.db();
            let nudges = NudgeService::with_cooldown(&*db, cooldown).received(user.id, limit)?;
            if nudges.is_empty() {
                println!("No nudges");
            }
            for n in nudges {
                let from = db.find_user_by_id(n.from_user)?
                    .map(|u| u.username)
                    .unwrap_or_else(|| n.from_user.to_string());
                println!("{}  from {from}", n.created_at.format("%b %-d, %H:%M"));
            }
        }
    }
    Ok(())
}

pub fn profile(state: &AppState, cmd: ProfileCommand) -> AppResult<()> {
    let user = state.require_user()?;
    let db = state.db();
    let service = ProfileService::new(&*db);

    let profile = match cmd {
        ProfileCommand::Show => service.profile(user.id)?,
        ProfileCommand::Update { username, bio } => {
            let update = ProfileUpdate {
                username,
                bio,
                avatar_url: None,
            };
            if update.is_empty() {
                return Err(AppError::Usage("Nothing to update; pass --username or --bio".into()));
            }
            service.update_profile(user.id, &update)?
        }
        ProfileCommand::Avatar { path } => {
            let bytes = fs::read(&path)?;
            let ext = path.extension().and_then(|e| e.to_str());
            service.upload_avatar(user.id, &bytes, ext, &state.photos)?
        }
    };

    println!("{}", profile.username);
    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.is_empty()) {
        println!("  {bio}");
    }
    if let Some(avatar) = &profile.avatar_url {
        println!("  avatar: {avatar}");
    }
    println!(
        "  notifications: {}",
        if profile.push_token.is_some() { "on" } else { "off" }
    );
    Ok(())
}

pub fn push_token(state: &AppState, token: &str) -> AppResult<()> {
    let user = state.require_user()?;
    let db = state.db();
    NudgeService::new(&*db).register_push_token(user.id, token)?;
    println!("Push notifications enabled");
    Ok(())
}
