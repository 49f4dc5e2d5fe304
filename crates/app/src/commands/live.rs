//! Mood display, live watching and the feed server

use std::sync::Arc;

use chrono::Utc;
use huddle_core::{mood_bar, CreatureFace, GroupService};
use huddle_net::{Change, FeedClient, FeedEvent, FeedServer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cli::FeedCommand;
use crate::error::AppResult;
use crate::state::AppState;
use crate::viewmodel::GroupScreen;

const BAR_WIDTH: usize = 20;

fn mood_line(name: &str, mood: u8) -> String {
    format!(
        "{name}: {} {mood:>3}%  {}",
        mood_bar(mood, BAR_WIDTH),
        CreatureFace::for_mood(mood)
    )
}

/// One-shot mood from the group's history
pub fn mood(state: &AppState, group: Option<Uuid>) -> AppResult<()> {
    let user = state.require_user()?;
    let group = state.current_group(user.id, group)?;
    let summary = {
        let db = state.db();
        GroupService::new(&*db).summary(group.id, &state.config.mood, Utc::now())?
    };
    println!("{}", mood_line(&group.name, summary.mood));
    println!("{} tasks completed", summary.completed_tasks);
    Ok(())
}

/// Mount the group screen and print every mood change until Ctrl-C
pub async fn watch(state: Arc<AppState>, group: Option<Uuid>) -> AppResult<()> {
    let user = state.require_user()?;
    let group = state.current_group(user.id, group)?;

    let mut screen = GroupScreen::mount(state.clone(), group.id)?;
    let mut moods = screen.subscribe();
    println!("{}", mood_line(&group.name, screen.mood()));

    let mut feed = match FeedClient::connect(state.config.realtime.addr.as_str()).await {
        Ok(client) => {
            client.subscribe(screen.group_id()).await?;
            Some(client)
        }
        Err(e) => {
            warn!(error = %e, "Change feed unavailable");
            println!("Live updates from other members are unavailable");
            None
        }
    };

    loop {
        tokio::select! {
            changed = moods.changed() => {
                if changed.is_err() {
                    break;
                }
                let mood = *moods.borrow_and_update();
                println!("{}", mood_line(&group.name, mood));
            }
            event = next_feed_event(&mut feed) => match event {
                Some(FeedEvent::Change(change)) => {
                    if let Change::Nudged { to_user, .. } = change {
                        if to_user == user.id {
                            println!("You got nudged! Time to finish a task.");
                        }
                    }
                    if let Err(e) = screen.handle_change(&change) {
                        warn!(error = %e, "Failed to apply change");
                    }
                }
                Some(FeedEvent::Subscribed { group_id }) => {
                    debug!(%group_id, "Watching for changes");
                }
                Some(FeedEvent::ServerShutdown | FeedEvent::Disconnected) | None => {
                    println!("Live updates stopped");
                    feed = None;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    screen.unmount();
    if let Some(client) = feed {
        client.disconnect().await;
    }
    Ok(())
}

async fn next_feed_event(feed: &mut Option<FeedClient>) -> Option<FeedEvent> {
    match feed {
        Some(client) => client.next_event().await,
        None => std::future::pending().await,
    }
}

pub async fn feed(state: &AppState, cmd: FeedCommand) -> AppResult<()> {
    match cmd {
        FeedCommand::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| state.config.realtime.addr.clone());
            let server = FeedServer::start(addr.as_str()).await?;
            println!("Change feed listening on {}", server.addr());

            tokio::signal::ctrl_c().await?;
            info!("Interrupted; stopping change feed");
            server.shutdown().await;
        }
    }
    Ok(())
}
