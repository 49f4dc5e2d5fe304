//! Task commands

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use huddle_core::{Error as CoreError, TaskFilter, TaskRepository, TaskService};
use huddle_net::{Change, GeminiSuggester, TaskSuggester};
use tracing::info;

use super::find_member;
use crate::cli::TaskCommand;
use crate::error::AppResult;
use crate::feed::announce;
use crate::state::AppState;
use crate::viewmodel::GroupScreen;

pub async fn run(state: &Arc<AppState>, cmd: TaskCommand) -> AppResult<()> {
    let user = state.require_user()?;

    match cmd {
        TaskCommand::Add { description, group } => {
            let group = state.current_group(user.id, group.group)?;
            let task = {
                let db = state.db();
                TaskService::new(&*db).add_task(group.id, user.id, &description)?
            };
            println!("Added {} ({})", task.description, task.id);
        }
        TaskCommand::Assign {
            username,
            description,
            group,
        } => {
            let group = state.current_group(user.id, group.group)?;
            let tasks = {
                let db = state.db();
                let member = find_member(&*db, group.id, &username)?;
                let assignments = HashMap::from([(member.user_id, vec![description])]);
                TaskService::new(&*db).assign_tasks(group.id, user.id, &assignments)?
            };
            for task in tasks {
                println!("Assigned {} to {username} ({})", task.description, task.id);
            }
        }
        TaskCommand::Suggest {
            prompt,
            random,
            accept,
            group,
        } => {
            let prompt = prompt.join(" ");
            let suggester = GeminiSuggester::from_env();
            let suggestions = if random || prompt.trim().is_empty() {
                suggester.suggest_random().await?
            } else {
                suggester.suggest(&prompt).await?
            };

            for (i, s) in suggestions.iter().enumerate() {
                println!("{}. {s}", i + 1);
            }

            if accept {
                let group = state.current_group(user.id, group.group)?;
                let tasks = {
                    let db = state.db();
                    TaskService::new(&*db).add_tasks(group.id, user.id, &suggestions)?
                };
                println!("Added {} tasks to {}", tasks.len(), group.name);
            }
        }
        TaskCommand::Accept {
            descriptions,
            group,
        } => {
            let group = state.current_group(user.id, group.group)?;
            let tasks = {
                let db = state.db();
                TaskService::new(&*db).add_tasks(group.id, user.id, &descriptions)?
            };
            println!("Added {} tasks to {}", tasks.len(), group.name);
        }
        TaskCommand::Complete { task, photo } => {
            let bytes = fs::read(&photo)?;
            let ext = photo_extension(&photo);

            let group_id = {
                let db = state.db();
                db.find_task_by_id(task)?
                    .map(|t| t.group_id)
                    .ok_or_else(|| CoreError::NotFound(format!("Task {task}")))?
            };

            let screen = GroupScreen::mount(state.clone(), group_id)?;
            let completed = screen.complete_task(task, user.id, &bytes, ext.as_deref())?;
            info!(task_id = %completed.id, "Completed from CLI");
            println!(
                "Completed {}! Creature is now {} ({}%)",
                completed.description,
                screen.face(),
                screen.mood()
            );

            announce(
                &state.config,
                Change::TaskChanged {
                    group_id,
                    task_id: completed.id,
                    completed: true,
                },
            )
            .await;
        }
        TaskCommand::List {
            group,
            mine,
            completed,
            pending,
        } => {
            let group = state.current_group(user.id, group.group)?;
            let filter = match (completed, pending) {
                (true, _) => TaskFilter::Completed,
                (_, true) => TaskFilter::Pending,
                _ => TaskFilter::All,
            };
            let db = state.db();
            let service = TaskService::new(&*db);
            let tasks = match filter {
                TaskFilter::All => service.group_tasks(group.id)?,
                TaskFilter::Completed => service.completed_tasks(group.id)?,
                TaskFilter::Pending => service.pending_tasks(group.id)?,
            };

            let tasks: Vec<_> = tasks
                .into_iter()
                .filter(|t| !mine || t.task.user_id == user.id)
                .collect();
            if tasks.is_empty() {
                println!("No tasks");
            }
            for t in tasks {
                let status = match t.format_completed_at() {
                    Some(at) => format!("done {at}"),
                    None => "pending".to_string(),
                };
                println!(
                    "{}  {:<12} {:<40} {}",
                    t.task.id, t.owner_username, t.task.description, status
                );
            }
        }
    }
    Ok(())
}

/// Lowercased extension of a photo path, if it has one
fn photo_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_extension() {
        assert_eq!(photo_extension(Path::new("proof.JPG")), Some("jpg".into()));
        assert_eq!(photo_extension(Path::new("proof")), None);
    }
}
