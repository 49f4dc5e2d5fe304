//! Task authoring, listing and completion

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::require_member;
use crate::error::{Error, Result};
use crate::invariants::assert_task_invariants;
use crate::models::{Task, TaskDisplay};
use crate::photos::{object_name, Bucket, PhotoStore};
use crate::storage::{Storage, TaskFilter};

pub struct TaskService<'a, S: Storage + ?Sized> {
    store: &'a S,
}

fn clean_description(description: &str) -> Option<String> {
    let description = description.trim();
    (!description.is_empty()).then(|| description.to_string())
}

impl<'a, S: Storage + ?Sized> TaskService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Add one task for the calling member
    #[instrument(skip(self, description))]
    pub fn add_task(&self, group_id: Uuid, user_id: Uuid, description: &str) -> Result<Task> {
        require_member(self.store, user_id, group_id)?;
        let description = clean_description(description)
            .ok_or_else(|| Error::Validation("Task description is required".into()))?;

        let task = Task::new(group_id, user_id, description);
        self.store.create_task(&task)?;
        Ok(task)
    }

    /// Add several tasks at once (accepted suggestions); blanks are skipped
    #[instrument(skip(self, descriptions), fields(count = descriptions.len()))]
    pub fn add_tasks(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        descriptions: &[String],
    ) -> Result<Vec<Task>> {
        require_member(self.store, user_id, group_id)?;
        let tasks: Vec<Task> = descriptions
            .iter()
            .filter_map(|d| clean_description(d))
            .map(|d| Task::new(group_id, user_id, d))
            .collect();

        if tasks.is_empty() {
            return Err(Error::Validation("No tasks selected".into()));
        }

        self.store.create_tasks(&tasks)?;
        info!(%group_id, count = tasks.len(), "Tasks added");
        Ok(tasks)
    }

    /// Create tasks for several members in one batch
    #[instrument(skip(self, assignments))]
    pub fn assign_tasks(
        &self,
        group_id: Uuid,
        assigned_by: Uuid,
        assignments: &HashMap<Uuid, Vec<String>>,
    ) -> Result<Vec<Task>> {
        require_member(self.store, assigned_by, group_id)?;

        let mut tasks = Vec::new();
        for (user_id, descriptions) in assignments {
            require_member(self.store, *user_id, group_id)?;
            tasks.extend(
                descriptions
                    .iter()
                    .filter_map(|d| clean_description(d))
                    .map(|d| Task::new(group_id, *user_id, d)),
            );
        }

        if tasks.is_empty() {
            return Err(Error::Validation("No tasks selected".into()));
        }

        self.store.create_tasks(&tasks)?;
        Ok(tasks)
    }

    pub fn my_tasks(&self, user_id: Uuid, group_id: Uuid) -> Result<Vec<Task>> {
        self.store.list_tasks_for_user(user_id, group_id)
    }

    pub fn group_tasks(&self, group_id: Uuid) -> Result<Vec<TaskDisplay>> {
        self.store.list_tasks_for_group(group_id, TaskFilter::All)
    }

    /// Completed tasks for the group feed, most recent first
    pub fn completed_tasks(&self, group_id: Uuid) -> Result<Vec<TaskDisplay>> {
        self.store.list_tasks_for_group(group_id, TaskFilter::Completed)
    }

    pub fn pending_tasks(&self, group_id: Uuid) -> Result<Vec<TaskDisplay>> {
        self.store.list_tasks_for_group(group_id, TaskFilter::Pending)
    }

    pub fn completed_count(&self, group_id: Uuid) -> Result<u64> {
        self.store.count_completed_tasks(group_id)
    }

    /// Complete a task with photo proof. Owner only, and only once.
    #[instrument(skip(self, photo, photos), fields(size = photo.len()))]
    pub fn complete_task(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        photo: &[u8],
        ext: Option<&str>,
        photos: &PhotoStore,
    ) -> Result<Task> {
        let task = self
            .store
            .find_task_by_id(task_id)?
            .ok_or_else(|| Error::NotFound(format!("Task {task_id}")))?;

        if task.user_id != user_id {
            return Err(Error::PermissionDenied(
                "Only the task owner can complete it".into(),
            ));
        }
        if task.completed {
            return Err(Error::InvalidOperation("Task is already completed".into()));
        }

        self.record_completion(task, photo, ext, photos, Utc::now())
    }

    /// Upload the proof and flip the completion flag. When another
    /// completion wins the guarded update, this upload is discarded.
    fn record_completion(
        &self,
        mut task: Task,
        photo: &[u8],
        ext: Option<&str>,
        photos: &PhotoStore,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let stored = photos.upload(Bucket::TaskPhotos, &object_name(task.id, ext, now), photo)?;

        if !self
            .store
            .mark_task_completed(task.id, &stored.public_url, now)?
        {
            let winner = self
                .store
                .find_task_by_id(task.id)?
                .and_then(|t| t.photo_url);
            if winner.as_deref() != Some(stored.public_url.as_str()) {
                if let Err(e) = photos.remove(stored.bucket, &stored.name) {
                    warn!(task_id = %task.id, error = %e, "Failed to discard proof photo");
                }
            }
            return Err(Error::InvalidOperation("Task is already completed".into()));
        }

        task.complete(stored.public_url, now);
        assert_task_invariants(&task);
        info!(task_id = %task.id, group_id = %task.group_id, "Task completed");
        Ok(task)
    }
}
