//! Task storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Task, TaskDisplay};

/// Which tasks of a group to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl TaskFilter {
    fn clause(self) -> &'static str {
        match self {
            TaskFilter::All => "",
            TaskFilter::Completed => " AND t.completed = 1",
            TaskFilter::Pending => " AND t.completed = 0",
        }
    }
}

const TASK_COLUMNS: &str =
    "t.id, t.group_id, t.user_id, t.description, t.completed, t.photo_url, t.completed_at, t.created_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        group_id: parse_uuid(&row.get::<_, String>(1)?)?,
        user_id: parse_uuid(&row.get::<_, String>(2)?)?,
        description: row.get(3)?,
        completed: row.get::<_, i32>(4)? != 0,
        photo_url: row.get(5)?,
        completed_at: parse_datetime_opt(row.get::<_, Option<String>>(6)?)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}

pub struct TaskStore<'a> {
    conn: &'a Connection,
}

impl<'a> TaskStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn insert(conn: &Connection, task: &Task) -> Result<()> {
        conn.execute(
            "INSERT INTO tasks (id, group_id, user_id, description, completed, photo_url, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                task.id.to_string(),
                task.group_id.to_string(),
                task.user_id.to_string(),
                task.description,
                task.completed as i32,
                task.photo_url,
                task.completed_at.map(|t| t.to_rfc3339()),
                task.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Create a task
    #[instrument(skip(self, task), fields(group_id = %task.group_id, user_id = %task.user_id))]
    pub fn create(&self, task: &Task) -> Result<()> {
        Self::insert(self.conn, task)
    }

    /// Create several tasks; all or none are stored
    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn create_many(&self, tasks: &[Task]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for task in tasks {
            Self::insert(&tx, task)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Find task by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1");
        let task = self
            .conn
            .query_row(&sql, params![id.to_string()], task_from_row)
            .optional()?;
        Ok(task)
    }

    /// List tasks in a group with owner names, newest first
    #[instrument(skip(self))]
    pub fn list_for_group(&self, group_id: Uuid, filter: TaskFilter) -> Result<Vec<TaskDisplay>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}, u.username
             FROM tasks t
             INNER JOIN users u ON u.id = t.user_id
             WHERE t.group_id = ?1{}
             ORDER BY COALESCE(t.completed_at, t.created_at) DESC",
            filter.clause()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let tasks = stmt
            .query_map(params![group_id.to_string()], |row| {
                Ok(TaskDisplay {
                    task: task_from_row(row)?,
                    owner_username: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// List one user's tasks in a group, newest first
    #[instrument(skip(self))]
    pub fn list_for_user(&self, user_id: Uuid, group_id: Uuid) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t
             WHERE t.user_id = ?1 AND t.group_id = ?2
             ORDER BY t.created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let tasks = stmt
            .query_map(
                params![user_id.to_string(), group_id.to_string()],
                task_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// Count completed tasks in a group
    #[instrument(skip(self))]
    pub fn count_completed(&self, group_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE group_id = ?1 AND completed = 1",
            params![group_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Flip a pending task to completed; returns false if it was already done
    #[instrument(skip(self, photo_url))]
    pub fn mark_completed(
        &self,
        task_id: Uuid,
        photo_url: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks SET completed = 1, photo_url = ?1, completed_at = ?2
             WHERE id = ?3 AND completed = 0",
            params![photo_url, at.to_rfc3339(), task_id.to_string()],
        )?;
        Ok(changed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, InviteCode, User};
    use crate::storage::Database;

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = User::new("ana".to_string(), "hash".to_string());
        db.users().create(&user).unwrap();
        let group = Group::new("Walkers".to_string(), user.id, InviteCode::generate());
        db.groups().create(&group).unwrap();
        (db, user.id, group.id)
    }

    #[test]
    fn test_complete_only_once() {
        let (db, user, group) = setup();
        let task = Task::new(group, user, "Drink water".to_string());
        db.tasks().create(&task).unwrap();

        assert!(db
            .tasks()
            .mark_completed(task.id, "file:///p1.jpg", Utc::now())
            .unwrap());
        assert!(!db
            .tasks()
            .mark_completed(task.id, "file:///p2.jpg", Utc::now())
            .unwrap());

        let stored = db.tasks().find_by_id(task.id).unwrap().unwrap();
        assert!(stored.completed);
        assert_eq!(stored.photo_url.as_deref(), Some("file:///p1.jpg"));
        assert!(stored.completed_at.is_some());
    }

    #[test]
    fn test_filters_and_count() {
        let (db, user, group) = setup();
        let tasks: Vec<Task> = ["a", "b", "c"]
            .iter()
            .map(|d| Task::new(group, user, d.to_string()))
            .collect();
        db.tasks().create_many(&tasks).unwrap();
        db.tasks()
            .mark_completed(tasks[1].id, "file:///b.jpg", Utc::now())
            .unwrap();

        assert_eq!(db.tasks().count_completed(group).unwrap(), 1);
        assert_eq!(
            db.tasks().list_for_group(group, TaskFilter::All).unwrap().len(),
            3
        );
        let done = db
            .tasks()
            .list_for_group(group, TaskFilter::Completed)
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].owner_username, "ana");
        assert_eq!(
            db.tasks()
                .list_for_group(group, TaskFilter::Pending)
                .unwrap()
                .len(),
            2
        );
        assert_eq!(db.tasks().list_for_user(user, group).unwrap().len(), 3);
    }

    #[test]
    fn test_create_many_is_atomic() {
        let (db, user, group) = setup();
        let first = Task::new(group, user, "ok".to_string());
        let dangling = Task::new(Uuid::new_v4(), user, "no such group".to_string());
        assert!(db.tasks().create_many(&[first, dangling]).is_err());
        assert!(db
            .tasks()
            .list_for_group(group, TaskFilter::All)
            .unwrap()
            .is_empty());
    }
}
