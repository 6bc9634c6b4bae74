//! Goal & task list (C12).

use crate::persist::{read_json_or_default, write_json_atomic, PersistLock};
use agent_core::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub details: String,
    pub done_criteria: String,
    pub progress: String,
    pub done: bool,
    /// Sticky "this task needs another look before it can count as done"
    /// marker; never cleared automatically.
    pub needs_edit: bool,
}

#[derive(Default, Serialize, Deserialize)]
struct TaskListData {
    tasks: Vec<Task>,
    /// Set by `check_if_all_done`; sticky until a caller re-runs the check
    /// after tasks change.
    all_done: bool,
}

pub struct TaskList {
    data: TaskListData,
    path: PathBuf,
    lock: PersistLock,
}

impl TaskList {
    pub fn new(path: PathBuf) -> Self {
        Self {
            data: TaskListData::default(),
            path,
            lock: PersistLock::new(),
        }
    }

    pub async fn load(path: PathBuf) -> Result<Self, PersistenceError> {
        let data: TaskListData = read_json_or_default(&path).await?;
        Ok(Self {
            data,
            path,
            lock: PersistLock::new(),
        })
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, &self.data, &self.lock).await
    }

    pub fn tasks(&self) -> &[Task] {
        &self.data.tasks
    }

    pub async fn add(&mut self, details: impl Into<String>, done_criteria: impl Into<String>) -> Result<Task, PersistenceError> {
        let id = (self.data.tasks.len() + 1).to_string();
        let task = Task {
            id,
            details: details.into(),
            done_criteria: done_criteria.into(),
            progress: String::new(),
            done: false,
            needs_edit: false,
        };
        self.data.tasks.push(task.clone());
        self.persist().await?;
        Ok(task)
    }

    /// Tolerant lookup: a non-numeric id is resolved by extracting its
    /// first digit run (e.g. `"task-3"` resolves to `"3"`).
    pub fn get_by_id(&self, id: &str) -> Option<&Task> {
        let canonical = canonical_id(id);
        self.data.tasks.iter().find(|t| t.id == canonical)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        let canonical = canonical_id(id);
        self.data.tasks.iter().position(|t| t.id == canonical)
    }

    pub async fn update_task_progress(&mut self, id: &str, progress: impl Into<String>) -> Result<bool, PersistenceError> {
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        self.data.tasks[idx].progress = progress.into();
        self.persist().await?;
        Ok(true)
    }

    pub async fn mark_task_done(&mut self, id: &str) -> Result<bool, PersistenceError> {
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        self.data.tasks[idx].done = true;
        self.persist().await?;
        Ok(true)
    }

    pub async fn del_task_by_id(&mut self, id: &str) -> Result<bool, PersistenceError> {
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        self.data.tasks.remove(idx);
        self.persist().await?;
        Ok(true)
    }

    /// True iff every task is done and no task's `needs_edit` sentinel is
    /// set. The result is cached as a sticky flag; re-run this after tasks
    /// change to have it reconsidered.
    pub fn check_if_all_done(&mut self) -> bool {
        let all_done = !self.data.tasks.is_empty()
            && self.data.tasks.iter().all(|t| t.done && !t.needs_edit);
        self.data.all_done = all_done;
        all_done
    }

    pub fn all_done_flag(&self) -> bool {
        self.data.all_done
    }
}

fn canonical_id(id: &str) -> String {
    if id.chars().all(|c| c.is_ascii_digit()) && !id.is_empty() {
        return id.to_string();
    }
    let digits: String = id.chars().skip_while(|c| !c.is_ascii_digit()).take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        id.to_string()
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "agent-tasks-list-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[tokio::test]
    async fn add_assigns_sequential_string_ids() {
        let mut list = TaskList::new(unique_path());
        let a = list.add("mine wood", "have 10 logs").await.unwrap();
        let b = list.add("craft pickaxe", "have 1 pickaxe").await.unwrap();
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
    }

    #[tokio::test]
    async fn get_by_id_tolerates_non_numeric_ids() {
        let mut list = TaskList::new(unique_path());
        list.add("mine wood", "have 10 logs").await.unwrap();
        assert!(list.get_by_id("task-1").is_some());
        assert!(list.get_by_id("#1!").is_some());
    }

    #[tokio::test]
    async fn check_if_all_done_requires_no_needs_edit() {
        let mut list = TaskList::new(unique_path());
        list.add("mine wood", "have 10 logs").await.unwrap();
        list.mark_task_done("1").await.unwrap();
        assert!(list.check_if_all_done());

        list.data.tasks[0].needs_edit = true;
        assert!(!list.check_if_all_done());
    }

    #[tokio::test]
    async fn del_task_by_id_removes_and_persists() {
        let mut list = TaskList::new(unique_path());
        list.add("mine wood", "have 10 logs").await.unwrap();
        assert!(list.del_task_by_id("1").await.unwrap());
        assert!(list.tasks().is_empty());
    }
}
