//! Task records and the per-tab pending pointer.
//!
//! A `pending.<tabID>` pointer exists exactly while that tab's task is active
//! or cancelling. Every other lifecycle edge goes through the status
//! transition table; only startup recovery writes statuses directly.

use crate::errors::{AgentError, Result};
use crate::host::{HostBridge, TaskUpdate};
use crate::store::StorageBackend;
use crate::types::{ActionResponse, PendingTask, TabSnapshot, Task, TaskStatus, TaskStep};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const TASK_PREFIX: &str = "tasks.";
const PENDING_PREFIX: &str = "pending.";

fn task_key(task_id: &str) -> String {
    format!("{TASK_PREFIX}{task_id}")
}

fn pending_key(tab_id: u32) -> String {
    format!("{PENDING_PREFIX}{tab_id}")
}

#[derive(Clone)]
pub struct TaskStore {
    storage: Arc<dyn StorageBackend>,
    host: Arc<dyn HostBridge>,
}

impl TaskStore {
    pub fn new(storage: Arc<dyn StorageBackend>, host: Arc<dyn HostBridge>) -> Self {
        Self { storage, host }
    }

    /// Startup recovery: any task still marked active or cancelling was
    /// interrupted by a shutdown mid-run. Force it to incomplete, skipping
    /// the transition table, and drop its pending pointer.
    pub async fn clear_incomplete_tasks(&self) -> Result<()> {
        let mut updates: Vec<(String, Value)> = Vec::new();
        let mut removals: Vec<String> = Vec::new();
        for (key, value) in self.storage.entries().await? {
            if !key.starts_with(TASK_PREFIX) {
                continue;
            }
            let mut task: Task = match serde_json::from_value(value) {
                Ok(task) => task,
                Err(err) => {
                    warn!(key = key.as_str(), error = %err, "skipping unreadable task record");
                    continue;
                }
            };
            if task.status.is_terminal() {
                continue;
            }
            task.status = TaskStatus::Incomplete;
            task.status_reason = Some("interrupted by restart".to_string());
            removals.push(pending_key(task.tab_id));
            updates.push((key, serde_json::to_value(&task)?));
        }
        if !updates.is_empty() {
            info!(count = updates.len(), "marking interrupted tasks incomplete");
            self.storage.set_many(updates).await?;
            self.storage.remove_many(&removals).await?;
        }
        Ok(())
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        match self.storage.get(&task_key(task_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// The task the active tab's pending pointer refers to, if any.
    pub async fn get_pending_task(&self) -> Result<Option<Task>> {
        let tab = self.host.query_active_tab().await?;
        let Some(value) = self.storage.get(&pending_key(tab.id)).await? else {
            return Ok(None);
        };
        let pending: PendingTask = serde_json::from_value(value)?;
        self.get_task(&pending.task_id).await
    }

    /// Create an active task for the current tab. The record and its pending
    /// pointer are written in one batch.
    pub async fn new_task(&self, description: &str) -> Result<Task> {
        let tab = self.host.query_active_tab().await?;
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.to_string(),
            status: TaskStatus::Active,
            tab_id: tab.id,
            steps: Vec::new(),
            status_reason: None,
            created_at: chrono::Utc::now(),
        };
        let pending = PendingTask {
            task_id: task.id.clone(),
        };
        self.storage
            .set_many(vec![
                (task_key(&task.id), serde_json::to_value(&task)?),
                (pending_key(tab.id), serde_json::to_value(&pending)?),
            ])
            .await?;
        self.host.task_update(TaskUpdate::Created, &task).await?;
        info!(task = task.id.as_str(), tab = tab.id, "task created");
        Ok(task)
    }

    /// Append one loop iteration, snapshotting the tab it acted on.
    pub async fn add_step(&self, task_id: &str, response: ActionResponse) -> Result<Task> {
        let tab = self.host.query_active_tab().await?;
        let mut task = self
            .get_task(task_id)
            .await?
            .ok_or_else(|| AgentError::StorageError(format!("unknown task: {task_id}")))?;
        task.steps.push(TaskStep {
            current_tab: TabSnapshot {
                url: tab.url,
                title: tab.title,
            },
            response,
        });
        self.storage
            .set(&task_key(task_id), serde_json::to_value(&task)?)
            .await?;
        self.host.task_update(TaskUpdate::StepAdded, &task).await?;
        Ok(task)
    }

    /// Move a task along the lifecycle. Reaching a terminal status removes
    /// the tab's pending pointer in the same call.
    pub async fn update_status(
        &self,
        task_id: &str,
        to: TaskStatus,
        reason: Option<String>,
    ) -> Result<Task> {
        let mut task = self
            .get_task(task_id)
            .await?
            .ok_or_else(|| AgentError::StorageError(format!("unknown task: {task_id}")))?;
        if !task.status.can_transition_to(to) {
            return Err(AgentError::InvalidTransition {
                from: task.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        task.status = to;
        task.status_reason = reason;
        self.storage
            .set(&task_key(task_id), serde_json::to_value(&task)?)
            .await?;
        if to.is_terminal() {
            self.storage.remove(&pending_key(task.tab_id)).await?;
            self.host.task_update(TaskUpdate::Finalized, &task).await?;
            info!(task = task_id, status = to.as_str(), "task finalized");
        } else {
            self.host
                .task_update(TaskUpdate::StatusChanged, &task)
                .await?;
        }
        Ok(task)
    }
}
