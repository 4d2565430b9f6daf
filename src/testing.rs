//! Fixtures shared by the store and orchestrator tests.

use crate::decision::{DecisionService, NextActionRequest};
use crate::errors::{AgentError, Result};
use crate::host::{HostBridge, TaskUpdate};
use crate::types::{ActionResponse, ErrorResponse, MessageModel, TabInfo, Task};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Host stub that records everything pushed across the bridge.
pub struct RecordingHost {
    pub tab: Mutex<TabInfo>,
    pub updates: Mutex<Vec<(TaskUpdate, Task)>>,
    pub messages: Mutex<Vec<MessageModel>>,
    pub fetch_errors: Mutex<Vec<(u32, ErrorResponse)>>,
    pub screenshots: AtomicUsize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::with_tab(TabInfo {
            id: 7,
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
        })
    }

    pub fn with_tab(tab: TabInfo) -> Self {
        Self {
            tab: Mutex::new(tab),
            updates: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            fetch_errors: Mutex::new(Vec::new()),
            screenshots: AtomicUsize::new(0),
        }
    }

    pub async fn update_kinds(&self) -> Vec<TaskUpdate> {
        self.updates.lock().await.iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl HostBridge for RecordingHost {
    async fn query_active_tab(&self) -> Result<TabInfo> {
        Ok(self.tab.lock().await.clone())
    }

    async fn capture_screenshot(&self) -> Result<String> {
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok("data:image/png;base64,Zml4dHVyZQ==".to_string())
    }

    async fn push_message(&self, message: &MessageModel) -> Result<()> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }

    async fn report_fetch_error(&self, tab_id: u32, error: &ErrorResponse) -> Result<()> {
        self.fetch_errors.lock().await.push((tab_id, error.clone()));
        Ok(())
    }

    async fn task_update(&self, update: TaskUpdate, task: &Task) -> Result<()> {
        self.updates.lock().await.push((update, task.clone()));
        Ok(())
    }
}

/// Decision service stub that replays a script and records the requests it saw.
pub struct ScriptedDecision {
    responses: Mutex<VecDeque<Result<ActionResponse>>>,
    pub requests: Mutex<Vec<NextActionRequest>>,
}

impl ScriptedDecision {
    pub fn new(responses: Vec<Result<ActionResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DecisionService for ScriptedDecision {
    async fn next_action(&self, request: &NextActionRequest) -> Result<ActionResponse> {
        self.requests.lock().await.push(request.clone());
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::DecisionRequestFailed("script exhausted".to_string())))
    }
}
