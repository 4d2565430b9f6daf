//! Drives one task to completion: capture the page, ask the decision
//! service, record the step, act, and repeat until a terminal status.

use crate::actions::ActionExecutor;
use crate::config::AgentConfig;
use crate::decision::{DecisionService, NextActionRequest};
use crate::errors::{AgentError, Result};
use crate::hints::CaptureSession;
use crate::host::HostBridge;
use crate::page::PageModel;
use crate::store::messages::MessageStore;
use crate::store::tasks::TaskStore;
use crate::store::StorageBackend;
use crate::types::{MessageModel, TabSnapshot, Task, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const CANCELLED_REASON: &str = "stopped at the user's request";

pub struct Orchestrator {
    page: Arc<Mutex<PageModel>>,
    host: Arc<dyn HostBridge>,
    decision: Arc<dyn DecisionService>,
    tasks: TaskStore,
    messages: MessageStore,
    executor: ActionExecutor,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        config: AgentConfig,
        page: Arc<Mutex<PageModel>>,
        storage: Arc<dyn StorageBackend>,
        host: Arc<dyn HostBridge>,
        decision: Arc<dyn DecisionService>,
    ) -> Self {
        Self {
            tasks: TaskStore::new(storage.clone(), host.clone()),
            messages: MessageStore::new(storage, host.clone()),
            executor: ActionExecutor::new(config.executor.clone()),
            page,
            host,
            decision,
            config,
        }
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// Run once per process start, before any task work.
    pub async fn startup(&self) -> Result<()> {
        self.tasks.clear_incomplete_tasks().await
    }

    /// Record the user's request and create its active task.
    pub async fn submit(&self, description: &str) -> Result<Task> {
        let task = self.tasks.new_task(description).await?;
        self.messages
            .add_message(
                task.tab_id,
                MessageModel {
                    sender: "user".to_string(),
                    message: description.to_string(),
                },
            )
            .await?;
        Ok(task)
    }

    /// Ask the running task to stop at the next checkpoint.
    pub async fn cancel(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .update_status(task_id, TaskStatus::Cancelling, None)
            .await
    }

    /// Drive the active tab's pending task until it reaches a terminal
    /// status. A no-op when the tab has no pending task. Any error inside the
    /// loop resolves the task rather than leaving it active.
    pub async fn run(&self) -> Result<()> {
        let Some(task) = self.tasks.get_pending_task().await? else {
            return Ok(());
        };
        let task_id = task.id.clone();
        match self.drive(task).await {
            Ok(()) => Ok(()),
            Err(err) => self.resolve_failure(&task_id, err).await,
        }
    }

    async fn drive(&self, mut task: Task) -> Result<()> {
        loop {
            let (request, session) = self.capture(&task).await?;
            let response = match self.decision.next_action(&request).await {
                Ok(response) => response,
                Err(AgentError::DecisionService(error)) => {
                    self.host.report_fetch_error(task.tab_id, &error).await?;
                    return Err(AgentError::DecisionService(error));
                }
                Err(other) => return Err(other),
            };

            // A cancellation that landed during the request wins over the
            // response; the step is never recorded.
            if self.checkpoint_cancelled(&task.id).await? {
                return Ok(());
            }

            task = self.tasks.add_step(&task.id, response.clone()).await?;
            if let Some(explanation) = &response.explanation {
                self.messages
                    .add_message(
                        task.tab_id,
                        MessageModel {
                            sender: "agent".to_string(),
                            message: explanation.clone(),
                        },
                    )
                    .await?;
            }

            if response.action.is_done() {
                info!(task = task.id.as_str(), steps = task.steps.len(), "task done");
                self.tasks
                    .update_status(&task.id, TaskStatus::Done, response.explanation.clone())
                    .await?;
                return Ok(());
            }

            // Typing continues on its own timer through the delay.
            self.executor
                .execute(&self.page, &session, &response.action)
                .await?;
            tokio::time::sleep(Duration::from_millis(self.config.orchestrator.step_delay_ms))
                .await;

            if self.checkpoint_cancelled(&task.id).await? {
                return Ok(());
            }
        }
    }

    /// Detection pass plus screenshot. Markers are rendered for the
    /// screenshot only and removed before the request goes out.
    async fn capture(&self, task: &Task) -> Result<(NextActionRequest, CaptureSession)> {
        let (mut session, hint_markers) = {
            let mut page = self.page.lock().await;
            let session = CaptureSession::begin(&mut page, &self.config.detection);
            let hint_markers = session.enrich(&page, &self.config.enrichment);
            (session, hint_markers)
        };
        let screenshot = self.host.capture_screenshot().await?;
        {
            let mut page = self.page.lock().await;
            session.remove_markers(&mut page);
        }
        let tab = self.host.query_active_tab().await?;
        let request = NextActionRequest {
            task_id: task.id.clone(),
            description: task.description.clone(),
            current_tab: TabSnapshot {
                url: tab.url,
                title: tab.title,
            },
            previous_actions: task.steps.clone(),
            screenshot,
            hint_markers,
        };
        Ok((request, session))
    }

    async fn checkpoint_cancelled(&self, task_id: &str) -> Result<bool> {
        let current = self
            .tasks
            .get_task(task_id)
            .await?
            .ok_or_else(|| AgentError::StorageError(format!("unknown task: {task_id}")))?;
        if current.status == TaskStatus::Cancelling {
            self.tasks
                .update_status(
                    task_id,
                    TaskStatus::Cancelled,
                    Some(CANCELLED_REASON.to_string()),
                )
                .await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// The loop's single error boundary. A failure while a cancellation is
    /// pending resolves to cancelled; otherwise the task fails with the
    /// serialized error as its reason.
    async fn resolve_failure(&self, task_id: &str, err: AgentError) -> Result<()> {
        warn!(task = task_id, error = %err, "task loop error");
        let Some(current) = self.tasks.get_task(task_id).await? else {
            return Err(err);
        };
        match current.status {
            TaskStatus::Cancelling => {
                self.tasks
                    .update_status(task_id, TaskStatus::Cancelled, Some(err.to_string()))
                    .await?;
                Ok(())
            }
            TaskStatus::Active => {
                self.tasks
                    .update_status(task_id, TaskStatus::Failed, Some(err.to_string()))
                    .await?;
                Ok(())
            }
            // Already resolved; nothing left to record.
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::labels;
    use crate::page::html::parse_page;
    use crate::store::MemoryStorage;
    use crate::testing::{RecordingHost, ScriptedDecision};
    use crate::types::{Action, ActionResponse, ErrorResponse};

    const PAGE: &str = r#"<html><head><title>Example</title></head><body>
        <a id="pricing" href="/pricing" style="left:0;top:0;width:80px;height:20px">Pricing</a>
        <input id="query" name="q" style="left:0;top:40px;width:120px;height:20px">
    </body></html>"#;

    fn fixture(script: Vec<crate::errors::Result<ActionResponse>>) -> (Orchestrator, Arc<RecordingHost>) {
        let page = Arc::new(Mutex::new(parse_page("https://example.com", PAGE)));
        let host = Arc::new(RecordingHost::new());
        let orchestrator = Orchestrator::new(
            AgentConfig::default(),
            page,
            Arc::new(MemoryStorage::new()),
            host.clone(),
            Arc::new(ScriptedDecision::new(script)),
        );
        (orchestrator, host)
    }

    /// Label assigned to the page's first surviving hint.
    fn first_label() -> String {
        labels::generate("sadfjklewcmpgh", 2)[0].to_uppercase()
    }

    fn click_first() -> crate::errors::Result<ActionResponse> {
        Ok(ActionResponse {
            action: Action::Click {
                hint_string: first_label(),
            },
            explanation: Some("opening the pricing page".to_string()),
        })
    }

    fn done() -> crate::errors::Result<ActionResponse> {
        Ok(ActionResponse {
            action: Action::Done,
            explanation: Some("all set".to_string()),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn task_runs_steps_until_the_service_says_done() {
        let (orchestrator, host) = fixture(vec![click_first(), done()]);
        let task = orchestrator.submit("open pricing").await.unwrap();
        orchestrator.run().await.unwrap();

        let finished = orchestrator.tasks().get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(finished.status, TaskStatus::Done);
        assert_eq!(finished.steps.len(), 2);
        assert_eq!(
            host.screenshots.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
        // user request + two explanations
        assert_eq!(host.messages.lock().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_carries_the_recorded_history() {
        let decision = Arc::new(ScriptedDecision::new(vec![click_first(), done()]));
        let page = Arc::new(Mutex::new(parse_page("https://example.com", PAGE)));
        let host = Arc::new(RecordingHost::new());
        let orchestrator = Orchestrator::new(
            AgentConfig::default(),
            page.clone(),
            Arc::new(MemoryStorage::new()),
            host,
            decision.clone(),
        );
        orchestrator.submit("open pricing").await.unwrap();
        orchestrator.run().await.unwrap();

        let requests = decision.requests.lock().await;
        assert_eq!(requests.len(), 2);
        assert!(requests[0].previous_actions.is_empty());
        assert_eq!(requests[1].previous_actions.len(), 1);
        assert_eq!(requests[0].hint_markers.len(), 2);
        // Markers never linger past the capture.
        assert!(!page.lock().await.markers_installed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_a_received_response() {
        let (orchestrator, _host) = fixture(vec![click_first()]);
        let task = orchestrator.submit("open pricing").await.unwrap();
        orchestrator.cancel(&task.id).await.unwrap();
        orchestrator.run().await.unwrap();

        let cancelled = orchestrator.tasks().get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        // The response arrived but its step was never recorded.
        assert!(cancelled.steps.is_empty());
        assert_eq!(cancelled.status_reason.as_deref(), Some(CANCELLED_REASON));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_the_step_delay_stops_before_the_next_capture() {
        let (orchestrator, host) = fixture(vec![click_first(), click_first()]);
        let orchestrator = Arc::new(orchestrator);
        let task = orchestrator.submit("open pricing").await.unwrap();

        let runner = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.run().await }
        });
        // Wait for the first step to land; the loop is then inside its
        // inter-step delay.
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let current = orchestrator.tasks().get_task(&task.id).await.unwrap().unwrap();
            if !current.steps.is_empty() {
                break;
            }
        }
        orchestrator.cancel(&task.id).await.unwrap();
        runner.await.unwrap().unwrap();

        let resolved = orchestrator.tasks().get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, TaskStatus::Cancelled);
        assert_eq!(resolved.steps.len(), 1);
        assert_eq!(resolved.status_reason.as_deref(), Some(CANCELLED_REASON));
        // No second capture happened after the cancel.
        assert_eq!(
            host.screenshots.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn decision_failures_fail_the_task_and_reach_the_host() {
        let error = ErrorResponse {
            error_message: "model overloaded".to_string(),
            status_code: 503,
        };
        let (orchestrator, host) =
            fixture(vec![Err(AgentError::DecisionService(error.clone()))]);
        let task = orchestrator.submit("open pricing").await.unwrap();
        orchestrator.run().await.unwrap();

        let failed = orchestrator.tasks().get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed
            .status_reason
            .as_deref()
            .unwrap()
            .contains("model overloaded"));
        assert_eq!(host.fetch_errors.lock().await.as_slice(), [(7, error)]);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_while_cancelling_resolve_to_cancelled() {
        let (orchestrator, _host) = fixture(vec![Err(AgentError::DecisionRequestFailed(
            "connection reset".to_string(),
        ))]);
        let task = orchestrator.submit("open pricing").await.unwrap();
        orchestrator.cancel(&task.id).await.unwrap();
        orchestrator.run().await.unwrap();

        let resolved = orchestrator.tasks().get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, TaskStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn run_without_a_pending_task_is_a_no_op() {
        let (orchestrator, host) = fixture(vec![]);
        orchestrator.run().await.unwrap();
        assert_eq!(
            host.screenshots.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }
}
