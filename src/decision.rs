//! Client for the remote decision service that chooses each next action.

use crate::config::DecisionConfig;
use crate::enrich::EnrichedHint;
use crate::errors::{AgentError, Result};
use crate::types::{ActionResponse, ErrorResponse, TabSnapshot, TaskStep};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Everything the service sees about the page: the task so far, a screenshot
/// with markers rendered, and the semantic descriptor of each marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextActionRequest {
    #[serde(rename = "taskID")]
    pub task_id: String,
    pub description: String,
    #[serde(rename = "currentTab")]
    pub current_tab: TabSnapshot,
    #[serde(
        rename = "previousActions",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub previous_actions: Vec<TaskStep>,
    pub screenshot: String,
    #[serde(rename = "hintMarkers")]
    pub hint_markers: Vec<EnrichedHint>,
}

#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn next_action(&self, request: &NextActionRequest) -> Result<ActionResponse>;
}

pub struct HttpDecisionClient {
    client: reqwest::Client,
    config: DecisionConfig,
}

impl HttpDecisionClient {
    pub fn new(config: DecisionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| AgentError::ConfigurationError(err.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DecisionService for HttpDecisionClient {
    async fn next_action(&self, request: &NextActionRequest) -> Result<ActionResponse> {
        debug!(
            task = request.task_id.as_str(),
            markers = request.hint_markers.len(),
            "requesting next action"
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| AgentError::DecisionRequestFailed(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AgentError::DecisionRequestFailed(err.to_string()))?;

        if !status.is_success() {
            // The service reports failures as a structured body; fall back to
            // the raw text when it doesn't.
            let error = serde_json::from_str::<ErrorResponse>(&body).unwrap_or(ErrorResponse {
                error_message: body,
                status_code: status.as_u16(),
            });
            return Err(AgentError::DecisionService(error));
        }

        serde_json::from_str(&body).map_err(|err| AgentError::MalformedResponse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ActionResponse};

    #[test]
    fn request_serializes_with_wire_field_names() {
        let request = NextActionRequest {
            task_id: "t-1".to_string(),
            description: "log in".to_string(),
            current_tab: TabSnapshot {
                url: "https://example.com".to_string(),
                title: "Example".to_string(),
            },
            previous_actions: vec![TaskStep {
                current_tab: TabSnapshot {
                    url: "https://example.com".to_string(),
                    title: "Example".to_string(),
                },
                response: ActionResponse {
                    action: Action::Done,
                    explanation: None,
                },
            }],
            screenshot: "data:image/png;base64,AA==".to_string(),
            hint_markers: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskID"], "t-1");
        assert_eq!(json["currentTab"]["url"], "https://example.com");
        assert_eq!(json["previousActions"][0]["response"]["action"], "done");
        assert!(json.get("task_id").is_none());
    }

    #[test]
    fn empty_history_is_omitted_from_the_request() {
        let request = NextActionRequest {
            task_id: "t-2".to_string(),
            description: "search".to_string(),
            current_tab: TabSnapshot {
                url: "https://example.com".to_string(),
                title: "Example".to_string(),
            },
            previous_actions: vec![],
            screenshot: String::new(),
            hint_markers: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("previousActions").is_none());
    }
}
