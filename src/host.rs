//! Boundary to the hosting environment: the tab registry, the screenshot
//! surface and the user-facing notification channel.

use crate::errors::Result;
use crate::types::{ErrorResponse, MessageModel, TabInfo, Task};
use async_trait::async_trait;
use base64::Engine;

/// What changed about a task, for listeners on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskUpdate {
    Created,
    StepAdded,
    StatusChanged,
    Finalized,
}

#[async_trait]
pub trait HostBridge: Send + Sync {
    /// The tab the automation loop is currently attached to.
    async fn query_active_tab(&self) -> Result<TabInfo>;

    /// Capture the visible viewport as a data URI.
    async fn capture_screenshot(&self) -> Result<String>;

    /// Deliver one chat transcript entry to the user.
    async fn push_message(&self, message: &MessageModel) -> Result<()>;

    /// Surface a decision service failure without touching the task record.
    async fn report_fetch_error(&self, tab_id: u32, error: &ErrorResponse) -> Result<()>;

    /// Announce a task lifecycle change.
    async fn task_update(&self, update: TaskUpdate, task: &Task) -> Result<()>;
}

/// Wrap raw PNG bytes in the data URI form `capture_screenshot` returns.
pub fn png_data_uri(bytes: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_carries_the_encoded_payload() {
        assert_eq!(png_data_uri(b"png"), "data:image/png;base64,cG5n");
        assert_eq!(png_data_uri(b""), "data:image/png;base64,");
    }
}
