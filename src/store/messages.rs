//! Per-tab chat transcript between the user and the agent.

use crate::errors::Result;
use crate::host::HostBridge;
use crate::store::StorageBackend;
use crate::types::MessageModel;
use std::sync::Arc;

const GREETING: &str = "Hi! Tell me what you'd like to get done on this page.";

fn messages_key(tab_id: u32) -> String {
    format!("messages.{tab_id}")
}

#[derive(Clone)]
pub struct MessageStore {
    storage: Arc<dyn StorageBackend>,
    host: Arc<dyn HostBridge>,
}

impl MessageStore {
    pub fn new(storage: Arc<dyn StorageBackend>, host: Arc<dyn HostBridge>) -> Self {
        Self { storage, host }
    }

    /// The transcript always opens with the agent's greeting; only the
    /// entries after it are persisted.
    pub async fn get_messages(&self, tab_id: u32) -> Result<Vec<MessageModel>> {
        let stored: Vec<MessageModel> = match self.storage.get(&messages_key(tab_id)).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        let mut messages = vec![MessageModel {
            sender: "agent".to_string(),
            message: GREETING.to_string(),
        }];
        messages.extend(stored);
        Ok(messages)
    }

    pub async fn add_message(&self, tab_id: u32, message: MessageModel) -> Result<()> {
        let mut stored: Vec<MessageModel> = match self.storage.get(&messages_key(tab_id)).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        stored.push(message.clone());
        self.storage
            .set(&messages_key(tab_id), serde_json::to_value(&stored)?)
            .await?;
        self.host.push_message(&message).await
    }

    pub async fn clear_messages(&self, tab_id: u32) -> Result<()> {
        self.storage.remove(&messages_key(tab_id)).await
    }
}
