//! Executes the decision service's chosen action against a labeled element.

use crate::config::ExecutorConfig;
use crate::errors::{AgentError, Result};
use crate::hints::CaptureSession;
use crate::page::{EventKind, NodeId, PageModel};
use crate::types::Action;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Tags that receive focus before a simulated click lands on them.
const FOCUS_BEFORE_CLICK: [&str; 4] = ["input", "select", "object", "embed"];

enum TypingSink {
    /// Form controls take characters into their value.
    Value,
    /// Plaintext-only editable elements take characters into their text.
    Text,
}

pub struct ActionExecutor {
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Perform one action. Typing runs on its own timer and the returned
    /// handle completes when the last character has been emitted; the other
    /// actions finish before returning.
    pub async fn execute(
        &self,
        page: &Arc<Mutex<PageModel>>,
        session: &CaptureSession,
        action: &Action,
    ) -> Result<Option<JoinHandle<()>>> {
        match action {
            Action::Done => Ok(None),
            Action::Navigate { url } => {
                info!(url = url.as_str(), "navigating");
                page.lock().await.navigate(url)?;
                Ok(None)
            }
            Action::Click { hint_string } => {
                let element = session.element_for(hint_string)?;
                let mut page = page.lock().await;
                if FOCUS_BEFORE_CLICK.contains(&page.tag(element)) {
                    page.focus(element)?;
                }
                info!(label = hint_string.as_str(), "clicking");
                page.simulate_click(element)?;
                Ok(None)
            }
            Action::Type {
                hint_string,
                content,
            } => {
                let element = session.element_for(hint_string)?;
                let sink = {
                    let page = page.lock().await;
                    typing_sink(&page, element)?
                };
                info!(
                    label = hint_string.as_str(),
                    chars = content.chars().count(),
                    "typing"
                );
                Ok(Some(self.spawn_typing(
                    Arc::clone(page),
                    element,
                    sink,
                    content.clone(),
                )))
            }
        }
    }

    /// Emits one character per tick: append it, then keydown, keyup and a
    /// change notification, all bubbling and cancelable. A failed character
    /// is logged and skipped; the timer moves on to the next one.
    fn spawn_typing(
        &self,
        page: Arc<Mutex<PageModel>>,
        element: NodeId,
        sink: TypingSink,
        content: String,
    ) -> JoinHandle<()> {
        let cadence = Duration::from_millis(self.config.type_interval_ms);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(cadence);
            // Consume the immediate first tick so the first character waits
            // one full cadence, like the rest.
            timer.tick().await;
            for ch in content.chars() {
                timer.tick().await;
                let mut page = page.lock().await;
                if let Err(err) = emit_character(&mut page, element, &sink, ch) {
                    warn!(character = %ch, error = %err, "keystroke dispatch failed, skipping");
                }
            }
        })
    }
}

fn typing_sink(page: &PageModel, element: NodeId) -> Result<TypingSink> {
    let tag = page.tag(element);
    if matches!(tag, "input" | "textarea") {
        return Ok(TypingSink::Value);
    }
    if page.attr(element, "contenteditable") == Some("plaintext-only") {
        return Ok(TypingSink::Text);
    }
    Err(AgentError::UnsupportedRichText(tag.to_string()))
}

fn emit_character(
    page: &mut PageModel,
    element: NodeId,
    sink: &TypingSink,
    ch: char,
) -> Result<()> {
    match sink {
        TypingSink::Value => page.append_to_value(element, ch)?,
        TypingSink::Text => page.append_to_text(element, ch)?,
    }
    page.dispatch(element, EventKind::KeyDown { key: ch }, true, true)?;
    page.dispatch(element, EventKind::KeyUp { key: ch }, true, true)?;
    page.dispatch(element, EventKind::Change, true, true)?;
    Ok(())
}
