use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identity of the tab the automation loop is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: u32,
    pub url: String,
    pub title: String,
}

/// Per-tab indirection record pointing at the currently active task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    #[serde(rename = "taskID")]
    pub task_id: String,
}

/// A task may be incomplete due to an undetected failure or a user interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Done,
    Failed,
    Incomplete,
    Cancelling,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Incomplete | TaskStatus::Cancelled
        )
    }

    /// The only permitted transitions. Startup recovery bypasses this table
    /// when it forces interrupted tasks to incomplete.
    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Active, TaskStatus::Cancelling)
                | (TaskStatus::Active, TaskStatus::Done)
                | (TaskStatus::Active, TaskStatus::Failed)
                | (TaskStatus::Cancelling, TaskStatus::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Incomplete => "incomplete",
            TaskStatus::Cancelling => "cancelling",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// One user-initiated automation request and its execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(rename = "tabID")]
    pub tab_id: u32,
    pub steps: Vec<TaskStep>,
    #[serde(rename = "statusReason", skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One completed loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    #[serde(rename = "currentTab")]
    pub current_tab: TabSnapshot,
    pub response: ActionResponse,
}

/// The tab's url/title at the moment the action was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub url: String,
    pub title: String,
}

/// The decision service's chosen next action plus user-facing narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Next action chosen by the decision service. On the wire this is either the
/// bare string "done" or a `type`-tagged object.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Done,
    Navigate { url: String },
    Click { hint_string: String },
    Type { hint_string: String, content: String },
}

impl Action {
    pub fn is_done(&self) -> bool {
        matches!(self, Action::Done)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ActionRepr {
    Sentinel(String),
    Step(StepRepr),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StepRepr {
    Navigate {
        url: String,
    },
    Click {
        #[serde(rename = "hintString")]
        hint_string: String,
    },
    Type {
        #[serde(rename = "hintString")]
        hint_string: String,
        content: String,
    },
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let repr = match self.clone() {
            Action::Done => ActionRepr::Sentinel("done".to_string()),
            Action::Navigate { url } => ActionRepr::Step(StepRepr::Navigate { url }),
            Action::Click { hint_string } => ActionRepr::Step(StepRepr::Click { hint_string }),
            Action::Type {
                hint_string,
                content,
            } => ActionRepr::Step(StepRepr::Type {
                hint_string,
                content,
            }),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match ActionRepr::deserialize(deserializer)
            .map_err(|_| D::Error::custom("action is neither \"done\" nor a recognized step"))?
        {
            ActionRepr::Sentinel(s) if s == "done" => Ok(Action::Done),
            ActionRepr::Sentinel(s) => Err(D::Error::custom(format!("unknown action: {}", s))),
            ActionRepr::Step(StepRepr::Navigate { url }) => Ok(Action::Navigate { url }),
            ActionRepr::Step(StepRepr::Click { hint_string }) => Ok(Action::Click { hint_string }),
            ActionRepr::Step(StepRepr::Type {
                hint_string,
                content,
            }) => Ok(Action::Type {
                hint_string,
                content,
            }),
        }
    }
}

/// Structured body returned by the decision service on a non-success status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// One entry of the per-tab chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageModel {
    pub sender: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_wire_shapes() {
        let click: ActionResponse = serde_json::from_str(
            r#"{"action":{"type":"click","hintString":"AB"},"explanation":"press the button"}"#,
        )
        .unwrap();
        assert_eq!(
            click.action,
            Action::Click {
                hint_string: "AB".to_string()
            }
        );

        let done: ActionResponse = serde_json::from_str(r#"{"action":"done"}"#).unwrap();
        assert!(done.action.is_done());
        assert_eq!(done.explanation, None);

        let ty = ActionResponse {
            action: Action::Type {
                hint_string: "SA".to_string(),
                content: "hi".to_string(),
            },
            explanation: Some("fill the field".to_string()),
        };
        let json = serde_json::to_value(&ty).unwrap();
        assert_eq!(json["action"]["type"], "type");
        assert_eq!(json["action"]["hintString"], "SA");
        let back: ActionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, ty);
    }

    #[test]
    fn malformed_actions_are_rejected() {
        assert!(serde_json::from_str::<ActionResponse>(r#"{"action":"finished"}"#).is_err());
        assert!(
            serde_json::from_str::<ActionResponse>(r#"{"action":{"type":"hover","hintString":"A"}}"#)
                .is_err()
        );
    }

    #[test]
    fn transition_table_only_allows_specified_edges() {
        use TaskStatus::*;
        let all = [Active, Done, Failed, Incomplete, Cancelling, Cancelled];
        for from in all {
            for to in all {
                let allowed = matches!(
                    (from, to),
                    (Active, Cancelling)
                        | (Active, Done)
                        | (Active, Failed)
                        | (Cancelling, Cancelled)
                );
                assert_eq!(from.can_transition_to(to), allowed, "{:?} -> {:?}", from, to);
            }
        }
    }
}
