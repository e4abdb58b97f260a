// Task resources as exchanged with the remote task service.
//
// Field names follow the service's PascalCase JSON. Optional fields are
// omitted when absent so that a freshly built task only carries what the
// user typed; fields this crate does not model are kept in `extra` so a JSON
// dump shows the task as the server sent it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Task status. Values the service adds later are kept verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    WaitingOnOthers,
    Deferred,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::NotStarted => "NotStarted",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::WaitingOnOthers => "WaitingOnOthers",
            TaskStatus::Deferred => "Deferred",
            TaskStatus::Other(s) => s,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NotStarted" => TaskStatus::NotStarted,
            "InProgress" => TaskStatus::InProgress,
            "Completed" => TaskStatus::Completed,
            "WaitingOnOthers" => TaskStatus::WaitingOnOthers,
            "Deferred" => TaskStatus::Deferred,
            _ => TaskStatus::Other(s),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(TaskStatus::from)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskBody {
    pub content_type: String,
    pub content: String,
}

/// A date and time as the service represents it: local wall-clock time plus
/// the name of its time zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZonedDateTime {
    #[serde(rename = "DateTime")]
    pub date_time: String,
    #[serde(rename = "TimeZone")]
    pub time_zone: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    #[serde(rename = "@odata.id", skip_serializing_if = "Option::is_none")]
    pub odata_id: Option<String>,
    #[serde(rename = "@odata.etag", skip_serializing_if = "Option::is_none")]
    pub odata_etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<TaskBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_time: Option<ZonedDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date_time: Option<ZonedDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Collection envelope returned by the list endpoint.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskList {
    pub value: Vec<Task>,
}

impl Task {
    /// Build a task to be created. The body is only attached when given.
    pub fn new(subject: &str, content: Option<&str>) -> Self {
        Task {
            subject: Some(subject.to_string()),
            body: content.map(|c| TaskBody {
                content_type: "Text".into(),
                content: c.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }

    pub fn content(&self) -> &str {
        self.body.as_ref().map(|b| b.content.as_str()).unwrap_or("")
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(TaskStatus::Completed)
    }

    /// Absolute URI addressing this task. Prefers the server-provided
    /// `@odata.id`, else joins the collection URL with `Id`.
    pub fn resource_url(&self, collection: &str) -> Option<String> {
        if let Some(uri) = self.odata_id.as_deref().filter(|u| !u.is_empty()) {
            return Some(uri.to_string());
        }
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}/{}", collection.trim_end_matches('/'), id))
    }
}
