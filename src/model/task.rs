use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Review,
    Deferred,
    Cancelled,
}

impl TaskStatus {
    /// Every status name the schema accepts, in canonical order.
    pub const NAMES: [&'static str; 6] = [
        "pending",
        "in-progress",
        "done",
        "review",
        "deferred",
        "cancelled",
    ];

    /// The name used in the document text
    pub fn name(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Review => "review",
            TaskStatus::Deferred => "deferred",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status name into a status
    pub fn from_name(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in-progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "review" => Some(TaskStatus::Review),
            "deferred" => Some(TaskStatus::Deferred),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// Every priority name the schema accepts, in canonical order.
    pub const NAMES: [&'static str; 3] = ["high", "medium", "low"];

    pub fn name(self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    pub fn from_name(s: &str) -> Option<TaskPriority> {
        match s {
            "high" => Some(TaskPriority::High),
            "medium" => Some(TaskPriority::Medium),
            "low" => Some(TaskPriority::Low),
            _ => None,
        }
    }
}

/// A task identifier. Integer and string forms are equivalent identity
/// material; identity comparisons and path segments always go through the
/// string form, since `id` values are only unique within a sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Int(i64),
    Str(String),
}

impl TaskId {
    /// The string form used in paths and identity comparisons
    pub fn key(&self) -> String {
        match self {
            TaskId::Int(n) => n.to_string(),
            TaskId::Str(s) => s.clone(),
        }
    }

    /// Whether this id matches a path segment
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            TaskId::Int(n) => decimal_eq(*n, segment),
            TaskId::Str(s) => s == segment,
        }
    }
}

/// Compare an integer against its decimal string form without allocating.
fn decimal_eq(n: i64, s: &str) -> bool {
    let mut buf = [0u8; 20];
    let mut i = buf.len();
    let negative = n < 0;
    let mut m = n.unsigned_abs();
    loop {
        i -= 1;
        buf[i] = b'0' + (m % 10) as u8;
        m /= 10;
        if m == 0 {
            break;
        }
    }
    if negative {
        i -= 1;
        buf[i] = b'-';
    }
    s.as_bytes() == &buf[i..]
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Int(n) => write!(f, "{}", n),
            TaskId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(n: i64) -> Self {
        TaskId::Int(n)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId::Str(s.to_string())
    }
}

/// A task with all its fields. Subtasks nest recursively; the declared
/// format stops at one level, but the engine tolerates any depth and the
/// content-warning pass lints the excess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_strategy: Option<String>,
    /// References to other tasks by id. Advisory: a dangling entry is a
    /// content warning, never a load failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Task>,
    /// Open custom fields, declared by the branch's metadata. Preserved
    /// verbatim through load and save.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Task {
    /// Create a task with the given id and title, everything else empty
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            title: title.into(),
            description: None,
            details: None,
            status: None,
            priority: None,
            test_strategy: None,
            dependencies: Vec::new(),
            subtasks: Vec::new(),
            extra: IndexMap::new(),
        }
    }
}

/// A shallow-merge patch for a single task, applied through
/// `ops::tree::update_by_path`. A `Some` field replaces the task's value;
/// `None` leaves it alone. Custom-field entries are set (or removed, when
/// the value is JSON null) on the task's `extra` map.
///
/// `id` and `subtasks` are deliberately absent: a node's identity is its
/// path, and structural changes go through insert/delete.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub test_strategy: Option<String>,
    pub dependencies: Option<Vec<TaskId>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}
