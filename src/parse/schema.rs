use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::model::document::Document;
use crate::model::task::{TaskPriority, TaskStatus};

/// A single structure-phase violation: where in the document, and what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Error type for document loading. Transport failures and schema
/// failures are distinct kinds so callers can route them to different
/// user-facing copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The text is not well-formed JSON at all
    #[error("invalid transport syntax: {0}")]
    MalformedTransport(String),
    /// Well-formed JSON that does not match the document shape, with one
    /// entry per violated constraint
    #[error("document does not match the expected shape: {}", summarize(.0))]
    SchemaViolation(Vec<Violation>),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse raw text into a typed Document.
///
/// Two phases: the syntax phase rejects text that is not well-formed JSON
/// (`MalformedTransport`); the structure phase walks the decoded value
/// tree and collects every shape violation before failing
/// (`SchemaViolation`). Unknown extra fields on a task are preserved, not
/// rejected.
pub fn parse_document(text: &str) -> Result<Document, LoadError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| LoadError::MalformedTransport(e.to_string()))?;

    let violations = check_structure(&value);
    if !violations.is_empty() {
        return Err(LoadError::SchemaViolation(violations));
    }

    // The walk precedes the typed decode, so a failure here is itself a
    // shape problem.
    serde_json::from_value(value)
        .map_err(|e| LoadError::SchemaViolation(vec![Violation::new("$", e.to_string())]))
}

// ---------------------------------------------------------------------------
// Structure phase
// ---------------------------------------------------------------------------

const BRANCH_FIELDS: [&str; 2] = ["tasks", "metadata"];
const METADATA_FIELDS: [&str; 4] = ["created", "updated", "description", "customFields"];
const CUSTOM_FIELD_DEF_FIELDS: [&str; 2] = ["name", "label"];

fn check_structure(value: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    let Some(branches) = value.as_object() else {
        violations.push(Violation::new(
            "$",
            "expected an object mapping branch names to branches",
        ));
        return violations;
    };
    for (name, branch) in branches {
        if name.is_empty() {
            violations.push(Violation::new("$", "branch name is empty"));
        }
        check_branch(name, branch, &mut violations);
    }
    violations
}

fn check_branch(name: &str, value: &Value, violations: &mut Vec<Violation>) {
    let Some(obj) = value.as_object() else {
        violations.push(Violation::new(name, "expected a branch object"));
        return;
    };

    match obj.get("tasks") {
        None => violations.push(Violation::new(name, "missing required field tasks")),
        Some(tasks) => match tasks.as_array() {
            None => violations.push(Violation::new(
                format!("{}.tasks", name),
                "expected an array of tasks",
            )),
            Some(list) => check_task_list(list, &format!("{}.tasks", name), violations),
        },
    }

    if let Some(metadata) = obj.get("metadata") {
        check_metadata(metadata, &format!("{}.metadata", name), violations);
    }

    for key in obj.keys() {
        if !BRANCH_FIELDS.contains(&key.as_str()) {
            violations.push(Violation::new(
                format!("{}.{}", name, key),
                "unknown branch field",
            ));
        }
    }
}

fn check_task_list(list: &[Value], path: &str, violations: &mut Vec<Violation>) {
    let mut sibling_ids = HashSet::new();
    for (i, task) in list.iter().enumerate() {
        check_task(task, &format!("{}[{}]", path, i), &mut sibling_ids, violations);
    }
}

fn check_task(
    value: &Value,
    path: &str,
    sibling_ids: &mut HashSet<String>,
    violations: &mut Vec<Violation>,
) {
    let Some(obj) = value.as_object() else {
        violations.push(Violation::new(path, "expected a task object"));
        return;
    };

    match obj.get("id") {
        None => violations.push(Violation::new(path, "missing required field id")),
        Some(id) => match id_key(id) {
            Err(message) => violations.push(Violation::new(format!("{}.id", path), message)),
            Ok(key) => {
                if key.is_empty() {
                    violations.push(Violation::new(format!("{}.id", path), "id is empty"));
                } else if key.contains('/') {
                    violations.push(Violation::new(
                        format!("{}.id", path),
                        "id must not contain '/'",
                    ));
                } else if !sibling_ids.insert(key.clone()) {
                    violations.push(Violation::new(
                        format!("{}.id", path),
                        format!("duplicate id {} among siblings", key),
                    ));
                }
            }
        },
    }

    match obj.get("title") {
        None => violations.push(Violation::new(path, "missing required field title")),
        Some(Value::String(title)) => {
            if title.trim().is_empty() {
                violations.push(Violation::new(format!("{}.title", path), "title is empty"));
            }
        }
        Some(_) => violations.push(Violation::new(
            format!("{}.title", path),
            "expected a string",
        )),
    }

    for field in ["description", "details", "testStrategy"] {
        if let Some(v) = obj.get(field)
            && !v.is_string()
        {
            violations.push(Violation::new(
                format!("{}.{}", path, field),
                "expected a string",
            ));
        }
    }

    if let Some(status) = obj.get("status") {
        match status.as_str() {
            Some(s) if TaskStatus::from_name(s).is_some() => {}
            Some(s) => violations.push(Violation::new(
                format!("{}.status", path),
                format!(
                    "unknown status {:?} (expected one of: {})",
                    s,
                    TaskStatus::NAMES.join(", ")
                ),
            )),
            None => violations.push(Violation::new(
                format!("{}.status", path),
                "expected a string",
            )),
        }
    }

    if let Some(priority) = obj.get("priority") {
        match priority.as_str() {
            Some(p) if TaskPriority::from_name(p).is_some() => {}
            Some(p) => violations.push(Violation::new(
                format!("{}.priority", path),
                format!(
                    "unknown priority {:?} (expected one of: {})",
                    p,
                    TaskPriority::NAMES.join(", ")
                ),
            )),
            None => violations.push(Violation::new(
                format!("{}.priority", path),
                "expected a string",
            )),
        }
    }

    if let Some(dependencies) = obj.get("dependencies") {
        match dependencies.as_array() {
            None => violations.push(Violation::new(
                format!("{}.dependencies", path),
                "expected an array of ids",
            )),
            Some(deps) => {
                for (i, dep) in deps.iter().enumerate() {
                    if id_key(dep).is_err() {
                        violations.push(Violation::new(
                            format!("{}.dependencies[{}]", path, i),
                            "expected an integer or string id",
                        ));
                    }
                }
            }
        }
    }

    if let Some(subtasks) = obj.get("subtasks") {
        match subtasks.as_array() {
            None => violations.push(Violation::new(
                format!("{}.subtasks", path),
                "expected an array of tasks",
            )),
            Some(list) => {
                check_task_list(list, &format!("{}.subtasks", path), violations);
            }
        }
    }

    // Anything else is an open custom field: preserved, never rejected.
}

fn check_metadata(value: &Value, path: &str, violations: &mut Vec<Violation>) {
    let Some(obj) = value.as_object() else {
        violations.push(Violation::new(path, "expected a metadata object"));
        return;
    };

    for field in ["created", "updated", "description"] {
        if let Some(v) = obj.get(field)
            && !v.is_string()
        {
            violations.push(Violation::new(
                format!("{}.{}", path, field),
                "expected a string",
            ));
        }
    }

    if let Some(custom_fields) = obj.get("customFields") {
        match custom_fields.as_array() {
            None => violations.push(Violation::new(
                format!("{}.customFields", path),
                "expected an array of field declarations",
            )),
            Some(defs) => {
                for (i, def) in defs.iter().enumerate() {
                    check_custom_field_def(
                        def,
                        &format!("{}.customFields[{}]", path, i),
                        violations,
                    );
                }
            }
        }
    }

    for key in obj.keys() {
        if !METADATA_FIELDS.contains(&key.as_str()) {
            violations.push(Violation::new(
                format!("{}.{}", path, key),
                "unknown metadata field",
            ));
        }
    }
}

fn check_custom_field_def(value: &Value, path: &str, violations: &mut Vec<Violation>) {
    let Some(obj) = value.as_object() else {
        violations.push(Violation::new(path, "expected a field declaration object"));
        return;
    };

    match obj.get("name") {
        None => violations.push(Violation::new(path, "missing required field name")),
        Some(Value::String(name)) => {
            if name.is_empty() {
                violations.push(Violation::new(format!("{}.name", path), "name is empty"));
            }
        }
        Some(_) => violations.push(Violation::new(
            format!("{}.name", path),
            "expected a string",
        )),
    }

    if let Some(label) = obj.get("label")
        && !label.is_string()
    {
        violations.push(Violation::new(
            format!("{}.label", path),
            "expected a string",
        ));
    }

    for key in obj.keys() {
        if !CUSTOM_FIELD_DEF_FIELDS.contains(&key.as_str()) {
            violations.push(Violation::new(
                format!("{}.{}", path, key),
                "unknown field declaration field",
            ));
        }
    }
}

/// The string key of an id value, or a message describing why it is not
/// valid id material.
fn id_key(value: &Value) -> Result<String, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .ok_or_else(|| "id must be an integer or a string".to_string()),
        Value::String(s) => Ok(s.clone()),
        _ => Err("id must be an integer or a string".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
