use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::task::Task;

/// A whole tasks file: branch name → branch. Branch order is preserved
/// through load and save so diffs of the persisted file stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub branches: IndexMap<String, Branch>,
}

impl Document {
    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn branch_mut(&mut self, name: &str) -> Option<&mut Branch> {
        self.branches.get_mut(name)
    }
}

/// A named, independent tree of tasks within one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BranchMetadata>,
}

impl Branch {
    /// Refresh `metadata.updated` after a mutation. Branches without
    /// metadata are left alone.
    pub fn touch_updated(&mut self) {
        if let Some(metadata) = &mut self.metadata {
            metadata.updated = Some(now_stamp());
        }
    }
}

/// Branch-level bookkeeping: timestamps, description, and the declared
/// custom-field extension point for this branch's tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldDef>,
}

/// Declaration of one custom task field available within a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// RFC 3339 at seconds precision, the format used by branch timestamps
fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
