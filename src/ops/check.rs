use std::collections::{HashMap, HashSet};

use crate::model::document::{Branch, Document};
use crate::model::task::Task;
use crate::ops::tree;
use crate::state::qualify;

/// Context shared by a warning pass over one branch
pub struct WarnContext<'a> {
    /// String form of every task id across all branches, for dependency
    /// resolution
    pub known_ids: &'a HashSet<String>,
    /// Custom-field names the branch declares; `None` when the branch
    /// declares none (undeclared-field linting is then skipped)
    pub declared_fields: Option<&'a HashSet<String>>,
}

/// Collect the string form of every task id across all branches.
/// Dependencies may point across branches, so resolution uses the full set.
pub fn collect_id_keys(doc: &Document) -> HashSet<String> {
    let mut ids = HashSet::new();
    for branch in doc.branches.values() {
        tree::for_each(&branch.tasks, &mut |task, _, _| {
            ids.insert(task.id.key());
        });
    }
    ids
}

/// The custom-field names a branch declares, if any
pub fn declared_fields(branch: &Branch) -> Option<HashSet<String>> {
    let metadata = branch.metadata.as_ref()?;
    if metadata.custom_fields.is_empty() {
        return None;
    }
    Some(
        metadata
            .custom_fields
            .iter()
            .map(|f| f.name.clone())
            .collect(),
    )
}

/// Advisory content warnings for every node in the document, keyed by
/// branch-qualified path.
///
/// This pass never fails and gates nothing. Warnings surface as
/// non-blocking per-node indicators, distinct from schema violations.
pub fn content_warnings(doc: &Document) -> HashMap<String, Vec<String>> {
    let known_ids = collect_id_keys(doc);
    let mut out = HashMap::new();
    for (name, branch) in &doc.branches {
        let declared = declared_fields(branch);
        let ctx = WarnContext {
            known_ids: &known_ids,
            declared_fields: declared.as_ref(),
        };
        tree::for_each(&branch.tasks, &mut |task, depth, path| {
            let warnings = task_warnings(task, depth, &ctx);
            if !warnings.is_empty() {
                out.insert(qualify(name, path), warnings);
            }
        });
    }
    out
}

/// Warnings for a single task. Used on load for every node, and again to
/// recompute one node's warnings after it is patched.
pub fn task_warnings(task: &Task, depth: usize, ctx: &WarnContext) -> Vec<String> {
    let mut warnings = Vec::new();

    if task.id.key().is_empty() {
        warnings.push("id is empty".to_string());
    }
    if task.title.trim().is_empty() {
        warnings.push("title is empty".to_string());
    }
    for dep in &task.dependencies {
        let key = dep.key();
        if !ctx.known_ids.contains(&key) {
            warnings.push(format!("dependency {} not found", key));
        }
    }
    // The declared format stops at one level of subtasks
    if depth >= 2 {
        warnings.push("nested deeper than one level of subtasks".to_string());
    }
    for (key, value) in &task.extra {
        if !value.is_string() {
            warnings.push(format!("custom field {} is not a string", key));
        }
        if let Some(declared) = ctx.declared_fields
            && !declared.contains(key)
        {
            warnings.push(format!("custom field {} is not declared by the branch", key));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{BranchMetadata, CustomFieldDef};
    use crate::model::task::TaskId;
    use serde_json::json;

    fn doc_with_branch(name: &str, tasks: Vec<Task>) -> Document {
        let mut doc = Document::default();
        doc.branches.insert(
            name.to_string(),
            Branch {
                tasks,
                metadata: None,
            },
        );
        doc
    }

    #[test]
    fn clean_document_yields_no_warnings() {
        let mut one = Task::new(1, "First");
        one.subtasks.push(Task::new("1.1", "Nested"));
        let doc = doc_with_branch("master", vec![one, Task::new(2, "Second")]);
        assert!(content_warnings(&doc).is_empty());
    }

    #[test]
    fn dangling_dependency_is_a_warning() {
        let mut task = Task::new(1, "First");
        task.dependencies.push(TaskId::Int(9));
        let doc = doc_with_branch("master", vec![task]);

        let warnings = content_warnings(&doc);
        assert_eq!(warnings["master/1"], vec!["dependency 9 not found"]);
    }

    #[test]
    fn dependencies_resolve_across_branches() {
        let mut doc = Document::default();
        let mut task = Task::new(1, "Needs other branch");
        task.dependencies.push(TaskId::Str("7".into()));
        doc.branches.insert(
            "master".into(),
            Branch {
                tasks: vec![task],
                metadata: None,
            },
        );
        doc.branches.insert(
            "feature".into(),
            Branch {
                tasks: vec![Task::new(7, "Target")],
                metadata: None,
            },
        );
        assert!(content_warnings(&doc).is_empty());
    }

    #[test]
    fn empty_title_is_a_warning() {
        let doc = doc_with_branch("master", vec![Task::new(1, "  ")]);
        let warnings = content_warnings(&doc);
        assert_eq!(warnings["master/1"], vec!["title is empty"]);
    }

    #[test]
    fn deep_nesting_is_linted_not_rejected() {
        let mut grandchild = Task::new("c", "Too deep");
        grandchild.subtasks.push(Task::new("d", "Deeper still"));
        let mut child = Task::new("b", "Child");
        child.subtasks.push(grandchild);
        let mut root = Task::new("a", "Root");
        root.subtasks.push(child);
        let doc = doc_with_branch("master", vec![root]);

        let warnings = content_warnings(&doc);
        assert_eq!(
            warnings["master/a/b/c"],
            vec!["nested deeper than one level of subtasks"]
        );
        assert_eq!(
            warnings["master/a/b/c/d"],
            vec!["nested deeper than one level of subtasks"]
        );
        assert!(!warnings.contains_key("master/a/b"));
    }

    #[test]
    fn undeclared_custom_field_is_linted_when_branch_declares_fields() {
        let mut task = Task::new(1, "First");
        task.extra.insert("component".into(), json!("core"));
        task.extra.insert("estimate".into(), json!("3d"));
        let mut doc = doc_with_branch("master", vec![task]);
        doc.branches[0].metadata = Some(BranchMetadata {
            custom_fields: vec![CustomFieldDef {
                name: "component".into(),
                label: None,
            }],
            ..Default::default()
        });

        let warnings = content_warnings(&doc);
        assert_eq!(
            warnings["master/1"],
            vec!["custom field estimate is not declared by the branch"]
        );
    }

    #[test]
    fn undeclared_lint_skipped_without_declarations() {
        let mut task = Task::new(1, "First");
        task.extra.insert("anything".into(), json!("goes"));
        let doc = doc_with_branch("master", vec![task]);
        assert!(content_warnings(&doc).is_empty());
    }

    #[test]
    fn non_string_custom_field_is_a_warning() {
        let mut task = Task::new(1, "First");
        task.extra.insert("estimate".into(), json!(3));
        let doc = doc_with_branch("master", vec![task]);

        let warnings = content_warnings(&doc);
        assert_eq!(
            warnings["master/1"],
            vec!["custom field estimate is not a string"]
        );
    }

    #[test]
    fn collect_id_keys_spans_branches_and_depths() {
        let mut doc = Document::default();
        let mut one = Task::new(1, "One");
        one.subtasks.push(Task::new("1.1", "Sub"));
        doc.branches.insert(
            "master".into(),
            Branch {
                tasks: vec![one],
                metadata: None,
            },
        );
        doc.branches.insert(
            "feature".into(),
            Branch {
                tasks: vec![Task::new("x", "Other")],
                metadata: None,
            },
        );

        let ids = collect_id_keys(&doc);
        assert!(ids.contains("1"));
        assert!(ids.contains("1.1"));
        assert!(ids.contains("x"));
        assert_eq!(ids.len(), 3);
    }
}
