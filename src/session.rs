use std::collections::HashMap;
use std::path::Path;

use crate::io::document_io::{self, DocumentError, SaveError};
use crate::model::document::Document;
use crate::model::task::{Task, TaskPatch};
use crate::ops::{check, tree};
use crate::parse::schema::{LoadError, parse_document};
use crate::state::{DirtyState, qualify};

/// Error type for session-level operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no document loaded")]
    NoDocument,
    #[error("no branch named {0}")]
    UnknownBranch(String),
    #[error(transparent)]
    Tree(#[from] tree::TreeError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// An editing session over one loaded document.
///
/// Owns the in-memory Document plus the dirty/error tracker. Every
/// mutation is addressed by branch name and composite path, never a bare
/// id, and keeps the tracker consistent: its maps never reference a path
/// that no longer resolves in the tree.
#[derive(Debug, Default)]
pub struct Session {
    document: Option<Document>,
    state: DirtyState,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    // -----------------------------------------------------------------------
    // Load / close
    // -----------------------------------------------------------------------

    /// Parse `text` and make it the session's document. On success the
    /// tracker resets: clean file, warnings seeded from the content pass.
    /// On failure the previous document, if any, stays loaded.
    pub fn load(&mut self, text: &str) -> Result<(), LoadError> {
        let doc = parse_document(text)?;
        let warnings = check::content_warnings(&doc);
        self.state.reset_loaded(warnings);
        self.document = Some(doc);
        Ok(())
    }

    /// Load a tasks file from disk
    pub fn load_file(&mut self, path: &Path) -> Result<(), DocumentError> {
        let (doc, warnings) = document_io::load_document_file(path)?;
        self.state.reset_loaded(warnings);
        self.document = Some(doc);
        Ok(())
    }

    /// Discard the current document (a different file is about to be
    /// loaded, or the editor is closing)
    pub fn close(&mut self) {
        self.document = None;
        self.state = DirtyState::new();
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Shallow-merge `patch` onto the node at `path` within `branch`.
    /// Marks the node and the file dirty and recomputes that node's
    /// content warnings.
    pub fn apply_update(
        &mut self,
        branch: &str,
        path: &str,
        patch: &TaskPatch,
    ) -> Result<(), SessionError> {
        let doc = self.document.as_mut().ok_or(SessionError::NoDocument)?;
        let b = doc
            .branches
            .get_mut(branch)
            .ok_or_else(|| SessionError::UnknownBranch(branch.to_string()))?;
        tree::update_by_path(&mut b.tasks, path, patch)?;
        b.touch_updated();

        let warnings = match &self.document {
            Some(doc) => node_warnings(doc, branch, path),
            None => Vec::new(),
        };
        self.state.note_update(&qualify(branch, path), warnings);
        Ok(())
    }

    /// Append `task` under `parent` (or at the branch root). Returns the
    /// new node's branch-relative path.
    pub fn apply_insert(
        &mut self,
        branch: &str,
        parent: Option<&str>,
        task: Task,
    ) -> Result<String, SessionError> {
        let doc = self.document.as_mut().ok_or(SessionError::NoDocument)?;
        let b = doc
            .branches
            .get_mut(branch)
            .ok_or_else(|| SessionError::UnknownBranch(branch.to_string()))?;
        let path = tree::insert_task(&mut b.tasks, parent, task)?;
        b.touch_updated();

        let warnings = match &self.document {
            Some(doc) => node_warnings(doc, branch, &path),
            None => Vec::new(),
        };
        self.state.note_update(&qualify(branch, &path), warnings);
        Ok(path)
    }

    /// Delete the node at `path` within `branch`, cascading to its whole
    /// subtree. Purges dirty and error entries for every removed path;
    /// the delete itself keeps the file dirty.
    pub fn apply_delete(&mut self, branch: &str, path: &str) -> Result<(), SessionError> {
        let doc = self.document.as_mut().ok_or(SessionError::NoDocument)?;
        let b = doc
            .branches
            .get_mut(branch)
            .ok_or_else(|| SessionError::UnknownBranch(branch.to_string()))?;
        let removed = tree::delete_by_path(&mut b.tasks, path)?;
        b.touch_updated();

        let keys: Vec<String> = removed.iter().map(|p| qualify(branch, p)).collect();
        self.state.note_delete(&keys);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serialize the current document and run the full durable-write
    /// protocol against `target`. On success the unsaved-changes flags
    /// clear; content warnings stay, since saving does not fix them.
    pub fn save(&mut self, target: &Path) -> Result<(), SessionError> {
        let doc = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        document_io::save_document(doc, target)?;
        self.state.mark_saved();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// The full dirty/error tracker, for callers that render indicators
    /// in bulk
    pub fn dirty_state(&self) -> &DirtyState {
        &self.state
    }

    pub fn is_file_dirty(&self) -> bool {
        self.state.is_file_dirty()
    }

    pub fn is_path_dirty(&self, branch: &str, path: &str) -> bool {
        self.state.is_dirty(&qualify(branch, path))
    }

    /// All content warnings, keyed by branch-qualified path
    pub fn errors(&self) -> &HashMap<String, Vec<String>> {
        self.state.errors()
    }

    pub fn errors_for(&self, branch: &str, path: &str) -> &[String] {
        self.state.errors_for(&qualify(branch, path))
    }

    /// Depth-first flattening of one branch, for list rendering
    pub fn flatten_for_display(
        &self,
        branch: &str,
    ) -> Result<Vec<tree::FlatEntry<'_>>, SessionError> {
        let b = self.branch(branch)?;
        Ok(tree::flatten(&b.tasks))
    }

    /// Recursively sorted copy of one branch's tasks
    pub fn sorted_view(&self, branch: &str) -> Result<Vec<Task>, SessionError> {
        let b = self.branch(branch)?;
        Ok(tree::sorted(&b.tasks))
    }

    fn branch(&self, branch: &str) -> Result<&crate::model::document::Branch, SessionError> {
        let doc = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        doc.branches
            .get(branch)
            .ok_or_else(|| SessionError::UnknownBranch(branch.to_string()))
    }
}

/// Recompute the content warnings for a single node after a mutation
fn node_warnings(doc: &Document, branch: &str, path: &str) -> Vec<String> {
    let known_ids = check::collect_id_keys(doc);
    let Some(b) = doc.branches.get(branch) else {
        return Vec::new();
    };
    let Ok(task) = tree::find_by_path(&b.tasks, path) else {
        return Vec::new();
    };
    let declared = check::declared_fields(b);
    let ctx = check::WarnContext {
        known_ids: &known_ids,
        declared_fields: declared.as_ref(),
    };
    let depth = path.split('/').count().saturating_sub(1);
    check::task_warnings(task, depth, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{TaskId, TaskStatus};
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
  "master": {
    "tasks": [
      { "id": 1, "title": "First" },
      {
        "id": 2,
        "title": "Second",
        "subtasks": [
          { "id": "1", "title": "Nested one" },
          { "id": "1.1", "title": "Nested dotted" }
        ]
      }
    ]
  },
  "feature": {
    "tasks": [
      { "id": 1, "title": "Feature root" }
    ]
  }
}
"#;

    fn loaded_session() -> Session {
        let mut session = Session::new();
        session.load(SAMPLE).unwrap();
        session
    }

    #[test]
    fn load_resets_to_a_clean_state() {
        let session = loaded_session();
        assert!(!session.is_file_dirty());
        assert!(session.errors().is_empty());
        assert_eq!(session.document().unwrap().branches.len(), 2);
    }

    #[test]
    fn load_failure_keeps_the_previous_document() {
        let mut session = loaded_session();
        assert!(session.load("{ invalid").is_err());
        assert!(session.document().is_some());
    }

    #[test]
    fn update_dirties_only_the_addressed_path() {
        let mut session = loaded_session();
        let patch = TaskPatch {
            status: Some(TaskStatus::Done),
            ..Default::default()
        };
        session.apply_update("master", "2/1", &patch).unwrap();

        assert!(session.is_file_dirty());
        assert!(session.is_path_dirty("master", "2/1"));
        // Neither the parent, nor the top-level task 1, nor the feature
        // branch's task 1 picked up the flag
        assert!(!session.is_path_dirty("master", "2"));
        assert!(!session.is_path_dirty("master", "1"));
        assert!(!session.is_path_dirty("feature", "1"));
    }

    #[test]
    fn update_recomputes_warnings_for_the_patched_node() {
        let mut session = loaded_session();
        let patch = TaskPatch {
            dependencies: Some(vec![TaskId::Int(99)]),
            ..Default::default()
        };
        session.apply_update("master", "1", &patch).unwrap();
        assert_eq!(
            session.errors_for("master", "1"),
            ["dependency 99 not found"]
        );

        // Fixing the dependency clears the key entirely
        let fix = TaskPatch {
            dependencies: Some(vec![TaskId::Int(2)]),
            ..Default::default()
        };
        session.apply_update("master", "1", &fix).unwrap();
        assert!(!session.errors().contains_key("master/1"));
    }

    #[test]
    fn update_missing_path_is_an_error_and_changes_nothing() {
        let mut session = loaded_session();
        let patch = TaskPatch::default();
        let err = session.apply_update("master", "9", &patch).unwrap_err();
        assert!(matches!(err, SessionError::Tree(tree::TreeError::NotFound(_))));
        assert!(!session.is_file_dirty());

        let err = session.apply_update("hotfix", "1", &patch).unwrap_err();
        assert!(matches!(err, SessionError::UnknownBranch(_)));
    }

    #[test]
    fn delete_purges_tracker_state_for_the_subtree() {
        let mut session = loaded_session();
        let patch = TaskPatch {
            title: Some("Touched".into()),
            ..Default::default()
        };
        session.apply_update("master", "2/1", &patch).unwrap();
        session.apply_update("master", "2/1.1", &patch).unwrap();

        session.apply_delete("master", "2").unwrap();
        assert!(session.is_file_dirty());
        assert!(!session.is_path_dirty("master", "2/1"));
        assert!(!session.is_path_dirty("master", "2/1.1"));
        assert!(!session.errors().contains_key("master/2/1"));
        assert!(session
            .flatten_for_display("master")
            .unwrap()
            .iter()
            .all(|e| e.path == "1"));
    }

    #[test]
    fn insert_marks_the_new_node_dirty() {
        let mut session = loaded_session();
        let path = session
            .apply_insert("master", Some("1"), Task::new("1.1", "New sub"))
            .unwrap();
        assert_eq!(path, "1/1.1");
        assert!(session.is_path_dirty("master", "1/1.1"));
    }

    #[test]
    fn insert_with_dangling_dependency_warns_immediately() {
        let mut session = loaded_session();
        let mut task = Task::new(3, "Third");
        task.dependencies.push(TaskId::Int(42));
        session.apply_insert("master", None, task).unwrap();
        assert_eq!(
            session.errors_for("master", "3"),
            ["dependency 42 not found"]
        );
    }

    #[test]
    fn mutations_refresh_branch_metadata_updated() {
        let mut session = Session::new();
        session
            .load(
                r#"{"master":{"tasks":[{"id":1,"title":"A"}],"metadata":{"created":"2026-01-01T00:00:00Z"}}}"#,
            )
            .unwrap();
        let patch = TaskPatch {
            title: Some("B".into()),
            ..Default::default()
        };
        session.apply_update("master", "1", &patch).unwrap();
        let metadata = session.document().unwrap().branches["master"]
            .metadata
            .as_ref()
            .unwrap();
        assert!(metadata.updated.is_some());
        assert_eq!(metadata.created.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn save_clears_dirty_flags_but_not_warnings() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("tasks.json");
        let mut session = loaded_session();

        let patch = TaskPatch {
            dependencies: Some(vec![TaskId::Int(99)]),
            ..Default::default()
        };
        session.apply_update("master", "1", &patch).unwrap();
        assert!(session.is_file_dirty());

        session.save(&target).unwrap();
        assert!(!session.is_file_dirty());
        assert!(!session.is_path_dirty("master", "1"));
        // Saving does not fix the dangling dependency
        assert_eq!(
            session.errors_for("master", "1"),
            ["dependency 99 not found"]
        );

        // The saved file parses back to the same document
        let text = fs::read_to_string(&target).unwrap();
        let reparsed = parse_document(&text).unwrap();
        assert_eq!(&reparsed, session.document().unwrap());
    }

    #[test]
    fn operations_without_a_document_fail_cleanly() {
        let mut session = Session::new();
        let patch = TaskPatch::default();
        assert!(matches!(
            session.apply_update("master", "1", &patch),
            Err(SessionError::NoDocument)
        ));
        assert!(matches!(
            session.save(Path::new("/tmp/never.json")),
            Err(SessionError::NoDocument)
        ));
        assert!(matches!(
            session.flatten_for_display("master"),
            Err(SessionError::NoDocument)
        ));
    }

    #[test]
    fn close_discards_document_and_tracker() {
        let mut session = loaded_session();
        let patch = TaskPatch {
            title: Some("Edited".into()),
            ..Default::default()
        };
        session.apply_update("master", "1", &patch).unwrap();

        session.close();
        assert!(session.document().is_none());
        assert!(!session.is_file_dirty());
        assert!(session.errors().is_empty());
    }

    #[test]
    fn flatten_and_sorted_views() {
        let mut session = Session::new();
        session
            .load(
                r#"{"master":{"tasks":[
                    {"id":"10","title":"Ten"},
                    {"id":"2","title":"Two","subtasks":[
                        {"id":"2.2","title":"B"},
                        {"id":"2.1","title":"A"}
                    ]},
                    {"id":"1","title":"One"}
                ]}}"#,
            )
            .unwrap();

        let flat: Vec<String> = session
            .flatten_for_display("master")
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(flat, vec!["10", "2", "2/2.2", "2/2.1", "1"]);

        let ids: Vec<String> = session
            .sorted_view("master")
            .unwrap()
            .iter()
            .map(|t| t.id.key())
            .collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
        let subs: Vec<String> = session.sorted_view("master").unwrap()[1]
            .subtasks
            .iter()
            .map(|t| t.id.key())
            .collect();
        assert_eq!(subs, vec!["2.1", "2.2"]);
    }
}
