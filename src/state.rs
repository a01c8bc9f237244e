use std::collections::{HashMap, HashSet};

/// Build the branch-qualified key used by the tracker maps. Two branches
/// may each contain a task literally identified `1`; qualification keeps
/// their state separate.
pub fn qualify(branch: &str, path: &str) -> String {
    format!("{}/{}", branch, path)
}

/// Tracks, per addressable node, whether local edits have diverged from
/// the last persisted state and whether the node currently carries
/// content warnings.
///
/// Keys are branch-qualified paths (`"master/2/1.1"`), never bare ids.
/// Neither map ever holds a key whose path no longer resolves in the
/// tree; structural mutations purge their removed subtrees.
#[derive(Debug, Clone, Default)]
pub struct DirtyState {
    file_dirty: bool,
    dirty_paths: HashSet<String>,
    errors_by_path: HashMap<String, Vec<String>>,
}

impl DirtyState {
    pub fn new() -> Self {
        DirtyState::default()
    }

    /// Record a successful node update (or insert) together with that
    /// node's recomputed warnings. An empty warning list clears the key
    /// entirely; callers must never see presence-with-empty-list.
    pub fn note_update(&mut self, key: &str, warnings: Vec<String>) {
        self.file_dirty = true;
        self.dirty_paths.insert(key.to_string());
        if warnings.is_empty() {
            self.errors_by_path.remove(key);
        } else {
            self.errors_by_path.insert(key.to_string(), warnings);
        }
    }

    /// Record a successful delete: purge every removed key from both
    /// maps. The delete itself is an unsaved change, so the file stays
    /// dirty.
    pub fn note_delete(&mut self, removed: &[String]) {
        self.file_dirty = true;
        for key in removed {
            self.dirty_paths.remove(key);
            self.errors_by_path.remove(key);
        }
    }

    /// Reset after a successful load: clean file, no per-node edits,
    /// warnings seeded from the load's content pass.
    pub fn reset_loaded(&mut self, warnings: HashMap<String, Vec<String>>) {
        self.file_dirty = false;
        self.dirty_paths.clear();
        self.errors_by_path = warnings;
        self.errors_by_path.retain(|_, w| !w.is_empty());
    }

    /// Reset after a successful save: the unsaved-changes flags clear,
    /// but warnings stay, since saving does not fix them.
    pub fn mark_saved(&mut self) {
        self.file_dirty = false;
        self.dirty_paths.clear();
    }

    pub fn is_file_dirty(&self) -> bool {
        self.file_dirty
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.dirty_paths.contains(key)
    }

    pub fn dirty_paths(&self) -> &HashSet<String> {
        &self.dirty_paths
    }

    pub fn errors(&self) -> &HashMap<String, Vec<String>> {
        &self.errors_by_path
    }

    pub fn errors_for(&self, key: &str) -> &[String] {
        self.errors_by_path.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warnings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn update_marks_file_and_path_dirty() {
        let mut state = DirtyState::new();
        assert!(!state.is_file_dirty());

        state.note_update("master/2/1", Vec::new());
        assert!(state.is_file_dirty());
        assert!(state.is_dirty("master/2/1"));
        // Neither the parent nor an unrelated same-id path is dirty
        assert!(!state.is_dirty("master/2"));
        assert!(!state.is_dirty("master/1"));
        assert!(!state.is_dirty("feature/1"));
    }

    #[test]
    fn update_replaces_and_clears_warnings() {
        let mut state = DirtyState::new();
        state.note_update("master/1", warnings(&["title is empty"]));
        assert_eq!(state.errors_for("master/1"), ["title is empty"]);

        // An empty recompute removes the key entirely
        state.note_update("master/1", Vec::new());
        assert!(!state.errors().contains_key("master/1"));
        assert!(state.errors_for("master/1").is_empty());
    }

    #[test]
    fn delete_purges_subtree_but_stays_dirty() {
        let mut state = DirtyState::new();
        state.note_update("master/2", Vec::new());
        state.note_update("master/2/1", warnings(&["dependency 9 not found"]));
        state.note_update("master/3", Vec::new());

        state.note_delete(&[
            "master/2".to_string(),
            "master/2/1".to_string(),
            "master/2/1/a".to_string(),
        ]);
        assert!(state.is_file_dirty());
        assert!(!state.is_dirty("master/2"));
        assert!(!state.is_dirty("master/2/1"));
        assert!(!state.errors().contains_key("master/2/1"));
        // Unrelated paths survive the purge
        assert!(state.is_dirty("master/3"));
    }

    #[test]
    fn delete_alone_still_dirties_the_file() {
        let mut state = DirtyState::new();
        state.note_delete(&["master/1".to_string()]);
        assert!(state.is_file_dirty());
        assert!(state.dirty_paths().is_empty());
    }

    #[test]
    fn load_resets_everything_and_seeds_warnings() {
        let mut state = DirtyState::new();
        state.note_update("master/1", warnings(&["stale"]));

        let mut seeded = HashMap::new();
        seeded.insert("master/4".to_string(), warnings(&["dependency 9 not found"]));
        seeded.insert("master/5".to_string(), Vec::new());
        state.reset_loaded(seeded);

        assert!(!state.is_file_dirty());
        assert!(state.dirty_paths().is_empty());
        assert_eq!(state.errors_for("master/4"), ["dependency 9 not found"]);
        // Empty lists never survive into the map
        assert!(!state.errors().contains_key("master/5"));
        assert!(!state.errors().contains_key("master/1"));
    }

    #[test]
    fn save_clears_dirty_flags_but_keeps_warnings() {
        let mut state = DirtyState::new();
        state.note_update("master/1", warnings(&["title is empty"]));
        assert!(state.is_file_dirty());

        state.mark_saved();
        assert!(!state.is_file_dirty());
        assert!(!state.is_dirty("master/1"));
        // Saving does not fix warnings
        assert_eq!(state.errors_for("master/1"), ["title is empty"]);
    }

    #[test]
    fn qualify_prefixes_the_branch() {
        assert_eq!(qualify("master", "2/1.1"), "master/2/1.1");
        assert_eq!(qualify("feature", "1"), "feature/1");
    }
}
