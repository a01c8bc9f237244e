use std::cmp::Ordering;

use crate::model::task::{Task, TaskPatch};

/// Error type for path-addressed tree operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("no task at path: {0}")]
    NotFound(String),
    #[error("a sibling already has id {0}")]
    DuplicateId(String),
}

/// Join a parent path and an id segment
pub fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", parent, segment)
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Walk a `/`-joined path down a task list, segment by segment. Each
/// segment must match an id in the current sibling list; the walk then
/// descends into that task's subtasks.
pub fn find_by_path<'a>(tasks: &'a [Task], path: &str) -> Result<&'a Task, TreeError> {
    let mut current = tasks;
    let mut found = None;
    for segment in path.split('/') {
        let task = current
            .iter()
            .find(|t| t.id.matches(segment))
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        current = &task.subtasks;
        found = Some(task);
    }
    found.ok_or_else(|| TreeError::NotFound(path.to_string()))
}

/// Mutable variant of `find_by_path`
pub fn find_by_path_mut<'a>(tasks: &'a mut [Task], path: &str) -> Result<&'a mut Task, TreeError> {
    let segments: Vec<&str> = path.split('/').collect();
    walk_mut(tasks, &segments, path)
}

fn walk_mut<'a>(tasks: &'a mut [Task], segments: &[&str], path: &str) -> Result<&'a mut Task, TreeError> {
    let (segment, rest) = segments
        .split_first()
        .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
    let idx = tasks
        .iter()
        .position(|t| t.id.matches(segment))
        .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
    let task = &mut tasks[idx];
    if rest.is_empty() {
        Ok(task)
    } else {
        walk_mut(&mut task.subtasks, rest, path)
    }
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Resolve `path` and shallow-merge `patch` onto that node in place.
/// Siblings and ancestors are never touched.
pub fn update_by_path(tasks: &mut [Task], path: &str, patch: &TaskPatch) -> Result<(), TreeError> {
    let task = find_by_path_mut(tasks, path)?;
    merge_patch(task, patch);
    Ok(())
}

fn merge_patch(task: &mut Task, patch: &TaskPatch) {
    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(description) = &patch.description {
        task.description = Some(description.clone());
    }
    if let Some(details) = &patch.details {
        task.details = Some(details.clone());
    }
    if let Some(status) = patch.status {
        task.status = Some(status);
    }
    if let Some(priority) = patch.priority {
        task.priority = Some(priority);
    }
    if let Some(test_strategy) = &patch.test_strategy {
        task.test_strategy = Some(test_strategy.clone());
    }
    if let Some(dependencies) = &patch.dependencies {
        task.dependencies = dependencies.clone();
    }
    for (key, value) in &patch.extra {
        if value.is_null() {
            task.extra.shift_remove(key);
        } else {
            task.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Remove the node at `path` from its parent list. Returns the removed
/// node's path plus every descendant path, so callers can purge
/// path-keyed state for the whole subtree.
pub fn delete_by_path(tasks: &mut Vec<Task>, path: &str) -> Result<Vec<String>, TreeError> {
    let (parent, leaf) = match path.rsplit_once('/') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };
    let list = match parent {
        Some(parent) => &mut find_by_path_mut(tasks, parent)?.subtasks,
        None => tasks,
    };
    let idx = list
        .iter()
        .position(|t| t.id.matches(leaf))
        .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
    let removed = list.remove(idx);

    let mut paths = vec![path.to_string()];
    collect_paths(&removed.subtasks, path, &mut paths);
    Ok(paths)
}

fn collect_paths(tasks: &[Task], prefix: &str, out: &mut Vec<String>) {
    for task in tasks {
        let path = join_path(prefix, &task.id.key());
        out.push(path.clone());
        collect_paths(&task.subtasks, &path, out);
    }
}

/// Append `task` under `parent`, or at the root when `parent` is `None`.
/// Rejects an id already used by a sibling. Returns the new node's path.
pub fn insert_task(
    tasks: &mut Vec<Task>,
    parent: Option<&str>,
    task: Task,
) -> Result<String, TreeError> {
    let list = match parent {
        Some(parent) => &mut find_by_path_mut(tasks, parent)?.subtasks,
        None => tasks,
    };
    let key = task.id.key();
    if list.iter().any(|t| t.id.matches(&key)) {
        return Err(TreeError::DuplicateId(key));
    }
    list.push(task);
    Ok(match parent {
        Some(parent) => join_path(parent, &key),
        None => key,
    })
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// One row of a flattened tree
#[derive(Debug, Clone)]
pub struct FlatEntry<'a> {
    pub task: &'a Task,
    pub depth: usize,
    pub path: String,
}

/// Depth-first pre-order flattening: a task is immediately followed by all
/// of its subtasks, before any sibling task.
pub fn flatten(tasks: &[Task]) -> Vec<FlatEntry<'_>> {
    let mut out = Vec::new();
    flatten_into(tasks, 0, "", &mut out);
    out
}

fn flatten_into<'a>(tasks: &'a [Task], depth: usize, prefix: &str, out: &mut Vec<FlatEntry<'a>>) {
    for task in tasks {
        let path = join_path(prefix, &task.id.key());
        out.push(FlatEntry {
            task,
            depth,
            path: path.clone(),
        });
        flatten_into(&task.subtasks, depth + 1, &path, out);
    }
}

/// Depth-first traversal, visiting a task then its subtasks before the
/// next sibling. The visitor receives the task, its depth, and its path.
pub fn for_each(tasks: &[Task], visit: &mut dyn FnMut(&Task, usize, &str)) {
    for_each_inner(tasks, 0, "", visit);
}

fn for_each_inner(
    tasks: &[Task],
    depth: usize,
    prefix: &str,
    visit: &mut dyn FnMut(&Task, usize, &str),
) {
    for task in tasks {
        let path = join_path(prefix, &task.id.key());
        visit(task, depth, &path);
        for_each_inner(&task.subtasks, depth + 1, &path, visit);
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Recursively sorted copy of a task list: every sibling list, root and
/// nested, ordered by the dotted-numeric id comparator.
pub fn sorted(tasks: &[Task]) -> Vec<Task> {
    let mut out = tasks.to_vec();
    sort_in_place(&mut out);
    out
}

fn sort_in_place(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| compare_dotted(&a.id.key(), &b.id.key()));
    for task in tasks {
        sort_in_place(&mut task.subtasks);
    }
}

/// Compare two ids by splitting their string forms on `.` and comparing
/// component-wise as integers. A non-numeric component sorts as infinitely
/// large; a shorter sequence pads with 0. `"2"` sorts before `"10"`, and
/// `"1.2"` immediately after `"1.1"`.
pub fn compare_dotted(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.').map(component_value);
    let mut right = b.split('.').map(component_value);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (x, y) => match x.unwrap_or(0).cmp(&y.unwrap_or(0)) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

fn component_value(component: &str) -> u64 {
    component.parse().unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
