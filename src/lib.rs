//! Hierarchical task document store with crash-safe persistence.
//!
//! A tasks file maps branch names to trees of tasks and nested subtasks.
//! Nodes are addressed by composite `/`-joined id paths (ids are only
//! unique within a sibling list), loads go through a two-phase schema
//! validator, per-node dirty/warning state is tracked by path, and saves
//! run a stage/snapshot/commit protocol that can never leave the file
//! corrupted mid-write.

pub mod io;
pub mod model;
pub mod ops;
pub mod parse;
pub mod session;
pub mod state;

pub use model::document::{Branch, BranchMetadata, CustomFieldDef, Document};
pub use model::task::{Task, TaskId, TaskPatch, TaskPriority, TaskStatus};
pub use parse::schema::{LoadError, Violation};
pub use session::{Session, SessionError};
pub use state::DirtyState;
