use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::safe_write::{WriteError, write_durable};
use crate::model::document::Document;
use crate::ops::check;
use crate::parse::schema::{LoadError, parse_document};
use crate::parse::serializer::serialize_document;

/// Error type for reading a tasks file, classified per failure kind so
/// callers can surface distinct copy for each
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("no tasks file at {0}")]
    NotFound(PathBuf),
    #[error("access denied reading {0}")]
    AccessDenied(PathBuf),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

/// Error type for loading a tasks file from disk
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Error type for the save protocol
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The in-memory document no longer matches the schema. Disk is
    /// untouched.
    #[error("refusing to save an invalid document: {0}")]
    Validation(#[from] LoadError),
    #[error("could not serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Read the raw text of a tasks file
pub fn read_document_text(path: &Path) -> Result<String, FileError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FileError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => FileError::AccessDenied(path.to_path_buf()),
        _ => FileError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Read and parse a tasks file, returning the document together with its
/// advisory content warnings (keyed by branch-qualified path).
pub fn load_document_file(
    path: &Path,
) -> Result<(Document, HashMap<String, Vec<String>>), DocumentError> {
    let text = read_document_text(path)?;
    let doc = parse_document(&text)?;
    let warnings = check::content_warnings(&doc);
    Ok((doc, warnings))
}

/// Save a document to `target` through the full durable-write protocol.
///
/// The serialized bytes are run back through the schema validator before
/// any disk I/O, so an in-memory state that somehow violates the schema
/// can never be written out.
pub fn save_document(doc: &Document, target: &Path) -> Result<(), SaveError> {
    let text = serialize_document(doc)?;
    parse_document(&text)?;
    write_durable(target, text.as_bytes())?;
    Ok(())
}
