pub mod document_io;
pub mod safe_write;
