pub mod schema;
pub mod serializer;

pub use schema::{LoadError, Violation, parse_document};
pub use serializer::serialize_document;
