use crate::model::document::Document;

/// Serialize a document as stable, human-diffable UTF-8 JSON: 2-space
/// indentation, branch and field order preserved, trailing newline.
pub fn serialize_document(doc: &Document) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    Ok(text)
}
