//! Writes generated documents as YAML or JSON.
//!
//! Every map in the document model is ordered, so the same document always
//! serializes to the same bytes.

use crate::error::Result;
use crate::openapi::OpenApiDocument;
use log::debug;
use std::fs;
use std::path::Path;

/// Document encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// JSON for a `.json` file, YAML for anything else
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

pub fn serialize(doc: &OpenApiDocument, format: Format) -> Result<String> {
    debug!("Serializing document as {:?}", format);
    let content = match format {
        Format::Yaml => serde_yaml::to_string(doc)?,
        Format::Json => serde_json::to_string_pretty(doc)?,
    };
    Ok(content)
}

pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    serialize(doc, Format::Yaml)
}

/// Pretty-printed JSON
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    serialize(doc, Format::Json)
}

/// Write serialized content, creating missing parent directories
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
