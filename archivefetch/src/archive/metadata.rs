//! Item metadata documents returned by the archive.org metadata API.

use std::io::Read;

use serde::Deserialize;

use super::CatalogError;
use crate::job::NameFilter;

/// A file entry in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileDescriptor {
    /// Path of the file relative to the collection root.
    pub name: String,
    /// Size in bytes, when the service reports one.
    #[serde(default, deserialize_with = "size_from_string")]
    pub size: Option<u64>,
    /// MD5 digest as reported by the service, when present.
    ///
    /// Reserved for checksum verification. Downloads do not check it yet.
    #[serde(default)]
    pub md5: Option<String>,
}

impl FileDescriptor {
    /// Create a descriptor carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            md5: None,
        }
    }
}

/// The subset of an item metadata document this crate consumes.
#[derive(Debug, Default, Deserialize)]
pub struct ItemMetadata {
    #[serde(default)]
    files: Option<Vec<FileDescriptor>>,
}

impl ItemMetadata {
    /// Decode a metadata document.
    ///
    /// The service answers unknown identifiers with an empty object, so a
    /// document without a `files` array is reported as [`CatalogError::NotFound`].
    pub fn from_reader<R: Read>(identifier: &str, reader: R) -> Result<Self, CatalogError> {
        let metadata: ItemMetadata = serde_json::from_reader(reader)
            .map_err(|e| CatalogError::Malformed(e.to_string()))?;

        if metadata.files.is_none() {
            return Err(CatalogError::NotFound(identifier.to_string()));
        }
        Ok(metadata)
    }

    /// Files of the item whose names match `filter`.
    pub fn into_files(self, filter: Option<&NameFilter>) -> Vec<FileDescriptor> {
        self.files
            .unwrap_or_default()
            .into_iter()
            .filter(|f| filter.map_or(true, |p| p.matches(&f.name)))
            .collect()
    }
}

// The metadata API reports sizes as decimal strings.
fn size_from_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Text(String),
        Number(u64),
    }

    Ok(match Option::<Size>::deserialize(deserializer)? {
        Some(Size::Text(s)) => s.parse().ok(),
        Some(Size::Number(n)) => Some(n),
        None => None,
    })
}
