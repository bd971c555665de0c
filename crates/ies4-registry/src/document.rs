//! Reading and writing region documents.
//!
//! The document is kept as a generic JSON object so keys the editor does not
//! know about are written back verbatim. Saves overwrite the file in place.

use crate::error::{RegistryError, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// SHA-256 of `bytes`, lowercase hex.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// One region's JSON document, held in memory for a single edit.
#[derive(Debug, Clone)]
pub struct RegionDocument {
    path: PathBuf,
    root: Map<String, Value>,
    /// Digest of the bytes this document was loaded from.
    loaded_digest: Option<String>,
}

impl RegionDocument {
    /// An empty document that has never been on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: Map::new(),
            loaded_digest: None,
        }
    }

    pub fn from_value(path: impl Into<PathBuf>, value: Value) -> Result<Self> {
        let path = path.into();
        match value {
            Value::Object(root) => Ok(Self {
                path,
                root,
                loaded_digest: None,
            }),
            _ => Err(RegistryError::NotADocument { path }),
        }
    }

    /// Read the raw file, mapping a missing file to `PathNotFound`.
    pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RegistryError::PathNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                RegistryError::io(path, e)
            }
        })
    }

    /// Parse the file without any shape checks.
    pub fn read_value(path: &Path) -> Result<Value> {
        let bytes = Self::read_bytes(path)?;
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = Self::read_bytes(path)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let mut doc = Self::from_value(path, value)?;
        doc.loaded_digest = Some(digest(&bytes));
        tracing::info!(
            path = %path.display(),
            collections = doc.collection_names().len(),
            "loaded region document"
        );
        Ok(doc)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn loaded_digest(&self) -> Option<&str> {
        self.loaded_digest.as_deref()
    }

    /// Names of every top-level array, in document order.
    pub fn collection_names(&self) -> Vec<&str> {
        self.root
            .iter()
            .filter(|(_, v)| v.is_array())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// A collection's records; an absent collection reads as empty.
    pub fn collection(&self, name: &str) -> Result<&[Value]> {
        match self.root.get(name) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(RegistryError::InvalidCollection {
                name: name.to_string(),
            }),
        }
    }

    /// Mutable access, materializing the collection when absent.
    pub fn collection_mut(&mut self, name: &str) -> Result<&mut Vec<Value>> {
        match self
            .root
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => Ok(items),
            _ => Err(RegistryError::InvalidCollection {
                name: name.to_string(),
            }),
        }
    }

    /// Mutable access without materializing.
    pub fn existing_collection_mut(&mut self, name: &str) -> Result<Option<&mut Vec<Value>>> {
        match self.root.get_mut(name) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(RegistryError::InvalidCollection {
                name: name.to_string(),
            }),
        }
    }

    /// 2-space indented JSON, keys in document order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.root)?)
    }

    /// Overwrite the file in place.
    ///
    /// With `guard` set, the file is re-hashed first and the write is refused
    /// if it no longer matches what was loaded.
    pub fn save(&mut self, guard: bool) -> Result<()> {
        if guard {
            self.check_unchanged()?;
        }
        let bytes = self.to_bytes()?;
        std::fs::write(&self.path, &bytes).map_err(|e| RegistryError::io(&self.path, e))?;
        self.loaded_digest = Some(digest(&bytes));
        tracing::info!(path = %self.path.display(), bytes = bytes.len(), "saved region document");
        Ok(())
    }

    fn check_unchanged(&self) -> Result<()> {
        let Some(expected) = &self.loaded_digest else {
            return Ok(());
        };
        let current = match std::fs::read(&self.path) {
            Ok(bytes) => Some(digest(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(RegistryError::io(&self.path, e)),
        };
        if current.as_deref() != Some(expected.as_str()) {
            return Err(RegistryError::ConcurrentModification {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}
