//! Error taxonomy for registry operations.

use std::path::PathBuf;

/// Errors raised while locating, reading, editing or writing a region document.
///
/// Only `PathNotFound`, `Parse`, `UnknownRegion` and the shape errors abort an
/// operation. `BackupFailed` is returned from [`crate::backup::snapshot`] so
/// callers can log it, but it never blocks a write.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("region document not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown region `{code}` (valid: {})", valid.join(", "))]
    UnknownRegion { code: String, valid: Vec<String> },

    #[error("unknown entity kind `{name}` (valid: {})", valid.join(", "))]
    UnknownKind { name: String, valid: Vec<String> },

    #[error("{} is not a JSON object at the top level", path.display())]
    NotADocument { path: PathBuf },

    #[error("collection `{name}` exists but is not an array")]
    InvalidCollection { name: String },

    #[error("{} changed on disk since it was loaded; refusing to overwrite", path.display())]
    ConcurrentModification { path: PathBuf },

    #[error("backup of {} failed: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid entity definition: {0}")]
    InvalidDefinition(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly tag, used in structured reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathNotFound { .. } => "path_not_found",
            Self::Parse { .. } => "parse_error",
            Self::UnknownRegion { .. } => "unknown_region",
            Self::UnknownKind { .. } => "unknown_kind",
            Self::NotADocument { .. } => "not_a_document",
            Self::InvalidCollection { .. } => "invalid_collection",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::BackupFailed { .. } => "backup_failed",
            Self::InvalidDefinition(_) => "invalid_definition",
            Self::Io { .. } => "io_error",
            Self::Serialize(_) => "serialize_error",
        }
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
