/// Fatal ingestion error. Any of these aborts `parse_epub`; no partial book is returned.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Malformed EPUB archive: {0}")]
    MalformedArchive(String),

    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable failure reading a single archive entry. Callers log and skip.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("Missing archive entry: {path}")]
    Missing { path: String },

    #[error("Failed to read {path}: {detail}")]
    Read { path: String, detail: String },

    #[error(transparent)]
    Security(#[from] SecurityError),
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("ZIP bomb detected in {name}: decompression ratio {ratio}:1 exceeds limit {limit}:1")]
    ZipBomb { name: String, ratio: u64, limit: u64 },

    #[error("Path traversal detected in archive entry: {path}")]
    PathTraversal { path: String },

    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyFiles { count: u64, limit: u64 },

    #[error("Resource {name} is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedResource {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },

    #[error("DRM protected file ({drm_type})")]
    DrmProtected { drm_type: String },
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A book with id {0} already exists")]
    DuplicateId(String),

    #[error("A folder named {0:?} already exists")]
    DuplicateFolder(String),

    #[error("Invalid request: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EntryError> for IngestError {
    /// Entry failures on required documents (container, package) are structural.
    fn from(e: EntryError) -> Self {
        match e {
            EntryError::Security(s) => IngestError::Security(s),
            other => IngestError::MalformedArchive(other.to_string()),
        }
    }
}
