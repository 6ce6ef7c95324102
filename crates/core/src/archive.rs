//! In-memory EPUB container. The whole ZIP is held in memory and entries are
//! read on demand by archive-internal path.

use std::io::{Cursor, Read};

use crate::encoding::decode_text;
use crate::error::{EntryError, IngestError};
use crate::security::{self, SecurityLimits};

pub const CONTAINER_PATH: &str = "META-INF/container.xml";
pub const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";

pub struct EpubArchive {
    zip: zip::ZipArchive<Cursor<Vec<u8>>>,
    limits: SecurityLimits,
}

impl EpubArchive {
    /// Open an archive from its raw bytes, applying archive-wide limits.
    pub fn open(data: Vec<u8>, limits: &SecurityLimits) -> Result<Self, IngestError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| IngestError::MalformedArchive(format!("Invalid ZIP archive: {e}")))?;

        security::check_file_count(zip.len() as u64, limits)?;

        let mut total: u64 = 0;
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i).map_err(|e| {
                IngestError::MalformedArchive(format!("Unreadable ZIP entry #{i}: {e}"))
            })?;
            total = total.saturating_add(entry.size());
        }
        security::check_total_size(total, limits)?;

        Ok(Self {
            zip,
            limits: limits.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.zip.index_for_name(path).is_some()
    }

    /// All entry names in central-directory order.
    pub fn entry_names(&self) -> Vec<String> {
        self.zip.file_names().map(str::to_string).collect()
    }

    /// Read an entry as raw bytes.
    pub fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>, EntryError> {
        security::check_path_traversal(path)?;

        let mut file = self.zip.by_name(path).map_err(|_| EntryError::Missing {
            path: path.to_string(),
        })?;

        security::check_resource_size(path, file.size(), &self.limits)?;
        security::check_compression_ratio(path, file.compressed_size(), file.size(), &self.limits)?;

        let capacity = usize::try_from(file.size()).unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        file.read_to_end(&mut buf).map_err(|e| EntryError::Read {
            path: path.to_string(),
            detail: e.to_string(),
        })?;
        Ok(buf)
    }

    /// Read an entry as text (UTF-8, BOM stripped, invalid sequences replaced).
    pub fn read_text(&mut self, path: &str) -> Result<String, EntryError> {
        let bytes = self.read_bytes(path)?;
        let (text, lossy) = decode_text(&bytes);
        if lossy {
            tracing::warn!("Entry {} is not valid UTF-8; invalid sequences were replaced", path);
        }
        Ok(text)
    }

    /// Refuse archives whose `encryption.xml` declares DRM.
    pub fn check_drm(&mut self) -> Result<(), IngestError> {
        if !self.contains(ENCRYPTION_PATH) {
            return Ok(());
        }
        let xml = self.read_text(ENCRYPTION_PATH)?;
        security::check_epub_drm(&xml)?;
        Ok(())
    }
}
