//! Archive hardening: ZIP bomb protection, path traversal guards, resource limits, DRM refusal.

use serde::{Deserialize, Serialize};

use crate::error::SecurityError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityLimits {
    /// Maximum decompression ratio before flagging as ZIP bomb.
    pub max_compression_ratio: u64,
    /// Maximum number of files allowed in an archive.
    pub max_file_count: u64,
    /// Maximum size of a single entry in bytes.
    pub max_resource_size_bytes: u64,
    /// Maximum total decompressed size in bytes.
    pub max_total_size_bytes: u64,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_compression_ratio: 100,
            max_file_count: 10_000,
            max_resource_size_bytes: 200 * 1024 * 1024, // 200 MB
            max_total_size_bytes: 1024 * 1024 * 1024,   // 1 GB
        }
    }
}

/// Reject absolute paths and `..` components in an archive entry name.
pub fn check_path_traversal(entry_path: &str) -> Result<(), SecurityError> {
    let traversal = entry_path.starts_with('/')
        || entry_path.starts_with('\\')
        || (entry_path.len() >= 2 && entry_path.as_bytes()[1] == b':')
        || entry_path.split(['/', '\\']).any(|seg| seg == "..");

    if traversal {
        return Err(SecurityError::PathTraversal {
            path: entry_path.to_string(),
        });
    }
    Ok(())
}

/// Check if a decompression ratio exceeds the configured limit (ZIP bomb detection).
pub fn check_compression_ratio(
    name: &str,
    compressed_size: u64,
    uncompressed_size: u64,
    limits: &SecurityLimits,
) -> Result<(), SecurityError> {
    // Tiny entries compress absurdly well; only judge entries worth worrying about.
    if uncompressed_size < 1024 * 1024 {
        return Ok(());
    }
    let ratio = match compressed_size {
        0 => u64::MAX,
        c => uncompressed_size / c,
    };
    if ratio > limits.max_compression_ratio {
        return Err(SecurityError::ZipBomb {
            name: name.to_string(),
            ratio,
            limit: limits.max_compression_ratio,
        });
    }
    Ok(())
}

pub fn check_file_count(count: u64, limits: &SecurityLimits) -> Result<(), SecurityError> {
    if count > limits.max_file_count {
        return Err(SecurityError::TooManyFiles {
            count,
            limit: limits.max_file_count,
        });
    }
    Ok(())
}

pub fn check_resource_size(
    name: &str,
    size_bytes: u64,
    limits: &SecurityLimits,
) -> Result<(), SecurityError> {
    if size_bytes > limits.max_resource_size_bytes {
        return Err(SecurityError::OversizedResource {
            name: name.to_string(),
            size_mb: size_bytes / (1024 * 1024),
            limit_mb: limits.max_resource_size_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

/// Check the declared total decompressed size of the archive.
pub fn check_total_size(total_bytes: u64, limits: &SecurityLimits) -> Result<(), SecurityError> {
    if total_bytes > limits.max_total_size_bytes {
        return Err(SecurityError::OversizedResource {
            name: "<total>".to_string(),
            size_mb: total_bytes / (1024 * 1024),
            limit_mb: limits.max_total_size_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

/// Check an EPUB's `META-INF/encryption.xml` for DRM.
/// Font obfuscation is not DRM and passes.
pub fn check_epub_drm(encryption_xml: &str) -> Result<(), SecurityError> {
    let drm_type = if encryption_xml.contains("http://ns.adobe.com/adept")
        || encryption_xml.contains("http://ns.adobe.com/digitaleditions")
    {
        Some("Adobe DRM")
    } else if encryption_xml.contains("http://www.apple.com/ibooks") || encryption_xml.contains("sinf") {
        Some("Apple FairPlay")
    } else if encryption_xml.contains("http://urms.org") {
        Some("Sony URMS")
    } else if encryption_xml.contains("EncryptedData")
        && !encryption_xml.contains("http://www.idpf.org/2008/embedding")
        && !encryption_xml.contains("http://ns.adobe.com/pdf/enc#RC")
    {
        Some("Unknown DRM")
    } else {
        None
    };

    match drm_type {
        Some(t) => Err(SecurityError::DrmProtected {
            drm_type: t.to_string(),
        }),
        None => Ok(()),
    }
}
