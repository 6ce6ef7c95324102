//! Config file parsing for `~/.config/shelf/config.toml`.
//!
//! Use `ingest_options_from_config` and `cache_from_config` to build runtime
//! settings from the loaded config so security and ingestion settings apply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ingest::IngestOptions;
use crate::security::SecurityLimits;
use crate::session::{ReaderCache, DEFAULT_CACHE_CAPACITY};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_true")]
    pub parse_toc: bool,
    #[serde(default = "default_true")]
    pub inline_images: bool,
    #[serde(default = "default_true")]
    pub normalize_unicode: bool,
    #[serde(default = "default_true")]
    pub warn_on_href_collision: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            parse_toc: true,
            inline_images: true,
            normalize_unicode: true,
            warn_on_href_collision: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_file_count: Option<u64>,
    pub max_resource_size_mb: Option<u64>,
    pub max_total_size_mb: Option<u64>,
    pub max_compression_ratio: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Default config file path.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("shelf");
        p.push("config.toml");
        p
    })
}

/// Load config from the default path. Missing or invalid files yield defaults.
pub fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => AppConfig::default(),
    }
}

/// Load config from `path`, falling back to defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}

/// Write config as TOML, creating parent directories.
pub fn save_config(cfg: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Build security limits from config. Uses defaults for any unset values.
pub fn security_limits_from_config(c: &SecurityConfig) -> SecurityLimits {
    let mut limits = SecurityLimits::default();
    if let Some(n) = c.max_file_count {
        limits.max_file_count = n;
    }
    if let Some(mb) = c.max_resource_size_mb {
        limits.max_resource_size_bytes = mb.saturating_mul(1024).saturating_mul(1024);
    }
    if let Some(mb) = c.max_total_size_mb {
        limits.max_total_size_bytes = mb.saturating_mul(1024).saturating_mul(1024);
    }
    if let Some(r) = c.max_compression_ratio {
        limits.max_compression_ratio = r;
    }
    limits
}

/// Build ingestion options from the full app config.
pub fn ingest_options_from_config(cfg: &AppConfig) -> IngestOptions {
    IngestOptions {
        security: security_limits_from_config(&cfg.security),
        parse_toc: cfg.ingest.parse_toc,
        inline_images: cfg.ingest.inline_images,
        normalize_unicode: cfg.ingest.normalize_unicode,
        warn_on_href_collision: cfg.ingest.warn_on_href_collision,
        added_at: None,
    }
}

pub fn cache_from_config(cfg: &AppConfig) -> ReaderCache {
    ReaderCache::new(cfg.cache.capacity)
}

/// Set a `section.key` value from its string form.
pub fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let parse_bool = || value.trim().parse::<bool>().map_err(|_| invalid());
    let parse_u64 = || value.trim().parse::<u64>().map_err(|_| invalid());

    match key {
        "ingest.parse_toc" => cfg.ingest.parse_toc = parse_bool()?,
        "ingest.inline_images" => cfg.ingest.inline_images = parse_bool()?,
        "ingest.normalize_unicode" => cfg.ingest.normalize_unicode = parse_bool()?,
        "ingest.warn_on_href_collision" => cfg.ingest.warn_on_href_collision = parse_bool()?,
        "security.max_file_count" => cfg.security.max_file_count = Some(parse_u64()?),
        "security.max_resource_size_mb" => cfg.security.max_resource_size_mb = Some(parse_u64()?),
        "security.max_total_size_mb" => cfg.security.max_total_size_mb = Some(parse_u64()?),
        "security.max_compression_ratio" => {
            cfg.security.max_compression_ratio = Some(parse_u64()?)
        }
        "cache.capacity" => {
            cfg.cache.capacity = usize::try_from(parse_u64()?).map_err(|_| invalid())?
        }
        other => return Err(ConfigError::UnknownKey(other.to_string())),
    }
    Ok(())
}
