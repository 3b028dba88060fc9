use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CleanupPolicy, ExtractionOptions};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(#[from] std::io::Error),
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub extraction: Option<ExtractionConfig>,
    pub mupdf: Option<MupdfConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub page_separator: Option<String>,
    pub normalize: Option<bool>,
    pub cleanup_policy: Option<CleanupPolicy>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MupdfConfig {
    /// Fraction of page height from the top to drop as running header.
    pub header_exclusion: Option<f32>,
    /// Fraction of page height from the bottom to drop as running footer.
    pub footer_exclusion: Option<f32>,
}

/// Platform config directory path: `<config_dir>/docextract/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docextract").join("config.toml"))
}

/// Load config by cascading CWD `.docextract.toml` over platform config.
/// CWD values override platform values. A file that exists but does not
/// parse is an error; a missing file is not.
pub fn load_config() -> Result<ConfigFile, ConfigError> {
    let platform = match config_path() {
        Some(p) => load_from_path(&p)?,
        None => None,
    };
    let cwd = load_from_path(Path::new(".docextract.toml"))?;

    Ok(match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    })
}

/// Load a config from a specific path. Returns `Ok(None)` if the file
/// doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let parsed = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Some(parsed))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let be = base.extraction.unwrap_or_default();
    let oe = overlay.extraction.unwrap_or_default();
    let bm = base.mupdf.unwrap_or_default();
    let om = overlay.mupdf.unwrap_or_default();

    ConfigFile {
        extraction: Some(ExtractionConfig {
            page_separator: oe.page_separator.or(be.page_separator),
            normalize: oe.normalize.or(be.normalize),
            cleanup_policy: oe.cleanup_policy.or(be.cleanup_policy),
            timeout_secs: oe.timeout_secs.or(be.timeout_secs),
        }),
        mupdf: Some(MupdfConfig {
            header_exclusion: om.header_exclusion.or(bm.header_exclusion),
            footer_exclusion: om.footer_exclusion.or(bm.footer_exclusion),
        }),
    }
}

/// Save the config to `path`, creating parent directories.
pub fn save_config(config: &ConfigFile, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

impl ConfigFile {
    /// Resolve extraction options, falling back to defaults for unset fields.
    /// A `timeout_secs` of 0 means no timeout.
    pub fn extraction_options(&self) -> ExtractionOptions {
        let defaults = ExtractionOptions::default();
        let Some(e) = &self.extraction else {
            return defaults;
        };
        ExtractionOptions {
            page_separator: e
                .page_separator
                .clone()
                .unwrap_or(defaults.page_separator),
            normalize: e.normalize.unwrap_or(defaults.normalize),
            cleanup_policy: e.cleanup_policy.unwrap_or(defaults.cleanup_policy),
            timeout: match e.timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.timeout,
            },
        }
    }
}
