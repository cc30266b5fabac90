//! Lookup configuration and dust-map discovery.
//!
//! The map file is located in this order:
//!
//! 1. the explicit [`DustConfig::map_path`], if set
//! 2. the `CELESTIAL_DUST_MAP` environment variable
//! 3. `PlanckEvb.fits` in each directory of `CELESTIAL_DUST_AUX_PATH`
//!    (colon separated), first hit wins
//!
//! An explicit path or `CELESTIAL_DUST_MAP` is returned as given, without
//! checking that it exists, so that opening it reports the real I/O error.

use crate::constants::{DEFAULT_EBV_COLUMN, DEFAULT_MAP_FILENAME};
use crate::errors::{DustError, DustResult};
use crate::healpix::Nside;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Environment variable naming the dust map file directly.
pub const MAP_PATH_ENV: &str = "CELESTIAL_DUST_MAP";

/// Environment variable listing directories searched for the default map.
pub const AUX_PATH_ENV: &str = "CELESTIAL_DUST_AUX_PATH";

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DustConfig {
    pub map_path: Option<PathBuf>,
    /// Resolution used to pixelize positions. [`DustLookup::with_resolution`](crate::service::DustLookup::with_resolution)
    /// rejects a map built at any other nside.
    pub nside: Nside,
    pub ra_column: String,
    pub dec_column: String,
    pub output_column: String,
}

impl Default for DustConfig {
    fn default() -> Self {
        Self {
            map_path: None,
            nside: Nside::default(),
            ra_column: "RA".to_string(),
            dec_column: "DEC".to_string(),
            output_column: DEFAULT_EBV_COLUMN.to_string(),
        }
    }
}

impl DustConfig {
    pub fn with_map_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_path = Some(path.into());
        self
    }

    /// Resolves the map file against the process environment.
    pub fn resolve_map_path(&self) -> DustResult<PathBuf> {
        self.resolve_map_path_with(|key| std::env::var(key).ok())
    }

    /// Resolves the map file, reading environment variables through `env`.
    ///
    /// # Errors
    /// [`DustError::MapNotFound`] listing every candidate that was tried.
    pub fn resolve_map_path_with<F>(&self, env: F) -> DustResult<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.map_path {
            return Ok(path.clone());
        }
        if let Some(path) = env(MAP_PATH_ENV).filter(|p| !p.is_empty()) {
            tracing::debug!(env = MAP_PATH_ENV, path = %path, "dust map from environment");
            return Ok(PathBuf::from(path));
        }

        let mut searched = Vec::new();
        let dirs = env(AUX_PATH_ENV).unwrap_or_default();
        for dir in dirs.split(':').filter(|d| !d.is_empty()) {
            let candidate = Path::new(dir).join(DEFAULT_MAP_FILENAME);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "dust map found on aux path");
                return Ok(candidate);
            }
            searched.push(candidate);
        }
        Err(DustError::MapNotFound { searched })
    }
}
