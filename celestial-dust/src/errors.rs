//! Error types for dust-map lookups.
//!
//! Every fallible operation in this crate returns [`DustResult<T>`]. The
//! variants follow the stage that detected the problem:
//!
//! | Variant | Raised by | Recoverable? |
//! |---------|-----------|--------------|
//! | [`InvalidResolution`](DustError::InvalidResolution) | [`Nside`](crate::healpix::Nside) construction | No |
//! | [`InvalidColatitude`](DustError::InvalidColatitude) | [`ang2pix_nest`](crate::healpix::ang2pix_nest) | No |
//! | [`InvalidLongitude`](DustError::InvalidLongitude) | [`ang2pix_nest`](crate::healpix::ang2pix_nest) | No |
//! | [`InvalidPosition`](DustError::InvalidPosition) | [`equatorial_to_galactic`](crate::galactic::equatorial_to_galactic) | No |
//! | [`ShapeMismatch`](DustError::ShapeMismatch) | any batch operation | No |
//! | [`IndexOutOfRange`](DustError::IndexOutOfRange) | [`ExtinctionMap::lookup`](crate::map::ExtinctionMap::lookup) | No |
//! | [`ResolutionMismatch`](DustError::ResolutionMismatch) | [`DustLookup`](crate::service::DustLookup), [`ebv`](crate::service::ebv) | No |
//! | [`MapFormat`](DustError::MapFormat) | map loaders | No |
//! | [`MapNotFound`](DustError::MapNotFound) | [`DustConfig`](crate::config::DustConfig) | No |
//! | [`Catalog`](DustError::Catalog) | [`catalog`](crate::catalog) | No |
//! | [`Io`](DustError::Io) | file access | Yes |
//!
//! The computation is deterministic, so nothing but I/O is worth retrying.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DustError {
    /// nside is not a power of two in `[1, 8192]`.
    #[error("Invalid HEALPix resolution: nside {nside} must be a power of two in [1, 8192]")]
    InvalidResolution { nside: u64 },

    /// Colatitude outside `[0, π]` (or NaN).
    #[error("Invalid colatitude at index {index}: theta {theta} rad outside [0, pi]")]
    InvalidColatitude { index: usize, theta: f64 },

    #[error("Invalid longitude at index {index}: phi {phi} rad is not finite")]
    InvalidLongitude { index: usize, phi: f64 },

    /// Non-finite RA/Dec, or Dec outside `[-90, 90]`.
    #[error("Invalid sky position at index {index}: ra {ra} deg, dec {dec} deg")]
    InvalidPosition { index: usize, ra: f64, dec: f64 },

    #[error("Shape mismatch in {context}: {left} vs {right} elements")]
    ShapeMismatch {
        context: String,
        left: usize,
        right: usize,
    },

    /// Pixel index past the end of the map. Almost always means the
    /// pixelization nside differs from the nside the map was built at.
    #[error("Pixel index {pixel} out of range for map of {len} pixels")]
    IndexOutOfRange { pixel: u64, len: usize },

    /// Lookup resolution differs from the resolution the map was built at.
    #[error("Resolution mismatch: lookup nside {lookup} but map nside {map}")]
    ResolutionMismatch { lookup: u64, map: u64 },

    #[error("Malformed dust map: {message}")]
    MapFormat { message: String },

    #[error("Dust map not found (searched: {})", display_paths(.searched))]
    MapNotFound { searched: Vec<PathBuf> },

    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, DustError>`.
pub type DustResult<T> = Result<T, DustError>;

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl DustError {
    pub fn shape_mismatch(context: &str, left: usize, right: usize) -> Self {
        Self::ShapeMismatch {
            context: context.to_string(),
            left,
            right,
        }
    }

    pub fn map_format(message: impl Into<String>) -> Self {
        Self::MapFormat {
            message: message.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying might succeed. Only I/O failures qualify.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
