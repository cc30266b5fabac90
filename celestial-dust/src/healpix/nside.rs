use crate::constants::{DEFAULT_MAP_NSIDE, NS_MAX, NS_MAX_ORDER};
use crate::errors::{DustError, DustResult};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Validated HEALPix resolution: a power of two in `[1, NS_MAX]`.
///
/// Holding an `Nside` means the value has already been checked, so the
/// pixelizer never has to re-validate it per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u64", into = "u64"))]
pub struct Nside(u32);

impl Nside {
    pub fn new(nside: u64) -> DustResult<Self> {
        if nside == 0 || nside > NS_MAX || !nside.is_power_of_two() {
            return Err(DustError::InvalidResolution { nside });
        }
        Ok(Self(nside as u32))
    }

    /// Builds the resolution for `order`, i.e. nside = 2^order.
    pub fn from_order(order: u32) -> DustResult<Self> {
        if order > NS_MAX_ORDER {
            return Err(DustError::InvalidResolution {
                nside: 1u64.checked_shl(order).unwrap_or(u64::MAX),
            });
        }
        Ok(Self(1 << order))
    }

    /// Recovers the resolution of a full-sky map from its pixel count.
    pub fn from_npix(npix: u64) -> DustResult<Self> {
        if npix == 0 || npix % 12 != 0 {
            return Err(DustError::map_format(format!(
                "{} pixels is not 12 * nside^2",
                npix
            )));
        }
        let face_pixels = npix / 12;
        let nside = (face_pixels as f64).sqrt().round() as u64;
        if nside * nside != face_pixels {
            return Err(DustError::map_format(format!(
                "{} pixels is not 12 * nside^2",
                npix
            )));
        }
        Self::new(nside)
    }

    pub fn get(self) -> u64 {
        self.0 as u64
    }

    pub fn order(self) -> u32 {
        self.0.trailing_zeros()
    }

    /// Pixels per base face, nside².
    pub fn face_pixels(self) -> u64 {
        self.get() * self.get()
    }

    /// Pixels on the whole sphere, 12·nside².
    pub fn npix(self) -> u64 {
        12 * self.face_pixels()
    }
}

/// The Planck map resolution, 2048.
impl Default for Nside {
    fn default() -> Self {
        Self(DEFAULT_MAP_NSIDE)
    }
}

impl TryFrom<u64> for Nside {
    type Error = DustError;

    fn try_from(value: u64) -> DustResult<Self> {
        Self::new(value)
    }
}

impl From<Nside> for u64 {
    fn from(nside: Nside) -> u64 {
        nside.get()
    }
}

impl fmt::Display for Nside {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
