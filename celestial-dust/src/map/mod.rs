//! Full-sky scalar maps in NESTED order.
//!
//! An [`ExtinctionMap`] is a flat array of `12·nside²` samples where element
//! `i` is the value of NESTED pixel `i`. Maps are built once (from a file via
//! [`fits::read_fits_map`], or in memory) and only ever read afterwards.

pub mod fits;

use crate::errors::{DustError, DustResult};
use crate::healpix::Nside;
use rayon::prelude::*;
use std::fmt;

pub use fits::read_fits_map;

/// Sample storage at the precision the map was produced in.
#[derive(Debug, Clone, PartialEq)]
pub enum MapData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl MapData {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Self::F32(v) => v.get(index).map(|&x| x as f64),
            Self::F64(v) => v.get(index).copied(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtinctionMap {
    nside: Nside,
    data: MapData,
}

impl ExtinctionMap {
    /// Wraps NESTED-ordered samples. The length must be exactly `12·nside²`.
    pub fn new(nside: Nside, data: MapData) -> DustResult<Self> {
        let npix = nside.npix();
        if data.len() as u64 != npix {
            return Err(DustError::map_format(format!(
                "nside {} needs {} pixels, got {}",
                nside,
                npix,
                data.len()
            )));
        }
        Ok(Self { nside, data })
    }

    pub fn from_f64(nside: Nside, values: Vec<f64>) -> DustResult<Self> {
        Self::new(nside, MapData::F64(values))
    }

    pub fn from_f32(nside: Nside, values: Vec<f32>) -> DustResult<Self> {
        Self::new(nside, MapData::F32(values))
    }

    /// Builds a map by evaluating `f` for every pixel index.
    pub fn from_fn(nside: Nside, f: impl Fn(u64) -> f64 + Sync) -> Self {
        let values = (0..nside.npix() as usize)
            .into_par_iter()
            .map(|i| f(i as u64))
            .collect();
        Self {
            nside,
            data: MapData::F64(values),
        }
    }

    pub fn nside(&self) -> Nside {
        self.nside
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &MapData {
        &self.data
    }

    /// Value of a single pixel.
    pub fn value(&self, pixel: u64) -> DustResult<f64> {
        usize::try_from(pixel)
            .ok()
            .and_then(|i| self.data.get(i))
            .ok_or(DustError::IndexOutOfRange {
                pixel,
                len: self.data.len(),
            })
    }

    /// Values for a batch of pixel indices, in order.
    ///
    /// # Errors
    /// [`DustError::IndexOutOfRange`] for the first index past the end of the
    /// map; no partial output is returned.
    pub fn lookup(&self, pixels: &[u64]) -> DustResult<Vec<f64>> {
        let len = self.data.len() as u64;
        if let Some(&pixel) = pixels.iter().find(|&&p| p >= len) {
            return Err(DustError::IndexOutOfRange {
                pixel,
                len: self.data.len(),
            });
        }
        pixels.par_iter().map(|&p| self.value(p)).collect()
    }
}

impl fmt::Display for ExtinctionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NESTED map nside={} npix={} ({})",
            self.nside,
            self.data.len(),
            self.data.type_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nside(n: u64) -> Nside {
        Nside::new(n).unwrap()
    }

    #[test]
    fn test_new_checks_length() {
        assert!(ExtinctionMap::from_f64(nside(1), vec![0.0; 12]).is_ok());
        let err = ExtinctionMap::from_f64(nside(2), vec![0.0; 12]).unwrap_err();
        assert!(matches!(err, DustError::MapFormat { .. }));
        assert!(err.to_string().contains("needs 48 pixels, got 12"));
    }

    #[test]
    fn test_lookup_returns_values_in_order() {
        let map = ExtinctionMap::from_fn(nside(2), |i| i as f64 * 0.5);
        let values = map.lookup(&[0, 47, 3, 3, 10]).unwrap();
        assert_eq!(values, vec![0.0, 23.5, 1.5, 1.5, 5.0]);
    }

    #[test]
    fn test_lookup_f32_widens() {
        let map = ExtinctionMap::from_f32(nside(1), (0..12).map(|i| i as f32 / 4.0).collect())
            .unwrap();
        assert_eq!(map.lookup(&[1, 11]).unwrap(), vec![0.25, 2.75]);
        assert_eq!(map.value(6).unwrap(), 1.5);
    }

    #[test]
    fn test_lookup_out_of_range() {
        let map = ExtinctionMap::from_fn(nside(1), |_| 1.0);
        let result = map.lookup(&[0, 11, 12, 5]);
        assert!(matches!(
            result,
            Err(DustError::IndexOutOfRange { pixel: 12, len: 12 })
        ));
        assert!(map.value(u64::MAX).is_err());
    }

    #[test]
    fn test_empty_lookup() {
        let map = ExtinctionMap::from_fn(nside(1), |_| 1.0);
        assert!(map.lookup(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_display() {
        let map = ExtinctionMap::from_f32(nside(1), vec![0.0; 12]).unwrap();
        assert_eq!(map.to_string(), "NESTED map nside=1 npix=12 (f32)");
    }
}
