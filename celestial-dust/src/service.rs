//! E(B-V) lookup for equatorial positions.
//!
//! [`DustLookup`] chains the three stages:
//!
//! ```text
//! (ra, dec) ──galactic──▶ (l, b) ──▶ (θ = 90° − b, φ = l) ──ang2pix_nest──▶ pixel ──map──▶ E(B-V)
//! ```
//!
//! Each stage validates its whole batch before computing, so a bad position
//! fails the call without producing partial output.

use crate::errors::{DustError, DustResult};
use crate::galactic::{galactic_angles, SkyPosition};
use crate::healpix::{ang2pix_nest, ang2pix_nest_one, BitTables, Nside};
use crate::map::ExtinctionMap;

/// Owns an extinction map and the tables needed to index it.
///
/// Shareable across threads; every method takes `&self`.
#[derive(Debug, Clone)]
pub struct DustLookup {
    tables: BitTables,
    map: ExtinctionMap,
    nside: Nside,
}

impl DustLookup {
    /// Looks positions up at the map's own resolution.
    pub fn new(map: ExtinctionMap) -> Self {
        Self {
            tables: BitTables::new(),
            nside: map.nside(),
            map,
        }
    }

    /// Looks positions up at `nside`, which must be the map's resolution.
    ///
    /// # Errors
    /// [`ResolutionMismatch`](DustError::ResolutionMismatch) if `nside`
    /// differs from [`ExtinctionMap::nside`].
    pub fn with_resolution(map: ExtinctionMap, nside: Nside) -> DustResult<Self> {
        check_resolution(&map, nside)?;
        Ok(Self::new(map))
    }

    pub fn nside(&self) -> Nside {
        self.nside
    }

    pub fn map(&self) -> &ExtinctionMap {
        &self.map
    }

    /// NESTED pixel of each position at the lookup resolution.
    pub fn pixels(&self, ra_deg: &[f64], dec_deg: &[f64]) -> DustResult<Vec<u64>> {
        position_pixels(&self.tables, self.nside, ra_deg, dec_deg)
    }

    /// E(B-V) for each position, in input order.
    ///
    /// # Errors
    /// [`ShapeMismatch`](DustError::ShapeMismatch) if the slices differ
    /// in length, [`InvalidPosition`](DustError::InvalidPosition) for a
    /// bad coordinate.
    pub fn ebv(&self, ra_deg: &[f64], dec_deg: &[f64]) -> DustResult<Vec<f64>> {
        let pixels = self.pixels(ra_deg, dec_deg)?;
        let values = self.map.lookup(&pixels)?;
        tracing::debug!(count = values.len(), nside = %self.nside, "E(B-V) lookup");
        Ok(values)
    }

    pub fn ebv_one(&self, position: &SkyPosition) -> DustResult<f64> {
        let colat = position.to_galactic().to_colat_lon();
        let pixel = ang2pix_nest_one(&self.tables, self.nside, colat.theta_rad(), colat.phi_rad())?;
        self.map.value(pixel)
    }
}

/// One-shot form of [`DustLookup::ebv`] for callers that hold the map
/// themselves.
pub fn ebv(ra_deg: &[f64], dec_deg: &[f64], map: &ExtinctionMap, nside: Nside) -> DustResult<Vec<f64>> {
    check_resolution(map, nside)?;
    let pixels = position_pixels(&BitTables::new(), nside, ra_deg, dec_deg)?;
    map.lookup(&pixels)
}

fn check_resolution(map: &ExtinctionMap, nside: Nside) -> DustResult<()> {
    if nside != map.nside() {
        return Err(DustError::ResolutionMismatch {
            lookup: nside.get(),
            map: map.nside().get(),
        });
    }
    Ok(())
}

fn position_pixels(
    tables: &BitTables,
    nside: Nside,
    ra_deg: &[f64],
    dec_deg: &[f64],
) -> DustResult<Vec<u64>> {
    let (theta, phi): (Vec<f64>, Vec<f64>) = galactic_angles(ra_deg, dec_deg)?
        .iter()
        .map(|g| {
            let c = g.to_colat_lon();
            (c.theta_rad(), c.phi_rad())
        })
        .unzip();
    ang2pix_nest(tables, nside, &theta, &phi)
}
