//! Equatorial to Galactic conversion.
//!
//! Uses the fixed B1950-style pole (NGP at 12h51.4m, +27°07.7') and Galactic
//! Center right ascension (17h45.6m) the Planck dust maps are indexed with.
//! The closed-form terms are evaluated in a fixed order; reordering them
//! moves points that sit on pixel edges.

use crate::constants::{GC_RA_DEG, NGP_DEC_DEG, NGP_RA_DEG, RAD_TO_DEG};
use crate::errors::{DustError, DustResult};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Below this cos(b) the point sits on a Galactic pole and l is undefined.
const POLE_COS_B: f64 = 1e-12;

/// Equatorial position in degrees. RA is taken modulo 360, Dec must lie in
/// `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkyPosition {
    ra_deg: f64,
    dec_deg: f64,
}

impl SkyPosition {
    pub fn new(ra_deg: f64, dec_deg: f64) -> DustResult<Self> {
        validate_position(0, ra_deg, dec_deg)?;
        Ok(Self { ra_deg, dec_deg })
    }

    pub fn ra_deg(&self) -> f64 {
        self.ra_deg
    }

    pub fn dec_deg(&self) -> f64 {
        self.dec_deg
    }

    pub fn to_galactic(&self) -> GalacticAngles {
        PoleTerms::new().transform(self.ra_deg, self.dec_deg)
    }
}

/// Galactic longitude `l` in `[0, 360)` and latitude `b` in `[-90, 90]`, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GalacticAngles {
    l_deg: f64,
    b_deg: f64,
}

impl GalacticAngles {
    pub fn l_deg(&self) -> f64 {
        self.l_deg
    }

    pub fn b_deg(&self) -> f64 {
        self.b_deg
    }

    /// Spherical angles for pixelization: theta = 90° − b, phi = l.
    pub fn to_colat_lon(&self) -> ColatLon {
        let theta = (90.0 - self.b_deg) / RAD_TO_DEG;
        let phi = self.l_deg / RAD_TO_DEG;
        ColatLon {
            theta_rad: theta.clamp(0.0, PI),
            phi_rad: phi,
        }
    }
}

impl fmt::Display for GalacticAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l={:.6}° b={:+.6}°", self.l_deg, self.b_deg)
    }
}

/// Colatitude (0 at the north pole) and longitude, radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColatLon {
    theta_rad: f64,
    phi_rad: f64,
}

impl ColatLon {
    pub fn new(theta_rad: f64, phi_rad: f64) -> DustResult<Self> {
        if !(0.0..=PI).contains(&theta_rad) {
            return Err(DustError::InvalidColatitude {
                index: 0,
                theta: theta_rad,
            });
        }
        if !phi_rad.is_finite() {
            return Err(DustError::InvalidLongitude {
                index: 0,
                phi: phi_rad,
            });
        }
        Ok(Self { theta_rad, phi_rad })
    }

    pub fn theta_rad(&self) -> f64 {
        self.theta_rad
    }

    pub fn phi_rad(&self) -> f64 {
        self.phi_rad
    }
}

/// Convert RA/Dec arrays (degrees) to Galactic `(l, b)` arrays (degrees).
///
/// # Errors
/// [`DustError::ShapeMismatch`] if the slices differ in length,
/// [`DustError::InvalidPosition`] for the first non-finite coordinate or
/// declination outside `[-90, 90]`. Nothing is computed on error.
pub fn equatorial_to_galactic(ra_deg: &[f64], dec_deg: &[f64]) -> DustResult<(Vec<f64>, Vec<f64>)> {
    let angles = galactic_angles(ra_deg, dec_deg)?;
    Ok(angles.into_iter().map(|g| (g.l_deg, g.b_deg)).unzip())
}

/// Same as [`equatorial_to_galactic`], keeping each `(l, b)` pair together.
pub fn galactic_angles(ra_deg: &[f64], dec_deg: &[f64]) -> DustResult<Vec<GalacticAngles>> {
    if ra_deg.len() != dec_deg.len() {
        return Err(DustError::shape_mismatch(
            "equatorial_to_galactic (ra, dec)",
            ra_deg.len(),
            dec_deg.len(),
        ));
    }
    for (index, (&ra, &dec)) in ra_deg.iter().zip(dec_deg).enumerate() {
        validate_position(index, ra, dec)?;
    }

    let pole = PoleTerms::new();
    Ok(ra_deg
        .par_iter()
        .zip(dec_deg.par_iter())
        .map(|(&ra, &dec)| pole.transform(ra, dec))
        .collect())
}

fn validate_position(index: usize, ra: f64, dec: f64) -> DustResult<()> {
    if ra.is_finite() && dec.is_finite() && (-90.0..=90.0).contains(&dec) {
        return Ok(());
    }
    Err(DustError::InvalidPosition { index, ra, dec })
}

/// Trigonometric terms of the pole and Galactic Center, fixed for every
/// position.
struct PoleTerms {
    rapol: f64,
    sdecpol: f64,
    cdecpol: f64,
    /// Galactic longitude of the equatorial north pole direction, degrees.
    q_deg: f64,
}

impl PoleTerms {
    fn new() -> Self {
        let rapol = NGP_RA_DEG / RAD_TO_DEG;
        let decpol = NGP_DEC_DEG / RAD_TO_DEG;
        let racen = GC_RA_DEG / RAD_TO_DEG;
        let (sdecpol, cdecpol) = (libm::sin(decpol), libm::cos(decpol));

        // Declination of the Galactic Center, about -28.93°.
        let deccen = libm::atan(-libm::cos(racen - rapol) / libm::tan(decpol));
        let q_deg = libm::acos(libm::sin(deccen) / cdecpol) * RAD_TO_DEG;

        Self {
            rapol,
            sdecpol,
            cdecpol,
            q_deg,
        }
    }

    fn transform(&self, ra_deg: f64, dec_deg: f64) -> GalacticAngles {
        let ras = ra_deg / RAD_TO_DEG;
        let decs = dec_deg / RAD_TO_DEG;
        let (sdecs, cdecs) = (libm::sin(decs), libm::cos(decs));
        let dra = ras - self.rapol;
        let cos_dra = libm::cos(dra);

        let b1 = sdecs * self.sdecpol + cdecs * self.cdecpol * cos_dra;
        let b_deg = (libm::asin(b1.clamp(-1.0, 1.0)) * RAD_TO_DEG).clamp(-90.0, 90.0);
        let cb = libm::cos(b_deg / RAD_TO_DEG);
        if cb < POLE_COS_B {
            return GalacticAngles { l_deg: 0.0, b_deg };
        }

        let j = ((sdecs * self.cdecpol - cdecs * self.sdecpol * cos_dra) / cb) * RAD_TO_DEG;
        let k = libm::asin(((cdecs * libm::sin(dra)) / cb).clamp(-1.0, 1.0)) * RAD_TO_DEG;

        let mut l_deg = if j < 0.0 {
            self.q_deg + k - 180.0
        } else {
            self.q_deg - k
        };
        if l_deg < 0.0 {
            l_deg += 360.0;
        }
        if l_deg >= 360.0 {
            l_deg -= 360.0;
        }
        GalacticAngles { l_deg, b_deg }
    }
}
