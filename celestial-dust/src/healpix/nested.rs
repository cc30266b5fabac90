//! Angle to NESTED pixel conversion.
//!
//! Positions are first located on the finest grid (`NS_MAX` = 8192 cells per
//! face edge) and the resulting Morton code is then coarsened to the requested
//! resolution by integer division. The truncation order is part of the
//! contract: indices must agree bit for bit with those used to build the
//! Planck extinction maps, and moving a division shifts edge points into a
//! neighbouring pixel.

use super::nside::Nside;
use super::tables::BitTables;
use crate::constants::{NS_MAX, POLAR_CAP_Z};
use crate::errors::{DustError, DustResult};
use rayon::prelude::*;
use std::f64::consts::{PI, TAU};

const NS_MAX_I: i64 = NS_MAX as i64;
const NS_MAX_F: f64 = NS_MAX as f64;

/// Low 7 bits of a face coordinate go through the tables directly.
const LOW_BITS: u64 = 7;
const LOW_MASK: u64 = (1 << LOW_BITS) - 1;

/// Width of the interleaved low part (2 × 7 bits).
const LOW_SPAN: u64 = 1 << (2 * LOW_BITS);

/// Convert colatitude/longitude arrays to NESTED pixel indices.
///
/// # Arguments
/// * `tables` - Bit-interleave tables
/// * `nside` - Output resolution
/// * `theta` - Colatitudes in radians, each in `[0, π]`
/// * `phi` - Longitudes in radians, any finite value (wrapped mod 2π)
///
/// # Errors
/// [`DustError::ShapeMismatch`] if the slices differ in length,
/// [`DustError::InvalidColatitude`] / [`DustError::InvalidLongitude`] for
/// the first bad element. Validation runs over the whole batch before any
/// pixel is computed, so a failed call produces nothing.
pub fn ang2pix_nest(
    tables: &BitTables,
    nside: Nside,
    theta: &[f64],
    phi: &[f64],
) -> DustResult<Vec<u64>> {
    if theta.len() != phi.len() {
        return Err(DustError::shape_mismatch(
            "ang2pix_nest (theta, phi)",
            theta.len(),
            phi.len(),
        ));
    }
    for (index, (&t, &p)) in theta.iter().zip(phi).enumerate() {
        validate_angles(index, t, p)?;
    }

    tracing::debug!(count = theta.len(), %nside, "pixelizing batch");

    Ok(theta
        .par_iter()
        .zip(phi.par_iter())
        .map(|(&t, &p)| pixelize(tables, nside, t, p))
        .collect())
}

/// Single-position form of [`ang2pix_nest`].
pub fn ang2pix_nest_one(tables: &BitTables, nside: Nside, theta: f64, phi: f64) -> DustResult<u64> {
    validate_angles(0, theta, phi)?;
    Ok(pixelize(tables, nside, theta, phi))
}

fn validate_angles(index: usize, theta: f64, phi: f64) -> DustResult<()> {
    if !(0.0..=PI).contains(&theta) {
        return Err(DustError::InvalidColatitude { index, theta });
    }
    if !phi.is_finite() {
        return Err(DustError::InvalidLongitude { index, phi });
    }
    Ok(())
}

/// Pixel index for already-validated angles.
pub(crate) fn pixelize(tables: &BitTables, nside: Nside, theta: f64, phi: f64) -> u64 {
    let z = libm::cos(theta);
    let tt = phi_to_tt(phi);
    let (face, ix, iy) = compute_face_and_position(tt, z);

    let raw = xy2pix_nest(tables, ix, iy);
    let scale = NS_MAX / nside.get();
    let pixel_in_face = raw / (scale * scale);
    pixel_in_face + face * nside.face_pixels()
}

/// Longitude in quarter turns, `[0, 4]`.
///
/// The upper bound is reachable: a tiny negative phi wraps to exactly 2π
/// after rounding. The face arithmetic below tolerates it.
fn phi_to_tt(phi: f64) -> f64 {
    let phi_norm = phi.rem_euclid(TAU);
    phi_norm / (0.5 * PI)
}

/// Base face (0-11) and position `(ix, iy)` on the `NS_MAX` grid of that face.
fn compute_face_and_position(tt: f64, z: f64) -> (u64, u64, u64) {
    // Equality at z = -2/3 belongs to the south cap.
    if z <= POLAR_CAP_Z && z > -POLAR_CAP_Z {
        compute_equatorial_face(tt, z)
    } else {
        compute_polar_face(tt, z)
    }
}

/// Equatorial belt. Edge-line indices grow with longitude.
fn compute_equatorial_face(tt: f64, z: f64) -> (u64, u64, u64) {
    let jp = (NS_MAX_F * (0.5 + tt - z * 0.75)) as i64; // ascending edge line
    let jm = (NS_MAX_F * (0.5 + tt + z * 0.75)) as i64; // descending edge line

    let ifp = jp / NS_MAX_I;
    let ifm = jm / NS_MAX_I;
    let face = equatorial_face_number(ifp, ifm);

    let ix = jm % NS_MAX_I;
    let iy = NS_MAX_I - (jp % NS_MAX_I) - 1;
    (face, ix as u64, iy as u64)
}

fn equatorial_face_number(ifp: i64, ifm: i64) -> u64 {
    let face = match ifp.cmp(&ifm) {
        std::cmp::Ordering::Equal => ifp % 4 + 4,
        std::cmp::Ordering::Less => ifp % 4,
        std::cmp::Ordering::Greater => ifm % 4 + 8,
    };
    face as u64
}

/// Polar caps. Edge-line indices grow with distance from the nearer pole.
fn compute_polar_face(tt: f64, z: f64) -> (u64, u64, u64) {
    let ntt = (tt as i64).min(3);
    let tp = tt - ntt as f64;
    let tmp = libm::sqrt(3.0 * (1.0 - libm::fabs(z)));

    // Clamped for points right on the cap boundary.
    let jp = ((NS_MAX_F * tp * tmp) as i64).min(NS_MAX_I - 1);
    let jm = ((NS_MAX_F * (1.0 - tp) * tmp) as i64).min(NS_MAX_I - 1);

    if z > 0.0 {
        let ix = NS_MAX_I - jm - 1;
        let iy = NS_MAX_I - jp - 1;
        (ntt as u64, ix as u64, iy as u64)
    } else {
        (ntt as u64 + 8, jp as u64, jm as u64)
    }
}

/// Morton code of a position on the `NS_MAX` grid, built from the 7-bit
/// tables: low halves fill the bottom 14 bits, high halves the next 12.
fn xy2pix_nest(tables: &BitTables, ix: u64, iy: u64) -> u64 {
    let ix_low = (ix & LOW_MASK) as usize;
    let iy_low = (iy & LOW_MASK) as usize;
    let ix_high = (ix >> LOW_BITS) as usize;
    let iy_high = (iy >> LOW_BITS) as usize;

    tables.interleave(ix_high, iy_high) * LOW_SPAN + tables.interleave(ix_low, iy_low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const TABLES: BitTables = BitTables::new();

    fn nside(n: u64) -> Nside {
        Nside::new(n).unwrap()
    }

    /// Bit-by-bit interleave, independent of the tables.
    fn morton_reference(ix: u64, iy: u64) -> u64 {
        let mut result = 0;
        for i in 0..13 {
            result |= ((ix >> i) & 1) << (2 * i);
            result |= ((iy >> i) & 1) << (2 * i + 1);
        }
        result
    }

    #[test]
    fn test_reference_vectors_nside_2048() {
        let theta_deg: [f64; 29] = [
            0.0, 180.0, 20.0, 40.0, 60.0, 80.0, 90.0, 110.0, 130.0, 150.0, 170.0, 20.0, 40.0,
            60.0, 80.0, 90.0, 110.0, 130.0, 150.0, 170.0, 20.0, 40.0, 60.0, 80.0, 90.0, 110.0,
            130.0, 150.0, 170.0,
        ];
        // Longitudes are raw radian values (30 rad, 90 rad, 360 rad), not degrees.
        let phi: [f64; 29] = [
            0.0, 0.0, 30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 90.0, 90.0, 90.0,
            90.0, 90.0, 90.0, 90.0, 90.0, 90.0, 360.0, 360.0, 360.0, 360.0, 360.0, 360.0, 360.0,
            360.0, 360.0,
        ];
        let expected: [u64; 29] = [
            4194303, 33554432, 16440540, 15431481, 33380969, 32600336, 31087209, 29773264,
            48920284, 48284168, 46302413, 7990252, 7147573, 6396249, 22912224, 22452569,
            41587488, 40296492, 38519304, 37898763, 8072512, 7135286, 6460821, 22987275,
            22648213, 21315275, 40487399, 39869553, 37894434,
        ];
        let theta: Vec<f64> = theta_deg.iter().map(|d| d * PI / 180.0).collect();

        let pixels = ang2pix_nest(&TABLES, nside(2048), &theta, &phi).unwrap();

        assert_eq!(pixels.len(), expected.len());
        for (i, (&got, &want)) in pixels.iter().zip(expected.iter()).enumerate() {
            assert_eq!(got, want, "element {} (theta {}°, phi {})", i, theta_deg[i], phi[i]);
        }
    }

    #[test]
    fn test_poles() {
        for order in 0..=13 {
            let ns = nside(1 << order);
            let north = ang2pix_nest_one(&TABLES, ns, 0.0, 0.0).unwrap();
            let south = ang2pix_nest_one(&TABLES, ns, PI, 0.0).unwrap();
            // North pole is the last pixel of face 0, south pole the first of face 8.
            assert_eq!(north, ns.face_pixels() - 1);
            assert_eq!(south, 8 * ns.face_pixels());
        }
    }

    #[test]
    fn test_nside_1_returns_face_number() {
        let ns = nside(1);
        let cases = [
            (0.1, FRAC_PI_2 * 0.5, 0),
            (0.1, FRAC_PI_2 * 1.5, 1),
            (0.1, FRAC_PI_2 * 2.5, 2),
            (0.1, FRAC_PI_2 * 3.5, 3),
            (FRAC_PI_2, 0.1, 4),
            (FRAC_PI_2, FRAC_PI_2 + 0.1, 5),
            (FRAC_PI_2, PI + 0.1, 6),
            (FRAC_PI_2, 3.0 * FRAC_PI_2 + 0.1, 7),
            (PI - 0.1, FRAC_PI_2 * 0.5, 8),
            (PI - 0.1, FRAC_PI_2 * 1.5, 9),
            (PI - 0.1, FRAC_PI_2 * 2.5, 10),
            (PI - 0.1, FRAC_PI_2 * 3.5, 11),
        ];
        for (theta, phi, face) in cases {
            let pixel = ang2pix_nest_one(&TABLES, ns, theta, phi).unwrap();
            assert_eq!(pixel, face, "theta {}, phi {}", theta, phi);
        }
    }

    #[test]
    fn test_range_invariant_all_resolutions() {
        let phis = [
            -1.0e3, -TAU, -1.0e-20, 0.0, 0.3, FRAC_PI_2, PI, 4.0, TAU, 30.0, 1.0e6,
        ];
        for order in 0..=13 {
            let ns = nside(1 << order);
            let npix = ns.npix();
            for step in 0..=180 {
                let theta = step as f64 * PI / 180.0;
                for &phi in &phis {
                    let pixel = ang2pix_nest_one(&TABLES, ns, theta, phi).unwrap();
                    assert!(
                        pixel < npix,
                        "pixel {} >= npix {} for nside {}, theta {}, phi {}",
                        pixel,
                        npix,
                        ns,
                        theta,
                        phi
                    );
                }
            }
        }
    }

    #[test]
    fn test_cap_boundary_and_wrapped_longitude() {
        let ns = nside(2048);
        let boundary = libm::acos(POLAR_CAP_Z);
        for theta in [boundary, PI - boundary] {
            for phi in [0.0, -1.0e-20, TAU, 2.0 * TAU] {
                let pixel = ang2pix_nest_one(&TABLES, ns, theta, phi).unwrap();
                assert!(pixel < ns.npix());
            }
        }
    }

    #[test]
    fn test_coarsening_is_hierarchical() {
        for step in 1..60 {
            let theta = step as f64 * PI / 60.0 - 0.013;
            let phi = step as f64 * 0.37;
            for order in 1..=13 {
                let fine = ang2pix_nest_one(&TABLES, nside(1 << order), theta, phi).unwrap();
                let coarse =
                    ang2pix_nest_one(&TABLES, nside(1 << (order - 1)), theta, phi).unwrap();
                assert_eq!(fine / 4, coarse, "order {} theta {} phi {}", order, theta, phi);
            }
        }
    }

    #[test]
    fn test_longitude_periodicity() {
        let ns = nside(256);
        for step in 0..50 {
            let theta = 0.05 + step as f64 * 0.06;
            let phi = 0.123 + step as f64 * 0.1;
            let base = ang2pix_nest_one(&TABLES, ns, theta, phi).unwrap();
            let wrapped = ang2pix_nest_one(&TABLES, ns, theta, phi - TAU).unwrap();
            assert_eq!(base, wrapped);
        }
    }

    #[test]
    fn test_deterministic() {
        let theta: Vec<f64> = (0..500).map(|i| i as f64 * PI / 499.0).collect();
        let phi: Vec<f64> = (0..500).map(|i| i as f64 * 0.731 - 50.0).collect();
        let first = ang2pix_nest(&TABLES, nside(2048), &theta, &phi).unwrap();
        let second = ang2pix_nest(&TABLES, nside(2048), &theta, &phi).unwrap();
        assert_eq!(first, second);

        let scalar: Vec<u64> = theta
            .iter()
            .zip(&phi)
            .map(|(&t, &p)| ang2pix_nest_one(&TABLES, nside(2048), t, p).unwrap())
            .collect();
        assert_eq!(first, scalar);
    }

    #[test]
    fn test_shape_mismatch() {
        let result = ang2pix_nest(&TABLES, nside(64), &[0.1, 0.2], &[0.0]);
        assert!(matches!(
            result,
            Err(DustError::ShapeMismatch { left: 2, right: 1, .. })
        ));
    }

    #[test]
    fn test_colatitude_out_of_range_rejects_whole_batch() {
        let theta = [0.1, PI + 1e-9, 0.3];
        let phi = [0.0, 0.0, 0.0];
        let result = ang2pix_nest(&TABLES, nside(64), &theta, &phi);
        assert!(matches!(
            result,
            Err(DustError::InvalidColatitude { index: 1, .. })
        ));

        assert!(ang2pix_nest_one(&TABLES, nside(64), -1e-12, 0.0).is_err());
        assert!(ang2pix_nest_one(&TABLES, nside(64), f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_non_finite_longitude_rejected() {
        for phi in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = ang2pix_nest_one(&TABLES, nside(64), 1.0, phi);
            assert!(matches!(result, Err(DustError::InvalidLongitude { .. })));
        }
    }

    #[test]
    fn test_empty_batch() {
        let pixels = ang2pix_nest(&TABLES, nside(2048), &[], &[]).unwrap();
        assert!(pixels.is_empty());
    }

    #[test]
    fn test_xy2pix_matches_bitwise_interleave() {
        let samples = [0u64, 1, 2, 127, 128, 129, 1000, 4095, 4096, 8000, 8191];
        for &ix in &samples {
            for &iy in &samples {
                assert_eq!(
                    xy2pix_nest(&TABLES, ix, iy),
                    morton_reference(ix, iy),
                    "ix {} iy {}",
                    ix,
                    iy
                );
            }
        }
    }

    #[test]
    fn test_equatorial_face_number() {
        assert_eq!(equatorial_face_number(0, 0), 4);
        assert_eq!(equatorial_face_number(3, 3), 7);
        assert_eq!(equatorial_face_number(4, 4), 4);
        assert_eq!(equatorial_face_number(1, 2), 1);
        assert_eq!(equatorial_face_number(4, 5), 0);
        assert_eq!(equatorial_face_number(2, 1), 9);
        assert_eq!(equatorial_face_number(5, 4), 8);
    }
}
