/// Finest HEALPix resolution handled by the nested pixelizer (2^13).
pub const NS_MAX: u64 = 8192;

/// Bits per face coordinate at [`NS_MAX`].
pub const NS_MAX_ORDER: u32 = 13;

/// Entries in each bit-interleave table (7-bit coordinates).
pub const BIT_TABLE_SIZE: usize = 128;

/// Resolution of the Planck E(B-V) map.
pub const DEFAULT_MAP_NSIDE: u32 = 2048;

/// Auxiliary file name searched for when no map path is configured.
pub const DEFAULT_MAP_FILENAME: &str = "PlanckEvb.fits";

/// Column appended to catalogs by default.
pub const DEFAULT_EBV_COLUMN: &str = "GAL_EBV";

/// Right ascension of the North Galactic Pole, degrees (12h51.4m).
pub const NGP_RA_DEG: f64 = (12.0 + 51.4 / 60.0) * 15.0;

/// Declination of the North Galactic Pole, degrees.
pub const NGP_DEC_DEG: f64 = 27.0 + 77.0 / 600.0;

/// Right ascension of the Galactic Center, degrees (17h45.6m).
pub const GC_RA_DEG: f64 = (17.0 + 45.6 / 60.0) * 15.0;

pub const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

/// z = cos(theta) above which a point lies in a polar cap.
pub const POLAR_CAP_Z: f64 = 2.0 / 3.0;
