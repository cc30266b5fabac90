//! Galactic E(B-V) reddening from a full-sky HEALPix dust map.
//!
//! Given equatorial positions, converts them to Galactic coordinates,
//! finds the NESTED HEALPix pixel each one falls in and reads the extinction
//! value stored for that pixel. Pixel indices reproduce those the Planck
//! E(B-V) map was built with bit for bit, so the same position always hits
//! the same map cell.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`galactic`] | RA/Dec to Galactic (l, b): [`equatorial_to_galactic`], [`SkyPosition`], [`GalacticAngles`] |
//! | [`healpix`] | [`Nside`], [`BitTables`], [`ang2pix_nest`] |
//! | [`map`] | [`ExtinctionMap`] storage and pixel lookup, FITS loading ([`read_fits_map`]) |
//! | [`service`] | [`DustLookup`] and [`ebv`]: positions in, E(B-V) out |
//! | [`config`] | [`DustConfig`], dust map discovery |
//! | [`catalog`] | CSV [`Catalog`] read/append/write |
//! | [`errors`] | [`DustError`], [`DustResult`] |
//!
//! # Quick Start
//!
//! ```ignore
//! use celestial_dust::{read_fits_map, DustLookup};
//!
//! let map = read_fits_map("PlanckEvb.fits")?;
//! let lookup = DustLookup::new(map);
//!
//! let ebv = lookup.ebv(&[83.633, 201.365], &[-5.375, -43.019])?;
//! ```
//!
//! # Features
//!
//! - **`serde`**: `Serialize`/`Deserialize` for [`Nside`], [`DustConfig`] and
//!   the coordinate types.
//! - **`cli`**: builds the `add-gal-dust` binary, which appends a `GAL_EBV`
//!   column to a CSV catalog.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod errors;
pub mod galactic;
pub mod healpix;
pub mod map;
pub mod service;

pub use catalog::Catalog;
pub use config::DustConfig;
pub use errors::{DustError, DustResult};
pub use galactic::{equatorial_to_galactic, ColatLon, GalacticAngles, SkyPosition};
pub use healpix::{ang2pix_nest, ang2pix_nest_one, BitTables, Nside};
pub use map::{read_fits_map, ExtinctionMap, MapData};
pub use service::{ebv, DustLookup};
