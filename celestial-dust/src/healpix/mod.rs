//! HEALPix NESTED pixelization.
//!
//! - [`nside`]: validated resolution parameter
//! - [`tables`]: 7-bit Morton interleave tables
//! - [`nested`]: colatitude/longitude to NESTED pixel index

pub mod nested;
pub mod nside;
pub mod tables;

pub use nested::{ang2pix_nest, ang2pix_nest_one};
pub use nside::Nside;
pub use tables::BitTables;
