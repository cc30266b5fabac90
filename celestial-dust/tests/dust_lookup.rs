use celestial_dust::constants::RAD_TO_DEG;
use celestial_dust::map::fits::write_fits_map;
use celestial_dust::{
    ang2pix_nest, ebv, equatorial_to_galactic, read_fits_map, BitTables, Catalog, DustConfig,
    DustError, DustLookup, ExtinctionMap, Nside, SkyPosition,
};
use std::io::Cursor;
use tempfile::TempDir;

fn grid() -> (Vec<f64>, Vec<f64>) {
    let mut ra = Vec::new();
    let mut dec = Vec::new();
    for i in 0..36 {
        for j in 0..=18 {
            ra.push(i as f64 * 10.0 + 0.37);
            dec.push(j as f64 * 10.0 - 90.0);
        }
    }
    (ra, dec)
}

fn expected_pixels(ra: &[f64], dec: &[f64], nside: Nside) -> Vec<u64> {
    let (l, b) = equatorial_to_galactic(ra, dec).unwrap();
    let theta: Vec<f64> = b
        .iter()
        .map(|b| ((90.0 - b) / RAD_TO_DEG).clamp(0.0, std::f64::consts::PI))
        .collect();
    let phi: Vec<f64> = l.iter().map(|l| l / RAD_TO_DEG).collect();
    ang2pix_nest(&BitTables::new(), nside, &theta, &phi).unwrap()
}

#[test]
fn test_index_map_end_to_end() {
    let nside = Nside::new(512).unwrap();
    let map = ExtinctionMap::from_fn(nside, |i| i as f64);
    let (ra, dec) = grid();

    let values = ebv(&ra, &dec, &map, nside).unwrap();
    let pixels = expected_pixels(&ra, &dec, nside);

    assert_eq!(values.len(), ra.len());
    for (i, (&v, &p)) in values.iter().zip(&pixels).enumerate() {
        assert_eq!(v, p as f64, "position {} (ra {}, dec {})", i, ra[i], dec[i]);
    }
}

#[test]
fn test_output_follows_input_order() {
    let nside = Nside::new(256).unwrap();
    let lookup = DustLookup::new(ExtinctionMap::from_fn(nside, |i| i as f64));
    let (mut ra, mut dec) = grid();
    let forward = lookup.ebv(&ra, &dec).unwrap();

    ra.reverse();
    dec.reverse();
    let mut backward = lookup.ebv(&ra, &dec).unwrap();
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn test_fits_round_trip_lookup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("PlanckEvb.fits");
    let nside = Nside::new(32).unwrap();
    let map = ExtinctionMap::from_f32(
        nside,
        (0..nside.npix()).map(|i| (i % 97) as f32 * 0.01).collect(),
    )
    .unwrap();
    write_fits_map(&path, &map).unwrap();

    let config = DustConfig::default();
    let aux = dir.path().display().to_string();
    let resolved = config
        .resolve_map_path_with(|key| (key == "CELESTIAL_DUST_AUX_PATH").then(|| aux.clone()))
        .unwrap();
    assert_eq!(resolved, path);

    let loaded = read_fits_map(&resolved).unwrap();
    assert_eq!(loaded.nside(), nside);

    let (ra, dec) = grid();
    let from_file = DustLookup::new(loaded).ebv(&ra, &dec).unwrap();
    let in_memory = DustLookup::new(map).ebv(&ra, &dec).unwrap();
    assert_eq!(from_file, in_memory);
}

#[test]
fn test_catalog_augmentation() {
    let input = "\
# sample
ID,RA,DEC
a,83.822,-5.391
b,266.405,-28.936
c,192.859,27.128
";
    let nside = Nside::new(64).unwrap();
    let lookup = DustLookup::new(ExtinctionMap::from_fn(nside, |i| i as f64));

    let mut catalog = Catalog::read(Cursor::new(input)).unwrap();
    let ra = catalog.column_f64("RA").unwrap();
    let dec = catalog.column_f64("DEC").unwrap();
    let values = lookup.ebv(&ra, &dec).unwrap();
    catalog.push_column("GAL_EBV", &values).unwrap();

    let mut out = Vec::new();
    catalog.write(&mut out).unwrap();
    let reread = Catalog::read(Cursor::new(out)).unwrap();
    assert_eq!(reread.columns(), ["ID", "RA", "DEC", "GAL_EBV"]);
    assert_eq!(reread.comments(), ["# sample"]);

    let pixels = expected_pixels(&ra, &dec, nside);
    let written = reread.column_f64("GAL_EBV").unwrap();
    assert_eq!(written, pixels.iter().map(|&p| p as f64).collect::<Vec<_>>());
}

#[test]
fn test_scalar_api() {
    let nside = Nside::new(16).unwrap();
    let lookup = DustLookup::new(ExtinctionMap::from_fn(nside, |i| i as f64));
    let position = SkyPosition::new(266.405, -28.936).unwrap();
    let galactic = position.to_galactic();
    assert!(galactic.b_deg().abs() < 0.1);
    assert!(galactic.l_deg() < 0.1 || galactic.l_deg() > 359.9);

    let value = lookup.ebv_one(&position).unwrap();
    assert_eq!(value, lookup.ebv(&[266.405], &[-28.936]).unwrap()[0]);
}

#[test]
fn test_errors_propagate() {
    let lookup = DustLookup::new(ExtinctionMap::from_fn(Nside::new(4).unwrap(), |_| 0.0));
    assert!(matches!(
        lookup.ebv(&[0.0, f64::NAN], &[0.0, 0.0]),
        Err(DustError::InvalidPosition { index: 1, .. })
    ));
    assert!(matches!(
        lookup.ebv(&[0.0], &[]),
        Err(DustError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_lookup_resolution_must_match_map() {
    let map = ExtinctionMap::from_fn(Nside::new(64).unwrap(), |i| i as f64);
    let coarser = Nside::new(32).unwrap();

    let result = DustLookup::with_resolution(map.clone(), coarser);
    assert!(matches!(
        result,
        Err(DustError::ResolutionMismatch { lookup: 32, map: 64 })
    ));
    assert!(matches!(
        ebv(&[83.822], &[-5.391], &map, coarser),
        Err(DustError::ResolutionMismatch { .. })
    ));
}
