use celestial_dust::{read_fits_map, DustConfig, DustLookup, DustResult, SkyPosition};

fn main() -> DustResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => DustConfig::default().with_map_path(path),
        None => DustConfig::default(),
    };
    let map = read_fits_map(config.resolve_map_path()?)?;
    println!("{}", map);

    let lookup = DustLookup::new(map);
    let targets = [
        ("M42", 83.822, -5.391),
        ("LMC", 80.894, -69.756),
        ("Galactic Center", 266.405, -28.936),
        ("NGP", 192.859, 27.128),
    ];

    for (name, ra, dec) in targets {
        let position = SkyPosition::new(ra, dec)?;
        let galactic = position.to_galactic();
        let ebv = lookup.ebv_one(&position)?;
        println!("  {:<16} RA {:>8.3}°  Dec {:+8.3}°  {}  E(B-V) {:.4}", name, ra, dec, galactic, ebv);
    }

    Ok(())
}
