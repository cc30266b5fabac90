//! add-gal-dust: append Galactic E(B-V) to a CSV catalog.
//!
//! Reads RA/Dec (degrees) from the input catalog, looks each position up in
//! the Planck dust map and writes the catalog back out with one extra
//! column.

use anyhow::Context;
use celestial_dust::{read_fits_map, Catalog, DustConfig, DustLookup, Nside};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "add-gal-dust")]
#[command(about = "Add Galactic E(B-V) from the Planck dust map to a catalog")]
#[command(version)]
struct Cli {
    /// Input catalog (CSV with a header line)
    #[arg(long)]
    input_catalog: PathBuf,

    /// Output catalog
    #[arg(long)]
    output_catalog: PathBuf,

    /// Right ascension column (degrees)
    #[arg(long)]
    ra: String,

    /// Declination column (degrees)
    #[arg(long)]
    dec: String,

    /// Name of the column added to the output catalog
    #[arg(long, alias = "galatic-ebv-col", default_value = "GAL_EBV")]
    galactic_ebv_col: String,

    /// HEALPix FITS map; searched for via CELESTIAL_DUST_MAP and
    /// CELESTIAL_DUST_AUX_PATH when omitted
    #[arg(long)]
    planck_dust_map: Option<PathBuf>,

    /// Expected map resolution (power of two); the run fails if the map
    /// was built at another nside
    #[arg(long, default_value = "2048")]
    nside: u64,

    /// Number of threads for parallel processing (0 = all cores)
    #[arg(short, long, default_value = "0")]
    threads: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> anyhow::Result<DustConfig> {
        Ok(DustConfig {
            map_path: self.planck_dust_map.clone(),
            nside: Nside::new(self.nside).context("Invalid --nside")?,
            ra_column: self.ra.clone(),
            dec_column: self.dec.clone(),
            output_column: self.galactic_ebv_col.clone(),
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    configure_thread_pool(cli.threads);

    let config = cli.to_config()?;
    run(&cli, &config)
}

fn run(cli: &Cli, config: &DustConfig) -> anyhow::Result<()> {
    let map_path = config.resolve_map_path()?;
    let map = read_fits_map(&map_path)
        .with_context(|| format!("Failed to load dust map {}", map_path.display()))?;
    let lookup = DustLookup::with_resolution(map, config.nside)
        .with_context(|| format!("Dust map {} does not match --nside", map_path.display()))?;

    let mut catalog = Catalog::open(&cli.input_catalog)
        .with_context(|| format!("Failed to read {}", cli.input_catalog.display()))?;
    let ra = catalog
        .column_f64(&config.ra_column)
        .context("RA column")?;
    let dec = catalog
        .column_f64(&config.dec_column)
        .context("DEC column")?;

    let ebv = lookup.ebv(&ra, &dec)?;
    catalog.set_column(&config.output_column, &ebv)?;
    catalog
        .save(&cli.output_catalog)
        .with_context(|| format!("Failed to write {}", cli.output_catalog.display()))?;

    tracing::info!(
        rows = ebv.len(),
        column = %config.output_column,
        output = %cli.output_catalog.display(),
        "done"
    );
    Ok(())
}

fn setup_logging(verbose: bool) {
    let base_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_threads(threads: usize) -> usize {
    if threads == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        threads
    }
}

fn configure_thread_pool(threads: usize) {
    let threads = resolve_threads(threads);
    if rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .is_err()
    {
        tracing::warn!(threads, "global thread pool already initialized");
    }
}
