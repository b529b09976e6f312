//! rigbuild - Main entry point
//!
//! Headless driver for the build configurator: loads configuration, catalog
//! and cart from disk and runs one command against them.

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use rigbuild::cart::FileCart;
use rigbuild::catalog::{CatalogLookup, JsonCatalog, TimedLookup};
use rigbuild::cli::{Cli, Commands, Selection, apply_selection};
use rigbuild::config_file::BuilderConfig;
use rigbuild::configurator::{CandidateStatus, Configurator};

/// Initialize logging; `RUST_LOG` overrides the default `info` level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    debug!("rigbuild starting up");

    let cli = Cli::parse_args();

    if let Commands::Validate { config } = &cli.command {
        info!("Validating configuration file: {:?}", config);
        let result = BuilderConfig::load_from_file(config)
            .and_then(|c| c.validate().map_err(anyhow::Error::from));
        return match result {
            Ok(()) => {
                println!("✓ Configuration file is valid: {}", config.display());
                Ok(())
            }
            Err(e) => {
                error!("Configuration validation failed: {:#}", e);
                eprintln!("✗ Configuration validation failed: {e:#}");
                std::process::exit(1);
            }
        };
    }

    let mut config = match &cli.config {
        Some(path) => BuilderConfig::load_from_file(path)?,
        None => BuilderConfig::default(),
    };
    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }
    if let Some(cart) = cli.cart {
        config.cart_path = cart;
    }
    config.validate()?;

    let mut configurator = config.configurator()?;

    match cli.command {
        Commands::Slots => print_slots(&configurator),
        Commands::Candidates { slot, selections } => {
            let lookup = open_catalog(&config)?;
            apply_all(&mut configurator, lookup.as_ref(), &selections)?;
            print_candidates(&configurator, lookup.as_ref(), &slot)?;
        }
        Commands::Build { selections, finish } => {
            let lookup = open_catalog(&config)?;
            apply_all(&mut configurator, lookup.as_ref(), &selections)?;
            print_summary(&configurator);
            if finish {
                finish_build(&mut configurator, &config)?;
            }
        }
        // Answered before any configuration is loaded
        Commands::Validate { .. } => {}
    }

    Ok(())
}

fn open_catalog(config: &BuilderConfig) -> Result<Box<dyn CatalogLookup>> {
    let catalog = JsonCatalog::load_from_file(&config.catalog_path)
        .with_context(|| format!("Failed to open catalog {:?}", config.catalog_path))?;
    info!(
        "Catalog loaded: {} parts in {} categories",
        catalog.len(),
        catalog.categories().count()
    );

    Ok(match config.lookup_timeout() {
        Some(timeout) => Box::new(TimedLookup::new(catalog, timeout)),
        None => Box::new(catalog),
    })
}

fn apply_all(
    configurator: &mut Configurator,
    lookup: &dyn CatalogLookup,
    selections: &[Selection],
) -> Result<()> {
    for selection in selections {
        let outcome = apply_selection(configurator, lookup, selection)?;
        for cleared in &outcome.cleared {
            println!(
                "! {} deselected: {} does not match the new {}",
                cleared.slot, cleared.part.name, outcome.slot
            );
        }
    }
    Ok(())
}

fn print_slots(configurator: &Configurator) {
    for slot in configurator.slots() {
        match &slot.depends_on {
            Some(upstream) => println!("{:<12} {} (must match {})", slot.id, slot.title, upstream),
            None => println!("{:<12} {}", slot.id, slot.title),
        }
    }
}

fn print_candidates(
    configurator: &Configurator,
    lookup: &dyn CatalogLookup,
    slot: &str,
) -> Result<()> {
    let list = configurator.list_candidates(slot, lookup)?;

    match &list.filter {
        Some(filter) => println!("Showing compatible parts for socket {}", filter.key),
        None => println!("Showing all available options"),
    }

    match list.status() {
        CandidateStatus::Available => {
            for candidate in &list.candidates {
                let part = &candidate.part;
                let marker = if candidate.current { "*" } else { " " };
                let key = part.compatibility_key().unwrap_or("-");
                println!(
                    "{marker} {:<20} {:>10}  {:<8} {} ({} in stock)",
                    part.id, part.price, key, part.name, part.stock_count
                );
            }
        }
        CandidateStatus::NoCompatibleCandidates => {
            let key = list.filter.as_ref().map_or("", |f| f.key.as_str());
            println!("No {slot} parts found matching {key}.");
        }
        CandidateStatus::NoStock => println!("No stock available for this category."),
    }
    Ok(())
}

fn print_summary(configurator: &Configurator) {
    let summary = configurator.compute_summary();
    for row in &summary.rows {
        println!("{:<18} {:<32} {:>10}", row.title, row.name, row.price);
    }
    println!(
        "{} of {} slots selected, total {}",
        summary.selected,
        configurator.slots().len(),
        summary.total
    );
}

fn finish_build(configurator: &mut Configurator, config: &BuilderConfig) -> Result<()> {
    let mut cart = FileCart::open(&config.cart_path);
    let report = configurator.finish(&mut cart)?;

    for failure in &report.failures {
        eprintln!("✗ {failure}");
    }
    println!(
        "✓ {} part(s) added to cart; cart now holds {} item(s), {}",
        report.added.len(),
        cart.item_count(),
        cart.total()
    );

    if !report.is_complete() {
        anyhow::bail!("{} part(s) could not be added to the cart", report.failures.len());
    }
    Ok(())
}
