//! Command-line driver for the `dmatpawu` population search.
//!
//! Loads a YAML configuration, builds the population over an ABINIT input
//! deck, optionally imports a converged output log, adds random candidates
//! and reports duplicates before snapshotting the store.

use std::fs;
use std::path::Path;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};

use dftu::config::{Args, Config};
use dftu::io::output::{setup_logging, write_population_report};
use dftu::io::store::MemoryStore;
use dftu::population::{OrbitalDftu, Population};

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.output.as_deref()).wrap_err("Failed to set up logging")?;

    info!("Reading configuration from: {}", args.config_file);
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;
    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();
    info!("Configuration loaded:\n{:?}", config);

    run_search(config, args)
}

fn run_search(config: Config, args: Args) -> Result<()> {
    let input_file = args
        .input_file
        .clone()
        .unwrap_or_else(|| config.input_file());
    let store_file = args
        .store_file
        .clone()
        .unwrap_or_else(|| config.store_file());
    let candidates = args.candidates.unwrap_or_else(|| config.candidates());

    let store = load_store(&store_file)?;
    let mut population = build_population(&config, &input_file, store)?;
    if let Some(seed) = args.seed.or_else(|| config.seed()) {
        info!("Seeding the random generator with {}", seed);
        population = population.with_seed(seed);
    }

    if let Some(log) = args.import_output.as_deref() {
        import_output(&mut population, log)?;
    }

    add_candidates(&mut population, candidates)?;
    report_duplicates(&population)?;

    if let Some(deck_dir) = args.deck_dir.clone().or_else(|| config.deck_dir()) {
        write_decks(&population, &deck_dir)?;
    }

    population
        .store()
        .save(&store_file)
        .wrap_err_with(|| format!("Unable to write the population snapshot: {}", store_file))?;
    info!("Population snapshot written to {}", store_file);

    Ok(())
}

/// Pick up an earlier snapshot when one exists, start empty otherwise.
fn load_store(path: &str) -> Result<MemoryStore> {
    if Path::new(path).exists() {
        info!("Loading population snapshot from {}", path);
        MemoryStore::load(path)
            .wrap_err_with(|| format!("Unable to read the population snapshot: {}", path))
    } else {
        Ok(MemoryStore::new())
    }
}

fn build_population(
    config: &Config,
    input_file: &str,
    store: MemoryStore,
) -> Result<OrbitalDftu<MemoryStore>> {
    let targets = config.population.num_electrons_spin.clone();
    // the constructor enforces one target and one connection per matrix,
    // so the target count is the right default length here
    let connections = config.connections_or_default(targets.len());
    let population = OrbitalDftu::from_file(
        &config.population_name(),
        input_file,
        targets,
        connections,
        store,
    )
    .wrap_err_with(|| format!("Unable to build a population over {}", input_file))?;
    info!("Population over {}:\n{}", input_file, population);
    Ok(population)
}

/// Scrape a finished run and store its matrices as a candidate.
fn import_output(population: &mut OrbitalDftu<MemoryStore>, log: &str) -> Result<()> {
    info!("Scraping correlation matrices from {}", log);
    let text =
        fs::read_to_string(log).wrap_err_with(|| format!("Unable to read the output log: {}", log))?;
    match population.add_from_output(&text)? {
        Some(id) => info!("Imported the converged matrices as entry {}", id),
        None => warn!("Output log holds only spin-1 matrices, no full genome to import"),
    }
    Ok(())
}

fn add_candidates(population: &mut OrbitalDftu<MemoryStore>, count: usize) -> Result<()> {
    info!("Adding {} random candidates...", count);
    for _ in 0..count {
        let id = population.add_random()?;
        let genome = population.entry_genome(id)?;
        let electrons: Vec<i32> = genome.blocks().iter().map(|b| b.electron_count()).collect();
        info!("  entry {}: electrons per block {:?}", id, electrons);
    }
    Ok(())
}

fn report_duplicates(population: &OrbitalDftu<MemoryStore>) -> Result<()> {
    let actives = population.actives();
    info!("Checking {} active candidates for duplicates...", actives.len());
    let duplicates = population.check_duplicates(&actives)?;
    let mut stdout = std::io::stdout();
    write_population_report(&mut stdout, population, &duplicates)
}

/// One ready-to-run deck per active candidate.
fn write_decks(population: &OrbitalDftu<MemoryStore>, deck_dir: &str) -> Result<()> {
    fs::create_dir_all(deck_dir)
        .wrap_err_with(|| format!("Unable to create the deck directory: {}", deck_dir))?;
    for id in population.actives() {
        let deck = population.prepare_deck(id)?;
        let path = Path::new(deck_dir).join(format!("abinit_{:04}.in", id));
        deck.write_file(&path)
            .wrap_err_with(|| format!("Unable to write the deck for entry {}", id))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}
