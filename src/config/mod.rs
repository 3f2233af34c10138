//! Run configuration for the `dmatpawu` search tool.
//!
//! Settings live in a YAML file; command-line arguments override single
//! values on top of it.

mod args;

pub use args::Args;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub population: PopulationParams,
    pub search: Option<SearchParams>,
}

/// Population section: which deck to search over and how its genome
/// blocks are tied together.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PopulationParams {
    pub name: Option<String>,
    pub input_file: Option<String>,
    pub num_electrons_spin: Vec<usize>,
    /// Equivalence tags between genome blocks; absent means every block
    /// varies independently.
    pub connections: Option<Vec<i64>>,
}

impl Default for PopulationParams {
    fn default() -> Self {
        PopulationParams {
            name: Some("dftu".to_string()),
            input_file: Some("abinit.in".to_string()),
            num_electrons_spin: Vec::new(),
            connections: None,
        }
    }
}

impl PopulationParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.name.is_none() {
            self.name = defaults.name;
        }
        if self.input_file.is_none() {
            self.input_file = defaults.input_file;
        }
        self
    }
}

/// Search section: how many candidates to add and where state goes.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchParams {
    pub candidates: Option<usize>,
    /// Seed for the random generator; absent means entropy.
    pub seed: Option<u64>,
    pub store_file: Option<String>,
    /// Directory for ready-to-run decks, one per active candidate.
    pub deck_dir: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            candidates: Some(16),
            seed: None,
            store_file: Some("population.json".to_string()),
            deck_dir: None,
        }
    }
}

impl SearchParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.candidates.is_none() {
            self.candidates = defaults.candidates;
        }
        if self.store_file.is_none() {
            self.store_file = defaults.store_file;
        }
        self
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.population = self.population.with_defaults();
        if let Some(search) = self.search.take() {
            self.search = Some(search.with_defaults());
        }
        self
    }

    pub fn population_name(&self) -> String {
        self.population
            .name
            .clone()
            .unwrap_or_else(|| "dftu".to_string())
    }

    pub fn input_file(&self) -> String {
        self.population
            .input_file
            .clone()
            .unwrap_or_else(|| "abinit.in".to_string())
    }

    pub fn candidates(&self) -> usize {
        self.search.as_ref().and_then(|s| s.candidates).unwrap_or(16)
    }

    pub fn seed(&self) -> Option<u64> {
        self.search.as_ref().and_then(|s| s.seed)
    }

    pub fn store_file(&self) -> String {
        self.search
            .as_ref()
            .and_then(|s| s.store_file.clone())
            .unwrap_or_else(|| "population.json".to_string())
    }

    pub fn deck_dir(&self) -> Option<String> {
        self.search.as_ref().and_then(|s| s.deck_dir.clone())
    }

    /// Connection tags, falling back to one independent tag per matrix.
    pub fn connections_or_default(&self, nmatrices: usize) -> Vec<i64> {
        self.population
            .connections
            .clone()
            .unwrap_or_else(|| (0..nmatrices as i64).collect())
    }
}
