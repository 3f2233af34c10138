//! Candidate populations over the ABINIT `dmatpawu` variable.
//!
//! A DFT+U calculation can converge to one of many metastable electronic
//! states depending on the correlated-orbital occupation matrices it starts
//! from. This crate encodes those matrices as compact genomes, integer
//! occupations plus deltas plus a rotation, and maintains a population of
//! candidate matrices that a global searcher can generate, compare,
//! interpolate and deduplicate.

pub mod codec;
pub mod config;
pub mod error;
pub mod genome;
pub mod io;
pub mod population;
pub mod spin;

pub use codec::{genome_to_matrices, matrices_to_genome};
pub use error::{DftuError, DftuResult};
pub use genome::{Genome, GenomeBlock, GenomeParams};
pub use population::{OrbitalDftu, Population};
pub use spin::SpinPolarization;
