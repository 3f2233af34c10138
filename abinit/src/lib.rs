//! Minimal toolkit for the ABINIT file formats this project touches:
//! free-format input decks, structural metadata extracted from them, and
//! scraping of DFT+U occupation data from output logs.

pub mod error;
pub mod input;
pub mod output;
pub mod structure;

pub use error::{AbinitError, AbinitResult};
pub use input::InputVariables;
pub use structure::Structure;
