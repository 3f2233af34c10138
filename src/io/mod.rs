//! Logging setup, report output and candidate persistence.

pub mod output;
pub mod store;

pub use output::{setup_logging, write_population_report};
pub use store::{Entry, EntryId, EntryStore, MemoryStore};
