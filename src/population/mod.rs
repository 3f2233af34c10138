//! Candidate populations for global searches over `dmatpawu`.

pub mod orbital;
pub mod random;

pub use orbital::OrbitalDftu;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use crate::error::DftuResult;
use crate::io::store::EntryId;

/// Operator surface a global-search strategy drives a population with.
///
/// The last block of methods are hooks reserved for an external searcher.
/// Their default bodies have no effect, and that no-effect contract is the
/// documented behavior, not a stub to retry around.
pub trait Population {
    /// Name tag of this population; also the status key marking active
    /// entries in the store.
    fn tag(&self) -> &str;

    /// Generate one random candidate, persist it and return its id.
    fn add_random(&mut self) -> DftuResult<EntryId>;

    /// Distance between two stored candidates.
    fn distance(&self, a: EntryId, b: EntryId) -> DftuResult<f64>;

    /// Interpolate candidate `a` towards candidate `b` by `factor` and
    /// persist the result: into `a` itself when `in_place` is set,
    /// otherwise as a new entry. Returns the id holding the result.
    fn move_towards(
        &mut self,
        a: EntryId,
        b: EntryId,
        factor: f64,
        in_place: bool,
    ) -> DftuResult<EntryId>;

    /// Group candidates lying closer than the duplicate tolerance. Keys
    /// are representatives, values the candidates equivalent to them.
    fn check_duplicates(&self, ids: &[EntryId]) -> DftuResult<BTreeMap<EntryId, Vec<EntryId>>>;

    // Searcher hooks, deliberately without effect.

    fn cross(&mut self, _ids: &[EntryId]) -> DftuResult<()> {
        Ok(())
    }

    fn move_random(&mut self, _id: EntryId, _factor: f64, _in_place: bool) -> DftuResult<()> {
        Ok(())
    }

    fn evaluate_entry(&mut self, _id: EntryId) -> DftuResult<()> {
        Ok(())
    }

    fn is_evaluated(&self, _id: EntryId) -> bool {
        false
    }

    fn recover(&mut self) {}

    fn value(&self, _id: EntryId) -> Option<f64> {
        None
    }
}
