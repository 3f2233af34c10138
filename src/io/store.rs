//! Candidate entry persistence.
//!
//! The population talks to storage through the [`EntryStore`] trait; the
//! bundled [`MemoryStore`] keeps everything in memory and can snapshot
//! itself to a JSON file between runs.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use abinit::Structure;
use serde::{Deserialize, Serialize};

use crate::error::{DftuError, DftuResult};
use crate::genome::GenomeParams;

pub type EntryId = u64;

/// One stored candidate: the shared crystal structure, the flattened
/// genome and a set of status flags keyed by population tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub structure: Structure,
    pub properties: GenomeParams,
    pub status: HashMap<String, bool>,
}

impl Entry {
    pub fn new(structure: Structure, properties: GenomeParams) -> Self {
        Entry {
            structure,
            properties,
            status: HashMap::new(),
        }
    }

    /// Status flag lookup, absent flags read as false.
    pub fn flag(&self, key: &str) -> bool {
        self.status.get(key).copied().unwrap_or(false)
    }
}

pub trait EntryStore {
    fn insert_entry(&mut self, entry: Entry) -> DftuResult<EntryId>;
    fn get_entry(&self, id: EntryId) -> DftuResult<Entry>;
    fn update_entry(&mut self, id: EntryId, entry: Entry) -> DftuResult<()>;
    /// All ids in ascending insertion order.
    fn entry_ids(&self) -> Vec<EntryId>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store with monotonically increasing ids.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    entries: BTreeMap<EntryId, Entry>,
    next_id: EntryId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the whole store to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> DftuResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Rebuild a store from a JSON snapshot.
    pub fn load<P: AsRef<Path>>(path: P) -> DftuResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl EntryStore for MemoryStore {
    fn insert_entry(&mut self, entry: Entry) -> DftuResult<EntryId> {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, entry);
        Ok(id)
    }

    fn get_entry(&self, id: EntryId) -> DftuResult<Entry> {
        self.entries
            .get(&id)
            .cloned()
            .ok_or(DftuError::EntryNotFound(id))
    }

    fn update_entry(&mut self, id: EntryId, entry: Entry) -> DftuResult<()> {
        if !self.entries.contains_key(&id) {
            return Err(DftuError::EntryNotFound(id));
        }
        self.entries.insert(id, entry);
        Ok(())
    }

    fn entry_ids(&self) -> Vec<EntryId> {
        self.entries.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
