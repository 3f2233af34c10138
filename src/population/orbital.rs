//! Population of ABINIT inputs differing only in their `dmatpawu`.
//!
//! Every candidate shares the structure and variables of one input deck;
//! the genome encodes the correlation matrices that a global searcher
//! varies in pursuit of the lowest total energy.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use abinit::{InputVariables, Structure};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

use crate::codec;
use crate::error::{DftuError, DftuResult};
use crate::genome::{Genome, GenomeParams};
use crate::io::store::{Entry, EntryId, EntryStore};
use crate::population::{random, Population};
use crate::spin::SpinPolarization;

/// Candidates closer than this count as duplicates.
pub const DUPLICATE_TOLERANCE: f64 = 1e-3;

/// Status key for entries that went through evaluation.
const EVALUATED_KEY: &str = "evaluated";

pub struct OrbitalDftu<S: EntryStore> {
    name: String,
    tag: String,
    input: InputVariables,
    structure: Structure,
    max_lpawu: i64,
    natpawu: usize,
    spin: SpinPolarization,
    num_electrons_spin: Vec<usize>,
    connections: Vec<i64>,
    store: S,
    rng: StdRng,
}

impl<S: EntryStore> OrbitalDftu<S> {
    /// Build a population over the deck stored at `path`.
    ///
    /// `num_electrons_spin` fixes the integer electron target of each
    /// genome block and `connections` the equivalence tags between blocks;
    /// both must have one element per matrix in `dmatpawu`. The electron
    /// targets are not validated against the structure, only against the
    /// matrix dimension once generation starts.
    pub fn from_file<P: AsRef<Path>>(
        name: &str,
        path: P,
        num_electrons_spin: Vec<usize>,
        connections: Vec<i64>,
        store: S,
    ) -> DftuResult<Self> {
        let input = InputVariables::from_file(path)?;
        Self::new(name, input, num_electrons_spin, connections, store)
    }

    /// Build a population over an already parsed deck.
    pub fn new(
        name: &str,
        input: InputVariables,
        num_electrons_spin: Vec<usize>,
        connections: Vec<i64>,
        store: S,
    ) -> DftuResult<Self> {
        let structure = Structure::from_input(&input)?;

        let lpawu = input.get_values("lpawu").ok_or_else(|| {
            DftuError::Configuration(
                "variable 'lpawu' is missing, cannot derive the matrix dimension".to_string(),
            )
        })?;
        let max_lpawu = lpawu.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        if max_lpawu < 0.0 || max_lpawu.fract() != 0.0 {
            return Err(DftuError::Configuration(format!(
                "lpawu = {:?} defines no correlated shell",
                lpawu
            )));
        }
        let max_lpawu = max_lpawu as i64;

        // sites with a nonzero initial magnetization take part in DFT+U
        let spinat = input.get_values("spinat").ok_or_else(|| {
            DftuError::Configuration(
                "variable 'spinat' is missing, cannot determine natpawu".to_string(),
            )
        })?;
        if spinat.len() % 3 != 0 {
            return Err(DftuError::Shape(format!(
                "spinat holds {} values, expected a multiple of 3",
                spinat.len()
            )));
        }
        let natpawu = spinat
            .chunks_exact(3)
            .filter(|site| site.iter().any(|&component| component != 0.0))
            .count();
        if natpawu == 0 {
            return Err(DftuError::Configuration(
                "spinat defines no magnetized site, natpawu would be zero".to_string(),
            ));
        }

        let nsppol = input.get_integer_or("nsppol", 1)?;
        let nspinor = input.get_integer_or("nspinor", 1)?;
        let nspden = input.get_integer_or("nspden", nsppol)?;
        let spin = SpinPolarization::classify(nsppol, nspinor, nspden)?;

        let nmatrices = spin.nmatrices(natpawu);
        if num_electrons_spin.len() != nmatrices {
            return Err(DftuError::Constraint(format!(
                "{} electron targets for {} matrices in dmatpawu",
                num_electrons_spin.len(),
                nmatrices
            )));
        }
        if connections.len() != nmatrices {
            return Err(DftuError::Constraint(format!(
                "{} connections for {} matrices in dmatpawu",
                connections.len(),
                nmatrices
            )));
        }

        Ok(OrbitalDftu {
            name: name.to_string(),
            tag: "global".to_string(),
            input,
            structure,
            max_lpawu,
            natpawu,
            spin,
            num_electrons_spin,
            connections,
            store,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replace the generator seed, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn spin(&self) -> SpinPolarization {
        self.spin
    }

    pub fn natpawu(&self) -> usize {
        self.natpawu
    }

    /// Dimension of one correlation matrix: 5 for d shells, 7 for f.
    pub fn ndim(&self) -> usize {
        (2 * self.max_lpawu + 1) as usize
    }

    /// Matrices in `dmatpawu`, fixed by the spin case and `natpawu`.
    pub fn nmatrices(&self) -> usize {
        self.spin.nmatrices(self.natpawu)
    }

    pub fn connections(&self) -> &[i64] {
        &self.connections
    }

    pub fn num_electrons_spin(&self) -> &[usize] {
        &self.num_electrons_spin
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All stored candidate ids.
    pub fn members(&self) -> Vec<EntryId> {
        self.store.entry_ids()
    }

    /// Candidates flagged active under this population's tag.
    pub fn actives(&self) -> Vec<EntryId> {
        self.entries_with_flag(&self.tag)
    }

    /// Candidates that went through evaluation.
    pub fn evaluated(&self) -> Vec<EntryId> {
        self.entries_with_flag(EVALUATED_KEY)
    }

    fn entries_with_flag(&self, key: &str) -> Vec<EntryId> {
        self.store
            .entry_ids()
            .into_iter()
            .filter(|&id| {
                self.store
                    .get_entry(id)
                    .map(|entry| entry.flag(key))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Persist a genome as a new candidate entry.
    pub fn new_entry(&mut self, genome: &Genome, active: bool) -> DftuResult<EntryId> {
        self.validate_genome(genome)?;
        let mut entry = Entry::new(self.structure.clone(), genome.to_params());
        entry.status.insert(self.tag.clone(), active);
        let id = self.store.insert_entry(entry)?;
        debug!("Added new entry {} with tag={}: {}", id, self.tag, active);
        Ok(id)
    }

    /// Typed genome of a stored candidate.
    pub fn entry_genome(&self, id: EntryId) -> DftuResult<Genome> {
        let entry = self.store.get_entry(id)?;
        let genome = Genome::from_params(&entry.properties, self.ndim())?;
        self.validate_genome(&genome)?;
        Ok(genome)
    }

    fn validate_genome(&self, genome: &Genome) -> DftuResult<()> {
        if genome.ndim() != self.ndim() {
            return Err(DftuError::Shape(format!(
                "genome blocks are {}x{}, population expects {}x{}",
                genome.ndim(),
                genome.ndim(),
                self.ndim(),
                self.ndim()
            )));
        }
        if genome.len() != self.nmatrices() {
            return Err(DftuError::Shape(format!(
                "genome holds {} blocks, population expects {}",
                genome.len(),
                self.nmatrices()
            )));
        }
        Ok(())
    }

    /// Readable dump of one candidate's parameter lists.
    pub fn str_entry(&self, id: EntryId) -> DftuResult<String> {
        let entry = self.store.get_entry(id)?;
        Ok(format!(
            "entry {}\n R: {:?}\n O: {:?}\n D: {:?}",
            id, entry.properties.rotations, entry.properties.occupations, entry.properties.deltas
        ))
    }

    /// Copy of the input deck with `dmatpawu` replaced by the decoded
    /// correlation matrices of candidate `id`, ready to run.
    pub fn prepare_deck(&self, id: EntryId) -> DftuResult<InputVariables> {
        let genome = self.entry_genome(id)?;
        let matrices = codec::genome_to_matrices(&genome)?;
        let mut deck = self.input.clone();
        deck.set_value("dmatpawu", codec::flatten_matrices(&matrices));
        Ok(deck)
    }

    /// Re-encode the spin-1 correlation matrices scraped from a finished
    /// output log into flat genome parameters.
    pub fn import_final_genome(&self, text: &str) -> DftuResult<GenomeParams> {
        let flat = abinit::output::final_dmatpawu(text)?;
        codec::matrix_to_params(&flat, self.ndim())
    }

    /// Scrape an output log and, when the scraped matrices form a full
    /// genome for this spin case, store them as a new active candidate.
    /// Spin cases with two matrices per site scrape only the spin-1 half,
    /// which is returned as `None` instead of a partial entry.
    pub fn add_from_output(&mut self, text: &str) -> DftuResult<Option<EntryId>> {
        let params = self.import_final_genome(text)?;
        let genome = Genome::from_params(&params, self.ndim())?;
        if genome.len() == self.nmatrices() {
            Ok(Some(self.new_entry(&genome, true)?))
        } else {
            Ok(None)
        }
    }
}

/// Distance over the flat parameter lists: rotation stacks plus delta
/// stacks, Euclidean each. Occupation integers are deliberately left out,
/// matching the measure the searcher history was built on.
fn params_distance(a: &GenomeParams, b: &GenomeParams) -> DftuResult<f64> {
    if a.rotations.len() != b.rotations.len() || a.deltas.len() != b.deltas.len() {
        return Err(DftuError::Shape(
            "entries hold differently sized genomes".to_string(),
        ));
    }
    let rot_a = DVector::from_row_slice(&a.rotations);
    let rot_b = DVector::from_row_slice(&b.rotations);
    let delta_a = DVector::from_row_slice(&a.deltas);
    let delta_b = DVector::from_row_slice(&b.deltas);
    Ok((rot_b - rot_a).norm() + (delta_b - delta_a).norm())
}

impl<S: EntryStore> Population for OrbitalDftu<S> {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn add_random(&mut self) -> DftuResult<EntryId> {
        let ndim = self.ndim();
        let genome = random::random_genome(
            ndim,
            &self.connections,
            &self.num_electrons_spin,
            &mut self.rng,
        )?;
        self.new_entry(&genome, true)
    }

    fn distance(&self, a: EntryId, b: EntryId) -> DftuResult<f64> {
        let entry_a = self.store.get_entry(a)?;
        let entry_b = self.store.get_entry(b)?;
        params_distance(&entry_a.properties, &entry_b.properties)
    }

    /// Elementwise `R_a + factor * (R_b - R_a)` over the rotation stacks.
    /// Interpolated rotations are generally not orthogonal; they are
    /// stored as-is and no re-orthogonalization is attempted.
    fn move_towards(
        &mut self,
        a: EntryId,
        b: EntryId,
        factor: f64,
        in_place: bool,
    ) -> DftuResult<EntryId> {
        let mut entry_a = self.store.get_entry(a)?;
        let entry_b = self.store.get_entry(b)?;
        if entry_a.properties.rotations.len() != entry_b.properties.rotations.len() {
            return Err(DftuError::Shape(
                "entries hold differently sized genomes".to_string(),
            ));
        }
        entry_a.properties.rotations = entry_a
            .properties
            .rotations
            .iter()
            .zip(&entry_b.properties.rotations)
            .map(|(&ra, &rb)| ra + factor * (rb - ra))
            .collect();
        if in_place {
            self.store.update_entry(a, entry_a)?;
            Ok(a)
        } else {
            entry_a.status.insert(self.tag.clone(), true);
            self.store.insert_entry(entry_a)
        }
    }

    /// Pairwise sweep over the given ids. Groups are first-found with no
    /// transitive closure: an id lands in at most one group and a grouped
    /// duplicate never becomes a representative itself.
    fn check_duplicates(&self, ids: &[EntryId]) -> DftuResult<BTreeMap<EntryId, Vec<EntryId>>> {
        let entries = ids
            .iter()
            .map(|&id| Ok((id, self.store.get_entry(id)?)))
            .collect::<DftuResult<Vec<_>>>()?;

        let pairs: Vec<(usize, usize)> = (0..entries.len())
            .flat_map(|i| ((i + 1)..entries.len()).map(move |j| (i, j)))
            .collect();
        let distances = pairs
            .par_iter()
            .map(|&(i, j)| {
                params_distance(&entries[i].1.properties, &entries[j].1.properties)
                    .map(|d| (i, j, d))
            })
            .collect::<DftuResult<Vec<_>>>()?;

        let mut duplicates: BTreeMap<EntryId, Vec<EntryId>> = BTreeMap::new();
        let mut grouped: BTreeSet<EntryId> = BTreeSet::new();
        for (i, j, dist) in distances {
            if dist >= DUPLICATE_TOLERANCE {
                continue;
            }
            let (id_i, id_j) = (entries[i].0, entries[j].0);
            if grouped.contains(&id_i) || grouped.contains(&id_j) {
                continue;
            }
            duplicates.entry(id_i).or_default().push(id_j);
            grouped.insert(id_j);
        }
        Ok(duplicates)
    }
}

impl<S: EntryStore> fmt::Display for OrbitalDftu<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " Population DFT+U")?;
        writeln!(f)?;
        writeln!(f, " Name:               {}", self.name)?;
        writeln!(f, " Tag:                {}", self.tag)?;
        writeln!(f, " Formula:            {}", self.structure.formula())?;
        writeln!(f, " Spin case:          {}", self.spin)?;
        writeln!(f, " natpawu:            {}", self.natpawu)?;
        writeln!(f, " connections:        {:?}", self.connections)?;
        writeln!(f, " num_electrons_spin: {:?}", self.num_electrons_spin)?;
        writeln!(f, " Members:            {}", self.members().len())?;
        writeln!(f, " Actives:            {}", self.actives().len())?;
        write!(f, " Evaluated:          {}", self.evaluated().len())
    }
}
