use std::collections::{BTreeMap, BTreeSet};

use super::*;
use crate::codec;
use crate::error::DftuError;
use crate::genome::{Genome, GenomeBlock};
use crate::io::store::{EntryStore, MemoryStore};
use crate::population::orbital::DUPLICATE_TOLERANCE;
use crate::spin::SpinPolarization;
use abinit::InputVariables;
use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;

const AFM_DECK: &str = "\
# two vanadium sites with opposite starting moments
natom 2
ntypat 1
znucl 23
typat 2*1
acell 3*5.5
xred
0.0 0.0 0.0
0.5 0.5 0.5
nspden 2
lpawu 2
spinat
0.0 0.0 3.0
0.0 0.0 -3.0
";

const FERRO_DECK: &str = "\
natom 3
ntypat 1
znucl 25
typat 3*1
acell 3*8.0
xred
0.0 0.0 0.0
0.3333 0.3333 0.3333
0.6666 0.6666 0.6666
nsppol 2
nspden 2
lpawu 1
spinat
0.0 0.0 4.0
0.0 0.0 4.0
0.0 0.0 4.0
";

const NICKEL_DECK: &str = "\
natom 2
ntypat 1
znucl 28
typat 2*1
acell 3*7.9
xred
0.0 0.0 0.0
0.5 0.5 0.5
nspden 2
lpawu 1
spinat
0.0 0.0 1.0
0.0 0.0 -1.0
";

fn afm() -> OrbitalDftu<MemoryStore> {
    let input: InputVariables = AFM_DECK.parse().unwrap();
    OrbitalDftu::new("vanadium-afm", input, vec![3, 2], vec![0, 1], MemoryStore::new())
        .unwrap()
        .with_seed(9)
}

fn ferro() -> OrbitalDftu<MemoryStore> {
    let input: InputVariables = FERRO_DECK.parse().unwrap();
    OrbitalDftu::new(
        "manganese-ferro",
        input,
        vec![2, 2, 2, 1, 1, 1],
        vec![0, 1, 2, 0, 1, 2],
        MemoryStore::new(),
    )
    .unwrap()
    .with_seed(31)
}

/// Per-atom section of an output log, in the layout the scraper expects.
fn atom_section(atom: usize, top: f64) -> String {
    [
        format!("====== For Atom   {atom}, occupations for correlated orbitals. lpawu =  1"),
        String::new(),
        format!("Atom   {atom} . Occ. for lpawu and for spin 1   =    2.01"),
        String::new(),
        format!("Atom   {atom} . Occ. for lpawu and for spin 2   =    0.98"),
        String::new(),
        format!(" => On atom   {atom},  local Mag. for lpawu is    1.030"),
        String::new(),
        "== Occupation matrix for correlated orbitals:".to_string(),
        String::new(),
        "Occupation matrix for spin  1".to_string(),
        format!("     {top:.5}    0.00100    0.00000"),
        "     0.00100    0.55000    0.00000".to_string(),
        "     0.00000    0.00000    0.12000".to_string(),
        String::new(),
        "Occupation matrix for spin  2".to_string(),
        "     0.30000    0.00000    0.00000".to_string(),
        "     0.00000    0.31000    0.00000".to_string(),
        "     0.00000    0.00000    0.32000".to_string(),
        String::new(),
    ]
    .join("\n")
}

fn output_log(natoms: usize) -> String {
    let mut text =
        String::from("========== LDA+U DATA ==========================================\n\n");
    for atom in 1..=natoms {
        text.push_str(&atom_section(atom, 0.93 - 0.01 * atom as f64));
        text.push('\n');
    }
    text.push('\n');
    text
}

#[test]
fn every_occupation_vector_hits_the_electron_target() {
    let vectors = random::occupation_vectors(5, 3).unwrap();
    assert_eq!(vectors.len(), 10);
    let distinct: BTreeSet<Vec<i32>> = vectors
        .iter()
        .map(|v| v.iter().copied().collect())
        .collect();
    assert_eq!(distinct.len(), 10);
    for v in &vectors {
        assert_eq!(v.iter().sum::<i32>(), 3);
        assert!(v.iter().all(|&x| x == 0 || x == 1));
    }
}

#[test]
fn electron_target_beyond_the_shell_is_rejected() {
    let err = random::occupation_vectors(5, 6).unwrap_err();
    assert!(matches!(err, DftuError::Constraint(_)));
}

#[test]
fn occupation_draws_spread_evenly_over_the_enumeration() {
    let mut rng = StdRng::seed_from_u64(77);
    let mut counts: BTreeMap<Vec<i32>, usize> = BTreeMap::new();
    for _ in 0..2000 {
        let block = random::random_block(5, 2, &mut rng).unwrap();
        let key: Vec<i32> = block.occupations().iter().copied().collect();
        *counts.entry(key).or_insert(0) += 1;
    }
    // C(5, 2) vectors, 200 expected hits apiece
    assert_eq!(counts.len(), 10);
    for (vector, &count) in &counts {
        assert!(
            count >= 100 && count <= 300,
            "vector {:?} drawn {} times out of 2000",
            vector,
            count
        );
    }
}

#[test]
fn random_rotations_are_special_orthogonal() {
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let q = random::random_rotation(5, &mut rng);
        let residue = q.transpose() * &q - DMatrix::identity(5, 5);
        assert!(residue.norm() < 1e-9, "seed {}: Q'Q != I", seed);
        assert_relative_eq!(q.determinant(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn construction_derives_counts_from_the_deck() {
    let pop = afm();
    assert_eq!(pop.name(), "vanadium-afm");
    assert_eq!(pop.tag(), "global");
    assert_eq!(pop.natpawu(), 2);
    assert_eq!(pop.ndim(), 5);
    assert_eq!(pop.nmatrices(), 2);
    assert_eq!(pop.spin(), SpinPolarization::AntiferromagneticCollinear);
    assert_eq!(pop.connections(), &[0, 1]);
    assert_eq!(pop.num_electrons_spin(), &[3, 2]);
    assert!(pop.store().is_empty());
}

#[test]
fn malformed_decks_are_rejected() {
    let build = |deck: &str| {
        let input: InputVariables = deck.parse().unwrap();
        OrbitalDftu::new("broken", input, vec![3, 2], vec![0, 1], MemoryStore::new())
            .map(|_| ())
            .unwrap_err()
    };

    let missing_lpawu = AFM_DECK.replace("lpawu 2\n", "");
    assert!(matches!(build(&missing_lpawu), DftuError::Configuration(_)));

    let fractional_lpawu = AFM_DECK.replace("lpawu 2", "lpawu 1.5");
    assert!(matches!(
        build(&fractional_lpawu),
        DftuError::Configuration(_)
    ));

    let missing_spinat = AFM_DECK.replace("spinat\n0.0 0.0 3.0\n0.0 0.0 -3.0\n", "");
    assert!(matches!(build(&missing_spinat), DftuError::Configuration(_)));

    let unmagnetized = AFM_DECK
        .replace("0.0 0.0 3.0", "0.0 0.0 0.0")
        .replace("0.0 0.0 -3.0", "0.0 0.0 0.0");
    assert!(matches!(build(&unmagnetized), DftuError::Configuration(_)));

    let ragged_spinat = AFM_DECK.replace("0.0 0.0 -3.0", "0.0 -3.0");
    assert!(matches!(build(&ragged_spinat), DftuError::Shape(_)));

    let bad_spin_case = format!("{}nsppol 3\n", AFM_DECK);
    assert!(matches!(build(&bad_spin_case), DftuError::Configuration(_)));
}

#[test]
fn target_and_connection_lengths_must_match_the_matrix_count() {
    let input: InputVariables = AFM_DECK.parse().unwrap();
    let err = OrbitalDftu::new("short", input, vec![3], vec![0, 1], MemoryStore::new())
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, DftuError::Constraint(_)));

    let input: InputVariables = AFM_DECK.parse().unwrap();
    let err = OrbitalDftu::new("short", input, vec![3, 2], vec![0, 1, 2], MemoryStore::new())
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, DftuError::Constraint(_)));
}

#[test]
fn add_random_persists_a_canonical_active_candidate() {
    let mut pop = afm();
    let id = pop.add_random().unwrap();

    assert_eq!(pop.members(), vec![id]);
    assert_eq!(pop.actives(), vec![id]);
    assert!(pop.evaluated().is_empty());

    let genome = pop.entry_genome(id).unwrap();
    assert_eq!(genome.len(), 2);
    assert_eq!(genome.ndim(), 5);
    for (block, &target) in genome.blocks().iter().zip(pop.num_electrons_spin()) {
        assert_eq!(block.electron_count(), target as i32);
        assert!(block.deltas().iter().all(|&d| d == 0.0));
        let q = block.rotation();
        let residue = q.transpose() * q - DMatrix::identity(5, 5);
        assert!(residue.norm() < 1e-9);
        assert_relative_eq!(q.determinant(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn connected_blocks_copy_the_first_occurrence() {
    let input: InputVariables = AFM_DECK.parse().unwrap();
    let mut pop = OrbitalDftu::new(
        "connected",
        input,
        vec![3, 2],
        vec![7, 7],
        MemoryStore::new(),
    )
    .unwrap()
    .with_seed(5);

    let id = pop.add_random().unwrap();
    let genome = pop.entry_genome(id).unwrap();
    let blocks = genome.blocks();
    assert_eq!(blocks[0].rotation(), blocks[1].rotation());
    assert_eq!(blocks[0].occupations(), blocks[1].occupations());
    // the second block inherits the first tag occurrence's electron target
    assert_eq!(blocks[1].electron_count(), 3);
}

#[test]
fn oversized_electron_target_fails_at_generation() {
    let input: InputVariables = AFM_DECK.parse().unwrap();
    let mut pop = OrbitalDftu::new("over", input, vec![6, 2], vec![0, 1], MemoryStore::new())
        .unwrap()
        .with_seed(1);
    let err = pop.add_random().unwrap_err();
    assert!(matches!(err, DftuError::Constraint(_)));
    assert!(pop.store().is_empty());
}

#[test]
fn distance_vanishes_on_itself_and_is_symmetric() {
    let mut pop = afm();
    let a = pop.add_random().unwrap();
    let b = pop.add_random().unwrap();

    assert_eq!(pop.distance(a, a).unwrap(), 0.0);
    let forward = pop.distance(a, b).unwrap();
    let backward = pop.distance(b, a).unwrap();
    assert_relative_eq!(forward, backward, epsilon = 1e-12);
    assert!(forward > DUPLICATE_TOLERANCE);
}

#[test]
fn move_towards_interpolates_the_rotations_only() {
    let mut pop = afm();
    let a = pop.add_random().unwrap();
    let b = pop.add_random().unwrap();
    let params_a = pop.entry_genome(a).unwrap().to_params();
    let params_b = pop.entry_genome(b).unwrap().to_params();

    let moved = pop.move_towards(a, b, 0.5, false).unwrap();
    assert_ne!(moved, a);
    assert_eq!(pop.store().len(), 3);
    assert!(pop.actives().contains(&moved));

    let result = pop.entry_genome(moved).unwrap().to_params();
    for ((&ra, &rb), &rm) in params_a
        .rotations
        .iter()
        .zip(&params_b.rotations)
        .zip(&result.rotations)
    {
        assert_relative_eq!(rm, ra + 0.5 * (rb - ra), epsilon = 1e-12);
    }
    assert_eq!(result.occupations, params_a.occupations);
    assert_eq!(result.deltas, params_a.deltas);
}

#[test]
fn move_endpoints_reproduce_the_operands() {
    let mut pop = afm();
    let a = pop.add_random().unwrap();
    let b = pop.add_random().unwrap();
    let params_a = pop.entry_genome(a).unwrap().to_params();
    let params_b = pop.entry_genome(b).unwrap().to_params();

    let stay = pop.move_towards(a, b, 0.0, false).unwrap();
    let stay_params = pop.entry_genome(stay).unwrap().to_params();
    assert_eq!(stay_params.rotations, params_a.rotations);

    let land = pop.move_towards(a, b, 1.0, false).unwrap();
    let land_params = pop.entry_genome(land).unwrap().to_params();
    for (&rl, &rb) in land_params.rotations.iter().zip(&params_b.rotations) {
        assert_relative_eq!(rl, rb, epsilon = 1e-12);
    }
}

#[test]
fn move_in_place_overwrites_the_source_entry() {
    let mut pop = afm();
    let a = pop.add_random().unwrap();
    let b = pop.add_random().unwrap();
    let before = pop.entry_genome(a).unwrap().to_params();

    let moved = pop.move_towards(a, b, 0.5, true).unwrap();
    assert_eq!(moved, a);
    assert_eq!(pop.store().len(), 2);
    let after = pop.entry_genome(a).unwrap().to_params();
    assert_ne!(after.rotations, before.rotations);
    assert_eq!(after.occupations, before.occupations);
}

#[test]
fn duplicates_group_under_the_first_representative() {
    let mut pop = afm();
    let a = pop.add_random().unwrap();
    let genome = pop.entry_genome(a).unwrap();
    let b = pop.new_entry(&genome, true).unwrap();
    let c = pop.new_entry(&genome, true).unwrap();
    let d = pop.add_random().unwrap();

    let duplicates = pop.check_duplicates(&pop.members()).unwrap();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[&a], vec![b, c]);
    assert!(!duplicates.contains_key(&d));
}

#[test]
fn distinct_candidates_report_no_duplicates() {
    let mut pop = afm();
    for _ in 0..4 {
        pop.add_random().unwrap();
    }
    let duplicates = pop.check_duplicates(&pop.members()).unwrap();
    assert!(duplicates.is_empty());
}

#[test]
fn prepare_deck_embeds_the_decoded_matrices() {
    let mut pop = afm();
    let id = pop.add_random().unwrap();

    let deck = pop.prepare_deck(id).unwrap();
    assert_eq!(deck.get_value("natom"), Some(2.0));
    let flat = deck.get_values("dmatpawu").unwrap();
    assert_eq!(flat.len(), 2 * 5 * 5);

    let genome = pop.entry_genome(id).unwrap();
    let expected = codec::flatten_matrices(&codec::genome_to_matrices(&genome).unwrap());
    assert_eq!(flat, &expected[..]);

    // decoded correlation matrices are symmetric
    let m = DMatrix::from_row_slice(5, 5, &flat[..25]);
    assert!((&m - m.transpose()).norm() < 1e-9);
}

#[test]
fn foreign_genome_shapes_are_rejected() {
    let mut pop = afm();

    let tiny = Genome::new(vec![GenomeBlock::new(
        DVector::from_vec(vec![1, 0, 0]),
        DVector::zeros(3),
        DMatrix::identity(3, 3),
    )
    .unwrap()])
    .unwrap();
    assert!(matches!(
        pop.new_entry(&tiny, true).unwrap_err(),
        DftuError::Shape(_)
    ));

    let lone = Genome::new(vec![GenomeBlock::new(
        DVector::from_vec(vec![1, 0, 0, 0, 0]),
        DVector::zeros(5),
        DMatrix::identity(5, 5),
    )
    .unwrap()])
    .unwrap();
    assert!(matches!(
        pop.new_entry(&lone, true).unwrap_err(),
        DftuError::Shape(_)
    ));
}

#[test]
fn missing_entries_are_reported() {
    let pop = afm();
    assert!(matches!(
        pop.entry_genome(42).unwrap_err(),
        DftuError::EntryNotFound(42)
    ));
}

#[test]
fn str_entry_lists_the_parameter_stacks() {
    let mut pop = afm();
    let id = pop.add_random().unwrap();
    let dump = pop.str_entry(id).unwrap();
    assert!(dump.contains("R:"));
    assert!(dump.contains("O:"));
    assert!(dump.contains("D:"));
}

#[test]
fn display_summarizes_the_population() {
    let mut pop = afm();
    pop.add_random().unwrap();
    pop.add_random().unwrap();

    let text = format!("{}", pop);
    assert!(text.contains(" Population DFT+U"));
    assert!(text.contains("Name:               vanadium-afm"));
    assert!(text.contains("Formula:            V2"));
    assert!(text.contains("Spin case:          collinear antiferromagnetic"));
    assert!(text.contains("Members:            2"));
    assert!(text.contains("Actives:            2"));
    assert!(text.contains("Evaluated:          0"));
}

#[test]
fn ferro_case_stacks_both_spin_channels() {
    let mut pop = ferro();
    assert_eq!(pop.spin(), SpinPolarization::FerromagneticCollinear);
    assert_eq!(pop.natpawu(), 3);
    assert_eq!(pop.nmatrices(), 6);
    assert_eq!(pop.ndim(), 3);

    let id = pop.add_random().unwrap();
    let genome = pop.entry_genome(id).unwrap();
    assert_eq!(genome.len(), 6);

    // connections [0,1,2,0,1,2] tie each down channel to its up channel,
    // electron target included
    let blocks = genome.blocks();
    assert_eq!(blocks[3].rotation(), blocks[0].rotation());
    assert_eq!(blocks[4].rotation(), blocks[1].rotation());
    assert_eq!(blocks[3].electron_count(), 2);
}

#[test]
fn add_from_output_restores_a_full_genome() {
    let input: InputVariables = NICKEL_DECK.parse().unwrap();
    let mut pop = OrbitalDftu::new("nickel", input, vec![2, 1], vec![0, 1], MemoryStore::new())
        .unwrap()
        .with_seed(3);

    let id = pop
        .add_from_output(&output_log(2))
        .unwrap()
        .expect("two scraped matrices fill this spin case");
    assert_eq!(pop.actives(), vec![id]);

    let genome = pop.entry_genome(id).unwrap();
    assert_eq!(genome.len(), 2);
    assert_eq!(genome.ndim(), 3);
    for block in genome.blocks() {
        assert_eq!(block.electron_count(), 2);
    }

    // decoding reproduces the scraped spin-1 matrix of atom 1
    let matrices = codec::genome_to_matrices(&genome).unwrap();
    assert_relative_eq!(matrices[0][(0, 0)], 0.92, epsilon = 1e-9);
    assert_relative_eq!(matrices[0][(2, 2)], 0.12, epsilon = 1e-9);
}

#[test]
fn add_from_output_skips_partial_spin_scrapes() {
    let mut pop = ferro();
    // three scraped spin-1 matrices cannot fill six genome slots
    assert!(pop.add_from_output(&output_log(3)).unwrap().is_none());
    assert!(pop.store().is_empty());
}

#[test]
fn searcher_hooks_default_to_no_effect() {
    let mut pop = afm();
    let id = pop.add_random().unwrap();

    assert!(pop.cross(&[id]).is_ok());
    assert!(pop.move_random(id, 0.1, true).is_ok());
    assert!(pop.evaluate_entry(id).is_ok());
    assert!(!pop.is_evaluated(id));
    assert_eq!(pop.value(id), None);
    pop.recover();
    assert_eq!(pop.members(), vec![id]);
}
