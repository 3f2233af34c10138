//! Scraper for the DFT+U occupation report in ABINIT output logs.
//!
//! The report is the `LDA+U DATA` block printed at the end of a converged
//! run, with per-atom scalar occupations and one occupation matrix per spin
//! channel. Scanning is idempotent over the log text and fails loudly when
//! the block is absent, repeated or malformed.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{AbinitError, AbinitResult};

/// Occupation data for one correlated atom, both spin channels.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomOccupations {
    /// Atom index as printed in the log, 1-based.
    pub atom_index: usize,
    /// Orbital angular momentum of the correlated shell.
    pub lpawu: u32,
    /// Scalar occupation per spin channel.
    pub occupations: [f64; 2],
    /// Flattened row-major occupation matrix per spin channel, each of
    /// length `ndim * ndim`.
    pub matrices: [Vec<f64>; 2],
}

impl AtomOccupations {
    pub fn ndim(&self) -> usize {
        2 * self.lpawu as usize + 1
    }
}

const MAIN_BLOCK: &str = r"LDA\+U DATA[\s\w=,>:.\-]*\n\n\n";

const ATOM_BLOCK: &str = concat!(
    r"For Atom\s*(\d+), occupations for correlated orbitals\. lpawu =\s*(\d+)\s*",
    r"Atom\s*\d+\s*\. Occ\. for lpawu and for spin\s*\d+\s*=\s*([\d.]+)\s*",
    r"Atom\s*\d+\s*\. Occ\. for lpawu and for spin\s*\d+\s*=\s*([\d.]+)\s*",
    r"=> On atom\s*\d+\s*,\s*local Mag\. for lpawu is[\s\w.\-]*",
    r"== Occupation matrix for correlated orbitals:\s*",
    r"Occupation matrix for spin\s*1\s*([\d.\-\s]*)",
    r"Occupation matrix for spin\s*2\s*([\d.\-\s]*)",
);

fn compile(pattern: &str) -> AbinitResult<Regex> {
    Regex::new(pattern).map_err(|e| AbinitError::Output(e.to_string()))
}

fn parse_matrix(raw: &str, atom_index: usize, ndim: usize) -> AbinitResult<Vec<f64>> {
    let values: Vec<f64> = raw
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                AbinitError::Output(format!(
                    "bad matrix element '{}' for atom {}",
                    token, atom_index
                ))
            })
        })
        .collect::<AbinitResult<_>>()?;
    if values.len() != ndim * ndim {
        return Err(AbinitError::Output(format!(
            "atom {}: occupation matrix holds {} elements, expected {}",
            atom_index,
            values.len(),
            ndim * ndim
        )));
    }
    Ok(values)
}

/// Extract per-atom occupation data from output log text.
pub fn correlation_matrices_from_output(text: &str) -> AbinitResult<Vec<AtomOccupations>> {
    let main_re = compile(MAIN_BLOCK)?;
    let blocks: Vec<&str> = main_re.find_iter(text).map(|m| m.as_str()).collect();
    if blocks.len() != 1 {
        return Err(AbinitError::Output(format!(
            "expected exactly one LDA+U data block, found {}",
            blocks.len()
        )));
    }

    let atom_re = compile(ATOM_BLOCK)?;
    let mut atoms = Vec::new();
    for caps in atom_re.captures_iter(blocks[0]) {
        let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");
        let atom_index: usize = field(1)
            .parse()
            .map_err(|_| AbinitError::Output(format!("bad atom index '{}'", field(1))))?;
        let lpawu: u32 = field(2)
            .parse()
            .map_err(|_| AbinitError::Output(format!("bad lpawu '{}'", field(2))))?;
        let occ = |i: usize| -> AbinitResult<f64> {
            field(i).parse::<f64>().map_err(|_| {
                AbinitError::Output(format!(
                    "bad occupation '{}' for atom {}",
                    field(i),
                    atom_index
                ))
            })
        };
        let ndim = 2 * lpawu as usize + 1;
        atoms.push(AtomOccupations {
            atom_index,
            lpawu,
            occupations: [occ(3)?, occ(4)?],
            matrices: [
                parse_matrix(field(5), atom_index, ndim)?,
                parse_matrix(field(6), atom_index, ndim)?,
            ],
        });
    }
    if atoms.is_empty() {
        return Err(AbinitError::Output(
            "LDA+U data block holds no per-atom occupation data".to_string(),
        ));
    }
    Ok(atoms)
}

/// [`correlation_matrices_from_output`] over a file on disk.
pub fn read_correlation_matrices<P: AsRef<Path>>(path: P) -> AbinitResult<Vec<AtomOccupations>> {
    let text = fs::read_to_string(path)?;
    correlation_matrices_from_output(&text)
}

/// Concatenated spin-1 occupation matrices, in atom order. This is the
/// value the `dmatpawu` input variable takes for a follow-up run.
pub fn final_dmatpawu(text: &str) -> AbinitResult<Vec<f64>> {
    let atoms = correlation_matrices_from_output(text)?;
    let mut flat = Vec::new();
    for atom in &atoms {
        flat.extend_from_slice(&atom.matrices[0]);
    }
    Ok(flat)
}

/// [`final_dmatpawu`] over a file on disk.
pub fn read_final_dmatpawu<P: AsRef<Path>>(path: P) -> AbinitResult<Vec<f64>> {
    let text = fs::read_to_string(path)?;
    final_dmatpawu(&text)
}
