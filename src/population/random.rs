//! Random genome generation under connection constraints.

use std::collections::HashMap;

use itertools::Itertools;
use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::error::{DftuError, DftuResult};
use crate::genome::{Genome, GenomeBlock};

/// Enumerate every {0,1} occupation vector of length `ndim` with exactly
/// `nelect` ones. The list has `C(ndim, nelect)` members, small for the
/// dimensions that occur here (5 or 7).
pub fn occupation_vectors(ndim: usize, nelect: usize) -> DftuResult<Vec<DVector<i32>>> {
    if nelect > ndim {
        return Err(DftuError::Constraint(format!(
            "electron target {} exceeds the matrix dimension {}",
            nelect, ndim
        )));
    }
    Ok((0..ndim)
        .combinations(nelect)
        .map(|ones| {
            let mut v = DVector::zeros(ndim);
            for k in ones {
                v[k] = 1;
            }
            v
        })
        .collect())
}

/// Draw a rotation uniformly from SO(ndim): QR of a Gaussian matrix, with
/// the Q columns sign-fixed against the R diagonal so the distribution is
/// Haar, then the determinant mirrored to +1 on the first column. The
/// mirror matches the branch the codec picks when it encodes a matrix.
pub fn random_rotation<R: Rng + ?Sized>(ndim: usize, rng: &mut R) -> DMatrix<f64> {
    let gaussian = DMatrix::<f64>::from_fn(ndim, ndim, |_, _| rng.sample(StandardNormal));
    let qr = gaussian.qr();
    let r = qr.r();
    let mut q = qr.q();
    for k in 0..ndim {
        if r[(k, k)] < 0.0 {
            for v in q.column_mut(k).iter_mut() {
                *v = -*v;
            }
        }
    }
    if q.determinant() < 0.0 {
        for v in q.column_mut(0).iter_mut() {
            *v = -*v;
        }
    }
    q
}

/// One fresh block: occupations drawn uniformly among the exact
/// enumeration for the electron target, zero deltas, random rotation.
pub fn random_block<R: Rng + ?Sized>(
    ndim: usize,
    nelect: usize,
    rng: &mut R,
) -> DftuResult<GenomeBlock> {
    let choices = occupation_vectors(ndim, nelect)?;
    let occupations = choices
        .choose(rng)
        .cloned()
        .ok_or_else(|| DftuError::Constraint("no occupation vector to draw from".to_string()))?;
    GenomeBlock::new(occupations, DVector::zeros(ndim), random_rotation(ndim, rng))
}

/// Generate a full genome in one pass. The first index carrying a
/// connection tag draws a fresh block; every later index with the same tag
/// copies that block verbatim, which is what keeps connected blocks
/// identical rather than merely equal in distribution. Blocks connected to
/// an earlier index inherit its electron target.
pub fn random_genome<R: Rng + ?Sized>(
    ndim: usize,
    connections: &[i64],
    num_electrons_spin: &[usize],
    rng: &mut R,
) -> DftuResult<Genome> {
    if connections.len() != num_electrons_spin.len() {
        return Err(DftuError::Constraint(format!(
            "{} connections against {} electron targets",
            connections.len(),
            num_electrons_spin.len()
        )));
    }
    let mut first_seen: HashMap<i64, usize> = HashMap::new();
    let mut blocks: Vec<GenomeBlock> = Vec::with_capacity(connections.len());
    for (i, &tag) in connections.iter().enumerate() {
        match first_seen.get(&tag) {
            Some(&earliest) => {
                let copy = blocks[earliest].clone();
                blocks.push(copy);
            }
            None => {
                first_seen.insert(tag, i);
                blocks.push(random_block(ndim, num_electrons_spin[i], rng)?);
            }
        }
    }
    Genome::new(blocks)
}
