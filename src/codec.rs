//! Transforms between correlation matrices and genome blocks.
//!
//! Encoding diagonalizes a real-symmetric correlation matrix and splits the
//! spectrum into integer occupations plus fractional deltas, with the
//! eigenvector basis kept as the rotation block. Decoding reassembles the
//! matrix as `R diag(e) R^-1`. The rotation sign convention matters: the
//! interpolation operator compares rotation blocks elementwise, so encoding
//! pins every rotation to determinant +1 by mirroring the first eigenvector
//! whenever the eigensolver hands back the other branch.

use nalgebra::{DMatrix, DVector};

use crate::error::{DftuError, DftuResult};
use crate::genome::{Genome, GenomeBlock, GenomeParams};

/// Encode one correlation matrix into a genome block.
///
/// The matrix is assumed symmetric; for a non-symmetric input the
/// eigensolver effectively works on its symmetric part, which is accepted
/// here as an approximation rather than rejected. Eigenvalues are sorted
/// ascending so equal matrices encode to equal blocks. Occupations round
/// half away from zero, so an eigenvalue of exactly 0.5 becomes occupation
/// 1 with delta 0.5.
pub fn encode_matrix(matrix: &DMatrix<f64>, ndim: usize) -> DftuResult<GenomeBlock> {
    if ndim == 0 {
        return Err(DftuError::Shape("ndim must be positive".to_string()));
    }
    if matrix.nrows() != ndim || matrix.ncols() != ndim {
        return Err(DftuError::Shape(format!(
            "correlation matrix is {}x{}, expected {}x{}",
            matrix.nrows(),
            matrix.ncols(),
            ndim,
            ndim
        )));
    }

    let eigen = matrix.clone().symmetric_eigen();

    // nalgebra does not define an eigenvalue order, so sort ascending with
    // the matching column permutation.
    let mut order: Vec<usize> = (0..ndim).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let eigval = DVector::from_fn(ndim, |k, _| eigen.eigenvalues[order[k]]);
    let mut rotation = DMatrix::zeros(ndim, ndim);
    for (k, &src) in order.iter().enumerate() {
        rotation.set_column(k, &eigen.eigenvectors.column(src));
    }

    if rotation.determinant() < 0.0 {
        for v in rotation.column_mut(0).iter_mut() {
            *v = -*v;
        }
    }

    let occupations = DVector::from_fn(ndim, |k, _| eigval[k].round() as i32);
    let deltas = DVector::from_fn(ndim, |k, _| (eigval[k] - eigval[k].round()).abs());
    GenomeBlock::new(occupations, deltas, rotation)
}

/// Decode one genome block back into a correlation matrix.
///
/// With an orthogonal rotation the result is symmetric to numerical
/// precision; callers feeding interpolated, non-orthogonal rotations get
/// whatever `R diag(e) R^-1` yields.
pub fn decode_block(block: &GenomeBlock) -> DftuResult<DMatrix<f64>> {
    let inverse = block.rotation().clone().try_inverse().ok_or_else(|| {
        DftuError::Constraint("rotation matrix is singular, block cannot be decoded".to_string())
    })?;
    let diag = DMatrix::from_diagonal(&block.eigenvalues());
    Ok(block.rotation() * diag * inverse)
}

/// Encode a stack of correlation matrices into one genome.
pub fn matrices_to_genome(matrices: &[DMatrix<f64>], ndim: usize) -> DftuResult<Genome> {
    let blocks = matrices
        .iter()
        .map(|m| encode_matrix(m, ndim))
        .collect::<DftuResult<Vec<_>>>()?;
    Genome::new(blocks)
}

/// Decode every block of a genome into its correlation matrix.
pub fn genome_to_matrices(genome: &Genome) -> DftuResult<Vec<DMatrix<f64>>> {
    genome.blocks().iter().map(decode_block).collect()
}

/// Rebuild the correlation matrices described by flat genome parameters.
pub fn params_to_matrix(params: &GenomeParams, ndim: usize) -> DftuResult<Vec<DMatrix<f64>>> {
    let genome = Genome::from_params(params, ndim)?;
    genome_to_matrices(&genome)
}

/// Encode a flat `dmatpawu` value (concatenated row-major matrices) into
/// flat genome parameters.
pub fn matrix_to_params(dmatpawu: &[f64], ndim: usize) -> DftuResult<GenomeParams> {
    if ndim == 0 {
        return Err(DftuError::Shape("ndim must be positive".to_string()));
    }
    let per_matrix = ndim * ndim;
    if dmatpawu.is_empty() || dmatpawu.len() % per_matrix != 0 {
        return Err(DftuError::Shape(format!(
            "dmatpawu of length {} is not a positive multiple of ndim^2 = {}",
            dmatpawu.len(),
            per_matrix
        )));
    }
    let matrices: Vec<DMatrix<f64>> = dmatpawu
        .chunks_exact(per_matrix)
        .map(|chunk| DMatrix::from_row_slice(ndim, ndim, chunk))
        .collect();
    Ok(matrices_to_genome(&matrices, ndim)?.to_params())
}

/// Flatten a stack of matrices row-major, the layout `dmatpawu` uses.
pub fn flatten_matrices(matrices: &[DMatrix<f64>]) -> Vec<f64> {
    let mut flat = Vec::new();
    for matrix in matrices {
        for row in matrix.row_iter() {
            flat.extend(row.iter().copied());
        }
    }
    flat
}
