//! Genome representation of correlation matrices.
//!
//! One correlation matrix is carried as a rotation matrix (its eigenvector
//! basis), integer occupations and fractional deltas. A full genome is one
//! such block per correlated matrix in the `dmatpawu` variable.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{DftuError, DftuResult};

/// Encoded form of one correlation matrix.
///
/// For a block in canonical form the occupations are 0 or 1, the deltas lie
/// in `[0, 0.5)` and the rotation is an element of SO(ndim). The constructor
/// checks shapes only; the value ranges are established by the generator and
/// the codec, with the single exception of eigenvalues exactly halfway
/// between integers, which land on a delta of 0.5.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeBlock {
    occupations: DVector<i32>,
    deltas: DVector<f64>,
    rotation: DMatrix<f64>,
}

impl GenomeBlock {
    pub fn new(
        occupations: DVector<i32>,
        deltas: DVector<f64>,
        rotation: DMatrix<f64>,
    ) -> DftuResult<Self> {
        if rotation.nrows() != rotation.ncols() {
            return Err(DftuError::Shape(format!(
                "rotation matrix is {}x{}, expected square",
                rotation.nrows(),
                rotation.ncols()
            )));
        }
        let ndim = rotation.nrows();
        if occupations.len() != ndim || deltas.len() != ndim {
            return Err(DftuError::Shape(format!(
                "occupations ({}) and deltas ({}) must both have length ndim = {}",
                occupations.len(),
                deltas.len(),
                ndim
            )));
        }
        Ok(GenomeBlock {
            occupations,
            deltas,
            rotation,
        })
    }

    pub fn ndim(&self) -> usize {
        self.rotation.nrows()
    }

    pub fn occupations(&self) -> &DVector<i32> {
        &self.occupations
    }

    pub fn deltas(&self) -> &DVector<f64> {
        &self.deltas
    }

    pub fn rotation(&self) -> &DMatrix<f64> {
        &self.rotation
    }

    /// Continuous eigenvalues reconstructed from occupations and deltas.
    /// A delta is added to an occupation of 0 and subtracted from anything
    /// else, so occupied orbitals relax downwards and empty ones upwards.
    pub fn eigenvalues(&self) -> DVector<f64> {
        DVector::from_fn(self.ndim(), |k, _| {
            let occ = self.occupations[k] as f64;
            if self.occupations[k] == 0 {
                occ + self.deltas[k]
            } else {
                occ - self.deltas[k]
            }
        })
    }

    /// Total integer electron count of the block.
    pub fn electron_count(&self) -> i32 {
        self.occupations.iter().sum()
    }
}

/// Ordered stack of genome blocks, all of the same dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    blocks: Vec<GenomeBlock>,
}

impl Genome {
    pub fn new(blocks: Vec<GenomeBlock>) -> DftuResult<Self> {
        let ndim = match blocks.first() {
            Some(block) => block.ndim(),
            None => {
                return Err(DftuError::Shape("genome holds no blocks".to_string()));
            }
        };
        if let Some(block) = blocks.iter().find(|b| b.ndim() != ndim) {
            return Err(DftuError::Shape(format!(
                "genome mixes block dimensions {} and {}",
                ndim,
                block.ndim()
            )));
        }
        Ok(Genome { blocks })
    }

    pub fn ndim(&self) -> usize {
        self.blocks[0].ndim()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[GenomeBlock] {
        &self.blocks
    }

    /// Flatten into the persisted parameter form. Matrices flatten row by
    /// row, matching the layout of `dmatpawu` in an input deck.
    pub fn to_params(&self) -> GenomeParams {
        let ndim = self.ndim();
        let mut params = GenomeParams {
            rotations: Vec::with_capacity(self.len() * ndim * ndim),
            occupations: Vec::with_capacity(self.len() * ndim),
            deltas: Vec::with_capacity(self.len() * ndim),
        };
        for block in &self.blocks {
            for row in block.rotation().row_iter() {
                params.rotations.extend(row.iter().copied());
            }
            params.occupations.extend(block.occupations().iter().copied());
            params.deltas.extend(block.deltas().iter().copied());
        }
        params
    }

    /// Rebuild the typed form from flat parameters.
    pub fn from_params(params: &GenomeParams, ndim: usize) -> DftuResult<Self> {
        let nblocks = params.nblocks(ndim)?;
        let mut blocks = Vec::with_capacity(nblocks);
        for i in 0..nblocks {
            let occ = &params.occupations[i * ndim..(i + 1) * ndim];
            let deltas = &params.deltas[i * ndim..(i + 1) * ndim];
            let rot = &params.rotations[i * ndim * ndim..(i + 1) * ndim * ndim];
            blocks.push(GenomeBlock::new(
                DVector::from_row_slice(occ),
                DVector::from_row_slice(deltas),
                DMatrix::from_row_slice(ndim, ndim, rot),
            )?);
        }
        Genome::new(blocks)
    }
}

/// Flat persisted form of a genome: the `R`, `O` and `D` property lists of
/// a stored candidate entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeParams {
    #[serde(rename = "R")]
    pub rotations: Vec<f64>,
    #[serde(rename = "O")]
    pub occupations: Vec<i32>,
    #[serde(rename = "D")]
    pub deltas: Vec<f64>,
}

impl GenomeParams {
    /// Number of blocks the flat lists describe for a given dimension.
    /// All three lists must agree, otherwise this is a shape error.
    pub fn nblocks(&self, ndim: usize) -> DftuResult<usize> {
        if ndim == 0 {
            return Err(DftuError::Shape("ndim must be positive".to_string()));
        }
        let per_matrix = ndim * ndim;
        if self.rotations.len() % per_matrix != 0 {
            return Err(DftuError::Shape(format!(
                "rotation list of length {} is not a multiple of ndim^2 = {}",
                self.rotations.len(),
                per_matrix
            )));
        }
        let nblocks = self.rotations.len() / per_matrix;
        if self.occupations.len() != nblocks * ndim || self.deltas.len() != nblocks * ndim {
            return Err(DftuError::Shape(format!(
                "occupation list ({}) and delta list ({}) must both have length {} for {} blocks",
                self.occupations.len(),
                self.deltas.len(),
                nblocks * ndim,
                nblocks
            )));
        }
        if nblocks == 0 {
            return Err(DftuError::Shape("parameter lists are empty".to_string()));
        }
        Ok(nblocks)
    }
}
