//! Spin-configuration cases recognized by the population.
//!
//! ABINIT describes magnetism through three integers: `nsppol` (independent
//! spin polarizations), `nspinor` (spinorial components) and `nspden`
//! (spin-density components). Only five combinations are meaningful for a
//! `dmatpawu` search and each fixes how many occupation matrices a
//! correlated site contributes.

use std::fmt;

use crate::error::{DftuError, DftuResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinPolarization {
    /// nsppol=1, nspinor=1, nspden=1; one matrix per site.
    NonMagnetic,
    /// nsppol=2, nspinor=1, nspden=2; spin-up and spin-down matrices.
    FerromagneticCollinear,
    /// nsppol=1, nspinor=1, nspden=2; one matrix per site.
    AntiferromagneticCollinear,
    /// nsppol=1, nspinor=2, nspden=4; spin-up and spin-down matrices.
    NonCollinear,
    /// nsppol=1, nspinor=2, nspden=1; spin-up and spin-down matrices.
    NonCollinearZeroMagnetization,
}

impl SpinPolarization {
    /// Map the three deck variables onto a supported case. Anything outside
    /// the table is a configuration error, never a guessed default.
    pub fn classify(nsppol: i64, nspinor: i64, nspden: i64) -> DftuResult<Self> {
        match (nsppol, nspinor, nspden) {
            (1, 1, 1) => Ok(Self::NonMagnetic),
            (2, 1, 2) => Ok(Self::FerromagneticCollinear),
            (1, 1, 2) => Ok(Self::AntiferromagneticCollinear),
            (1, 2, 4) => Ok(Self::NonCollinear),
            (1, 2, 1) => Ok(Self::NonCollinearZeroMagnetization),
            _ => Err(DftuError::Configuration(format!(
                "unsupported spin configuration nsppol={} nspinor={} nspden={}",
                nsppol, nspinor, nspden
            ))),
        }
    }

    /// Occupation matrices one correlated site contributes to `dmatpawu`.
    pub fn matrices_per_site(&self) -> usize {
        match self {
            Self::NonMagnetic | Self::AntiferromagneticCollinear => 1,
            Self::FerromagneticCollinear
            | Self::NonCollinear
            | Self::NonCollinearZeroMagnetization => 2,
        }
    }

    /// Total matrix count for `natpawu` correlated sites.
    pub fn nmatrices(&self, natpawu: usize) -> usize {
        self.matrices_per_site() * natpawu
    }
}

impl fmt::Display for SpinPolarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NonMagnetic => "non-magnetic",
            Self::FerromagneticCollinear => "collinear ferromagnetic",
            Self::AntiferromagneticCollinear => "collinear antiferromagnetic",
            Self::NonCollinear => "non-collinear magnetic",
            Self::NonCollinearZeroMagnetization => "non-collinear, zero net magnetization",
        };
        write!(f, "{}", name)
    }
}
