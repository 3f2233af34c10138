//! Structural metadata pulled out of an input deck.

use nalgebra::Vector3;
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};

use crate::error::{AbinitError, AbinitResult};
use crate::input::InputVariables;

/// Crystal structure as declared by the `natom`/`ntypat`/`typat`/`znucl`
/// family of input variables.
///
/// `acell` defaults to one Bohr per axis and `xred` to the origin when the
/// deck omits them; everything else is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub natom: usize,
    pub ntypat: usize,
    /// Per-atom type index, 1-based as in the deck.
    pub typat: Vec<usize>,
    /// Per-type atomic number.
    pub znucl: Vec<u32>,
    pub acell: [f64; 3],
    /// Reduced coordinates, one vector per atom.
    pub xred: Vec<Vector3<f64>>,
}

impl Structure {
    pub fn from_input(input: &InputVariables) -> AbinitResult<Self> {
        let natom = positive_count(input.get_integer("natom")?, "natom")?;

        let znucl: Vec<u32> = input
            .get_integers("znucl")?
            .into_iter()
            .map(|z| nonnegative_z(z, "znucl"))
            .collect::<AbinitResult<_>>()?;

        let ntypat = match input.has_variable("ntypat") {
            true => positive_count(input.get_integer("ntypat")?, "ntypat")?,
            false => znucl.len(),
        };
        if znucl.len() != ntypat {
            return Err(AbinitError::Parse(format!(
                "znucl holds {} entries, expected ntypat = {}",
                znucl.len(),
                ntypat
            )));
        }

        let typat_raw = input.get_integers("typat")?;
        if typat_raw.len() != natom {
            return Err(AbinitError::Parse(format!(
                "typat holds {} entries, expected natom = {}",
                typat_raw.len(),
                natom
            )));
        }
        let typat: Vec<usize> = typat_raw
            .into_iter()
            .map(|t| {
                if t < 1 || t as usize > ntypat {
                    Err(AbinitError::Parse(format!(
                        "typat entry {} outside 1..={}",
                        t, ntypat
                    )))
                } else {
                    Ok(t as usize)
                }
            })
            .collect::<AbinitResult<_>>()?;

        let acell = match input.get_values("acell") {
            Some(values) if values.len() == 3 => [values[0], values[1], values[2]],
            Some(values) => {
                return Err(AbinitError::Parse(format!(
                    "acell holds {} entries, expected 3",
                    values.len()
                )))
            }
            None => [1.0, 1.0, 1.0],
        };

        let xred = match input.get_values("xred") {
            Some(values) if values.len() == 3 * natom => values
                .chunks_exact(3)
                .map(|c| Vector3::new(c[0], c[1], c[2]))
                .collect(),
            Some(values) => {
                return Err(AbinitError::Parse(format!(
                    "xred holds {} entries, expected 3*natom = {}",
                    values.len(),
                    3 * natom
                )))
            }
            None => vec![Vector3::zeros(); natom],
        };

        Ok(Structure {
            natom,
            ntypat,
            typat,
            znucl,
            acell,
            xred,
        })
    }

    /// Atomic number of atom `i`.
    pub fn atomic_number(&self, i: usize) -> Option<u32> {
        self.typat.get(i).map(|&t| self.znucl[t - 1])
    }

    /// Chemical formula in first-appearance order, e.g. `LaMnO3`.
    pub fn formula(&self) -> String {
        let mut counts: Vec<(u32, usize)> = Vec::new();
        for &t in &self.typat {
            let z = self.znucl[t - 1];
            match counts.iter_mut().find(|(known, _)| *known == z) {
                Some((_, n)) => *n += 1,
                None => counts.push((z, 1)),
            }
        }
        let mut formula = String::new();
        for (z, n) in counts {
            match Element::from_atomic_number(z as usize) {
                Some(element) => formula.push_str(element.get_symbol()),
                None => formula.push_str(&format!("Z{}", z)),
            }
            if n > 1 {
                formula.push_str(&n.to_string());
            }
        }
        formula
    }
}

fn positive_count(v: i64, name: &str) -> AbinitResult<usize> {
    if v < 1 {
        return Err(AbinitError::Parse(format!(
            "variable '{}' must be positive, got {}",
            name, v
        )));
    }
    Ok(v as usize)
}

fn nonnegative_z(v: i64, name: &str) -> AbinitResult<u32> {
    if !(0..=118).contains(&v) {
        return Err(AbinitError::Parse(format!(
            "variable '{}' holds atomic number {} outside 0..=118",
            name, v
        )));
    }
    Ok(v as u32)
}
