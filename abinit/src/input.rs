//! Parser and writer for ABINIT free-format input decks.
//!
//! The covered subset is what the population machinery needs: bare
//! `name value value ...` assignments with `#` or `!` comments, `n*value`
//! repetition shorthand and Fortran `d`/`D` exponent markers. Units
//! keywords and multi-dataset suffixes are not interpreted; they come out
//! as ordinary variable names.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AbinitError, AbinitResult};

/// All variables of one input deck, values stored as `f64` lists.
///
/// Insertion order is preserved so a deck can be written back without
/// shuffling its variables around.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputVariables {
    variables: HashMap<String, Vec<f64>>,
    order: Vec<String>,
}

impl InputVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a deck from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AbinitResult<Self> {
        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Write the deck back to disk in the format produced by [`fmt::Display`].
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> AbinitResult<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// All values of a variable, in deck order.
    pub fn get_values(&self, name: &str) -> Option<&[f64]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    /// Scalar value of a variable. `None` when the variable is absent or
    /// holds more than one value.
    pub fn get_value(&self, name: &str) -> Option<f64> {
        match self.variables.get(name) {
            Some(values) if values.len() == 1 => Some(values[0]),
            _ => None,
        }
    }

    /// Scalar integer variable. Missing variables and non-integral values
    /// are errors.
    pub fn get_integer(&self, name: &str) -> AbinitResult<i64> {
        let values = self
            .get_values(name)
            .ok_or_else(|| AbinitError::MissingVariable(name.to_string()))?;
        if values.len() != 1 {
            return Err(AbinitError::Parse(format!(
                "variable '{}' holds {} values, expected a scalar",
                name,
                values.len()
            )));
        }
        float_to_integer(name, values[0])
    }

    /// Like [`get_integer`](Self::get_integer) but substituting a default
    /// when the variable is absent.
    pub fn get_integer_or(&self, name: &str, default: i64) -> AbinitResult<i64> {
        if self.has_variable(name) {
            self.get_integer(name)
        } else {
            Ok(default)
        }
    }

    /// Integer list variable; every value must be integral.
    pub fn get_integers(&self, name: &str) -> AbinitResult<Vec<i64>> {
        let values = self
            .get_values(name)
            .ok_or_else(|| AbinitError::MissingVariable(name.to_string()))?;
        values
            .iter()
            .map(|&v| float_to_integer(name, v))
            .collect()
    }

    /// Set or replace a variable. New names are appended at the end of the
    /// deck, existing names keep their position.
    pub fn set_value(&mut self, name: &str, values: Vec<f64>) {
        if !self.variables.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.variables.insert(name.to_string(), values);
    }

    /// Variable names in deck order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

fn float_to_integer(name: &str, v: f64) -> AbinitResult<i64> {
    if v.fract() != 0.0 || v.abs() >= 9.0e15 {
        return Err(AbinitError::Parse(format!(
            "variable '{}' holds non-integer value {}",
            name, v
        )));
    }
    Ok(v as i64)
}

/// Truncate a line at the first `#` or `!`.
fn strip_comment(line: &str) -> &str {
    match line.find(|c| c == '#' || c == '!') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Parse one numeric token, expanding `n*value` repetition. The token is
/// already known not to start a variable name.
fn parse_numeric_token(token: &str, lineno: usize) -> AbinitResult<(usize, f64)> {
    let (count, literal) = match token.split_once('*') {
        Some((repeat, value)) => {
            let count = repeat.parse::<usize>().map_err(|_| {
                AbinitError::Parse(format!(
                    "bad repetition count in token '{}' on line {}",
                    token,
                    lineno + 1
                ))
            })?;
            (count, value)
        }
        None => (1, token),
    };
    let value = parse_fortran_float(literal).ok_or_else(|| {
        AbinitError::Parse(format!(
            "cannot parse numeric token '{}' on line {}",
            token,
            lineno + 1
        ))
    })?;
    Ok((count, value))
}

/// Parse a float accepting Fortran `d`/`D` exponent markers.
fn parse_fortran_float(token: &str) -> Option<f64> {
    let normalized = token.replace(['d', 'D'], "e");
    normalized.parse::<f64>().ok()
}

impl FromStr for InputVariables {
    type Err = AbinitError;

    fn from_str(s: &str) -> AbinitResult<Self> {
        let mut input = InputVariables::new();
        let mut current: Option<String> = None;

        for (lineno, raw) in s.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            for token in line.split_whitespace() {
                let starts_name = token
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_alphabetic())
                    .unwrap_or(false);
                if starts_name {
                    if input.variables.contains_key(token) {
                        return Err(AbinitError::Parse(format!(
                            "variable '{}' defined twice, second time on line {}",
                            token,
                            lineno + 1
                        )));
                    }
                    input.order.push(token.to_string());
                    input.variables.insert(token.to_string(), Vec::new());
                    current = Some(token.to_string());
                } else {
                    let name = current.as_ref().ok_or_else(|| {
                        AbinitError::Parse(format!(
                            "value '{}' on line {} precedes any variable name",
                            token,
                            lineno + 1
                        ))
                    })?;
                    let (count, value) = parse_numeric_token(token, lineno)?;
                    if let Some(values) = input.variables.get_mut(name) {
                        values.extend(std::iter::repeat(value).take(count));
                    }
                }
            }
        }
        Ok(input)
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

impl fmt::Display for InputVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.order {
            let Some(values) = self.variables.get(name) else {
                continue;
            };
            if values.len() <= 3 {
                let joined: Vec<String> = values.iter().map(|&v| format_value(v)).collect();
                writeln!(f, "{} {}", name, joined.join(" "))?;
            } else {
                writeln!(f, "{}", name)?;
                for chunk in values.chunks(3) {
                    let joined: Vec<String> = chunk.iter().map(|&v| format_value(v)).collect();
                    writeln!(f, "  {}", joined.join(" "))?;
                }
            }
        }
        Ok(())
    }
}
