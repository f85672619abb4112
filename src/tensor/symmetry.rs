//! Symmetry tags relating adjacent tensor dimensions.
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Symmetry relation between dimension `i` and dimension `i + 1`.
///
/// A symmetric matrix is described by `[SY, NS]`; a tensor symmetric in its
/// first three dimensions by `[SY, SY, NS, ...]`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sym {
    /// No symmetry.
    #[default]
    NS,
    /// Symmetric.
    SY,
    /// Antisymmetric.
    AS,
    /// Symmetric with a zero diagonal.
    SH,
}

impl Sym {
    /// Whether this tag relates its dimension to the next one.
    #[inline]
    pub fn is_symmetric(self) -> bool {
        self != Sym::NS
    }
}

/// Checks that symmetry tags only link dimensions of equal length and that
/// the last dimension carries no tag.
pub(crate) fn validate(len: &[usize], sym: &[Sym]) -> Result<()> {
    if len.len() != sym.len() {
        return Err(Error::ShapeMismatch {
            expected: len.len(),
            got: sym.len(),
        });
    }
    for (position, tag) in sym.iter().enumerate() {
        if !tag.is_symmetric() {
            continue;
        }
        if position + 1 == len.len() {
            return Err(Error::InvalidSymmetry {
                position,
                reason: format!("{tag:?} on the last dimension has no partner"),
            });
        }
        if len[position] != len[position + 1] {
            return Err(Error::InvalidSymmetry {
                position,
                reason: format!(
                    "{tag:?} links dimensions of length {} and {}",
                    len[position],
                    len[position + 1]
                ),
            });
        }
    }
    Ok(())
}

/// Returns the maximal runs of dimensions linked by symmetry tags. Every run
/// spans at least two dimensions.
///
/// # Examples
/// ```
/// # use cyclops::tensor::symmetry::{symmetric_runs, Sym};
/// let runs = symmetric_runs(&[Sym::NS, Sym::SY, Sym::SY, Sym::NS, Sym::AS, Sym::NS]);
/// assert_eq!(runs, vec![1..4, 4..6]);
/// ```
pub fn symmetric_runs(sym: &[Sym]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (position, tag) in sym.iter().enumerate() {
        match (tag.is_symmetric(), start) {
            (true, None) => start = Some(position),
            (false, Some(first)) => {
                runs.push(first..position + 1);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(first) = start {
        runs.push(first..sym.len());
    }
    runs
}
