//! Index matching and the dense evaluation loop behind the tensor primitives.
//!
//! A [`Plan`] resolves the label strings of the operands and the destination
//! into strides: every distinct label gets one length, and every tensor gets
//! the stride of each label in its own column-major storage. Labels that occur
//! in the destination are iterated over the output space, all other labels
//! are summed over.

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::algebra::Semiring;
use crate::error::{Error, Result};

/// Edge lengths and labels of one tensor taking part in a primitive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Binding<'a> {
    pub len: &'a [usize],
    pub labels: &'a [char],
}

/// Column-major strides for the given edge lengths.
pub(crate) fn strides(len: &[usize]) -> Vec<usize> {
    let mut stride = 1;
    len.iter()
        .map(|l| {
            let current = stride;
            stride *= l;
            current
        })
        .collect()
}

/// Splits a label string into characters and checks it against the rank of
/// the tensor it is attached to.
pub(crate) fn parse_labels(labels: &str, ndim: usize) -> Result<Vec<char>> {
    let parsed = labels.chars().collect_vec();
    check_labels(&parsed, ndim)?;
    Ok(parsed)
}

/// Checks that `labels` has one entry per dimension and no repetitions.
pub(crate) fn check_labels(labels: &[char], ndim: usize) -> Result<()> {
    if labels.len() != ndim {
        return Err(Error::ShapeMismatch {
            expected: ndim,
            got: labels.len(),
        });
    }
    if let Some(label) = labels.iter().duplicates().next() {
        return Err(Error::RepeatedIndex {
            label: *label,
            labels: labels.iter().collect(),
        });
    }
    Ok(())
}

/// Iterates over all multi-indices of a box with the given edge lengths. A
/// zero-dimensional box contains exactly one (empty) index.
fn index_space(len: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let scalar = len.is_empty();
    let product = len
        .iter()
        .map(|l| 0..*l)
        .multi_cartesian_product()
        .filter(move |_| !scalar);
    std::iter::once(Vec::new())
        .filter(move |_| scalar)
        .chain(product)
}

/// Linear offset of a multi-index.
fn offset(index: &[usize], strides: &[usize]) -> usize {
    index.iter().zip(strides).map(|(i, s)| i * s).sum()
}

/// Strides of `labels` within the storage of `binding`; 0 for labels the
/// tensor does not carry.
fn label_strides(binding: &Binding<'_>, labels: &[char]) -> Vec<usize> {
    let own = strides(binding.len);
    labels
        .iter()
        .map(|label| {
            binding
                .labels
                .iter()
                .position(|l| l == label)
                .map_or(0, |dim| own[dim])
        })
        .collect()
}

/// Resolved index correspondence of a primitive call.
#[derive(Debug)]
pub(crate) struct Plan {
    /// Lengths of the destination labels, in destination order.
    output_len: Vec<usize>,
    /// Strides of the destination labels within the destination.
    output_strides: Vec<usize>,
    /// Lengths of the summed labels.
    summed_len: Vec<usize>,
    /// Per operand: strides of the destination labels (0 if absent).
    operand_output_strides: Vec<Vec<usize>>,
    /// Per operand: strides of the summed labels (0 if absent).
    operand_summed_strides: Vec<Vec<usize>>,
}

impl Plan {
    /// Matches the labels of `operands` against `output`.
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`] if a label string does not match its tensor's rank
    /// - [`Error::RepeatedIndex`] if a label repeats within one tensor
    /// - [`Error::DimensionMismatch`] if a label is bound to different lengths
    /// - [`Error::UnboundFreeIndex`] if an output label is bound by no operand
    pub fn new(output: Binding<'_>, operands: &[Binding<'_>]) -> Result<Self> {
        check_labels(output.labels, output.len.len())?;
        for operand in operands {
            check_labels(operand.labels, operand.len.len())?;
        }

        let mut lengths = FxHashMap::default();
        let mut summed = Vec::new();
        for operand in operands {
            for (label, len) in operand.labels.iter().zip(operand.len) {
                match lengths.get(label) {
                    Some(&expected) if expected != *len => {
                        return Err(Error::DimensionMismatch {
                            label: *label,
                            expected,
                            got: *len,
                        })
                    }
                    Some(_) => {}
                    None => {
                        lengths.insert(*label, *len);
                        if !output.labels.contains(label) {
                            summed.push(*label);
                        }
                    }
                }
            }
        }
        for (label, len) in output.labels.iter().zip(output.len) {
            match lengths.get(label) {
                None => return Err(Error::UnboundFreeIndex { label: *label }),
                Some(&expected) if expected != *len => {
                    return Err(Error::DimensionMismatch {
                        label: *label,
                        expected,
                        got: *len,
                    })
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            output_len: output.len.to_vec(),
            output_strides: strides(output.len),
            summed_len: summed.iter().map(|l| lengths[l]).collect(),
            operand_output_strides: operands
                .iter()
                .map(|op| label_strides(op, output.labels))
                .collect(),
            operand_summed_strides: operands
                .iter()
                .map(|op| label_strides(op, &summed))
                .collect(),
        })
    }

    /// Number of elements of the destination.
    pub fn output_size(&self) -> usize {
        self.output_len.iter().product()
    }

    /// Computes `sum over summed labels of prod(operands)` for every element
    /// of the destination, in the destination's storage order.
    pub fn evaluate<S: Semiring>(&self, operands: &[&[S::Scalar]]) -> Vec<S::Scalar> {
        assert_eq!(
            operands.len(),
            self.operand_output_strides.len(),
            "Plan was built for a different number of operands"
        );

        // Offsets of the summed space are identical for every output element.
        let summed_offsets = index_space(&self.summed_len)
            .map(|index| {
                self.operand_summed_strides
                    .iter()
                    .map(|strides| offset(&index, strides))
                    .collect_vec()
            })
            .collect_vec();

        let mut result = vec![S::zero(); self.output_size()];
        for index in index_space(&self.output_len) {
            let bases = self
                .operand_output_strides
                .iter()
                .map(|strides| offset(&index, strides))
                .collect_vec();
            let mut acc = S::zero();
            for inner in &summed_offsets {
                let product = operands
                    .iter()
                    .zip(&bases)
                    .zip(inner)
                    .fold(S::one(), |prod, ((data, base), off)| {
                        S::mul(prod, data[base + off])
                    });
                acc = S::add(acc, product);
            }
            result[offset(&index, &self.output_strides)] = acc;
        }
        result
    }
}

/// Folds a computed `result` into `destination` as
/// `destination = beta * destination + alpha * result`. A zero `beta`
/// overwrites without reading the previous content.
pub(crate) fn accumulate<S: Semiring>(
    destination: &mut [S::Scalar],
    alpha: S::Scalar,
    result: &[S::Scalar],
    beta: S::Scalar,
) {
    assert_eq!(destination.len(), result.len());
    let overwrite = S::is_zero(beta);
    for (dest, value) in destination.iter_mut().zip(result) {
        let scaled = S::mul(alpha, *value);
        *dest = if overwrite {
            scaled
        } else {
            S::add(S::mul(beta, *dest), scaled)
        };
    }
}
