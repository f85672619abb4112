//! Tensors placed on a [`World`] and the three primitives the expression
//! engine lowers to: [`Tensor::sum`], [`Tensor::contract`] and [`Tensor::scale`].
//!
//! Tensor data is stored densely and replicated on every process of the
//! world. Elements are addressed by global index: the element `(i, j, k, l)`
//! of a tensor with edge lengths `{m, n, p, q}` has global index
//! `i + j*m + k*m*n + l*m*n*p` (column-major).
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use float_cmp::{ApproxEq, F64Margin};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::algebra::{Scalar, Semiring, Standard};
use crate::error::{Error, Result};
use crate::expression::{IndexedView, SparseView};
use crate::world::World;

pub(crate) mod kernel;
pub mod symmetry;

pub use symmetry::Sym;

use kernel::{Binding, Plan};

/// Norms computed by [`Tensor::norm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Norm {
    /// Sum of absolute values.
    L1,
    /// Frobenius norm.
    L2,
    /// Largest absolute value.
    MaxAbs,
}

struct TensorInner<S: Semiring> {
    id: usize,
    name: RefCell<Option<String>>,
    len: Vec<usize>,
    sym: Vec<Sym>,
    world: World,
    data: RefCell<Vec<S::Scalar>>,
}

/// A dense, possibly symmetric tensor living on a [`World`].
///
/// `Tensor` is a handle: cloning it yields another handle to the same tensor,
/// and mutating operations take `&self`. Every process of the world holds the
/// full data and performs the same operations on it. At most one expression
/// may write to a tensor at a time.
pub struct Tensor<S: Semiring = Standard<f64>> {
    inner: Rc<TensorInner<S>>,
}

impl<S: Semiring> Tensor<S> {
    /// Creates a zero-filled tensor with edge lengths `len` and symmetry tags
    /// `sym` on `world`.
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`] if `len` and `sym` differ in length
    /// - [`Error::InvalidShape`] if an edge length is zero or the element
    ///   count does not fit in `usize`
    /// - [`Error::InvalidSymmetry`] if a tag links dimensions of different
    ///   length or sits on the last dimension
    ///
    /// # Examples
    /// ```
    /// # use cyclops::{tensor::{Sym, Tensor}, world::World};
    /// let world = World::local();
    /// let t: Tensor = Tensor::new(&[3, 3, 2], &[Sym::SY, Sym::NS, Sym::NS], &world).unwrap();
    /// assert_eq!(t.ndim(), 3);
    /// assert_eq!(t.size(), 18);
    /// ```
    pub fn new(len: &[usize], sym: &[Sym], world: &World) -> Result<Self> {
        symmetry::validate(len, sym)?;
        if len.contains(&0) {
            return Err(Error::InvalidShape {
                len: len.to_vec(),
                reason: "edge lengths must be positive".into(),
            });
        }
        if len
            .iter()
            .try_fold(1usize, |size, l| size.checked_mul(*l))
            .is_none()
        {
            return Err(Error::InvalidShape {
                len: len.to_vec(),
                reason: "element count overflows usize".into(),
            });
        }
        Ok(Self::from_parts(len.to_vec(), sym.to_vec(), world))
    }

    /// Like [`Tensor::new`], but with a name used in diagnostics.
    pub fn named(len: &[usize], sym: &[Sym], world: &World, name: &str) -> Result<Self> {
        let tensor = Self::new(len, sym, world)?;
        tensor.set_name(name);
        Ok(tensor)
    }

    /// Creates a `nrow` x `ncol` matrix. `sym` relates rows and columns.
    pub fn matrix(nrow: usize, ncol: usize, sym: Sym, world: &World) -> Result<Self> {
        Self::new(&[nrow, ncol], &[sym, Sym::NS], world)
    }

    /// Creates a vector of length `len`.
    pub fn vector(len: usize, world: &World) -> Result<Self> {
        Self::new(&[len], &[Sym::NS], world)
    }

    /// Creates a zero-dimensional tensor holding `value`. Scalars take part in
    /// expressions with the empty index map `""`.
    pub fn scalar(value: S::Scalar, world: &World) -> Self {
        let tensor = Self::from_parts(Vec::new(), Vec::new(), world);
        tensor.inner.data.borrow_mut()[0] = value;
        tensor
    }

    fn from_parts(len: Vec<usize>, sym: Vec<Sym>, world: &World) -> Self {
        let size = len.iter().product();
        let id = world.next_tensor_id();
        debug!(id, world = world.id(), size; "Created tensor");
        Self {
            inner: Rc::new(TensorInner {
                id,
                name: RefCell::new(None),
                len,
                sym,
                world: world.clone(),
                data: RefCell::new(vec![S::zero(); size]),
            }),
        }
    }

    /// Creates a zero-filled tensor with the same shape, symmetry and world.
    pub fn zeros_like(&self) -> Self {
        Self::from_parts(self.inner.len.clone(), self.inner.sym.clone(), self.world())
    }

    /// Creates a new tensor with the same characteristics and a copy of the
    /// data.
    pub fn duplicate(&self) -> Self {
        let copy = self.zeros_like();
        copy.inner
            .data
            .borrow_mut()
            .copy_from_slice(&self.inner.data.borrow());
        copy
    }

    /// Creates a zero-filled tensor with the same characteristics on a
    /// different world.
    pub fn on_world(&self, world: &World) -> Self {
        Self::from_parts(self.inner.len.clone(), self.inner.sym.clone(), world)
    }

    /// Identifier of this tensor, unique within its world.
    #[inline]
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// The diagnostic name, if one was set.
    pub fn name(&self) -> Option<String> {
        self.inner.name.borrow().clone()
    }

    /// Sets the diagnostic name.
    pub fn set_name(&self, name: &str) {
        *self.inner.name.borrow_mut() = Some(name.to_owned());
    }

    /// Number of dimensions.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.inner.len.len()
    }

    /// Edge lengths.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.inner.len
    }

    /// Symmetry tags, one per dimension.
    #[inline]
    pub fn symmetry(&self) -> &[Sym] {
        &self.inner.sym
    }

    /// The world this tensor is placed on.
    #[inline]
    pub fn world(&self) -> &World {
        &self.inner.world
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.inner.len.iter().product()
    }

    /// Whether `self` and `other` are handles to the same tensor.
    #[inline]
    pub fn same_tensor(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attaches the index labels `labels` to this tensor, one character per
    /// dimension, for use in an expression.
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`] if the number of labels differs from [`Tensor::ndim`]
    /// - [`Error::RepeatedIndex`] if a label occurs twice
    pub fn idx(&self, labels: &str) -> Result<IndexedView<S>> {
        IndexedView::new(self, labels)
    }

    /// Selects the elements at the global indices `keys` for scattered
    /// reads and writes.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfBounds`] if a key lies outside the tensor.
    pub fn at(&self, keys: Vec<i64>) -> Result<SparseView<S>> {
        SparseView::new(self, keys)
    }

    /// Converts a multi-index into a global index.
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`] if `index` has the wrong number of entries
    /// - [`Error::EntryOutOfBounds`] if an entry exceeds its edge length
    pub fn global_index(&self, index: &[usize]) -> Result<i64> {
        if index.len() != self.ndim() {
            return Err(Error::ShapeMismatch {
                expected: self.ndim(),
                got: index.len(),
            });
        }
        let strides = kernel::strides(self.shape());
        let mut key = 0;
        for (dim, ((i, len), stride)) in index.iter().zip(self.shape()).zip(strides).enumerate() {
            if i >= len {
                return Err(Error::EntryOutOfBounds {
                    dim,
                    entry: *i,
                    len: *len,
                });
            }
            key += i * stride;
        }
        Ok(key as i64)
    }

    /// Converts a global index into a multi-index.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfBounds`] if `key` lies outside the tensor.
    pub fn multi_index(&self, key: i64) -> Result<Vec<usize>> {
        let mut rest = self.check_key(key)?;
        Ok(self
            .shape()
            .iter()
            .map(|len| {
                let i = rest % len;
                rest /= len;
                i
            })
            .collect())
    }

    fn check_key(&self, key: i64) -> Result<usize> {
        usize::try_from(key)
            .ok()
            .filter(|k| *k < self.size())
            .ok_or(Error::IndexOutOfBounds {
                key,
                size: self.size(),
            })
    }

    fn check_keys(&self, keys: &[i64]) -> Result<Vec<usize>> {
        keys.iter().map(|key| self.check_key(*key)).collect()
    }

    /// Reads the elements at the global indices `keys`.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfBounds`] if a key lies outside the tensor.
    pub fn read(&self, keys: &[i64]) -> Result<Vec<S::Scalar>> {
        let mut values = vec![S::zero(); keys.len()];
        self.read_scaled(S::one(), S::zero(), keys, &mut values)?;
        Ok(values)
    }

    /// Sparse read: `values[j] = alpha * self[keys[j]] + beta * values[j]`.
    ///
    /// # Errors
    /// - [`Error::ValueCountMismatch`] if `values` and `keys` differ in length
    /// - [`Error::IndexOutOfBounds`] if a key lies outside the tensor
    pub fn read_scaled(
        &self,
        alpha: S::Scalar,
        beta: S::Scalar,
        keys: &[i64],
        values: &mut [S::Scalar],
    ) -> Result<()> {
        if keys.len() != values.len() {
            return Err(Error::ValueCountMismatch {
                expected: keys.len(),
                got: values.len(),
            });
        }
        let positions = self.check_keys(keys)?;
        let data = self.inner.data.borrow();
        let gathered = positions.iter().map(|p| data[*p]).collect_vec();
        kernel::accumulate::<S>(values, alpha, &gathered, beta);
        Ok(())
    }

    /// Writes `values` to the global indices `keys`, overwriting the previous
    /// content. Values for a key listed more than once are added up.
    ///
    /// # Errors
    /// See [`Tensor::write_scaled`].
    pub fn write(&self, keys: &[i64], values: &[S::Scalar]) -> Result<()> {
        self.write_scaled(S::one(), S::zero(), keys, values)
    }

    /// Sparse write: `self[keys[j]] = beta * self[keys[j]] + alpha * values[j]`.
    ///
    /// A key listed more than once has `beta` applied once and receives the
    /// sum of all its scaled values.
    ///
    /// # Errors
    /// - [`Error::ValueCountMismatch`] if `values` and `keys` differ in length
    /// - [`Error::IndexOutOfBounds`] if a key lies outside the tensor
    pub fn write_scaled(
        &self,
        alpha: S::Scalar,
        beta: S::Scalar,
        keys: &[i64],
        values: &[S::Scalar],
    ) -> Result<()> {
        if keys.len() != values.len() {
            return Err(Error::ValueCountMismatch {
                expected: keys.len(),
                got: values.len(),
            });
        }
        let positions = self.check_keys(keys)?;
        debug!(tensor = self.id(), count = keys.len(); "Writing sparse values");
        let mut data = self.inner.data.borrow_mut();
        let overwrite = S::is_zero(beta);
        for position in positions.iter().unique() {
            data[*position] = if overwrite {
                S::zero()
            } else {
                S::mul(beta, data[*position])
            };
        }
        for (position, value) in positions.iter().zip(values) {
            data[*position] = S::add(data[*position], S::mul(alpha, *value));
        }
        Ok(())
    }

    /// Returns a copy of all elements in global index order.
    pub fn read_all(&self) -> Vec<S::Scalar> {
        self.inner.data.borrow().clone()
    }

    /// The global indices assigned to the calling process. Elements are dealt
    /// out cyclically over the ranks of the world; processes outside the world
    /// own nothing.
    pub fn local_keys(&self) -> Vec<i64> {
        let Some(position) = self.world().position() else {
            return Vec::new();
        };
        (position..self.size())
            .step_by(self.world().size())
            .map(|key| key as i64)
            .collect()
    }

    /// The `(global index, value)` pairs assigned to the calling process.
    pub fn read_local(&self) -> Vec<(i64, S::Scalar)> {
        let data = self.inner.data.borrow();
        self.local_keys()
            .into_iter()
            .map(|key| (key, data[key as usize]))
            .collect()
    }

    /// Overwrites all elements with `values`, given in global index order.
    ///
    /// # Errors
    /// Returns [`Error::ValueCountMismatch`] if `values` does not hold exactly
    /// [`Tensor::size`] elements.
    pub fn set_from_slice(&self, values: &[S::Scalar]) -> Result<()> {
        if values.len() != self.size() {
            return Err(Error::ValueCountMismatch {
                expected: self.size(),
                got: values.len(),
            });
        }
        self.inner.data.borrow_mut().copy_from_slice(values);
        Ok(())
    }

    /// Sets every element to `value`.
    pub fn fill(&self, value: S::Scalar) {
        self.inner.data.borrow_mut().fill(value);
    }

    /// The value of a zero-rank tensor.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] unless the tensor has no dimensions.
    pub fn value(&self) -> Result<S::Scalar> {
        self.require_scalar()?;
        Ok(self.inner.data.borrow()[0])
    }

    /// Overwrites the value of a zero-rank tensor.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] unless the tensor has no dimensions.
    pub fn set_value(&self, value: S::Scalar) -> Result<()> {
        self.require_scalar()?;
        self.inner.data.borrow_mut()[0] = value;
        Ok(())
    }

    fn require_scalar(&self) -> Result<()> {
        if self.ndim() == 0 {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                expected: 0,
                got: self.ndim(),
            })
        }
    }

    /// The `n` elements of largest magnitude, largest first. Fewer are returned
    /// if the tensor holds fewer than `n` elements.
    pub fn max_abs(&self, n: usize) -> Vec<S::Scalar> {
        self.inner
            .data
            .borrow()
            .iter()
            .copied()
            .sorted_by(|a, b| b.magnitude().total_cmp(&a.magnitude()))
            .take(n)
            .collect()
    }

    /// Semiring sum of all elements.
    pub fn sum_all(&self) -> S::Scalar {
        self.inner
            .data
            .borrow()
            .iter()
            .fold(S::zero(), |acc, x| S::add(acc, *x))
    }

    /// Computes the requested norm of the elements.
    pub fn norm(&self, norm: Norm) -> f64 {
        let data = self.inner.data.borrow();
        let magnitudes = data.iter().map(|x| x.magnitude());
        match norm {
            Norm::L1 => magnitudes.sum(),
            Norm::L2 => magnitudes.map(|m| m * m).sum::<f64>().sqrt(),
            Norm::MaxAbs => magnitudes.fold(0.0, f64::max),
        }
    }

    fn require_same_world(&self, operand: &Self) -> Result<()> {
        if operand.world() == self.world() {
            Ok(())
        } else {
            Err(Error::WorldMismatch {
                expected: self.world().id(),
                got: operand.world().id(),
            })
        }
    }

    /// Sum: `self[idx_b] = beta * self[idx_b] + alpha * a[idx_a]`.
    ///
    /// Labels of `idx_a` missing from `idx_b` are summed over; labels may be
    /// permuted between the two index maps.
    ///
    /// # Errors
    /// - [`Error::WorldMismatch`] if `a` lives on another world
    /// - the label errors of [`Tensor::contract`]
    ///
    /// # Examples
    /// ```
    /// # use cyclops::{tensor::Tensor, world::World};
    /// let world = World::local();
    /// let a: Tensor = Tensor::matrix(2, 2, Default::default(), &world).unwrap();
    /// a.set_from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    /// let b: Tensor = a.zeros_like();
    /// b.sum(1.0, &a, "ij", 0.0, "ji").unwrap();
    /// assert_eq!(b.read_all(), vec![1.0, 3.0, 2.0, 4.0]);
    /// ```
    pub fn sum(
        &self,
        alpha: S::Scalar,
        a: &Self,
        idx_a: &str,
        beta: S::Scalar,
        idx_b: &str,
    ) -> Result<()> {
        let labels_a = idx_a.chars().collect_vec();
        let labels_b = idx_b.chars().collect_vec();
        let plan = self.sum_plan(a, &labels_a, &labels_b)?;
        debug!(dest = self.id(), operand = a.id(), idx_a, idx_b; "Summing tensor");

        let result = plan.evaluate::<S>(&[a.inner.data.borrow().as_slice()]);
        kernel::accumulate::<S>(
            self.inner.data.borrow_mut().as_mut_slice(),
            alpha,
            &result,
            beta,
        );
        Ok(())
    }

    fn sum_plan(&self, a: &Self, labels_a: &[char], labels_b: &[char]) -> Result<Plan> {
        self.require_same_world(a)?;
        Plan::new(
            Binding {
                len: self.shape(),
                labels: labels_b,
            },
            &[Binding {
                len: a.shape(),
                labels: labels_a,
            }],
        )
    }

    /// Validates the arguments of [`Tensor::sum`] without touching any data.
    pub(crate) fn check_sum(&self, a: &Self, labels_a: &[char], labels_b: &[char]) -> Result<()> {
        self.sum_plan(a, labels_a, labels_b).map(drop)
    }

    /// Contraction: `self[idx_c] = beta * self[idx_c] + alpha * a[idx_a] * b[idx_b]`.
    ///
    /// Labels shared by `a` and `b` but absent from `idx_c` are summed over.
    /// Labels present in all three index maps are batch labels. Either operand
    /// may be `self`.
    ///
    /// # Errors
    /// - [`Error::WorldMismatch`] if an operand lives on another world
    /// - [`Error::ShapeMismatch`] if an index map does not match its tensor's rank
    /// - [`Error::RepeatedIndex`] if a label repeats within one index map
    /// - [`Error::UnboundFreeIndex`] if a label of `idx_c` occurs in neither operand
    /// - [`Error::DimensionMismatch`] if a label is bound to different lengths
    #[allow(clippy::too_many_arguments)]
    pub fn contract(
        &self,
        alpha: S::Scalar,
        a: &Self,
        idx_a: &str,
        b: &Self,
        idx_b: &str,
        beta: S::Scalar,
        idx_c: &str,
    ) -> Result<()> {
        let labels_a = idx_a.chars().collect_vec();
        let labels_b = idx_b.chars().collect_vec();
        let labels_c = idx_c.chars().collect_vec();
        let plan = self.contract_plan(a, &labels_a, b, &labels_b, &labels_c)?;
        debug!(
            dest = self.id(), left = a.id(), right = b.id(), idx_a, idx_b, idx_c;
            "Contracting tensors"
        );

        let result = {
            let data_a = a.inner.data.borrow();
            let data_b = b.inner.data.borrow();
            plan.evaluate::<S>(&[data_a.as_slice(), data_b.as_slice()])
        };
        kernel::accumulate::<S>(
            self.inner.data.borrow_mut().as_mut_slice(),
            alpha,
            &result,
            beta,
        );
        Ok(())
    }

    fn contract_plan(
        &self,
        a: &Self,
        labels_a: &[char],
        b: &Self,
        labels_b: &[char],
        labels_c: &[char],
    ) -> Result<Plan> {
        self.require_same_world(a)?;
        self.require_same_world(b)?;
        Plan::new(
            Binding {
                len: self.shape(),
                labels: labels_c,
            },
            &[
                Binding {
                    len: a.shape(),
                    labels: labels_a,
                },
                Binding {
                    len: b.shape(),
                    labels: labels_b,
                },
            ],
        )
    }

    /// Validates the arguments of [`Tensor::contract`] without touching any
    /// data.
    pub(crate) fn check_contract(
        &self,
        a: &Self,
        labels_a: &[char],
        b: &Self,
        labels_b: &[char],
        labels_c: &[char],
    ) -> Result<()> {
        self.contract_plan(a, labels_a, b, labels_b, labels_c)
            .map(drop)
    }

    /// Scaling: `self[idx_a] = alpha * self[idx_a]`.
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`] if `idx_a` does not match the rank
    /// - [`Error::RepeatedIndex`] if a label repeats
    pub fn scale(&self, alpha: S::Scalar, idx_a: &str) -> Result<()> {
        kernel::parse_labels(idx_a, self.ndim())?;
        debug!(dest = self.id(), idx_a; "Scaling tensor");
        for value in self.inner.data.borrow_mut().iter_mut() {
            *value = S::mul(alpha, *value);
        }
        Ok(())
    }

    fn require_same_characteristics(&self, other: &Self) -> Result<()> {
        if self.shape() == other.shape() && self.symmetry() == other.symmetry() {
            Ok(())
        } else {
            Err(Error::IncompatibleTensors {
                left: self.shape().to_vec(),
                right: other.shape().to_vec(),
            })
        }
    }

    /// Accumulates this tensor into `target`, a tensor of the same
    /// characteristics on a sub- or super-world:
    /// `target = beta * target + alpha * self`.
    ///
    /// # Errors
    /// - [`Error::WorldMismatch`] if neither world contains the other
    /// - [`Error::IncompatibleTensors`] if shape or symmetry differ
    pub fn add_to_subworld(&self, target: &Self, alpha: S::Scalar, beta: S::Scalar) -> Result<()> {
        let (own, other) = (self.world(), target.world());
        if !other.is_subset_of(own) && !other.is_superset_of(own) {
            return Err(Error::WorldMismatch {
                expected: own.id(),
                got: other.id(),
            });
        }
        self.require_same_characteristics(target)?;
        debug!(source = self.id(), target = target.id(), from = own.id(), to = other.id(); "Moving tensor between worlds");

        let source = self.read_all();
        kernel::accumulate::<S>(
            target.inner.data.borrow_mut().as_mut_slice(),
            alpha,
            &source,
            beta,
        );
        Ok(())
    }

    /// Accumulates `source`, a tensor of the same characteristics on a sub- or
    /// super-world, into this tensor: `self = beta * self + alpha * source`.
    ///
    /// # Errors
    /// See [`Tensor::add_to_subworld`].
    pub fn add_from_subworld(&self, source: &Self, alpha: S::Scalar, beta: S::Scalar) -> Result<()> {
        source.add_to_subworld(self, alpha, beta)
    }
}

impl<S: Semiring> Clone for Tensor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: Semiring> fmt::Debug for Tensor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("shape", &self.shape())
            .field("symmetry", &self.symmetry())
            .field("world", &self.world().id())
            .finish()
    }
}

/// Prints the characteristics followed by every non-zero element.
impl<S: Semiring> fmt::Display for Tensor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().unwrap_or_else(|| format!("#{}", self.id()));
        writeln!(
            f,
            "tensor {name} {:?} {:?} on world {}",
            self.shape(),
            self.symmetry(),
            self.world().id()
        )?;
        let data = self.inner.data.borrow();
        for (key, value) in data.iter().enumerate() {
            if S::is_zero(*value) {
                continue;
            }
            let index = self.multi_index(key as i64).map_err(|_| fmt::Error)?;
            writeln!(f, "  [{}] {value:?}", index.iter().join(", "))?;
        }
        Ok(())
    }
}

impl<S: Semiring> ApproxEq for &Tensor<S> {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        let margin = margin.into();
        self.shape() == other.shape()
            && self
                .read_all()
                .into_iter()
                .zip(other.read_all())
                .all(|(a, b)| a.approx_eq_margin(b, margin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::assert_approx_eq;

    use crate::algebra::MaxPlus;

    fn matrix(values: &[f64], world: &World) -> Tensor {
        let t = Tensor::matrix(2, 2, Sym::NS, world).unwrap();
        t.set_from_slice(values).unwrap();
        t
    }

    #[test]
    fn test_new_validates_shape() {
        let world = World::local();
        assert!(matches!(
            Tensor::<Standard<f64>>::new(&[2, 0], &[Sym::NS, Sym::NS], &world),
            Err(Error::InvalidShape { .. })
        ));
        assert!(matches!(
            Tensor::<Standard<f64>>::new(&[2, 3], &[Sym::SY, Sym::NS], &world),
            Err(Error::InvalidSymmetry { .. })
        ));
        assert!(matches!(
            Tensor::<Standard<f64>>::new(&[2, 2], &[Sym::NS], &world),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Tensor::<Standard<f64>>::new(&[usize::MAX, 2], &[Sym::NS, Sym::NS], &world),
            Err(Error::InvalidShape { .. })
        ));
        assert_eq!(world.tensors_created(), 0);
    }

    #[test]
    fn test_identity_within_world() {
        let world = World::local();
        let a: Tensor = Tensor::vector(3, &world).unwrap();
        let b: Tensor = Tensor::vector(3, &world).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.same_tensor(&a.clone()));
        assert!(!a.same_tensor(&b));
        assert!(world.owns(&a));
        assert!(!World::local().owns(&a));
        assert_eq!(world.tensors_created(), 2);
    }

    #[test]
    fn test_global_index_roundtrip() {
        let world = World::local();
        let t: Tensor = Tensor::new(&[2, 3, 4], &[Sym::NS; 3], &world).unwrap();
        assert_eq!(t.global_index(&[1, 2, 3]).unwrap(), 1 + 2 * 2 + 3 * 6);
        assert_eq!(t.multi_index(23).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            t.global_index(&[1, 3, 0]),
            Err(Error::EntryOutOfBounds {
                dim: 1,
                entry: 3,
                len: 3
            })
        );
        assert!(matches!(
            t.multi_index(24),
            Err(Error::IndexOutOfBounds { key: 24, size: 24 })
        ));
        assert!(matches!(
            t.multi_index(-1),
            Err(Error::IndexOutOfBounds { key: -1, .. })
        ));
    }

    #[test]
    fn test_scalar_value() {
        let world = World::local();
        let s: Tensor = Tensor::scalar(1.5, &world);
        assert_eq!(s.value(), Ok(1.5));
        s.set_value(-2.0).unwrap();
        assert_eq!(s.value(), Ok(-2.0));

        let v: Tensor = Tensor::vector(2, &world).unwrap();
        assert_eq!(
            v.value(),
            Err(Error::ShapeMismatch {
                expected: 0,
                got: 1
            })
        );
        assert!(v.set_value(1.0).is_err());
    }

    #[test]
    fn test_max_abs() {
        let world = World::local();
        let t: Tensor = Tensor::vector(5, &world).unwrap();
        t.set_from_slice(&[1.0, -7.0, 3.0, 0.0, 5.0]).unwrap();
        assert_eq!(t.max_abs(3), vec![-7.0, 5.0, 3.0]);
        assert_eq!(t.max_abs(9).len(), 5);
    }

    #[test]
    fn test_write_and_read() {
        let world = World::local();
        let t: Tensor = Tensor::vector(4, &world).unwrap();
        t.write(&[3, 1], &[5.0, 7.0]).unwrap();
        assert_eq!(t.read(&[1, 3, 0]).unwrap(), vec![7.0, 5.0, 0.0]);
        assert_eq!(t.read_all(), vec![0.0, 7.0, 0.0, 5.0]);

        t.write_scaled(2.0, 1.0, &[1], &[1.0]).unwrap();
        assert_eq!(t.read(&[1]).unwrap(), vec![9.0]);

        let mut values = vec![1.0, 1.0];
        t.read_scaled(0.5, 2.0, &[1, 3], &mut values).unwrap();
        assert_eq!(values, vec![6.5, 4.5]);
    }

    #[test]
    fn test_write_duplicate_keys_accumulate() {
        let world = World::local();
        let t: Tensor = Tensor::vector(2, &world).unwrap();
        t.fill(10.0);
        t.write_scaled(1.0, 0.5, &[0, 0, 1], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(t.read_all(), vec![8.0, 8.0]);
    }

    #[test]
    fn test_write_rejects_bad_input() {
        let world = World::local();
        let t: Tensor = Tensor::vector(2, &world).unwrap();
        assert_eq!(
            t.write(&[0, 2], &[1.0, 1.0]),
            Err(Error::IndexOutOfBounds { key: 2, size: 2 })
        );
        assert_eq!(
            t.write(&[0], &[1.0, 1.0]),
            Err(Error::ValueCountMismatch {
                expected: 1,
                got: 2
            })
        );
        // Nothing was written.
        assert_eq!(t.read_all(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_sum_permutes() {
        let world = World::local();
        let a = matrix(&[1.0, 2.0, 3.0, 4.0], &world);
        let b = matrix(&[1.0, 1.0, 1.0, 1.0], &world);
        b.sum(2.0, &a, "ij", 1.0, "ji").unwrap();
        assert_eq!(b.read_all(), vec![3.0, 7.0, 5.0, 9.0]);
    }

    #[test]
    fn test_contract_matrix_product() {
        let world = World::local();
        let a = matrix(&[1.0, 3.0, 2.0, 4.0], &world);
        let b = matrix(&[5.0, 7.0, 6.0, 8.0], &world);
        let c = a.zeros_like();
        c.contract(1.0, &a, "ik", &b, "kj", 0.0, "ij").unwrap();
        assert_eq!(c.read_all(), vec![19.0, 43.0, 22.0, 50.0]);
    }

    #[test]
    fn test_contract_into_operand() {
        let world = World::local();
        let a = matrix(&[1.0, 3.0, 2.0, 4.0], &world);
        let b = matrix(&[5.0, 7.0, 6.0, 8.0], &world);
        a.contract(1.0, &a, "ik", &b, "kj", 0.0, "ij").unwrap();
        assert_eq!(a.read_all(), vec![19.0, 43.0, 22.0, 50.0]);
    }

    #[test]
    fn test_contract_errors() {
        let world = World::local();
        let a: Tensor = Tensor::new(&[2, 3], &[Sym::NS; 2], &world).unwrap();
        let b: Tensor = Tensor::new(&[2, 2], &[Sym::NS; 2], &world).unwrap();
        let c: Tensor = Tensor::new(&[2, 2], &[Sym::NS; 2], &world).unwrap();
        assert_eq!(
            c.contract(1.0, &a, "ik", &b, "kj", 0.0, "ij"),
            Err(Error::DimensionMismatch {
                label: 'k',
                expected: 3,
                got: 2
            })
        );
        assert_eq!(
            c.contract(1.0, &b, "ik", &b, "kl", 0.0, "ij"),
            Err(Error::UnboundFreeIndex { label: 'j' })
        );
        assert_eq!(
            c.contract(1.0, &b, "ikl", &b, "kj", 0.0, "ij"),
            Err(Error::ShapeMismatch {
                expected: 2,
                got: 3
            })
        );

        let elsewhere: Tensor = Tensor::new(&[2, 2], &[Sym::NS; 2], &World::local()).unwrap();
        assert!(matches!(
            c.contract(1.0, &b, "ik", &elsewhere, "kj", 0.0, "ij"),
            Err(Error::WorldMismatch { .. })
        ));
    }

    #[test]
    fn test_scale() {
        let world = World::local();
        let a = matrix(&[1.0, 2.0, 3.0, 4.0], &world);
        a.scale(-2.0, "ij").unwrap();
        assert_eq!(a.read_all(), vec![-2.0, -4.0, -6.0, -8.0]);
        assert_eq!(
            a.scale(2.0, "ii"),
            Err(Error::RepeatedIndex {
                label: 'i',
                labels: "ii".into()
            })
        );
    }

    #[test]
    fn test_scalar_tensor() {
        let world = World::local();
        let s: Tensor = Tensor::scalar(4.0, &world);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.size(), 1);
        let v: Tensor = Tensor::vector(3, &world).unwrap();
        v.set_from_slice(&[1.0, 2.0, 3.0]).unwrap();
        s.contract(1.0, &v, "i", &v, "i", 1.0, "").unwrap();
        assert_eq!(s.read_all(), vec![18.0]);
    }

    #[test]
    fn test_norms_and_reduction() {
        let world = World::local();
        let a = matrix(&[3.0, -4.0, 0.0, 0.0], &world);
        assert_eq!(a.norm(Norm::L1), 7.0);
        assert_eq!(a.norm(Norm::L2), 5.0);
        assert_eq!(a.norm(Norm::MaxAbs), 4.0);
        assert_eq!(a.sum_all(), -1.0);

        let tropical: Tensor<MaxPlus<f64>> = Tensor::vector(3, &world).unwrap();
        tropical.set_from_slice(&[1.0, 5.0, 2.0]).unwrap();
        assert_eq!(tropical.sum_all(), 5.0);
    }

    #[test]
    fn test_local_keys() {
        let world = World::new(1, vec![0, 1, 2]).unwrap();
        let t: Tensor = Tensor::vector(7, &world).unwrap();
        assert_eq!(t.local_keys(), vec![1, 4]);
        t.write(&[4], &[2.0]).unwrap();
        assert_eq!(t.read_local(), vec![(1, 0.0), (4, 2.0)]);
    }

    #[test]
    fn test_subworld_accumulation() {
        let world = World::new(0, vec![0, 1]).unwrap();
        let sub = world.split(&[0]).unwrap();
        let unrelated = World::new(0, vec![0, 2]).unwrap();
        let sub_of_unrelated = unrelated.split(&[2]).unwrap();

        let a = matrix(&[1.0, 2.0, 3.0, 4.0], &world);
        let b = a.on_world(&sub);
        b.fill(1.0);
        a.add_to_subworld(&b, 2.0, 1.0).unwrap();
        assert_eq!(b.read_all(), vec![3.0, 5.0, 7.0, 9.0]);

        a.add_from_subworld(&b, 1.0, 0.0).unwrap();
        assert_eq!(a.read_all(), vec![3.0, 5.0, 7.0, 9.0]);

        let c = a.on_world(&sub_of_unrelated);
        assert!(matches!(
            a.add_to_subworld(&c, 1.0, 1.0),
            Err(Error::WorldMismatch { .. })
        ));

        let v: Tensor = Tensor::vector(4, &sub).unwrap();
        assert!(matches!(
            a.add_to_subworld(&v, 1.0, 1.0),
            Err(Error::IncompatibleTensors { .. })
        ));
    }

    #[test]
    fn test_duplicate_is_deep() {
        let world = World::local();
        let a = matrix(&[1.0, 2.0, 3.0, 4.0], &world);
        let b = a.duplicate();
        assert!(!a.same_tensor(&b));
        assert_approx_eq!(&Tensor, &a, &b);
        b.scale(2.0, "ij").unwrap();
        assert_eq!(a.read_all(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_display_lists_nonzeros() {
        let world = World::local();
        let a = matrix(&[0.0, 2.0, 0.0, 0.0], &world);
        a.set_name("A");
        let printed = a.to_string();
        assert!(printed.starts_with("tensor A [2, 2] [NS, NS]"));
        assert!(printed.contains("[1, 0] 2.0"));
        assert_eq!(printed.lines().count(), 2);
    }
}
