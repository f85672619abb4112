use std::fmt;

use crate::algebra::{Ring, Semiring, Standard};
use crate::error::Result;
use crate::tensor::Tensor;

/// A list of global indices into a tensor, used for scattered reads and
/// writes.
///
/// The keys are checked against the tensor once, when the view is created.
/// They need not be sorted or unique. When a key occurs more than once in a
/// write, the tensor element is scaled by `beta` once and then receives the
/// sum of all values written to it.
pub struct SparseView<S: Semiring = Standard<f64>> {
    tensor: Tensor<S>,
    keys: Vec<i64>,
    scale: S::Scalar,
}

impl<S: Semiring> SparseView<S> {
    /// Selects the elements at `keys` of `tensor`.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfBounds`](crate::error::Error::IndexOutOfBounds)
    /// for the first key outside the tensor.
    pub fn new(tensor: &Tensor<S>, keys: Vec<i64>) -> Result<Self> {
        for key in &keys {
            tensor.multi_index(*key)?;
        }
        Ok(Self {
            tensor: tensor.clone(),
            keys,
            scale: S::one(),
        })
    }

    /// Multiplies the scale of this view by `alpha`. The scale applies to
    /// reads and writes alike.
    #[must_use]
    pub fn scaled(mut self, alpha: S::Scalar) -> Self {
        self.scale = S::mul(alpha, self.scale);
        self
    }

    #[inline]
    pub fn tensor(&self) -> &Tensor<S> {
        &self.tensor
    }

    #[inline]
    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    #[inline]
    pub fn scale(&self) -> S::Scalar {
        self.scale
    }

    /// `values[j] = alpha * tensor[keys[j]] + beta * values[j]`.
    ///
    /// # Errors
    /// Returns [`Error::ValueCountMismatch`](crate::error::Error::ValueCountMismatch)
    /// if `values` does not hold one entry per key.
    pub fn read(&self, alpha: S::Scalar, values: &mut [S::Scalar], beta: S::Scalar) -> Result<()> {
        self.tensor
            .read_scaled(S::mul(self.scale, alpha), beta, &self.keys, values)
    }

    /// `tensor[keys[j]] = beta * tensor[keys[j]] + alpha * values[j]`.
    ///
    /// # Errors
    /// Returns [`Error::ValueCountMismatch`](crate::error::Error::ValueCountMismatch)
    /// if `values` does not hold one entry per key.
    pub fn write(&self, alpha: S::Scalar, values: &[S::Scalar], beta: S::Scalar) -> Result<()> {
        self.tensor
            .write_scaled(S::mul(self.scale, alpha), beta, &self.keys, values)
    }

    /// Reads the selected elements into a new vector.
    pub fn values(&self) -> Result<Vec<S::Scalar>> {
        let mut values = vec![S::zero(); self.keys.len()];
        self.read(S::one(), &mut values, S::zero())?;
        Ok(values)
    }

    /// Overwrites the selected elements with `values`.
    pub fn assign_values(&self, values: &[S::Scalar]) -> Result<()> {
        self.write(S::one(), values, S::zero())
    }

    /// Adds `values` to the selected elements.
    pub fn add_values(&self, values: &[S::Scalar]) -> Result<()> {
        self.write(S::one(), values, S::one())
    }
}

impl<S: Ring> SparseView<S> {
    /// Subtracts `values` from the selected elements.
    pub fn sub_values(&self, values: &[S::Scalar]) -> Result<()> {
        self.write(S::neg(S::one()), values, S::one())
    }
}

impl<S: Semiring> Clone for SparseView<S> {
    fn clone(&self) -> Self {
        Self {
            tensor: self.tensor.clone(),
            keys: self.keys.clone(),
            scale: self.scale,
        }
    }
}

impl<S: Semiring> fmt::Debug for SparseView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseView")
            .field("tensor", &self.tensor.id())
            .field("keys", &self.keys)
            .field("scale", &self.scale)
            .finish()
    }
}
