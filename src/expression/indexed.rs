use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::algebra::{Ring, Semiring, Standard};
use crate::error::Result;
use crate::expression::Term;
use crate::tensor::{kernel, Tensor};

/// A tensor with one index label attached to each of its dimensions.
///
/// Views are the leaves of every expression and the destinations expressions
/// are assigned to. Cloning a view is cheap: the tensor is shared.
pub struct IndexedView<S: Semiring = Standard<f64>> {
    tensor: Tensor<S>,
    labels: Vec<char>,
    scale: S::Scalar,
    is_intermediate: bool,
}

impl<S: Semiring> IndexedView<S> {
    /// Attaches `labels` to `tensor`. The view shares the tensor with the
    /// caller.
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`](crate::error::Error::ShapeMismatch) if the number
    ///   of labels differs from the rank of `tensor`
    /// - [`Error::RepeatedIndex`](crate::error::Error::RepeatedIndex) if a label
    ///   occurs twice
    pub fn new(tensor: &Tensor<S>, labels: &str) -> Result<Self> {
        let labels = kernel::parse_labels(labels, tensor.ndim())?;
        Ok(Self {
            tensor: tensor.clone(),
            labels,
            scale: S::one(),
            is_intermediate: false,
        })
    }

    /// Like [`IndexedView::new`], but the view owns a private copy of the
    /// tensor's current data. Later changes to `tensor` are not visible
    /// through the view.
    pub fn copied(tensor: &Tensor<S>, labels: &str) -> Result<Self> {
        let labels = kernel::parse_labels(labels, tensor.ndim())?;
        Ok(Self {
            tensor: tensor.duplicate(),
            labels,
            scale: S::one(),
            is_intermediate: false,
        })
    }

    /// Wraps a tensor created by the expression engine.
    pub(crate) fn intermediate(tensor: Tensor<S>, labels: Vec<char>) -> Self {
        debug_assert_eq!(tensor.ndim(), labels.len());
        Self {
            tensor,
            labels,
            scale: S::one(),
            is_intermediate: true,
        }
    }

    /// Multiplies the scale of this view by `alpha`.
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
    pub fn labels(&self) -> &[char] {
        &self.labels
    }

    /// The labels as a string, in dimension order.
    pub fn label_string(&self) -> String {
        self.labels.iter().collect()
    }

    #[inline]
    pub fn scale(&self) -> S::Scalar {
        self.scale
    }

    /// Whether the tensor was created by the expression engine rather than by
    /// the caller.
    #[inline]
    pub fn is_intermediate(&self) -> bool {
        self.is_intermediate
    }

    /// `self = term`: overwrites the viewed tensor with the value of `term`.
    ///
    /// # Errors
    /// Fails if the labels of the expression cannot be resolved, or if an
    /// operand lives on another world. No data is modified in that case.
    pub fn assign<T: Into<Term<S>>>(&self, term: T) -> Result<()> {
        let mut term: Term<S> = term.into();
        term.execute(self, S::zero())
    }

    /// `self += term`: adds the value of `term` to the viewed tensor.
    ///
    /// # Errors
    /// See [`IndexedView::assign`].
    pub fn accumulate<T: Into<Term<S>>>(&self, term: T) -> Result<()> {
        let mut term: Term<S> = term.into();
        term.execute(self, S::one())
    }

    /// `self *= term`: replaces the viewed tensor by its contraction with
    /// `term`.
    ///
    /// # Errors
    /// See [`IndexedView::assign`].
    pub fn contract_assign<T: Into<Term<S>>>(&self, term: T) -> Result<()> {
        self.assign(Term::from(self.clone()) * term)
    }
}

impl<S: Ring> IndexedView<S> {
    /// `self -= term`: subtracts the value of `term` from the viewed tensor.
    ///
    /// # Errors
    /// See [`IndexedView::assign`].
    pub fn subtract<T: Into<Term<S>>>(&self, term: T) -> Result<()> {
        let term: Term<S> = term.into();
        let mut term = -term;
        term.execute(self, S::one())
    }
}

impl<S: Semiring> Clone for IndexedView<S> {
    fn clone(&self) -> Self {
        Self {
            tensor: self.tensor.clone(),
            labels: self.labels.clone(),
            scale: self.scale,
            is_intermediate: self.is_intermediate,
        }
    }
}

impl<S: Semiring> fmt::Debug for IndexedView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedView")
            .field("tensor", &self.tensor.id())
            .field("labels", &self.label_string())
            .field("scale", &self.scale)
            .field("is_intermediate", &self.is_intermediate)
            .finish()
    }
}

impl<S: Semiring> fmt::Display for IndexedView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !S::is_one(self.scale) {
            write!(f, "{:?}*", self.scale)?;
        }
        match self.tensor.name() {
            Some(name) => write!(f, "{name}")?,
            None => write!(f, "#{}", self.tensor.id())?,
        }
        write!(f, "[\"{}\"]", self.label_string())
    }
}

impl<S: Semiring, R: Into<Term<S>>> Add<R> for IndexedView<S> {
    type Output = Term<S>;

    fn add(self, rhs: R) -> Term<S> {
        Term::from(self) + rhs
    }
}

impl<S: Ring, R: Into<Term<S>>> Sub<R> for IndexedView<S> {
    type Output = Term<S>;

    fn sub(self, rhs: R) -> Term<S> {
        Term::from(self) - rhs
    }
}

impl<S: Semiring, R: Into<Term<S>>> Mul<R> for IndexedView<S> {
    type Output = Term<S>;

    fn mul(self, rhs: R) -> Term<S> {
        Term::from(self) * rhs
    }
}

impl<S: Ring> Neg for IndexedView<S> {
    type Output = IndexedView<S>;

    fn neg(mut self) -> Self {
        self.scale = S::neg(self.scale);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::tensor::Sym;
    use crate::world::World;

    fn matrix(values: &[f64], world: &World) -> Tensor {
        let t = Tensor::matrix(2, 2, Sym::NS, world).unwrap();
        t.set_from_slice(values).unwrap();
        t
    }

    #[test]
    fn test_view_rejects_bad_labels() {
        let world = World::local();
        let a = matrix(&[0.0; 4], &world);
        assert_eq!(
            a.idx("ijk").unwrap_err(),
            Error::ShapeMismatch {
                expected: 2,
                got: 3
            }
        );
        assert!(matches!(
            a.idx("kk"),
            Err(Error::RepeatedIndex { label: 'k', .. })
        ));
    }

    #[test]
    fn test_assign_accumulate_subtract() {
        let world = World::local();
        let a = matrix(&[1.0, 2.0, 3.0, 4.0], &world);
        let c = matrix(&[10.0, 20.0, 30.0, 40.0], &world);

        c.idx("ij").unwrap().accumulate(a.idx("ij").unwrap()).unwrap();
        assert_eq!(c.read_all(), vec![11.0, 22.0, 33.0, 44.0]);

        c.idx("ij").unwrap().subtract(a.idx("ij").unwrap()).unwrap();
        assert_eq!(c.read_all(), vec![10.0, 20.0, 30.0, 40.0]);

        c.idx("ij").unwrap().assign(a.idx("ij").unwrap()).unwrap();
        assert_eq!(c.read_all(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_leaf_matches_primitive_sum() {
        let world = World::local();
        let a = matrix(&[1.0, 2.0, 3.0, 4.0], &world);
        let via_view = matrix(&[1.0; 4], &world);
        let via_sum = matrix(&[1.0; 4], &world);

        via_view
            .idx("ij")
            .unwrap()
            .accumulate(a.idx("ji").unwrap().scaled(3.0))
            .unwrap();
        via_sum.sum(3.0, &a, "ji", 1.0, "ij").unwrap();
        assert_eq!(via_view.read_all(), via_sum.read_all());
    }

    #[test]
    fn test_copied_view_is_detached() {
        let world = World::local();
        let a = matrix(&[1.0, 2.0, 3.0, 4.0], &world);
        let snapshot = IndexedView::copied(&a, "ij").unwrap();
        a.fill(0.0);
        assert_eq!(snapshot.tensor().read_all(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(!snapshot.is_intermediate());
    }

    #[test]
    fn test_contract_assign_in_place() {
        let world = World::local();
        let a = matrix(&[1.0, 3.0, 2.0, 4.0], &world);

        let v: Tensor = Tensor::vector(2, &world).unwrap();
        v.set_from_slice(&[1.0, 2.0]).unwrap();
        a.idx("ij")
            .unwrap()
            .contract_assign(v.idx("j").unwrap())
            .unwrap();
        assert_eq!(a.read_all(), vec![1.0, 3.0, 4.0, 8.0]);

        let s: Tensor = Tensor::scalar(2.0, &world);
        a.idx("ij")
            .unwrap()
            .contract_assign(s.idx("").unwrap())
            .unwrap();
        assert_eq!(a.read_all(), vec![2.0, 6.0, 8.0, 16.0]);

        let w: Tensor = Tensor::vector(3, &world).unwrap();
        assert!(matches!(
            a.idx("ij").unwrap().contract_assign(w.idx("j").unwrap()),
            Err(Error::DimensionMismatch { label: 'j', .. })
        ));
        assert_eq!(a.read_all(), vec![2.0, 6.0, 8.0, 16.0]);
    }

    #[test]
    fn test_display() {
        let world = World::local();
        let a = matrix(&[0.0; 4], &world);
        a.set_name("A");
        let view = a.idx("ik").unwrap();
        assert_eq!(view.to_string(), "A[\"ik\"]");
        assert_eq!(view.scaled(2.0).to_string(), "2.0*A[\"ik\"]");
    }
}
