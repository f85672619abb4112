//! Element types and the arithmetic (semiring) a tensor is bound to.
//!
//! Every [`Tensor`](crate::tensor::Tensor) carries its algebra as a type
//! parameter. The expression engine only ever needs the additive and
//! multiplicative identities and the two operations; subtraction is offered
//! only for algebras that are rings.
//!
//! - [`Standard`]: field arithmetic over `f32`, `f64`, `Complex32`, `Complex64`
//! - [`MaxPlus`]: tropical semiring (`add = max`, `mul = +`)

use std::fmt::Debug;
use std::marker::PhantomData;

use float_cmp::{ApproxEq, F64Margin};
use num_complex::{Complex32, Complex64};

/// A value that can be stored in a tensor.
pub trait Scalar: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Approximate equality, used when comparing tensors.
    fn approx_eq_margin(self, other: Self, margin: F64Margin) -> bool;

    /// Absolute value (modulus for complex numbers), used for norms.
    fn magnitude(self) -> f64;
}

impl Scalar for f32 {
    #[inline]
    fn approx_eq_margin(self, other: Self, margin: F64Margin) -> bool {
        f64::from(self).approx_eq(f64::from(other), margin)
    }

    #[inline]
    fn magnitude(self) -> f64 {
        f64::from(self.abs())
    }
}

impl Scalar for f64 {
    #[inline]
    fn approx_eq_margin(self, other: Self, margin: F64Margin) -> bool {
        self.approx_eq(other, margin)
    }

    #[inline]
    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl Scalar for Complex32 {
    #[inline]
    fn approx_eq_margin(self, other: Self, margin: F64Margin) -> bool {
        self.re.approx_eq_margin(other.re, margin) && self.im.approx_eq_margin(other.im, margin)
    }

    #[inline]
    fn magnitude(self) -> f64 {
        f64::from(self.norm())
    }
}

impl Scalar for Complex64 {
    #[inline]
    fn approx_eq_margin(self, other: Self, margin: F64Margin) -> bool {
        self.re.approx_eq(other.re, margin) && self.im.approx_eq(other.im, margin)
    }

    #[inline]
    fn magnitude(self) -> f64 {
        self.norm()
    }
}

/// The arithmetic a tensor is bound to.
///
/// Addition must be commutative and associative: the children of a sum are
/// accumulated one after the other into the same destination.
pub trait Semiring: 'static {
    /// The element type.
    type Scalar: Scalar;

    /// Additive identity.
    fn zero() -> Self::Scalar;

    /// Multiplicative identity.
    fn one() -> Self::Scalar;

    /// Semiring addition.
    fn add(a: Self::Scalar, b: Self::Scalar) -> Self::Scalar;

    /// Semiring multiplication.
    fn mul(a: Self::Scalar, b: Self::Scalar) -> Self::Scalar;

    /// Whether `a` is the additive identity.
    #[inline]
    fn is_zero(a: Self::Scalar) -> bool {
        a == Self::zero()
    }

    /// Whether `a` is the multiplicative identity.
    #[inline]
    fn is_one(a: Self::Scalar) -> bool {
        a == Self::one()
    }
}

/// A semiring with additive inverses.
pub trait Ring: Semiring {
    /// Additive inverse.
    fn neg(a: Self::Scalar) -> Self::Scalar;
}

/// Standard arithmetic (`add = +`, `mul = *`). The default algebra.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standard<T>(PhantomData<T>);

/// Tropical max-plus semiring: `zero = -inf`, `one = 0`, `add = max`, `mul = +`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxPlus<T>(PhantomData<T>);

macro_rules! impl_standard {
    ($t:ty, $zero:expr, $one:expr) => {
        impl Semiring for Standard<$t> {
            type Scalar = $t;

            #[inline]
            fn zero() -> $t {
                $zero
            }

            #[inline]
            fn one() -> $t {
                $one
            }

            #[inline]
            fn add(a: $t, b: $t) -> $t {
                a + b
            }

            #[inline]
            fn mul(a: $t, b: $t) -> $t {
                a * b
            }
        }

        impl Ring for Standard<$t> {
            #[inline]
            fn neg(a: $t) -> $t {
                -a
            }
        }
    };
}

impl_standard!(f32, 0.0, 1.0);
impl_standard!(f64, 0.0, 1.0);
impl_standard!(Complex32, Complex32::new(0.0, 0.0), Complex32::new(1.0, 0.0));
impl_standard!(Complex64, Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0));

macro_rules! impl_max_plus {
    ($t:ty) => {
        impl Semiring for MaxPlus<$t> {
            type Scalar = $t;

            #[inline]
            fn zero() -> $t {
                <$t>::NEG_INFINITY
            }

            #[inline]
            fn one() -> $t {
                0.0
            }

            #[inline]
            fn add(a: $t, b: $t) -> $t {
                a.max(b)
            }

            #[inline]
            fn mul(a: $t, b: $t) -> $t {
                a + b
            }
        }
    };
}

impl_max_plus!(f32);
impl_max_plus!(f64);
