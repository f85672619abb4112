//! Einstein-notation expressions over tensors.
//!
//! Attaching index labels to a tensor yields an [`IndexedView`]. Views combine
//! through `+`, `-` and `*` into a [`Term`] tree without doing any numeric
//! work. Assigning a term to a destination view resolves the labels of every
//! node, creates the intermediates nested contractions need, and lowers the
//! tree into calls of [`Tensor::sum`](crate::tensor::Tensor::sum),
//! [`Tensor::contract`](crate::tensor::Tensor::contract) and
//! [`Tensor::scale`](crate::tensor::Tensor::scale).
//!
//! ```
//! # use cyclops::{tensor::{Sym, Tensor}, world::World};
//! # fn main() -> cyclops::error::Result<()> {
//! let world = World::local();
//! let a: Tensor = Tensor::matrix(2, 2, Sym::NS, &world)?;
//! let b: Tensor = Tensor::matrix(2, 2, Sym::NS, &world)?;
//! let c: Tensor = Tensor::matrix(2, 2, Sym::NS, &world)?;
//! a.set_from_slice(&[1.0, 3.0, 2.0, 4.0])?;
//! b.fill(1.0);
//!
//! c.idx("ij")?.assign(a.idx("ik")? * b.idx("kj")?)?;
//! assert_eq!(c.read_all(), vec![3.0, 7.0, 3.0, 7.0]);
//!
//! c.idx("ij")?.subtract(a.idx("ji")?)?;
//! assert_eq!(c.read_all(), vec![2.0, 5.0, 0.0, 3.0]);
//! # Ok(())
//! # }
//! ```

mod indexed;
mod sparse;
mod term;

pub use indexed::IndexedView;
pub use sparse::SparseView;
pub use term::{Term, TermState};
