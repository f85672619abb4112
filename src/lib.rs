//! Distributed tensor algebra with Einstein-notation expressions.
//!
//! Tensors are placed on a [`World`](world::World) of cooperating processes,
//! bound to an arithmetic ([`algebra`]) and combined through indexed
//! expressions ([`expression`]) that lower to three primitives:
//! [`Tensor::sum`](tensor::Tensor::sum), [`Tensor::contract`](tensor::Tensor::contract)
//! and [`Tensor::scale`](tensor::Tensor::scale).

pub mod algebra;
pub mod error;
pub mod expression;
#[cfg(feature = "mpi")]
pub mod mpi;
pub mod tensor;
pub mod world;
