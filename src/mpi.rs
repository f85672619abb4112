//! Placing worlds on MPI communicators.
//!
//! Every process of a communicator builds the same worlds and runs the same
//! expressions on its replica of the tensor data. The functions here keep the
//! replicas in sync.

use mpi::topology::SimpleCommunicator;
use mpi::traits::Communicator;

use crate::error::Result;
use crate::world::World;

pub mod communication;

impl World {
    /// Creates a world spanning all processes of `communicator`, seen from the
    /// calling process.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWorld`](crate::error::Error::InvalidWorld) if the
    /// communicator reports an inconsistent rank.
    pub fn from_communicator(communicator: &SimpleCommunicator) -> Result<Self> {
        World::new(communicator.rank(), (0..communicator.size()).collect())
    }
}
