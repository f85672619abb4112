use log::debug;
use mpi::topology::Process;
use mpi::traits::{BufferMut, Root};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::algebra::Semiring;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Communication(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    bincode::deserialize(data).map_err(|e| Error::Communication(e.to_string()))
}

/// Broadcasts `data` from `root`. Receivers may pass an empty vector; it is
/// resized to the length sent by `root`.
fn broadcast_vec<T>(data: &mut Vec<T>, root: &Process)
where
    T: Clone + Default,
    Vec<T>: BufferMut,
{
    let mut len = if root.is_self() { data.len() } else { 0 };
    root.broadcast_into(&mut len);

    if !root.is_self() {
        data.resize(len, T::default());
    }
    root.broadcast_into(data);
}

/// Overwrites the replica of `tensor` on every process with the data held by
/// `root`.
///
/// # Errors
/// - [`Error::Communication`] if the data cannot be encoded or decoded
/// - [`Error::ValueCountMismatch`] if `root` sent a tensor of another size
pub fn broadcast_tensor<S>(tensor: &Tensor<S>, root: &Process) -> Result<()>
where
    S: Semiring,
    S::Scalar: Serialize + DeserializeOwned,
{
    let mut data = if root.is_self() {
        serialize(&tensor.read_all())?
    } else {
        Vec::new()
    };
    broadcast_vec(&mut data, root);

    if !root.is_self() {
        let values: Vec<S::Scalar> = deserialize(&data)?;
        tensor.set_from_slice(&values)?;
        debug!(tensor = tensor.id(), root = root.rank(), bytes = data.len(); "Received broadcasted tensor");
    }
    Ok(())
}
