//! Process worlds: the set of processes a tensor is placed on.
//!
//! Tensor data is replicated on every process of its world and every
//! process runs the same sequence of operations (SPMD). A world therefore
//! only has to answer membership questions: which ranks participate, whether
//! a tensor was created on it, and how it relates to other worlds.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;
use log::debug;

use crate::algebra::Semiring;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Rank of a process, matching the MPI rank type.
pub type Rank = i32;

/// Identifier of a world.
pub type WorldId = usize;

/// Worlds are numbered in creation order. Since every process creates its
/// worlds in the same order, the numbering is identical across processes.
static NEXT_WORLD_ID: AtomicUsize = AtomicUsize::new(0);

struct WorldInner {
    id: WorldId,
    rank: Rank,
    ranks: Vec<Rank>,
    tensors_created: Cell<usize>,
}

/// A set of cooperating processes over which tensors are placed.
///
/// Cloning a `World` yields another handle to the same world.
#[derive(Clone)]
pub struct World {
    inner: Rc<WorldInner>,
}

impl World {
    /// Creates a world of the given `ranks`, seen from process `rank`.
    ///
    /// The ranks are sorted and must be unique and non-negative.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWorld`] if `ranks` is empty, contains duplicates
    /// or negative ranks, or does not contain `rank`.
    pub fn new(rank: Rank, ranks: Vec<Rank>) -> Result<Self> {
        if ranks.is_empty() {
            return Err(Error::InvalidWorld("a world needs at least one rank".into()));
        }
        if let Some(negative) = ranks.iter().find(|r| **r < 0) {
            return Err(Error::InvalidWorld(format!("negative rank {negative}")));
        }
        if let Some(duplicate) = ranks.iter().duplicates().next() {
            return Err(Error::InvalidWorld(format!("rank {duplicate} listed twice")));
        }
        if !ranks.contains(&rank) {
            return Err(Error::InvalidWorld(format!(
                "calling rank {rank} is not part of the world"
            )));
        }
        Ok(Self::from_sorted(rank, ranks.into_iter().sorted().collect()))
    }

    /// Creates a world consisting of the calling process only.
    ///
    /// # Examples
    /// ```
    /// # use cyclops::world::World;
    /// let world = World::local();
    /// assert_eq!(world.size(), 1);
    /// assert_eq!(world.rank(), 0);
    /// ```
    pub fn local() -> Self {
        Self::from_sorted(0, vec![0])
    }

    fn from_sorted(rank: Rank, ranks: Vec<Rank>) -> Self {
        let id = NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed);
        debug!(id, rank, size = ranks.len(); "Created world");
        Self {
            inner: Rc::new(WorldInner {
                id,
                rank,
                ranks,
                tensors_created: Cell::new(0),
            }),
        }
    }

    /// Creates a sub-world consisting of `ranks`, which must all belong to this
    /// world. Processes outside the sub-world still receive a handle, so that
    /// world numbering stays identical on every process.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWorld`] if a rank is not part of this world, or
    /// the rank list is empty or contains duplicates.
    pub fn split(&self, ranks: &[Rank]) -> Result<Self> {
        if ranks.is_empty() {
            return Err(Error::InvalidWorld("a world needs at least one rank".into()));
        }
        if let Some(foreign) = ranks.iter().find(|r| !self.contains_rank(**r)) {
            return Err(Error::InvalidWorld(format!(
                "rank {foreign} is not part of world {}",
                self.id()
            )));
        }
        if let Some(duplicate) = ranks.iter().duplicates().next() {
            return Err(Error::InvalidWorld(format!("rank {duplicate} listed twice")));
        }
        Ok(Self::from_sorted(
            self.rank(),
            ranks.iter().copied().sorted().collect(),
        ))
    }

    /// The identifier of this world.
    #[inline]
    pub fn id(&self) -> WorldId {
        self.inner.id
    }

    /// The rank of the calling process.
    #[inline]
    pub fn rank(&self) -> Rank {
        self.inner.rank
    }

    /// The number of processes in this world.
    #[inline]
    pub fn size(&self) -> usize {
        self.inner.ranks.len()
    }

    /// The ranks of this world, sorted ascending.
    #[inline]
    pub fn ranks(&self) -> &[Rank] {
        &self.inner.ranks
    }

    /// Whether `rank` belongs to this world.
    #[inline]
    pub fn contains_rank(&self, rank: Rank) -> bool {
        self.inner.ranks.binary_search(&rank).is_ok()
    }

    /// Whether the calling process participates in this world.
    #[inline]
    pub fn is_member(&self) -> bool {
        self.contains_rank(self.rank())
    }

    /// Position of the calling process within this world, if it is a member.
    pub fn position(&self) -> Option<usize> {
        self.inner.ranks.binary_search(&self.rank()).ok()
    }

    /// Whether `tensor` was placed on this world.
    pub fn owns<S: Semiring>(&self, tensor: &Tensor<S>) -> bool {
        tensor.world() == self
    }

    /// Whether every rank of this world is also part of `other`.
    pub fn is_subset_of(&self, other: &World) -> bool {
        self.ranks().iter().all(|r| other.contains_rank(*r))
    }

    /// Whether every rank of `other` is also part of this world.
    pub fn is_superset_of(&self, other: &World) -> bool {
        other.is_subset_of(self)
    }

    /// The number of tensors created on this world so far, including
    /// intermediates created during expression evaluation.
    pub fn tensors_created(&self) -> usize {
        self.inner.tensors_created.get()
    }

    /// Hands out the next tensor identifier of this world.
    pub(crate) fn next_tensor_id(&self) -> usize {
        let id = self.inner.tensors_created.get();
        self.inner.tensors_created.set(id + 1);
        id
    }
}

impl PartialEq for World {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for World {}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id())
            .field("rank", &self.rank())
            .field("ranks", &self.ranks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_world() {
        let world = World::local();
        assert_eq!(world.ranks(), &[0]);
        assert!(world.is_member());
        assert_eq!(world.position(), Some(0));
        assert_eq!(world.tensors_created(), 0);
    }

    #[test]
    fn test_world_identity() {
        let a = World::local();
        let b = World::local();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_sorts_ranks() {
        let world = World::new(2, vec![3, 0, 2]).unwrap();
        assert_eq!(world.ranks(), &[0, 2, 3]);
        assert_eq!(world.position(), Some(1));
    }

    #[test]
    fn test_new_rejects_invalid_ranks() {
        assert!(matches!(World::new(0, vec![]), Err(Error::InvalidWorld(_))));
        assert!(matches!(World::new(0, vec![0, 0]), Err(Error::InvalidWorld(_))));
        assert!(matches!(World::new(0, vec![0, -1]), Err(Error::InvalidWorld(_))));
        assert!(matches!(World::new(5, vec![0, 1]), Err(Error::InvalidWorld(_))));
    }

    #[test]
    fn test_subset_relation() {
        let world = World::new(1, vec![0, 1, 2, 3]).unwrap();
        let sub = world.split(&[1, 3]).unwrap();
        assert!(sub.is_subset_of(&world));
        assert!(world.is_superset_of(&sub));
        assert!(!world.is_subset_of(&sub));
        assert!(sub.is_member());

        let other = world.split(&[0, 2]).unwrap();
        assert!(!other.is_member());
        assert!(!other.is_subset_of(&sub));
        assert!(!other.is_superset_of(&sub));
    }

    #[test]
    fn test_split_rejects_foreign_ranks() {
        let world = World::new(0, vec![0, 1]).unwrap();
        assert!(matches!(world.split(&[0, 4]), Err(Error::InvalidWorld(_))));
        assert!(matches!(world.split(&[]), Err(Error::InvalidWorld(_))));
    }
}
