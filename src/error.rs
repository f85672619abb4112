//! Error type shared by all tensor and expression operations.

use crate::world::WorldId;

/// Errors raised while resolving index expressions or accessing tensor data.
///
/// Apart from [`Error::Communication`], all variants are detected during the
/// metadata pass, before any data of a destination tensor is modified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The number of index labels (or symmetry tags) does not match the rank of
    /// the tensor.
    #[error("shape mismatch: expected {expected} entries, got {got}")]
    ShapeMismatch {
        /// Rank of the tensor.
        expected: usize,
        /// Number of entries supplied.
        got: usize,
    },

    /// A label of the destination is not supplied by any operand.
    #[error("label '{label}' of the destination is not bound by any operand")]
    UnboundFreeIndex {
        /// The unbound label.
        label: char,
    },

    /// The same label is bound to dimensions of different length.
    #[error("label '{label}' has length {expected} in one operand but {got} in another")]
    DimensionMismatch {
        /// The offending label.
        label: char,
        /// Length seen first.
        expected: usize,
        /// Conflicting length.
        got: usize,
    },

    /// An operand lives on a world that is incompatible with the operation.
    #[error("tensor lives on world {got}, but the operation requires world {expected}")]
    WorldMismatch {
        /// World the operation runs on.
        expected: WorldId,
        /// World of the offending tensor.
        got: WorldId,
    },

    /// A tensor (or inferred intermediate) would have a degenerate shape.
    #[error("invalid shape {len:?}: {reason}")]
    InvalidShape {
        /// The rejected edge lengths.
        len: Vec<usize>,
        /// Why the shape was rejected.
        reason: String,
    },

    /// A global index lies outside the tensor.
    #[error("global index {key} is out of bounds for a tensor with {size} elements")]
    IndexOutOfBounds {
        /// The offending key.
        key: i64,
        /// Number of elements in the tensor.
        size: usize,
    },

    /// An entry of a multi-index exceeds the edge length of its dimension.
    #[error("index {entry} in dimension {dim} is out of bounds for edge length {len}")]
    EntryOutOfBounds {
        dim: usize,
        entry: usize,
        len: usize,
    },

    /// A term was executed after it had already been consumed.
    #[error("term has already been executed")]
    ReuseOfConsumedTerm,

    /// A label repeats within a single index map.
    #[error("label '{label}' appears more than once in index map \"{labels}\"")]
    RepeatedIndex {
        /// The repeated label.
        label: char,
        /// The full index map.
        labels: String,
    },

    /// A symmetry tag links dimensions that cannot be symmetric.
    #[error("invalid symmetry tag at dimension {position}: {reason}")]
    InvalidSymmetry {
        /// Dimension carrying the tag.
        position: usize,
        /// Why the tag was rejected.
        reason: String,
    },

    /// The number of values does not match the number of sparse keys.
    #[error("expected {expected} values, got {got}")]
    ValueCountMismatch {
        /// Number of keys.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// Two tensors that must share their characteristics do not.
    #[error("incompatible tensors: {left:?} vs {right:?}")]
    IncompatibleTensors {
        /// Edge lengths of the first tensor.
        left: Vec<usize>,
        /// Edge lengths of the second tensor.
        right: Vec<usize>,
    },

    /// A world could not be formed from the given ranks.
    #[error("invalid world: {0}")]
    InvalidWorld(String),

    /// Replicated data could not be exchanged between processes.
    #[error("communication failed: {0}")]
    Communication(String),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
