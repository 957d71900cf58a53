use crate::arena::Key;

/// Result type for handle and container operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a handle or an eraser can not do what was asked
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The handle has been moved from and owns nothing
    #[error("handle has been moved from")]
    MovedFrom,

    /// Position outside of an ordered container
    #[error("index {index} is out of range (len: {len})")]
    OutOfRange {
        /// The position that was asked for
        index: usize,
        /// Length of the container
        len: usize,
    },

    /// The key does not match the generation stored in the arena
    #[error("stale key: {0:?}")]
    StaleKey(Key),

    /// The container was dropped before the handle
    #[error("container no longer exists")]
    ContainerDropped,

    /// The container is borrowed elsewhere
    #[error("container is already borrowed")]
    ContainerBorrowed,
}
