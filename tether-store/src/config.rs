/// Which index a handle keeps when another handle is move-assigned into it.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexPolicy {
    /// The incoming handle brings its index along.
    /// Correct when the move is "same slot, new storage location".
    #[default]
    Source,
    /// The receiving slot keeps its own index.
    /// Correct when a handle is shifted into a different slot.
    Slot,
}

/// What happens to the indices of later handles once a slot is erased.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Renumber {
    /// Every handle after the erased slot is renumbered straight away.
    #[default]
    Eager,
    /// Indices are left as they are and will be stale by one.
    /// Call `ManagedVec::reindex` to bring them up to date.
    Never,
}

/// Settings for a [`ManagedVec`](crate::ManagedVec).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Index policy used by [`ManagedVec::overwrite`](crate::ManagedVec::overwrite)
    pub index_policy: IndexPolicy,
    /// Renumbering after an erase
    pub renumber: Renumber,
}

impl Config {
    /// Set the index policy
    pub fn index_policy(mut self, index_policy: IndexPolicy) -> Self {
        self.index_policy = index_policy;
        self
    }

    /// Set the renumbering policy
    pub fn renumber(mut self, renumber: Renumber) -> Self {
        self.renumber = renumber;
        self
    }
}
