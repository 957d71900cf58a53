pub use tether_store as store; // store

pub mod prelude {
    pub use crate::store::{Config, IndexPolicy, Managed, ManagedArena, ManagedVec, Renumber};
    pub use crate::store::{append_handle, make_handle, try_make_handle};
}
