#![deny(missing_docs)]
//! Owning handles that can remove themselves from the container holding them.
//!
//! A [`Managed`] handle owns a boxed value and an eraser bound to the container
//! the handle lives in. Calling [`Managed::remove`] erases the handle's own slot
//! without the caller needing the container or the index.
//!
//! * [`ManagedVec`]: ordered slots, indices are renumbered as slots are erased
//! * [`ManagedArena`]: generational keys, erasing never moves another handle
//! * [`make_handle`] / [`append_handle`]: bind handles to any [`Erasable`] container
//!   shared as `Rc<RefCell<_>>` (e.g. a `Vec<Managed<T>>`)
pub use self::arena::{Arena, Generation, Key, ManagedArena};
pub use self::config::{Config, IndexPolicy, Renumber};
pub use self::erase::{Erasable, Erase, Eraser};
pub use self::error::{Error, Result};
pub use self::factory::{Managing, append_handle, make_handle, try_make_handle};
pub use self::managed::Managed;
pub use self::vec::{ManagedVec, Slots};

mod arena;
mod config;
mod erase;
mod error;
mod factory;
mod managed;
mod vec;
