use std::fmt::{self, Debug};
use std::ops::{Deref, DerefMut};

use crate::config::IndexPolicy;
use crate::erase::Erase;
use crate::error::{Error, Result};

// Payload and eraser are always owned together
struct Owned<T, P> {
    value: Box<T>,
    eraser: Box<dyn Erase<P>>,
}

// -----------------------------------------------------------------------------
//   - Managed -
// -----------------------------------------------------------------------------
/// A uniquely owned value that lives in a container and can remove
/// itself from that container.
///
/// A handle is either live (it owns a value and an eraser) or moved-from
/// (it owns nothing). A moved-from handle can only be dropped; dereferencing
/// or removing it panics.
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use tether_store::{Managed, append_handle};
///
/// let container = Rc::new(RefCell::new(Vec::<Managed<&str>>::new()));
/// append_handle(&container, "a");
/// append_handle(&container, "b");
///
/// // Move the handle out, leaving a moved-from handle in the slot
/// let mut handle = container.borrow_mut()[0].take();
/// assert_eq!(*handle, "a");
///
/// handle.remove();
/// assert!(!handle.is_live());
/// assert_eq!(*container.borrow()[0], "b");
/// ```
pub struct Managed<T, P = usize> {
    index: P,
    owned: Option<Owned<T, P>>,
}

impl<T, P> Managed<T, P> {
    /// Create a new handle from an eraser, the position of the
    /// handle's slot and the value
    pub fn new(eraser: Box<dyn Erase<P>>, index: P, value: Box<T>) -> Self {
        Self {
            index,
            owned: Some(Owned { value, eraser }),
        }
    }

    /// A moved-from handle at a given position
    pub const fn empty(index: P) -> Self {
        Self { index, owned: None }
    }

    /// `false` once the handle has been moved from or removed
    pub fn is_live(&self) -> bool {
        self.owned.is_some()
    }

    /// Get a reference to the value
    pub fn try_get(&self) -> Result<&T> {
        match &self.owned {
            Some(owned) => Ok(owned.value.as_ref()),
            None => Err(Error::MovedFrom),
        }
    }

    /// Get a mutable reference to the value
    pub fn try_get_mut(&mut self) -> Result<&mut T> {
        match &mut self.owned {
            Some(owned) => Ok(owned.value.as_mut()),
            None => Err(Error::MovedFrom),
        }
    }

    /// Drop the value and the eraser, leaving the handle moved-from.
    /// Does nothing if the handle is already moved-from.
    pub fn release(&mut self) {
        self.owned = None;
    }

    // Replace the eraser of a live handle, returning the previous one.
    // A moved-from handle drops `eraser` and returns `None`.
    pub(crate) fn swap_eraser(&mut self, eraser: Box<dyn Erase<P>>) -> Option<Box<dyn Erase<P>>> {
        let owned = self.owned.as_mut()?;
        Some(std::mem::replace(&mut owned.eraser, eraser))
    }

    /// Take the value out of the handle.
    /// The eraser is dropped, the slot in the container is left as is.
    pub fn into_inner(self) -> Result<T> {
        match self.owned {
            Some(owned) => Ok(*owned.value),
            None => Err(Error::MovedFrom),
        }
    }
}

impl<T, P: Copy> Managed<T, P> {
    /// Position of the slot this handle belongs to
    pub fn index(&self) -> P {
        self.index
    }

    /// Update the position of the slot.
    /// Containers call this when they renumber their slots.
    pub fn set_index(&mut self, index: P) {
        self.index = index;
    }

    /// Move the value and eraser into a new handle.
    /// `self` is left moved-from, the index is copied.
    pub fn take(&mut self) -> Self {
        Self {
            index: self.index,
            owned: self.owned.take(),
        }
    }

    /// Move `other` into `self`.
    ///
    /// The current value and eraser of `self` are released first, then
    /// `other` is moved in and left moved-from.
    /// With [`IndexPolicy::Source`] the index of `other` is copied,
    /// with [`IndexPolicy::Slot`] `self` keeps its index.
    pub fn assign(&mut self, other: &mut Self, policy: IndexPolicy) {
        if let IndexPolicy::Source = policy {
            self.index = other.index;
        }
        self.release();
        self.owned = other.owned.take();
    }

    /// Remove the handle's slot from its container.
    ///
    /// On success the value and the eraser are released and
    /// the handle is left moved-from.
    /// On failure the handle is left untouched.
    pub fn try_remove(&mut self) -> Result<()> {
        let owned = self.owned.as_ref().ok_or(Error::MovedFrom)?;
        owned.eraser.erase_at(self.index)?;
        self.release();
        Ok(())
    }

    /// Remove the handle's slot from its container.
    ///
    /// # Panics
    ///
    /// Panics if the handle is moved-from, or the slot can not be erased
    /// (see [`Managed::try_remove`])
    pub fn remove(&mut self) {
        if let Err(err) = self.try_remove() {
            panic!("failed to remove handle: {err}");
        }
    }
}

impl<T, P: Default> Default for Managed<T, P> {
    fn default() -> Self {
        Self::empty(P::default())
    }
}

impl<T, P> Deref for Managed<T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T, P> DerefMut for Managed<T, P> {
    fn deref_mut(&mut self) -> &mut T {
        match self.try_get_mut() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T: Debug, P: Debug> Debug for Managed<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owned {
            Some(owned) => f.debug_tuple(&format!("Managed<{:?}>", self.index)).field(&owned.value).finish(),
            None => f.debug_tuple("MovedFrom").field(&self.index).finish(),
        }
    }
}
