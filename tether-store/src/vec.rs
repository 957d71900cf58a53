use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::config::{Config, Renumber};
use crate::erase::{Erasable, Erase, Eraser, in_range};
use crate::error::{Error, Result};
use crate::factory::{Managing, append_handle, make_handle};
use crate::Managed;

// -----------------------------------------------------------------------------
//   - Checkout -
// -----------------------------------------------------------------------------
type Ticket = usize;

// Position of a checked out handle, kept up to date as slots are erased
#[derive(Debug, Copy, Clone, PartialEq)]
enum Checkout {
    At(usize),
    // The slot was erased while the handle was checked out.
    // The position is where the next slot now lives.
    Erased(usize),
}

enum Restore<T> {
    Restored(usize),
    Erased(usize, Managed<T>),
}

// The eraser of a checked out handle.
// The handle's own index is not renumbered while it is out of the
// container, so the erase goes through the checkout entry instead.
struct CheckoutEraser<T> {
    slots: Weak<RefCell<Slots<T>>>,
    ticket: Ticket,
}

impl<T> Erase<usize> for CheckoutEraser<T> {
    fn erase_at(&self, _: usize) -> Result<()> {
        let Some(shared) = self.slots.upgrade() else {
            log::warn!("unable to erase checkout {}, the container was dropped", self.ticket);
            return Err(Error::ContainerDropped);
        };

        let Ok(mut slots) = shared.try_borrow_mut() else {
            log::warn!("unable to erase checkout {}, the container is borrowed", self.ticket);
            return Err(Error::ContainerBorrowed);
        };

        let erased = match slots.checkout_position(self.ticket) {
            Some(Checkout::At(index)) => {
                log::trace!("erasing checked out slot {index}");
                slots.erase_at(index)
            }
            // Nothing left to erase
            Some(Checkout::Erased(_)) | None => {
                log::trace!("slot of checkout {} is already erased", self.ticket);
                None
            }
        };

        drop(slots);
        drop(erased);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
//   - Slots -
// -----------------------------------------------------------------------------
/// The storage behind a [`ManagedVec`].
///
/// Erasing a slot keeps the index of every later handle correct
/// when the renumbering policy is [`Renumber::Eager`].
pub struct Slots<T> {
    handles: Vec<Managed<T>>,
    config: Config,
    checked_out: Vec<(Ticket, Checkout)>,
    next_ticket: Ticket,
}

impl<T> Slots<T> {
    fn new(config: Config) -> Self {
        Self {
            handles: vec![],
            config,
            checked_out: vec![],
            next_ticket: 0,
        }
    }

    fn renumber(&mut self, from: usize) {
        if let Renumber::Never = self.config.renumber {
            return;
        }

        log::debug!("renumbering slots from {from}");
        self.handles[from..]
            .iter_mut()
            .enumerate()
            .for_each(|(offset, handle)| handle.set_index(from + offset));
    }

    fn reindex(&mut self) {
        log::debug!("reindexing {} slots", self.handles.len());
        self.handles
            .iter_mut()
            .enumerate()
            .for_each(|(index, handle)| handle.set_index(index));
    }

    fn is_checked_out(&self, index: usize) -> bool {
        self.checked_out.iter().any(|(_, c)| *c == Checkout::At(index))
    }

    fn checkout_position(&self, ticket: Ticket) -> Option<Checkout> {
        self.checked_out
            .iter()
            .find(|(t, _)| *t == ticket)
            .map(|(_, checkout)| *checkout)
    }

    fn insert(&mut self, index: usize, handle: Managed<T>) {
        self.handles.insert(index, handle);
        for (_, checkout) in self.checked_out.iter_mut() {
            *checkout = match *checkout {
                Checkout::At(pos) if pos >= index => Checkout::At(pos + 1),
                Checkout::Erased(pos) if pos >= index => Checkout::Erased(pos + 1),
                unchanged => unchanged,
            };
        }
        self.renumber(index + 1);
    }

    // Take the handle out of the slot, leaving a moved-from handle in its place.
    fn checkout(&mut self, index: usize) -> (Ticket, Managed<T>) {
        if self.is_checked_out(index) {
            panic!("handle already checked out");
        }

        let Some(slot) = self.handles.get_mut(index) else {
            panic!("no slot at index {index}")
        };

        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);

        log::trace!("checking out {index} (ticket {ticket})");
        self.checked_out.push((ticket, Checkout::At(index)));
        (ticket, slot.take())
    }

    // Put a checked out handle back.
    // If the slot was erased in the meantime the handle is handed back
    // so it can be dropped once the container is no longer borrowed.
    // A handle that was moved from while checked out never goes back
    // into the container, its slot is erased instead.
    fn restore(&mut self, ticket: Ticket, mut handle: Managed<T>) -> Restore<T> {
        let Some(pos) = self.checked_out.iter().position(|(t, _)| *t == ticket) else {
            panic!("no handle is checked out")
        };

        match self.checked_out.remove(pos).1 {
            Checkout::At(index) if handle.is_live() => {
                log::trace!("restoring {index}");
                if let Renumber::Eager = self.config.renumber {
                    handle.set_index(index);
                }
                self.handles[index] = handle;
                Restore::Restored(index)
            }
            Checkout::At(index) => {
                log::trace!("handle at {index} was moved from while checked out");
                drop(self.erase_at(index));
                Restore::Erased(index, handle)
            }
            Checkout::Erased(next) => {
                log::trace!("slot erased while checked out");
                Restore::Erased(next, handle)
            }
        }
    }
}

impl<T> Erasable for Slots<T> {
    type Item = Managed<T>;
    type Position = usize;

    fn check(&self, index: usize) -> Result<()> {
        in_range(index, self.handles.len())
    }

    fn erase_at(&mut self, index: usize) -> Option<Managed<T>> {
        let erased = self.handles.remove(index);

        for (_, checkout) in self.checked_out.iter_mut() {
            *checkout = match *checkout {
                Checkout::At(pos) if pos == index => Checkout::Erased(pos),
                Checkout::At(pos) if pos > index => Checkout::At(pos - 1),
                Checkout::Erased(pos) if pos > index => Checkout::Erased(pos - 1),
                unchanged => unchanged,
            };
        }

        self.renumber(index);
        Some(erased)
    }
}

impl<T> Managing for Slots<T> {
    type Value = T;

    fn next_position(&self) -> usize {
        self.handles.len()
    }

    fn push_managed(&mut self, handle: Managed<T>) {
        self.handles.push(handle);
    }
}

impl<T: Debug> Slots<T> {
    fn dump_state(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();

        for (pos, handle) in self.handles.iter().enumerate() {
            let _ = writeln!(&mut s, "{pos}: {handle:?}");
        }

        let _ = writeln!(&mut s, "---- checked out ----");

        for (_, checkout) in &self.checked_out {
            let _ = match checkout {
                Checkout::At(pos) => writeln!(&mut s, "at {pos}"),
                Checkout::Erased(next) => writeln!(&mut s, "erased (next: {next})"),
            };
        }

        s
    }
}

// -----------------------------------------------------------------------------
//   - Checked out -
// -----------------------------------------------------------------------------
// A handle out of its slot. Dropping it restores the handle,
// so a panic inside `ManagedVec::with` does not leave the slot checked out.
struct CheckedOut<'a, T> {
    slots: &'a Rc<RefCell<Slots<T>>>,
    ticket: Ticket,
    handle: Managed<T>,
    eraser: Option<Box<dyn Erase<usize>>>,
    restored: bool,
}

impl<T> CheckedOut<'_, T> {
    // Returns the index of the next slot
    fn restore(&mut self) -> usize {
        self.restored = true;

        let mut handle = self.handle.take();
        if let Some(eraser) = self.eraser.take() {
            handle.swap_eraser(eraser);
        }

        let restore = self.slots.borrow_mut().restore(self.ticket, handle);
        match restore {
            Restore::Restored(index) => index + 1,
            Restore::Erased(next, handle) => {
                drop(handle);
                next
            }
        }
    }
}

impl<T> Drop for CheckedOut<'_, T> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }

        if self.slots.try_borrow_mut().is_err() {
            log::warn!("unable to restore checkout {}, the container is borrowed", self.ticket);
            return;
        }

        self.restore();
    }
}

// -----------------------------------------------------------------------------
//   - Managed vec -
// -----------------------------------------------------------------------------
/// An ordered container of [`Managed`] handles.
///
/// Cloning a `ManagedVec` gives another reference to the same container.
///
/// ```
/// use tether_store::ManagedVec;
///
/// let words = ManagedVec::new();
/// for word in ["This", "Is", "A", "Test"] {
///     words.push(word);
/// }
///
/// words.for_each(|word| {
///     if **word == "A" {
///         word.remove();
///     }
/// });
///
/// let words = words.borrow().iter().map(|word| **word).collect::<Vec<_>>();
/// assert_eq!(words, vec!["This", "Is", "Test"]);
/// ```
pub struct ManagedVec<T> {
    inner: Rc<RefCell<Slots<T>>>,
}

impl<T: 'static> ManagedVec<T> {
    /// Create an empty container with the default config
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an empty container
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slots::new(config))),
        }
    }

    /// The config of the container
    pub fn config(&self) -> Config {
        self.inner.borrow().config
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.inner.borrow().handles.len()
    }

    /// `true` if there are no slots
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a value to the end, returning its index
    pub fn push(&self, value: T) -> usize {
        append_handle(&self.inner, value)
    }

    /// Insert a value at `index`, shifting every later slot up by one.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`
    pub fn insert(&self, index: usize, value: T) {
        let handle = make_handle(&self.inner, index, value);
        self.inner.borrow_mut().insert(index, handle);
    }

    /// Create a handle bound to this container without inserting it
    pub fn make_handle(&self, index: usize, value: T) -> Managed<T> {
        make_handle(&self.inner, index, value)
    }

    /// Borrow all the handles in order.
    ///
    /// Removing a handle while the container is borrowed
    /// fails with [`Error::ContainerBorrowed`](crate::Error::ContainerBorrowed).
    pub fn borrow(&self) -> Ref<'_, [Managed<T>]> {
        Ref::map(self.inner.borrow(), |slots| slots.handles.as_slice())
    }

    /// Erase the slot at `index`
    pub fn remove(&self, index: usize) -> Result<()> {
        Eraser::new(&self.inner).erase_at(index)
    }

    /// Check out the handle at `index` and call `f` with it.
    /// The container is not borrowed while `f` runs, so the handle
    /// can remove itself.
    ///
    /// # Panics
    ///
    /// Panics if there is no slot at `index` or the handle is already checked out.
    pub fn with<F, U>(&self, index: usize, f: F) -> U
    where
        F: FnOnce(&mut Managed<T>) -> U,
    {
        let (ret, _) = self.visit(index, f);
        ret
    }

    // Returns the value of `f` and the index of the next slot to visit
    fn visit<F, U>(&self, index: usize, f: F) -> (U, usize)
    where
        F: FnOnce(&mut Managed<T>) -> U,
    {
        let (ticket, mut handle) = self.inner.borrow_mut().checkout(index);
        let checkout_eraser = CheckoutEraser {
            slots: Rc::downgrade(&self.inner),
            ticket,
        };
        let eraser = handle.swap_eraser(Box::new(checkout_eraser));

        let mut checked_out = CheckedOut {
            slots: &self.inner,
            ticket,
            handle,
            eraser,
            restored: false,
        };

        let ret = f(&mut checked_out.handle);
        (ret, checked_out.restore())
    }

    /// Call `f` with every handle in order.
    /// Handles removing themselves from within `f` does not cause
    /// any other handle to be skipped.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&mut Managed<T>),
    {
        let mut index = 0;
        while index < self.len() {
            let ((), next) = self.visit(index, &mut f);
            index = next;
        }
    }

    /// Move the handle at `src` into the slot at `dst`, then erase the slot at `src`.
    /// The value previously at `dst` is dropped.
    ///
    /// The moved handle's index follows the configured
    /// [`IndexPolicy`](crate::IndexPolicy) and is then corrected
    /// to its slot under [`Renumber::Eager`].
    ///
    /// # Panics
    ///
    /// Panics if either handle is checked out.
    pub fn overwrite(&self, dst: usize, src: usize) -> Result<()> {
        if dst == src {
            return Ok(());
        }

        {
            let mut slots = self.inner.borrow_mut();
            slots.check(dst)?;
            slots.check(src)?;

            if slots.is_checked_out(dst) || slots.is_checked_out(src) {
                panic!("handle is checked out");
            }

            let policy = slots.config.index_policy;
            let mut incoming = slots.handles[src].take();
            let previous = slots.handles[dst].take();
            slots.handles[dst].assign(&mut incoming, policy);
            if let Renumber::Eager = slots.config.renumber {
                slots.handles[dst].set_index(dst);
            }

            // The previous value is dropped once the container is no longer borrowed
            drop(slots);
            drop(previous);
        }

        self.remove(src)
    }

    /// Set the index of every handle to its position.
    /// Needed after erasing slots when renumbering is [`Renumber::Never`].
    pub fn reindex(&self) {
        self.inner.borrow_mut().reindex();
    }
}

impl<T: Debug> ManagedVec<T> {
    #[doc(hidden)]
    pub fn dump_state(&self) -> String {
        self.inner.borrow().dump_state()
    }
}

impl<T: 'static> Default for ManagedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ManagedVec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
