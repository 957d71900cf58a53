//! Removal capability.
//!
//! An [`Eraser`] is bound to exactly one container and can erase the element
//! at a given position in that container. A handle stores the eraser as a
//! `Box<dyn Erase<P>>`, so the handle's type never mentions the container.
//!
//! The eraser only holds a weak reference: the container is expected to outlive
//! every handle bound to it. If it does not, erasing fails with
//! [`Error::ContainerDropped`] rather than touching freed memory.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};

/// A container that can erase an element by position.
pub trait Erasable {
    /// Position of an element in the container
    type Position: Copy + Debug;

    /// The erased element
    type Item;

    /// Check that `position` refers to an element in the container
    fn check(&self, position: Self::Position) -> Result<()>;

    /// Erase the element at `position` and return it.
    /// For ordered containers every element after `position` moves down by one.
    ///
    /// # Panics
    ///
    /// May panic if the position is invalid, see [`Erasable::check`]
    fn erase_at(&mut self, position: Self::Position) -> Option<Self::Item>;
}

pub(crate) fn in_range(index: usize, len: usize) -> Result<()> {
    match index < len {
        true => Ok(()),
        false => Err(Error::OutOfRange { index, len }),
    }
}

impl<T> Erasable for Vec<T> {
    type Item = T;
    type Position = usize;

    fn check(&self, index: usize) -> Result<()> {
        in_range(index, self.len())
    }

    fn erase_at(&mut self, index: usize) -> Option<T> {
        Some(self.remove(index))
    }
}

impl<T> Erasable for VecDeque<T> {
    type Item = T;
    type Position = usize;

    fn check(&self, index: usize) -> Result<()> {
        in_range(index, self.len())
    }

    fn erase_at(&mut self, index: usize) -> Option<T> {
        self.remove(index)
    }
}

/// The ability to erase the element at a position from one specific container.
pub trait Erase<P> {
    /// Erase the element at `position`
    fn erase_at(&self, position: P) -> Result<()>;
}

/// An [`Erase`] implementation for any [`Erasable`] container
/// shared as `Rc<RefCell<C>>`.
pub struct Eraser<C>(Weak<RefCell<C>>);

impl<C> Eraser<C> {
    /// Bind an eraser to a container
    pub fn new(container: &Rc<RefCell<C>>) -> Self {
        Self(Rc::downgrade(container))
    }

    /// `true` as long as the container is alive
    pub fn is_bound(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl<C: Erasable> Erase<C::Position> for Eraser<C> {
    fn erase_at(&self, position: C::Position) -> Result<()> {
        let Some(shared) = self.0.upgrade() else {
            log::warn!("unable to erase {position:?}, the container was dropped");
            return Err(Error::ContainerDropped);
        };

        let Ok(mut container) = shared.try_borrow_mut() else {
            log::warn!("unable to erase {position:?}, the container is borrowed");
            return Err(Error::ContainerBorrowed);
        };

        container.check(position)?;
        log::trace!("erasing {position:?}");
        let erased = container.erase_at(position);

        // The erased element may reach back into the container when dropped
        drop(container);
        drop(erased);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use super::*;

    fn shared<T>(values: impl IntoIterator<Item = T>) -> Rc<RefCell<Vec<T>>> {
        Rc::new(RefCell::new(values.into_iter().collect()))
    }

    #[test]
    fn erase_shifts_later_elements() {
        let container = shared([1, 2, 3]);
        let eraser = Eraser::new(&container);
        eraser.erase_at(0).unwrap();
        assert_eq!(*container.borrow(), vec![2, 3]);
    }

    #[test]
    fn erase_from_deque() {
        let container = Rc::new(RefCell::new(VecDeque::from(["a", "b", "c"])));
        let eraser = Eraser::new(&container);
        eraser.erase_at(1).unwrap();
        assert_eq!(*container.borrow(), VecDeque::from(["a", "c"]));
    }

    #[test]
    fn out_of_range() {
        let container = shared([1]);
        let eraser = Eraser::new(&container);
        let err = eraser.erase_at(1).unwrap_err();
        assert_eq!(err, Error::OutOfRange { index: 1, len: 1 });
        assert_eq!(container.borrow().len(), 1);
    }

    #[test]
    fn dropped_container() {
        let container = shared([1]);
        let eraser = Eraser::new(&container);
        assert!(eraser.is_bound());
        drop(container);
        assert!(!eraser.is_bound());
        assert_eq!(eraser.erase_at(0).unwrap_err(), Error::ContainerDropped);
    }

    #[test]
    fn borrowed_container() {
        let container = shared([1]);
        let eraser = Eraser::new(&container);
        let _guard = container.borrow();
        assert_eq!(eraser.erase_at(0).unwrap_err(), Error::ContainerBorrowed);
    }

    // Reads the length of its own container when dropped
    struct LenOnDrop(Weak<RefCell<Vec<LenOnDrop>>>, Rc<Cell<Option<usize>>>);

    impl Drop for LenOnDrop {
        fn drop(&mut self) {
            if let Some(container) = self.0.upgrade() {
                self.1.set(Some(container.borrow().len()));
            }
        }
    }

    #[test]
    fn erased_element_dropped_after_borrow_ends() {
        let seen = Rc::new(Cell::new(None));
        let container = Rc::new(RefCell::new(vec![]));
        for _ in 0..2 {
            let element = LenOnDrop(Rc::downgrade(&container), seen.clone());
            container.borrow_mut().push(element);
        }

        Eraser::new(&container).erase_at(0).unwrap();
        assert_eq!(seen.get(), Some(1));
    }
}
