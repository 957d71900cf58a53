use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::Managed;
use crate::erase::{Erasable, Eraser};

/// A container of [`Managed`] handles that can append new handles.
pub trait Managing: Erasable {
    /// The value type of the handles
    type Value;

    /// The position the next pushed handle will occupy
    fn next_position(&self) -> Self::Position;

    /// Push a handle into the container.
    /// The handle is expected to be created with [`Managing::next_position`]
    fn push_managed(&mut self, handle: Managed<Self::Value, Self::Position>);
}

impl<T> Managing for Vec<Managed<T>> {
    type Value = T;

    fn next_position(&self) -> usize {
        self.len()
    }

    fn push_managed(&mut self, handle: Managed<T>) {
        self.push(handle);
    }
}

impl<T> Managing for VecDeque<Managed<T>> {
    type Value = T;

    fn next_position(&self) -> usize {
        self.len()
    }

    fn push_managed(&mut self, handle: Managed<T>) {
        self.push_back(handle);
    }
}

/// Create a handle bound to `container` for the slot at `index`.
/// The handle is not inserted.
pub fn make_handle<C, T>(container: &Rc<RefCell<C>>, index: C::Position, value: T) -> Managed<T, C::Position>
where
    C: Erasable + 'static,
{
    Managed::new(Box::new(Eraser::new(container)), index, Box::new(value))
}

/// Same as [`make_handle`] but the value is constructed by `init`.
/// If `init` fails the error is returned and nothing is bound to the container.
pub fn try_make_handle<C, T, E, F>(container: &Rc<RefCell<C>>, index: C::Position, init: F) -> Result<Managed<T, C::Position>, E>
where
    C: Erasable + 'static,
    F: FnOnce() -> Result<T, E>,
{
    let value = init()?;
    Ok(make_handle(container, index, value))
}

/// Create a handle for the next position in the container and push it.
/// Returns the position of the new handle.
///
/// # Panics
///
/// Panics if the container is currently borrowed
pub fn append_handle<C>(container: &Rc<RefCell<C>>, value: C::Value) -> C::Position
where
    C: Managing + 'static,
{
    let position = container.borrow().next_position();
    let handle = make_handle(container, position, value);
    container.borrow_mut().push_managed(handle);
    position
}
