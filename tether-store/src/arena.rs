//! A generational arena.
//!
//! Unlike a vector, removing a value from the arena does not shift the
//! subsequent values down. The slot is marked as vacant and reused by the
//! next insert with a new generation, so a [`Key`] never goes stale by
//! pointing at a different value: it either finds its own value or nothing.
//!
//! Handles stored in a [`ManagedArena`] use the key as their position,
//! which means erasing a sibling never invalidates a handle's position.
use std::cell::{Ref, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::erase::{Erasable, Erase, Eraser};
use crate::error::{Error, Result};
use crate::factory::{Managing, append_handle};
use crate::Managed;

/// A generation associated with a key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Generation(u16);

impl From<u16> for Generation {
    fn from(val: u16) -> Self {
        Self(val)
    }
}

/// A key is a combination of an index and a generation.
/// To access a value using a key the value at the given index
/// has to have a matching generation.
///
/// Bits 0..48: 48-bit index
/// Bits 48..64 are the 16-bit generation
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Key(u64);

impl Key {
    const GEN_BITS: usize = 16;
    const INDEX_BITS: usize = 48;
    /// Zero for both index and generation
    pub const ZERO: Self = Self(0);

    /// Create a new key with a generation of zero
    pub const fn new(index: usize) -> Self {
        Self((index as u64) << Self::GEN_BITS >> Self::GEN_BITS)
    }

    fn bump(mut self) -> Self {
        let generation = self.generation().0.wrapping_add(1);
        self.set_generation(generation);
        self
    }

    fn set_generation(&mut self, generation: u16) {
        let generation = (generation as u64) << Self::INDEX_BITS;
        self.0 = (self.0 << Self::GEN_BITS >> Self::GEN_BITS) | generation;
    }

    /// The index of the slot
    pub const fn index(&self) -> usize {
        (self.0 << Self::GEN_BITS >> Self::GEN_BITS) as usize
    }

    /// The key generation
    pub const fn generation(&self) -> Generation {
        Generation((self.0 >> Self::INDEX_BITS) as u16)
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key <{}:{}>", self.index(), self.generation().0)
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<(usize, Generation)> for Key {
    fn from((index, generation): (usize, Generation)) -> Self {
        let mut key = Key::new(index);
        key.set_generation(generation.0);
        key
    }
}

// -----------------------------------------------------------------------------
//   - Entry -
// -----------------------------------------------------------------------------
#[derive(Debug, PartialEq)]
enum Entry<T> {
    Vacant(Option<Key>),
    Occupied(T, Generation),
}

// -----------------------------------------------------------------------------
//   - Arena -
// -----------------------------------------------------------------------------
/// A generational arena.
/// Each value inserted is given a generation.
/// If another value is inserted at the same index it will have a new generation.
#[derive(Debug)]
pub struct Arena<T> {
    next_key: Option<Key>,
    inner: Vec<Entry<T>>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena
    pub const fn empty() -> Self {
        Self {
            next_key: None,
            inner: vec![],
            len: 0,
        }
    }

    /// Reserve capacity, this does not fill the underlying storage
    /// with vacant entries.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            next_key: None,
            inner: Vec::with_capacity(cap),
            len: 0,
        }
    }

    /// Number of occupied entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if there are no occupied entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The key the next insert will return,
    /// as long as nothing else is inserted or removed before that.
    pub fn next_key(&self) -> Key {
        match self.next_key {
            Some(key) => key,
            None => Key::new(self.inner.len()),
        }
    }

    // If there is a `self.next_key` then `take` the key (making it None)
    // and replace the vacant entry at the given key.
    //
    // Write the vacant entry's `next_key` into self.next_key, and
    // finally replace the vacant entry with the occupied value
    /// Insert a value into the arena
    pub fn insert(&mut self, value: T) -> Key {
        self.len += 1;
        match self.next_key.take() {
            Some(key) => {
                let entry = &mut self.inner[key.index()];

                let Entry::Vacant(next_key) = entry else {
                    unreachable!("the next key always points to a vacant entry")
                };

                self.next_key = next_key.take();
                *entry = Entry::Occupied(value, key.generation());
                key
            }
            None => {
                let key = Key::new(self.inner.len());
                self.inner.push(Entry::Occupied(value, key.generation()));
                key
            }
        }
    }

    /// Remove a value from the arena, as long as the index and generation matches
    pub fn try_remove(&mut self, key: Key) -> Option<T> {
        if !self.contains(key) {
            return None;
        }

        let mut entry = Entry::Vacant(self.next_key.take());
        std::mem::swap(&mut self.inner[key.index()], &mut entry);
        self.next_key = Some(key.bump());
        self.len -= 1;

        match entry {
            Entry::Occupied(value, _) => Some(value),
            Entry::Vacant(_) => unreachable!("the entry was checked"),
        }
    }

    /// Remove a value from the arena.
    ///
    /// # Panics
    ///
    /// Panics if the key is stale or there is no value at the key
    pub fn remove(&mut self, key: Key) -> T {
        match self.try_remove(key) {
            Some(value) => value,
            None => panic!("{}", Error::StaleKey(key)),
        }
    }

    /// `true` if there is a value at the key with a matching generation
    pub fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Get a reference to a value in the arena
    pub fn get(&self, key: Key) -> Option<&T> {
        match self.inner.get(key.index())? {
            Entry::Occupied(val, generation) if key.generation() == *generation => Some(val),
            _ => None,
        }
    }

    /// Get a mutable reference to a value in the arena
    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        match self.inner.get_mut(key.index())? {
            Entry::Occupied(val, generation) if key.generation() == *generation => Some(val),
            _ => None,
        }
    }

    /// Iterate over the keys and values.
    ///
    /// Be aware that this will only ever be as performant as
    /// the underlying vector if all entries are occupied.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &T)> + '_ {
        self.inner.iter().enumerate().filter_map(|(i, e)| match e {
            Entry::Occupied(val, generation) => Some(((i, *generation).into(), val)),
            Entry::Vacant(_) => None,
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Erasable for Arena<T> {
    type Item = T;
    type Position = Key;

    fn check(&self, key: Key) -> Result<()> {
        match self.contains(key) {
            true => Ok(()),
            false => Err(Error::StaleKey(key)),
        }
    }

    fn erase_at(&mut self, key: Key) -> Option<T> {
        self.try_remove(key)
    }
}

impl<T> Managing for Arena<Managed<T, Key>> {
    type Value = T;

    fn next_position(&self) -> Key {
        self.next_key()
    }

    fn push_managed(&mut self, handle: Managed<T, Key>) {
        debug_assert_eq!(handle.index(), self.next_key());
        self.insert(handle);
    }
}

impl<T: Debug> Arena<T> {
    #[doc(hidden)]
    pub fn dump_state(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();

        for (idx, value) in self.inner.iter().enumerate() {
            let _ = match value {
                Entry::Vacant(key) => {
                    let _ = write!(&mut s, "{idx}: vacant ");
                    match key {
                        Some(key) => writeln!(&mut s, "next key: {key:?}"),
                        None => writeln!(&mut s, "no next key"),
                    }
                }
                Entry::Occupied(value, generation) => {
                    writeln!(&mut s, "{idx}: (gen: {}) | {value:?}", generation.0)
                }
            };
        }

        let _ = writeln!(&mut s, "---- next key ----");

        let _ = match self.next_key {
            Some(key) => writeln!(&mut s, "next key: {key:?}"),
            None => writeln!(&mut s, "no next key"),
        };

        s
    }
}

// A handle out of its slot, restored when dropped
struct CheckedOut<'a, T> {
    arena: &'a Rc<RefCell<Arena<Managed<T, Key>>>>,
    key: Key,
    handle: Managed<T, Key>,
    restored: bool,
}

impl<T> CheckedOut<'_, T> {
    fn restore(&mut self) {
        self.restored = true;
        let handle = self.handle.take();
        let key = self.key;

        let mut arena = self.arena.borrow_mut();
        let erased = match (arena.contains(key), handle.is_live()) {
            (true, true) => {
                if let Some(slot) = arena.get_mut(key) {
                    *slot = handle;
                }
                None
            }
            // Moved from while checked out, the slot goes with it
            (true, false) => arena.try_remove(key),
            (false, _) => Some(handle),
        };

        // An erased handle is dropped once the arena is no longer borrowed
        drop(arena);
        if let Some(handle) = erased {
            log::trace!("{key:?} was erased while checked out");
            drop(handle);
        }
    }
}

impl<T> Drop for CheckedOut<'_, T> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }

        if self.arena.try_borrow_mut().is_err() {
            log::warn!("unable to restore {:?}, the arena is borrowed", self.key);
            return;
        }

        self.restore();
    }
}

// -----------------------------------------------------------------------------
//   - Managed arena -
// -----------------------------------------------------------------------------
/// Handles stored in an [`Arena`], positioned by [`Key`].
///
/// ```
/// use tether_store::ManagedArena;
///
/// let arena = ManagedArena::new();
/// let a = arena.push("a");
/// let b = arena.push("b");
///
/// arena.with(a, |handle| handle.remove());
///
/// // The key of `b` is still valid
/// assert_eq!(arena.with(b, |handle| **handle), "b");
/// ```
pub struct ManagedArena<T> {
    inner: Rc<RefCell<Arena<Managed<T, Key>>>>,
}

impl<T: 'static> ManagedArena<T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Arena::empty())),
        }
    }

    /// Insert a value, returning its key
    pub fn push(&self, value: T) -> Key {
        append_handle(&self.inner, value)
    }

    /// Number of handles
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// `true` if there are no handles
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if the key belongs to a handle in the arena
    pub fn contains(&self, key: Key) -> bool {
        self.inner.borrow().contains(key)
    }

    /// Borrow the arena
    pub fn borrow(&self) -> Ref<'_, Arena<Managed<T, Key>>> {
        self.inner.borrow()
    }

    /// Erase the handle at `key`
    pub fn remove(&self, key: Key) -> Result<()> {
        Eraser::new(&self.inner).erase_at(key)
    }

    /// Check out the handle at `key` and call `f` with it.
    /// The arena is not borrowed while `f` runs, so the handle
    /// can remove itself.
    ///
    /// # Panics
    ///
    /// Panics if the key is stale or the handle is already checked out.
    pub fn with<F, U>(&self, key: Key, f: F) -> U
    where
        F: FnOnce(&mut Managed<T, Key>) -> U,
    {
        let handle = match self.inner.borrow_mut().get_mut(key) {
            Some(slot) if slot.is_live() => slot.take(),
            Some(_) => panic!("handle already checked out"),
            None => panic!("{}", Error::StaleKey(key)),
        };

        log::trace!("checked out {key:?}");
        let mut checked_out = CheckedOut {
            arena: &self.inner,
            key,
            handle,
            restored: false,
        };

        let ret = f(&mut checked_out.handle);
        checked_out.restore();
        ret
    }

    /// Call `f` with every handle.
    /// Handles erased by an earlier call are not visited.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&mut Managed<T, Key>),
    {
        let keys = self.inner.borrow().iter().map(|(key, _)| key).collect::<Vec<_>>();
        for key in keys {
            if self.contains(key) {
                self.with(key, &mut f);
            }
        }
    }
}

impl<T: 'static> Default for ManagedArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ManagedArena<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut arena = Arena::empty();
        let key = arena.insert(123);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.remove(key), 123);
        assert!(arena.is_empty());
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut arena = Arena::empty();
        let key_1 = arena.insert(1);
        let _ = arena.remove(key_1);
        let key_2 = arena.insert(2);
        assert_eq!(key_1.index(), key_2.index());
        assert_ne!(key_1.generation(), key_2.generation());
        assert!(arena.get(key_1).is_none());
        assert_eq!(arena.get(key_2), Some(&2));
    }

    #[test]
    fn next_key_matches_insert() {
        let mut arena = Arena::empty();
        let key = arena.insert("a");
        arena.remove(key);
        let next = arena.next_key();
        assert_eq!(next, arena.insert("b"));
        assert_eq!(arena.next_key(), Key::new(1));
    }

    #[test]
    fn get_mut() {
        let mut arena = Arena::empty();
        let key = arena.insert(1);
        *arena.get_mut(key).unwrap() = 2;
        assert_eq!(arena.get(key), Some(&2));
    }

    #[test]
    #[should_panic(expected = "stale key: Key <0:0>")]
    fn remove_stale_key() {
        let mut arena = Arena::empty();
        let key = arena.insert(1);
        arena.remove(key);
        arena.remove(key);
    }

    #[test]
    fn wrapping_generation() {
        let mut key = Key::new(3).bump();
        key.set_generation(u16::MAX);
        let key = key.bump();
        assert_eq!(key.generation(), Generation(0));
        assert_eq!(key.index(), 3);
        assert_eq!(format!("{key:?}"), "Key <3:0>");
    }

    #[test]
    fn key_from_parts() {
        let key = Key::from((5, Generation::from(2)));
        assert_eq!(key.index(), 5);
        assert_eq!(key.generation(), Generation(2));
    }

    #[test]
    fn erase_does_not_shift_siblings() {
        let arena = ManagedArena::new();
        let keys = ["This", "Is", "A", "Test"].map(|word| arena.push(word));

        arena.for_each(|handle| {
            if **handle == "A" {
                handle.remove();
            }
        });

        assert_eq!(arena.len(), 3);
        assert!(!arena.contains(keys[2]));
        for key in [keys[0], keys[1], keys[3]] {
            assert_eq!(arena.with(key, |handle| handle.index()), key);
        }

        let words = arena.borrow().iter().map(|(_, handle)| **handle).collect::<Vec<_>>();
        assert_eq!(words, vec!["This", "Is", "Test"]);
    }

    #[test]
    fn removed_key_is_rejected() {
        let arena = ManagedArena::new();
        let key = arena.push(1);
        arena.remove(key).unwrap();
        assert_eq!(arena.remove(key).unwrap_err(), Error::StaleKey(key));

        // The slot is reused, the old key still does not match
        let new_key = arena.push(2);
        assert_eq!(new_key.index(), key.index());
        assert!(!arena.contains(key));
    }

    #[test]
    fn handle_removed_while_checked_out() {
        let arena = ManagedArena::new();
        let key = arena.push(String::from("a"));
        let outer = arena.clone();
        arena.with(key, |handle| {
            outer.remove(key).unwrap();
            assert_eq!(handle.try_remove().unwrap_err(), Error::StaleKey(key));
        });
        assert!(arena.is_empty());
    }

    #[test]
    fn handle_moved_out_while_checked_out() {
        let arena = ManagedArena::new();
        let a = arena.push('a');
        let b = arena.push('b');

        let escaped = arena.with(a, |handle| handle.take());
        assert_eq!(*escaped, 'a');
        assert!(!arena.contains(a));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.with(b, |handle| **handle), 'b');
    }

    #[test]
    fn panic_while_checked_out_restores_the_handle() {
        let arena = ManagedArena::new();
        let key = arena.push(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            arena.with(key, |handle| {
                if **handle == 1 {
                    panic!("boom");
                }
            });
        }));
        assert!(result.is_err());
        assert_eq!(arena.with(key, |handle| **handle), 1);
    }

    #[test]
    #[should_panic(expected = "handle already checked out")]
    fn double_checkout() {
        let arena = ManagedArena::new();
        let key = arena.push(1);
        let inner = arena.clone();
        arena.with(key, |_| inner.with(key, |_| ()));
    }
}
