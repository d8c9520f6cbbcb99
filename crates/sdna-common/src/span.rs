//! Growable array with explicit capacity control.
//!
//! [`SpanArray`] wraps a `Vec` but makes every growth decision visible:
//! capacity only changes through [`SpanArray::reserve`] (or the doubling
//! performed by [`SpanArray::append`]), allocation failure is reported as an
//! error instead of aborting, and [`SpanArray::clear`] can keep the buffer
//! around for reuse a bounded number of times.

use std::ops::{Index, IndexMut};

use crate::{Error, Result};

/// Smallest capacity used when `append` has to grow the buffer.
pub const MIN_GROWTH: usize = 8;

/// Number of consecutive reusing clears before the buffer is released anyway.
pub const DEFAULT_REUSE_LIMIT: u32 = 16;

/// A growable, explicitly-resized sequence.
#[derive(Debug, Clone)]
pub struct SpanArray<T> {
    items: Vec<T>,
    reuse_count: u32,
    reuse_limit: u32,
}

impl<T> Default for SpanArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SpanArray<T> {
    /// Create an empty array without allocating.
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            reuse_count: 0,
            reuse_limit: DEFAULT_REUSE_LIMIT,
        }
    }

    /// Create an empty array that releases its buffer after `limit` reusing clears.
    pub const fn with_reuse_limit(limit: u32) -> Self {
        Self {
            items: Vec::new(),
            reuse_count: 0,
            reuse_limit: limit,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// How many reusing clears happened since the buffer was last released.
    #[inline]
    pub fn reuse_count(&self) -> u32 {
        self.reuse_count
    }

    /// Ensure room for `n` live elements.
    ///
    /// Does nothing when `n` does not exceed the current capacity.
    pub fn reserve(&mut self, n: usize) -> Result<()> {
        if n <= self.items.capacity() {
            return Ok(());
        }
        let additional = n - self.items.len();
        self.items
            .try_reserve_exact(additional)
            .map_err(|_| Error::AllocationFailed {
                requested: n.saturating_mul(std::mem::size_of::<T>()),
            })
    }

    /// Append a value, doubling the capacity (at least [`MIN_GROWTH`]) when full.
    ///
    /// Returns the index of the new element.
    pub fn append(&mut self, value: T) -> Result<usize> {
        if self.items.len() == self.items.capacity() {
            let target = self.items.capacity().saturating_mul(2).max(MIN_GROWTH);
            self.reserve(target)?;
        }
        let index = self.items.len();
        self.items.push(value);
        Ok(index)
    }

    /// Grow or shrink to exactly `n` live elements, constructing new ones with `f`.
    pub fn resize_with(&mut self, n: usize, f: impl FnMut() -> T) -> Result<()> {
        if n > self.items.len() {
            self.reserve(n)?;
        }
        self.items.resize_with(n, f);
        Ok(())
    }

    /// Remove element `index` by moving the last element into its slot.
    ///
    /// Does not preserve order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove_swap(&mut self, index: usize) -> T {
        self.items.swap_remove(index)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Drop every live element.
    ///
    /// With `reuse` the buffer is kept for the next fill, unless it has
    /// already been reused `reuse_limit` times in a row, in which case it is
    /// released like a plain clear.
    pub fn clear(&mut self, reuse: bool) {
        if reuse && self.reuse_count < self.reuse_limit {
            self.items.clear();
            self.reuse_count += 1;
        } else {
            self.items = Vec::new();
            self.reuse_count = 0;
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Clone> SpanArray<T> {
    /// Grow or shrink to exactly `n` live elements, filling new slots with `fill`.
    pub fn resize(&mut self, n: usize, fill: T) -> Result<()> {
        if n > self.items.len() {
            self.reserve(n)?;
        }
        self.items.resize(n, fill);
        Ok(())
    }

    /// Create an array of `n` copies of `fill`.
    pub fn filled(n: usize, fill: T) -> Result<Self> {
        let mut array = Self::new();
        array.resize(n, fill)?;
        Ok(array)
    }
}

impl<T> From<Vec<T>> for SpanArray<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            reuse_count: 0,
            reuse_limit: DEFAULT_REUSE_LIMIT,
        }
    }
}

impl<T> Index<usize> for SpanArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        debug_assert!(
            index < self.items.len(),
            "SpanArray index {index} out of bounds (len {})",
            self.items.len()
        );
        &self.items[index]
    }
}

impl<T> IndexMut<usize> for SpanArray<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(
            index < self.items.len(),
            "SpanArray index {index} out of bounds (len {})",
            self.items.len()
        );
        &mut self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a SpanArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> IntoIterator for SpanArray<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
