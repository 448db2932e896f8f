use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};

use mosaic_error::MosaicResult;

use crate::buffer::Preview;
use crate::{Buffer, BufferFactory};

/// A mutable buffer of items of `T`, frozen into a [`Buffer`] once complete.
#[derive(Clone, PartialEq, Eq)]
pub struct BufferMut<T> {
    values: Vec<T>,
}

impl<T> BufferMut<T> {
    /// Create a new empty buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Create a new empty buffer.
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    /// Create a new buffer of `len` copies of `item`.
    pub fn full(item: T, len: usize) -> Self
    where
        T: Clone,
    {
        Self {
            values: vec![item; len],
        }
    }

    /// Create a new buffer copied from the provided slice.
    pub fn copy_from(values: impl AsRef<[T]>) -> Self
    where
        T: Clone,
    {
        Self {
            values: values.as_ref().to_vec(),
        }
    }

    /// Returns the length of the buffer.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was pushed yet.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the capacity of the buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Reserves capacity for at least `additional` more elements.
    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional)
    }

    /// Appends an item to the buffer.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.values.push(value)
    }

    /// Shortens the buffer, keeping the first `len` elements.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len)
    }

    /// Freeze the buffer into heap-owned memory.
    pub fn freeze(self) -> Buffer<T> {
        Buffer::from(self.values)
    }

    /// Freeze the buffer into memory provided by `factory`.
    pub fn freeze_in(self, factory: BufferFactory<'_>) -> MosaicResult<Buffer<T>> {
        factory.allocate(self.values)
    }
}

impl<T> Default for BufferMut<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Debug> Debug for BufferMut<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferMut")
            .field("length", &self.values.len())
            .field("values", &Preview(&self.values))
            .finish()
    }
}

impl<T> Deref for BufferMut<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl<T> DerefMut for BufferMut<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

impl<T> AsRef<[T]> for BufferMut<T> {
    fn as_ref(&self) -> &[T] {
        &self.values
    }
}

impl<T> Extend<T> for BufferMut<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.values.extend(iter)
    }
}

impl<T> From<Vec<T>> for BufferMut<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T> FromIterator<T> for BufferMut<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            values: Vec::from_iter(iter),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{Arena, BufferFactory, BufferMut, buffer_mut};

    #[test]
    fn freeze_on_heap() {
        let mut buf = buffer_mut![1i32, 2];
        buf.push(3);
        buf[0] = 10;
        let frozen = buf.freeze();
        assert!(frozen.is_owned());
        assert_eq!(frozen.as_slice(), &[10, 2, 3]);
    }

    #[test]
    fn freeze_in_arena() {
        let arena = Arena::new();
        let buf: BufferMut<u32> = (0..4).collect();
        let frozen = buf.freeze_in(BufferFactory::Arena(&arena)).unwrap();
        assert!(!frozen.is_owned());
        assert_eq!(frozen.as_slice(), &[0, 1, 2, 3]);
        assert_eq!(arena.allocated_bytes(), 16);
    }
}
