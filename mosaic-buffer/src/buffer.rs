use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::{Bound, Deref, RangeBounds};
use std::sync::Arc;

use mosaic_error::mosaic_panic;

use crate::BufferMut;

/// The memory behind a [`Buffer`], tagged with who keeps it alive.
pub(crate) enum Storage<T> {
    /// Heap memory co-owned by the buffer. Safe to retain indefinitely.
    Owned(Arc<[T]>),
    /// Arena memory, or an explicitly unowned view of other memory. Only valid for the scope that
    /// produced it; [`Buffer::make_owned`] copies it out.
    Borrowed(Arc<[T]>),
}

impl<T> Storage<T> {
    #[inline(always)]
    fn data(&self) -> &Arc<[T]> {
        match self {
            Storage::Owned(data) | Storage::Borrowed(data) => data,
        }
    }
}

impl<T> Clone for Storage<T> {
    fn clone(&self) -> Self {
        match self {
            Storage::Owned(data) => Storage::Owned(data.clone()),
            Storage::Borrowed(data) => Storage::Borrowed(data.clone()),
        }
    }
}

/// An immutable, ownership-tagged run of `T` items.
///
/// Cloning and slicing share the underlying memory.
pub struct Buffer<T> {
    storage: Storage<T>,
    offset: usize,
    length: usize,
}

impl<T> Buffer<T> {
    pub(crate) fn owned(data: Arc<[T]>) -> Self {
        let length = data.len();
        Self {
            storage: Storage::Owned(data),
            offset: 0,
            length,
        }
    }

    pub(crate) fn borrowed(data: Arc<[T]>) -> Self {
        let length = data.len();
        Self {
            storage: Storage::Borrowed(data),
            offset: 0,
            length,
        }
    }

    /// Returns a new heap-owned `Buffer<T>` copied from the provided `Vec<T>`, `&[T]`, etc.
    pub fn copy_from(values: impl AsRef<[T]>) -> Self
    where
        T: Clone,
    {
        BufferMut::copy_from(values).freeze()
    }

    /// Create a new empty buffer.
    pub fn empty() -> Self {
        Self::owned(Arc::from(Vec::new()))
    }

    /// Create a new buffer of `len` copies of `item`.
    pub fn full(item: T, len: usize) -> Self
    where
        T: Clone,
    {
        BufferMut::full(item, len).freeze()
    }

    /// Number of items visible through this buffer.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether no items are visible.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The visible items.
    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        &self.storage.data()[self.offset..self.offset + self.length]
    }

    /// Iterates the visible items in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.as_slice().iter()
    }

    /// Returns a slice of self for the provided range, sharing the underlying memory.
    ///
    /// # Panics
    ///
    /// Panics with `OutOfBounds` unless the range is ordered and within `self.len()`.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        let begin = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.length,
        };
        if begin > end || end > self.length {
            mosaic_panic!(OutOfBounds: end, begin, self.length);
        }

        Self {
            storage: self.storage.clone(),
            offset: self.offset + begin,
            length: end - begin,
        }
    }

    /// Whether this buffer may be retained beyond the scope that allocated it.
    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Returns a buffer that is safe to retain indefinitely.
    ///
    /// Owned buffers are returned as-is. Borrowed buffers have their visible range copied onto the
    /// heap.
    pub fn make_owned(&self) -> Self
    where
        T: Clone,
    {
        match &self.storage {
            Storage::Owned(_) => self.clone(),
            Storage::Borrowed(_) => {
                #[cfg(feature = "warn-copy")]
                log::warn!(
                    "Copying {} items of {} to make an arena buffer owned",
                    self.length,
                    std::any::type_name::<T>()
                );
                Self::owned(Arc::from(self.as_slice()))
            }
        }
    }

    /// Returns a zero-copy view of this buffer that reports itself as not owned.
    pub fn make_unowned(&self) -> Self {
        Self {
            storage: Storage::Borrowed(self.storage.data().clone()),
            offset: self.offset,
            length: self.length,
        }
    }

    /// Whether both buffers view exactly the same memory range.
    ///
    /// This is an identity check and never compares elements.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.storage.data(), other.storage.data())
            && self.offset == other.offset
            && self.length == other.length
    }
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            offset: self.offset,
            length: self.length,
        }
    }
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Debug> Debug for Buffer<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("length", &self.length)
            .field("owned", &self.is_owned())
            .field("values", &Preview(self.as_slice()))
            .finish()
    }
}

/// Formats the first few items of a slice.
pub(crate) struct Preview<'a, T>(pub(crate) &'a [T]);

impl<T: Debug> Debug for Preview<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        const LIMIT: usize = 16;
        let mut list = f.debug_list();
        list.entries(self.0.iter().take(LIMIT));
        if self.0.len() > LIMIT {
            list.finish_non_exhaustive()
        } else {
            list.finish()
        }
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> AsRef<[T]> for Buffer<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: PartialEq> PartialEq for Buffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for Buffer<T> {}

impl<T: Hash> Hash for Buffer<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl<T> FromIterator<T> for Buffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        BufferMut::from_iter(iter).freeze()
    }
}

impl<T> From<Vec<T>> for Buffer<T> {
    fn from(value: Vec<T>) -> Self {
        Self::owned(Arc::from(value))
    }
}

impl<T> From<BufferMut<T>> for Buffer<T> {
    fn from(value: BufferMut<T>) -> Self {
        value.freeze()
    }
}

impl<'a, T> IntoIterator for &'a Buffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}
