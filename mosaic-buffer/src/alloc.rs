use std::cell::Cell;
use std::sync::Arc;

use mosaic_error::{MosaicResult, mosaic_bail};

use crate::Buffer;

/// Where buffer-producing operations place their output.
#[derive(Clone, Copy, Debug, Default)]
pub enum BufferFactory<'a> {
    /// Long-lived, reference-counted heap memory. Buffers are owned.
    #[default]
    Heap,
    /// Short-lived memory accounted against an [`Arena`]. Buffers are not owned.
    Arena(&'a Arena),
}

impl BufferFactory<'_> {
    /// Whether buffers produced by this factory are owned.
    #[inline]
    pub fn is_heap(&self) -> bool {
        matches!(self, BufferFactory::Heap)
    }

    /// Move `values` into a buffer provided by this factory.
    pub fn allocate<T>(&self, values: Vec<T>) -> MosaicResult<Buffer<T>> {
        match self {
            BufferFactory::Heap => Ok(Buffer::owned(Arc::from(values))),
            BufferFactory::Arena(arena) => {
                arena.reserve(values.len() * size_of::<T>())?;
                Ok(Buffer::borrowed(Arc::from(values)))
            }
        }
    }
}

/// A scope for transient allocations.
///
/// Buffers allocated through an arena report [`Buffer::is_owned`] as `false` and must be made
/// owned before being retained past the arena's scope. An arena may carry a byte budget, in which
/// case allocations beyond it fail with `AllocationFailed`.
#[derive(Debug, Default)]
pub struct Arena {
    capacity: Option<usize>,
    allocated: Cell<usize>,
    allocations: Cell<usize>,
}

impl Arena {
    /// Create an arena without a byte budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena that refuses to hand out more than `capacity` bytes in total.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Default::default()
        }
    }

    /// Total bytes handed out since creation or the last [`Arena::reset`].
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.get()
    }

    /// Number of allocations since creation or the last [`Arena::reset`].
    pub fn allocation_count(&self) -> usize {
        self.allocations.get()
    }

    /// Bytes still available, or `None` for an unbounded arena.
    pub fn remaining(&self) -> Option<usize> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.allocated.get()))
    }

    /// Start a new scope. Requires exclusive access, so no factory borrowing the arena is alive.
    pub fn reset(&mut self) {
        self.allocated.set(0);
        self.allocations.set(0);
    }

    fn reserve(&self, bytes: usize) -> MosaicResult<()> {
        if let Some(remaining) = self.remaining() {
            if bytes > remaining {
                mosaic_bail!(AllocationFailed: bytes, remaining);
            }
        }
        self.allocated.set(self.allocated.get() + bytes);
        self.allocations.set(self.allocations.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use mosaic_error::MosaicError;

    use super::*;

    #[test]
    fn heap_buffers_are_owned() {
        let buf = BufferFactory::Heap.allocate(vec![1u8, 2, 3]).unwrap();
        assert!(buf.is_owned());
        assert!(BufferFactory::default().is_heap());
    }

    #[test]
    fn arena_budget_is_enforced() {
        let mut arena = Arena::with_capacity(10);
        let factory = BufferFactory::Arena(&arena);
        factory.allocate(vec![0u32, 1]).unwrap();
        assert_eq!(arena.remaining(), Some(2));

        let err = factory.allocate(vec![0u32]).unwrap_err();
        let MosaicError::AllocationFailed(requested, available, _) = err else {
            unreachable!()
        };
        assert_eq!((requested, available), (4, 2));
        assert_eq!(arena.allocation_count(), 1);

        arena.reset();
        assert_eq!(arena.remaining(), Some(10));
    }
}
