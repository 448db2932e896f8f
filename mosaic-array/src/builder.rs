use mosaic_buffer::{BufferFactory, BufferMut};
use mosaic_error::{MosaicExpect, MosaicResult};

use crate::Array;
use crate::dense::DenseBuilder;
use crate::id_filter::IdFilter;

/// Builds a sparse array from rows added in strictly ascending id order.
///
/// Out-of-order or out-of-range ids break the builder's contract and are only caught in debug
/// builds. Rows that are never added hold `missing_id_value`.
pub struct SparseArrayBuilder<T> {
    size: usize,
    ids: BufferMut<usize>,
    values: DenseBuilder<T>,
    missing_id_value: Option<T>,
}

impl<T: Default> SparseArrayBuilder<T> {
    pub fn new(size: usize, missing_id_value: Option<T>) -> Self {
        Self::with_capacity(size, 0, missing_id_value)
    }

    pub fn with_capacity(size: usize, capacity: usize, missing_id_value: Option<T>) -> Self {
        Self {
            size,
            ids: BufferMut::with_capacity(capacity),
            values: DenseBuilder::with_capacity(capacity),
            missing_id_value,
        }
    }

    /// The offset the next added row will occupy.
    #[inline]
    pub fn next_offset(&self) -> usize {
        self.ids.len()
    }

    /// Add row `id` holding `value`.
    pub fn add(&mut self, id: usize, value: T) {
        self.add_option(id, Some(value));
    }

    /// Add row `id`, present or not.
    pub fn add_option(&mut self, id: usize, value: Option<T>) {
        self.push_id(id);
        self.values.push(value);
    }

    /// Add row `id` as absent and return its offset, to be filled by
    /// [`SparseArrayBuilder::set_by_offset`].
    pub fn add_id(&mut self, id: usize) -> usize {
        let offset = self.next_offset();
        self.add_option(id, None);
        offset
    }

    /// Overwrite the value of an already added row.
    pub fn set_by_offset(&mut self, offset: usize, value: Option<T>) {
        debug_assert!(offset < self.next_offset(), "offset {offset} was never added");
        self.values.set(offset, value);
    }

    pub fn build(self) -> Array<T> {
        self.build_in(BufferFactory::Heap)
            .mosaic_expect("heap allocation cannot fail")
    }

    pub fn build_in(self, factory: BufferFactory<'_>) -> MosaicResult<Array<T>> {
        let id_filter = IdFilter::new(self.size, self.ids.freeze_in(factory)?, 0);
        Ok(Array::new(
            self.size,
            id_filter,
            self.values.build_in(factory)?,
            self.missing_id_value,
        ))
    }

    fn push_id(&mut self, id: usize) {
        debug_assert!(
            self.ids.last().is_none_or(|&last| last < id),
            "ids must be added in ascending order, got {id} after {:?}",
            self.ids.last()
        );
        debug_assert!(id < self.size, "id {id} out of bounds for size {}", self.size);
        self.ids.push(id);
    }
}

/// Builds a dense array by setting rows in any order. Rows never set are absent.
pub struct ArrayBuilder<T> {
    values: DenseBuilder<T>,
}

impl<T: Clone + Default> ArrayBuilder<T> {
    pub fn new(size: usize) -> Self {
        Self {
            values: DenseBuilder::filled(size, None),
        }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn set(&mut self, id: usize, value: T) {
        self.values.set(id, Some(value));
    }

    pub fn set_option(&mut self, id: usize, value: Option<T>) {
        self.values.set(id, value);
    }

    pub fn build(self) -> Array<T> {
        Array::from_dense(self.values.build())
    }

    pub fn build_in(self, factory: BufferFactory<'_>) -> MosaicResult<Array<T>> {
        Ok(Array::from_dense(self.values.build_in(factory)?))
    }
}
