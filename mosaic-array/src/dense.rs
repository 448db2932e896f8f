use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

use arrow_buffer::BooleanBufferBuilder;
use mosaic_buffer::{Buffer, BufferFactory, BufferMut};
use mosaic_error::{MosaicExpect, MosaicResult, mosaic_bail};
use mosaic_mask::Mask;

/// A fixed-size column of `T` with a presence bitmap.
///
/// Slots whose presence bit is unset still hold a value (usually `T::default()`), which is never
/// observed through the public accessors.
pub struct DenseArray<T> {
    values: Buffer<T>,
    validity: Mask,
}

impl<T> DenseArray<T> {
    /// Create a column from a value buffer and a presence bitmap of the same length.
    ///
    /// # Panics
    ///
    /// Panics if the bitmap length differs from the number of values.
    pub fn new(values: Buffer<T>, validity: Mask) -> Self {
        assert_eq!(
            values.len(),
            validity.len(),
            "validity length must match the value count"
        );
        Self { values, validity }
    }

    /// Create a column where every slot is present.
    pub fn from_buffer(values: Buffer<T>) -> Self {
        let validity = Mask::new_true(values.len());
        Self { values, validity }
    }

    /// Create a column with no slots.
    pub fn empty() -> Self {
        Self::from_buffer(Buffer::empty())
    }

    /// Create a column from optional values.
    pub fn from_options(values: impl IntoIterator<Item = Option<T>>) -> Self
    where
        T: Default,
    {
        let values = values.into_iter();
        let mut builder = DenseBuilder::with_capacity(values.size_hint().0);
        values.for_each(|value| builder.push(value));
        builder.build()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether every slot is present, i.e. the column carries no bitmap.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.validity.all_true()
    }

    pub fn values(&self) -> &Buffer<T> {
        &self.values
    }

    pub fn validity(&self) -> &Mask {
        &self.validity
    }

    #[inline]
    pub fn present(&self, offset: usize) -> bool {
        self.validity.value(offset)
    }

    /// The value at `offset`, or `None` when the slot is absent.
    #[inline]
    pub fn get(&self, offset: usize) -> Option<&T> {
        self.present(offset).then(|| &self.values[offset])
    }

    pub fn present_count(&self) -> usize {
        self.validity.true_count()
    }

    /// A zero-copy view of `count` slots starting at `start`.
    pub fn slice(&self, start: usize, count: usize) -> Self {
        Self {
            values: self.values.slice(start..start + count),
            validity: self.validity.slice(start, count),
        }
    }

    /// Visit every slot in order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, Option<&T>),
    {
        self.validity.iter_bools(|bools| {
            bools
                .zip(self.values.iter())
                .enumerate()
                .for_each(|(offset, (present, value))| f(offset, present.then_some(value)))
        })
    }

    /// Visit every present slot in order.
    pub fn for_each_present<F>(&self, mut f: F)
    where
        F: FnMut(usize, &T),
    {
        self.validity.for_each_run(|start, len, present| {
            if present {
                for offset in start..start + len {
                    f(offset, &self.values[offset]);
                }
            }
        })
    }

    /// The value buffer, provided that every slot is present.
    pub fn to_buffer(&self) -> MosaicResult<Buffer<T>> {
        if !self.is_full() {
            mosaic_bail!(
                Unsupported: "cannot materialize a buffer, {} of {} values are missing",
                self.validity.false_count(),
                self.len()
            );
        }
        Ok(self.values.clone())
    }

    pub fn is_owned(&self) -> bool {
        self.values.is_owned()
    }

    pub fn make_owned(&self) -> Self
    where
        T: Clone,
    {
        Self {
            values: self.values.make_owned(),
            validity: self.validity.clone(),
        }
    }

    pub fn make_unowned(&self) -> Self {
        Self {
            values: self.values.make_unowned(),
            validity: self.validity.clone(),
        }
    }

    /// Logical equality: same length, same presence, and equal values wherever present.
    pub fn arrays_are_equivalent(lhs: &Self, rhs: &Self) -> bool
    where
        T: PartialEq,
    {
        if lhs.len() != rhs.len() || lhs.validity != rhs.validity {
            return false;
        }
        let mut equal = true;
        lhs.validity.for_each_run(|start, len, present| {
            if equal && present {
                equal = lhs.values[start..start + len] == rhs.values[start..start + len];
            }
        });
        equal
    }
}

impl<T> Clone for DenseArray<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            validity: self.validity.clone(),
        }
    }
}

impl<T> Default for DenseArray<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Debug> Debug for DenseArray<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseArray")
            .field("values", &self.values)
            .field("validity", &self.validity)
            .finish()
    }
}

impl<T: Hash> Hash for DenseArray<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
        self.validity.hash(state);
    }
}

impl<T> From<Buffer<T>> for DenseArray<T> {
    fn from(values: Buffer<T>) -> Self {
        Self::from_buffer(values)
    }
}

impl<T: Default> FromIterator<Option<T>> for DenseArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        Self::from_options(iter)
    }
}

/// Random-access builder for a [`DenseArray`].
///
/// Every format conversion goes through this builder: it is either pre-filled and patched by
/// offset, or appended to in order.
pub struct DenseBuilder<T> {
    values: BufferMut<T>,
    validity: BooleanBufferBuilder,
}

impl<T> DenseBuilder<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: BufferMut::with_capacity(capacity),
            validity: BooleanBufferBuilder::new(capacity),
        }
    }

    /// A builder of `len` slots, all set to `value`.
    pub fn filled(len: usize, value: Option<&T>) -> Self
    where
        T: Clone + Default,
    {
        let mut validity = BooleanBufferBuilder::new(len);
        validity.append_n(len, value.is_some());
        Self {
            values: BufferMut::full(value.cloned().unwrap_or_default(), len),
            validity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn push(&mut self, value: Option<T>)
    where
        T: Default,
    {
        self.validity.append(value.is_some());
        self.values.push(value.unwrap_or_default());
    }

    pub fn push_n(&mut self, value: Option<&T>, n: usize)
    where
        T: Clone + Default,
    {
        self.validity.append_n(n, value.is_some());
        let value = value.cloned().unwrap_or_default();
        self.values.extend(std::iter::repeat_n(value, n));
    }

    /// Overwrite the slot at `offset`.
    #[inline]
    pub fn set(&mut self, offset: usize, value: Option<T>)
    where
        T: Default,
    {
        self.validity.set_bit(offset, value.is_some());
        self.values[offset] = value.unwrap_or_default();
    }

    pub fn build(self) -> DenseArray<T> {
        self.build_in(BufferFactory::Heap)
            .mosaic_expect("heap allocation cannot fail")
    }

    pub fn build_in(mut self, factory: BufferFactory<'_>) -> MosaicResult<DenseArray<T>> {
        let validity = Mask::from_buffer(self.validity.finish());
        Ok(DenseArray::new(self.values.freeze_in(factory)?, validity))
    }
}
