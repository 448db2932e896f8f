use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;

use mosaic_buffer::{Buffer, BufferFactory, BufferMut};
use mosaic_error::{MosaicExpect, MosaicResult, mosaic_bail, mosaic_err};
use rustc_hash::FxHasher;

use crate::dense::{DenseArray, DenseBuilder};
use crate::id_filter::{IdFilter, IdFilterKind};

/// A column of `size` optional values, stored in one of three forms.
///
/// * **Const**: the filter is `Empty`, every row holds `missing_id_value`.
/// * **Dense**: the filter is `Full`, row `id` is slot `id` of `dense_data`.
/// * **Sparse**: the filter is `Partial`, listed rows live in `dense_data` and every other row
///   holds `missing_id_value`.
///
/// The form is derived from the filter, never stored. Arrays are immutable: every conversion
/// returns a new array that shares buffers with its source where it can.
#[derive(Clone, Debug)]
pub struct Array<T> {
    size: usize,
    id_filter: IdFilter,
    dense_data: DenseArray<T>,
    missing_id_value: Option<T>,
}

impl<T> Array<T> {
    /// Assemble an array from its parts.
    ///
    /// `dense_data` must hold exactly as many slots as `id_filter` implies for `size` rows. This
    /// is checked in debug builds only. `missing_id_value` is dropped when the filter is `Full`.
    pub fn new(
        size: usize,
        id_filter: IdFilter,
        dense_data: DenseArray<T>,
        missing_id_value: Option<T>,
    ) -> Self {
        debug_assert_eq!(
            dense_data.len(),
            id_filter.dense_len(size),
            "{:?} filter over {size} rows needs a matching dense column",
            id_filter.kind()
        );
        let missing_id_value = if id_filter.is_full() {
            None
        } else {
            missing_id_value
        };
        Self {
            size,
            id_filter,
            dense_data,
            missing_id_value,
        }
    }

    /// An array where every row holds `value`.
    pub fn new_const(size: usize, value: Option<T>) -> Self {
        Self {
            size,
            id_filter: IdFilter::Empty,
            dense_data: DenseArray::empty(),
            missing_id_value: value,
        }
    }

    /// A dense array over the given column.
    pub fn from_dense(dense_data: DenseArray<T>) -> Self {
        Self {
            size: dense_data.len(),
            id_filter: IdFilter::Full,
            dense_data,
            missing_id_value: None,
        }
    }

    /// A dense array where every row is present.
    pub fn from_buffer(values: Buffer<T>) -> Self {
        Self::from_dense(DenseArray::from_buffer(values))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn id_filter(&self) -> &IdFilter {
        &self.id_filter
    }

    pub fn dense_data(&self) -> &DenseArray<T> {
        &self.dense_data
    }

    pub fn missing_id_value(&self) -> Option<&T> {
        self.missing_id_value.as_ref()
    }

    #[inline]
    pub fn is_const_form(&self) -> bool {
        self.id_filter.kind() == IdFilterKind::Empty
    }

    #[inline]
    pub fn is_dense_form(&self) -> bool {
        self.id_filter.is_full()
    }

    #[inline]
    pub fn is_sparse_form(&self) -> bool {
        self.id_filter.is_partial()
    }

    /// Dense with every row present.
    pub fn is_full_form(&self) -> bool {
        self.is_dense_form() && self.dense_data.is_full()
    }

    /// Const with every row absent.
    pub fn is_all_missing_form(&self) -> bool {
        self.is_const_form() && self.missing_id_value.is_none()
    }

    /// The value of row `id`.
    ///
    /// Requires `id < size`, which is checked in debug builds only; see [`Array::try_get`].
    pub fn get(&self, id: usize) -> Option<&T> {
        debug_assert!(id < self.size, "id {id} out of bounds for size {}", self.size);
        match self.id_filter.id_to_offset(id) {
            Some(offset) => self.dense_data.get(offset),
            None => self.missing_id_value.as_ref(),
        }
    }

    /// The value of row `id`, failing with `OutOfBounds` instead of a contract violation.
    pub fn try_get(&self, id: usize) -> MosaicResult<Option<&T>> {
        if id >= self.size {
            return Err(mosaic_err!(OutOfBounds: id, 0, self.size));
        }
        Ok(self.get(id))
    }

    /// The values of every row in id order.
    pub fn iter(&self) -> ArrayIter<'_, T> {
        ArrayIter {
            array: self,
            id: 0,
            offset: 0,
        }
    }

    /// Number of rows holding a value.
    pub fn present_count(&self) -> usize {
        let mut count = self.dense_data.present_count();
        if self.missing_id_value.is_some() {
            count += self.size - self.dense_data.len();
        }
        count
    }

    /// Restrict the array to rows `[start, start + count)`.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the array.
    pub fn slice(&self, start: usize, count: usize) -> Self
    where
        T: Clone,
    {
        assert!(
            start + count <= self.size,
            "slice {start}..{} out of bounds for size {}",
            start + count,
            self.size
        );
        if self.is_const_form() {
            return Self::new_const(count, self.missing_id_value.clone());
        }
        let (id_filter, offsets) = self.id_filter.slice(start, count);
        Self::new(
            count,
            id_filter,
            self.dense_data.slice(offsets.start, offsets.len()),
            self.missing_id_value.clone(),
        )
    }

    /// Visit every row in id order.
    ///
    /// `repeated_fn(first_id, count, value)` receives runs of rows known to share a value: the
    /// whole array in const form, and every gap between listed ids in sparse form. Dense arrays
    /// only produce per-row calls.
    pub fn for_each<F, R>(&self, mut f: F, mut repeated_fn: R)
    where
        F: FnMut(usize, Option<&T>),
        R: FnMut(usize, usize, Option<&T>),
    {
        let missing = self.missing_id_value.as_ref();
        match &self.id_filter {
            IdFilter::Empty => {
                if self.size > 0 {
                    repeated_fn(0, self.size, missing);
                }
            }
            IdFilter::Full => self.dense_data.for_each(f),
            IdFilter::Partial(_) => {
                let mut next = 0;
                for (offset, id) in self.id_filter.row_ids().enumerate() {
                    if id > next {
                        repeated_fn(next, id - next, missing);
                    }
                    f(id, self.dense_data.get(offset));
                    next = id + 1;
                }
                if next < self.size {
                    repeated_fn(next, self.size - next, missing);
                }
            }
        }
    }

    /// Like [`Array::for_each`], skipping absent rows.
    pub fn for_each_present<F, R>(&self, mut f: F, mut repeated_fn: R)
    where
        F: FnMut(usize, &T),
        R: FnMut(usize, usize, &T),
    {
        match (&self.id_filter, &self.missing_id_value) {
            (IdFilter::Empty, None) => {}
            (IdFilter::Empty, Some(value)) => {
                if self.size > 0 {
                    repeated_fn(0, self.size, value);
                }
            }
            (IdFilter::Full, _) => self.dense_data.for_each_present(f),
            (IdFilter::Partial(_), None) => {
                for (offset, id) in self.id_filter.row_ids().enumerate() {
                    if let Some(value) = self.dense_data.get(offset) {
                        f(id, value);
                    }
                }
            }
            (IdFilter::Partial(_), Some(missing)) => {
                self.for_each(
                    |id, value| {
                        if let Some(value) = value {
                            f(id, value)
                        }
                    },
                    |first, count, _| repeated_fn(first, count, missing),
                );
            }
        }
    }

    /// Whether every buffer behind the array may outlive the scope that allocated it.
    pub fn is_owned(&self) -> bool {
        self.dense_data.is_owned() && self.id_filter.is_owned()
    }

    /// Copy whichever buffers are not owned onto the heap.
    pub fn make_owned(&self) -> Self
    where
        T: Clone,
    {
        if self.is_owned() {
            return self.clone();
        }
        Self {
            size: self.size,
            id_filter: self.id_filter.make_owned(),
            dense_data: self.dense_data.make_owned(),
            missing_id_value: self.missing_id_value.clone(),
        }
    }

    /// A zero-copy view whose value buffer reports itself as not owned.
    pub fn make_unowned(&self) -> Self
    where
        T: Clone,
    {
        Self {
            size: self.size,
            id_filter: self.id_filter.clone(),
            dense_data: self.dense_data.make_unowned(),
            missing_id_value: self.missing_id_value.clone(),
        }
    }

    /// A stable hash of the physical representation.
    ///
    /// Equal encodings hash equally; logically equal arrays in different forms need not.
    pub fn fingerprint(&self) -> u64
    where
        T: Hash,
    {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl<T: Clone + Default> Array<T> {
    /// Re-express the array over `id_filter`, with `missing_id_value` for the rows it leaves out.
    ///
    /// Rows still covered keep their values; the size never changes.
    pub fn with_ids(&self, id_filter: &IdFilter, missing_id_value: Option<T>) -> Self {
        self.with_ids_in(id_filter, missing_id_value, BufferFactory::Heap)
            .mosaic_expect("heap allocation cannot fail")
    }

    pub fn with_ids_in(
        &self,
        id_filter: &IdFilter,
        missing_id_value: Option<T>,
        factory: BufferFactory<'_>,
    ) -> MosaicResult<Self> {
        if self.size == 0 && id_filter.is_full() {
            return Ok(Self::from_dense(DenseArray::empty()));
        }
        if id_filter.kind() == IdFilterKind::Empty || self.size == 0 {
            return Ok(Self::new_const(self.size, missing_id_value));
        }
        if self.id_filter.is_same(id_filter) {
            return Ok(Self::new(
                self.size,
                id_filter.clone(),
                self.dense_data.clone(),
                missing_id_value,
            ));
        }

        let len = id_filter.dense_len(self.size);
        let dense_data = match &self.id_filter {
            IdFilter::Empty => {
                DenseBuilder::filled(len, self.missing_id_value.as_ref()).build_in(factory)?
            }
            IdFilter::Partial(_) => {
                let mut builder = DenseBuilder::filled(len, self.missing_id_value.as_ref());
                if id_filter.is_full() {
                    for (offset, id) in self.id_filter.row_ids().enumerate() {
                        builder.set(id, self.dense_data.get(offset).cloned());
                    }
                } else {
                    IdFilter::for_each_common_id(&self.id_filter, id_filter, |_, from, to| {
                        builder.set(to, self.dense_data.get(from).cloned())
                    });
                }
                builder.build_in(factory)?
            }
            IdFilter::Full => {
                let mut builder = DenseBuilder::with_capacity(len);
                for id in id_filter.row_ids() {
                    builder.push(self.dense_data.get(id).cloned());
                }
                builder.build_in(factory)?
            }
        };

        Ok(Self::new(
            self.size,
            id_filter.clone(),
            dense_data,
            missing_id_value,
        ))
    }

    /// The same rows in dense form.
    pub fn to_dense_form(&self) -> Self {
        self.to_dense_form_in(BufferFactory::Heap)
            .mosaic_expect("heap allocation cannot fail")
    }

    pub fn to_dense_form_in(&self, factory: BufferFactory<'_>) -> MosaicResult<Self> {
        if self.is_dense_form() {
            return Ok(self.clone());
        }
        self.with_ids_in(&IdFilter::Full, None, factory)
    }

    /// The same rows in the sparsest form that uses `missing_id_value` as the default.
    ///
    /// Exactly the rows whose value differs from `missing_id_value` are listed. No listed row
    /// yields const form; every row listed yields dense form.
    pub fn to_sparse_form(&self, missing_id_value: Option<T>) -> Self
    where
        T: PartialEq,
    {
        self.to_sparse_form_in(missing_id_value, BufferFactory::Heap)
            .mosaic_expect("heap allocation cannot fail")
    }

    pub fn to_sparse_form_in(
        &self,
        missing_id_value: Option<T>,
        factory: BufferFactory<'_>,
    ) -> MosaicResult<Self>
    where
        T: PartialEq,
    {
        if self.size == 0 {
            return Ok(Self::new_const(0, missing_id_value));
        }
        if !self.is_dense_form() && self.missing_id_value != missing_id_value {
            // Rows outside the filter change value, so they have to be inspected too.
            return self
                .to_dense_form_in(factory)?
                .to_sparse_form_in(missing_id_value, factory);
        }
        if self.is_const_form() {
            return Ok(self.clone());
        }

        let mut ids = BufferMut::with_capacity(self.dense_data.len());
        let mut values = DenseBuilder::with_capacity(self.dense_data.len());
        let mut keep = |offset: usize, value: Option<&T>| {
            ids.push(self.id_filter.offset_to_id(offset));
            values.push(value.cloned());
        };
        match &missing_id_value {
            None => self
                .dense_data
                .for_each_present(|offset, value| keep(offset, Some(value))),
            Some(default) => self.dense_data.for_each(|offset, value| {
                if value != Some(default) {
                    keep(offset, value)
                }
            }),
        }

        if ids.len() == self.dense_data.len() && self.is_sparse_form() {
            return Ok(Self::new(
                self.size,
                self.id_filter.clone(),
                self.dense_data.clone(),
                missing_id_value,
            ));
        }
        let id_filter = IdFilter::new(self.size, ids.freeze_in(factory)?, 0);
        let dense_data = values.build_in(factory)?;
        Ok(Self::new(self.size, id_filter, dense_data, missing_id_value))
    }

    /// Every row's value, provided every row is present.
    pub fn to_buffer(&self) -> MosaicResult<Buffer<T>> {
        self.to_buffer_in(BufferFactory::Heap)
    }

    pub fn to_buffer_in(&self, factory: BufferFactory<'_>) -> MosaicResult<Buffer<T>> {
        let present = self.present_count();
        if present != self.size {
            mosaic_bail!(
                Unsupported: "cannot materialize a buffer, {} of {} rows are missing",
                self.size - present,
                self.size
            );
        }
        match (&self.id_filter, &self.missing_id_value) {
            (IdFilter::Full, _) => self.dense_data.to_buffer(),
            (IdFilter::Empty, Some(value)) => {
                BufferMut::full(value.clone(), self.size).freeze_in(factory)
            }
            _ => self.to_dense_form_in(factory)?.dense_data.to_buffer(),
        }
    }

    /// Whether both arrays hold the same values, whatever their forms.
    pub fn arrays_are_equivalent(lhs: &Self, rhs: &Self) -> bool
    where
        T: PartialEq,
    {
        if lhs.size != rhs.size {
            return false;
        }
        if lhs.size == 0 {
            return true;
        }
        if lhs.is_dense_form() && rhs.is_dense_form() {
            return DenseArray::arrays_are_equivalent(&lhs.dense_data, &rhs.dense_data);
        }
        let union = IdFilter::upper_bound_merge(lhs.size, [&lhs.id_filter, &rhs.id_filter]);
        let lhs = lhs.with_ids(&union, lhs.missing_id_value.clone());
        let rhs = rhs.with_ids(&union, rhs.missing_id_value.clone());
        lhs.missing_id_value == rhs.missing_id_value
            && DenseArray::arrays_are_equivalent(&lhs.dense_data, &rhs.dense_data)
    }
}

impl<T> Default for Array<T> {
    fn default() -> Self {
        Self::new_const(0, None)
    }
}

impl<T: Hash> Hash for Array<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        self.id_filter.hash(state);
        self.dense_data.hash(state);
        self.missing_id_value.hash(state);
    }
}

impl<T> From<DenseArray<T>> for Array<T> {
    fn from(value: DenseArray<T>) -> Self {
        Self::from_dense(value)
    }
}

impl<'a, T> IntoIterator for &'a Array<T> {
    type Item = Option<&'a T>;
    type IntoIter = ArrayIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the rows of an [`Array`], created by [`Array::iter`].
pub struct ArrayIter<'a, T> {
    array: &'a Array<T>,
    id: usize,
    // Next dense slot of a sparse array.
    offset: usize,
}

impl<'a, T> Iterator for ArrayIter<'a, T> {
    type Item = Option<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.id >= self.array.size {
            return None;
        }
        let array = self.array;
        let id = self.id;
        self.id += 1;

        let value = match &array.id_filter {
            IdFilter::Empty => array.missing_id_value.as_ref(),
            IdFilter::Full => array.dense_data.get(id),
            IdFilter::Partial(_) => {
                if self.offset < array.dense_data.len()
                    && array.id_filter.offset_to_id(self.offset) == id
                {
                    self.offset += 1;
                    array.dense_data.get(self.offset - 1)
                } else {
                    array.missing_id_value.as_ref()
                }
            }
        };
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.array.size - self.id;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for ArrayIter<'_, T> {}

impl<T> FusedIterator for ArrayIter<'_, T> {}
