//! The sparse index shared by arrays: a mapping from row id to an offset in a dense column.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use itertools::Itertools;
use mosaic_buffer::{Buffer, BufferFactory};
use mosaic_error::{MosaicExpect, MosaicResult, mosaic_panic};

/// Density at which a sparse id list stops paying for itself.
///
/// Every decision between a sparse and a dense representation uses this threshold: a filter (or a
/// result) whose explicit id count reaches `size * DENSE_SPARSITY_LIMIT` is treated as dense.
pub const DENSE_SPARSITY_LIMIT: f64 = 0.25;

/// Whether `count` explicit ids out of `size` rows are too many for a sparse representation.
#[inline]
pub(crate) fn exceeds_sparsity_limit(count: usize, size: usize) -> bool {
    count as f64 >= size as f64 * DENSE_SPARSITY_LIMIT
}

static FULL: IdFilter = IdFilter::Full;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdFilterKind {
    Empty,
    Partial,
    Full,
}

/// Maps row ids in `[0, size)` to offsets in a dense column.
///
/// * `Empty`: no id has an offset.
/// * `Full`: every id is its own offset.
/// * `Partial`: the listed ids, each biased by an offset, have offsets in list order.
///
/// Filters are cheap to clone; the id list is shared. A `Partial` filter can only be built by
/// [`IdFilter::new`], so it always lists some but not all rows.
#[derive(Clone, Debug, Default)]
pub enum IdFilter {
    #[default]
    Empty,
    Full,
    Partial(PartialIds),
}

/// The id list of a `Partial` filter.
///
/// Its fields are private, so a `Partial` filter cannot bypass canonicalization:
///
/// ```compile_fail
/// use mosaic_array::{IdFilter, PartialIds};
/// use mosaic_buffer::Buffer;
///
/// let filter = IdFilter::Partial(PartialIds { ids: Buffer::empty(), ids_offset: 0 });
/// ```
#[derive(Clone, Debug)]
pub struct PartialIds {
    ids: Buffer<usize>,
    ids_offset: usize,
}

impl PartialIds {
    /// The raw (biased) ids, strictly increasing.
    pub fn ids(&self) -> &Buffer<usize> {
        &self.ids
    }

    /// The bias subtracted from every listed id.
    pub fn ids_offset(&self) -> usize {
        self.ids_offset
    }
}

impl IdFilter {
    /// Create a filter over `size` rows from strictly increasing `ids`, each in
    /// `[ids_offset, ids_offset + size)`.
    ///
    /// No ids canonicalize to `Empty`; `size` ids (necessarily every row) to `Full`.
    pub fn new(size: usize, ids: Buffer<usize>, ids_offset: usize) -> Self {
        debug_assert!(
            ids.iter().tuple_windows().all(|(a, b)| a < b),
            "ids must be strictly increasing"
        );
        debug_assert!(
            ids.first().is_none_or(|&id| id >= ids_offset)
                && ids.last().is_none_or(|&id| id - ids_offset < size),
            "ids must lie in [{ids_offset}, {})",
            ids_offset + size
        );

        if ids.is_empty() {
            IdFilter::Empty
        } else if ids.len() == size {
            IdFilter::Full
        } else {
            IdFilter::Partial(PartialIds { ids, ids_offset })
        }
    }

    pub fn kind(&self) -> IdFilterKind {
        match self {
            IdFilter::Empty => IdFilterKind::Empty,
            IdFilter::Full => IdFilterKind::Full,
            IdFilter::Partial(_) => IdFilterKind::Partial,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, IdFilter::Full)
    }

    #[inline]
    pub fn is_partial(&self) -> bool {
        matches!(self, IdFilter::Partial(_))
    }

    /// The raw (biased) id list.
    ///
    /// # Panics
    ///
    /// Panics unless the filter is `Partial`.
    pub fn ids(&self) -> &Buffer<usize> {
        match self {
            IdFilter::Partial(partial) => &partial.ids,
            _ => mosaic_panic!("{:?} filter has no id list", self.kind()),
        }
    }

    /// The bias subtracted from every listed id; zero unless `Partial`.
    pub fn ids_offset(&self) -> usize {
        match self {
            IdFilter::Partial(partial) => partial.ids_offset,
            _ => 0,
        }
    }

    /// The ids of a `Partial` filter with the bias removed, in ascending order.
    ///
    /// # Panics
    ///
    /// Panics unless the filter is `Partial`.
    pub fn row_ids(&self) -> impl DoubleEndedIterator<Item = usize> + ExactSizeIterator + '_ {
        let ids_offset = self.ids_offset();
        self.ids().as_slice().iter().map(move |id| id - ids_offset)
    }

    /// Number of dense slots a column aligned to this filter over `size` rows holds.
    #[inline]
    pub fn dense_len(&self, size: usize) -> usize {
        match self {
            IdFilter::Empty => 0,
            IdFilter::Full => size,
            IdFilter::Partial(partial) => partial.ids.len(),
        }
    }

    /// The dense offset of `id`, if the filter covers it.
    pub fn id_to_offset(&self, id: usize) -> Option<usize> {
        match self {
            IdFilter::Empty => None,
            IdFilter::Full => Some(id),
            IdFilter::Partial(PartialIds { ids, ids_offset }) => {
                ids.binary_search(&(id + ids_offset)).ok()
            }
        }
    }

    /// The row id stored at dense `offset`.
    ///
    /// # Panics
    ///
    /// Panics on an `Empty` filter, which has no offsets.
    pub fn offset_to_id(&self, offset: usize) -> usize {
        match self {
            IdFilter::Empty => mosaic_panic!("Empty filter has no offset {offset}"),
            IdFilter::Full => offset,
            IdFilter::Partial(PartialIds { ids, ids_offset }) => ids[offset] - ids_offset,
        }
    }

    /// Structural identity: same kind and, for `Partial`, the very same id memory and bias.
    ///
    /// Two filters listing equal ids from different buffers are *not* the same.
    pub fn is_same(&self, other: &IdFilter) -> bool {
        match (self, other) {
            (IdFilter::Empty, IdFilter::Empty) | (IdFilter::Full, IdFilter::Full) => true,
            (IdFilter::Partial(lhs), IdFilter::Partial(rhs)) => {
                lhs.ids_offset == rhs.ids_offset && lhs.ids.ptr_eq(&rhs.ids)
            }
            _ => false,
        }
    }

    pub fn is_owned(&self) -> bool {
        match self {
            IdFilter::Partial(partial) => partial.ids.is_owned(),
            _ => true,
        }
    }

    pub fn make_owned(&self) -> Self {
        match self {
            IdFilter::Partial(partial) if !partial.ids.is_owned() => {
                IdFilter::Partial(PartialIds {
                    ids: partial.ids.make_owned(),
                    ids_offset: partial.ids_offset,
                })
            }
            _ => self.clone(),
        }
    }

    /// Restrict the filter to rows `[start, start + count)`, rebased to start at zero.
    ///
    /// Returns the new filter and the range of dense offsets it keeps. The id list is shared, only
    /// the bias moves.
    pub fn slice(&self, start: usize, count: usize) -> (IdFilter, Range<usize>) {
        match self {
            IdFilter::Empty => (IdFilter::Empty, 0..0),
            IdFilter::Full => (IdFilter::Full, start..start + count),
            IdFilter::Partial(PartialIds { ids, ids_offset }) => {
                let begin = ids.partition_point(|&id| id < ids_offset + start);
                let end = ids.partition_point(|&id| id < ids_offset + start + count);
                (
                    IdFilter::new(count, ids.slice(begin..end), ids_offset + start),
                    begin..end,
                )
            }
        }
    }

    /// Calls `f(id, offset_in_lhs, offset_in_rhs)` for every id listed by both filters, in
    /// ascending order.
    ///
    /// # Panics
    ///
    /// Panics unless both filters are `Partial`.
    pub fn for_each_common_id<F>(lhs: &IdFilter, rhs: &IdFilter, mut f: F)
    where
        F: FnMut(usize, usize, usize),
    {
        let (lhs_ids, rhs_ids) = (lhs.ids(), rhs.ids());
        let (lhs_offset, rhs_offset) = (lhs.ids_offset(), rhs.ids_offset());

        let (mut i, mut j) = (0, 0);
        while i < lhs_ids.len() && j < rhs_ids.len() {
            let (a, b) = (lhs_ids[i] - lhs_offset, rhs_ids[j] - rhs_offset);
            match a.cmp(&b) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    f(a, i, j);
                    i += 1;
                    j += 1;
                }
            }
        }
    }

    /// A filter over `size` rows covering every id covered by any of `filters`.
    ///
    /// The result may cover more: once an input is denser than [`DENSE_SPARSITY_LIMIT`] the
    /// result is `Full`.
    pub fn upper_bound_merge<'a>(
        size: usize,
        filters: impl IntoIterator<Item = &'a IdFilter>,
    ) -> IdFilter {
        Self::upper_bound_merge_in(size, filters, BufferFactory::Heap)
            .mosaic_expect("heap allocation cannot fail")
    }

    pub fn upper_bound_merge_in<'a>(
        size: usize,
        filters: impl IntoIterator<Item = &'a IdFilter>,
        factory: BufferFactory<'_>,
    ) -> MosaicResult<IdFilter> {
        filters
            .into_iter()
            .try_fold(IdFilter::Empty, |acc, filter| {
                merge_pair(size, &acc, filter, factory)
            })
    }

    /// A filter covering every id covered by all of `filters`, chosen among the inputs.
    ///
    /// This is a loose bound: the smallest input is returned as is, no intersection is computed.
    /// An empty input list yields `Full`.
    pub fn upper_bound_intersect<'a>(
        filters: impl IntoIterator<Item = &'a IdFilter>,
    ) -> &'a IdFilter {
        let full: &'a IdFilter = &FULL;
        filters
            .into_iter()
            .fold(full, |acc, filter| match (acc, filter) {
                (IdFilter::Empty, _) | (_, IdFilter::Full) => acc,
                (_, IdFilter::Empty) | (IdFilter::Full, _) => filter,
                (IdFilter::Partial(smallest), IdFilter::Partial(partial)) => {
                    if partial.ids.len() < smallest.ids.len() {
                        filter
                    } else {
                        acc
                    }
                }
            })
    }
}

fn merge_pair(
    size: usize,
    lhs: &IdFilter,
    rhs: &IdFilter,
    factory: BufferFactory<'_>,
) -> MosaicResult<IdFilter> {
    match (lhs, rhs) {
        (IdFilter::Full, _) | (_, IdFilter::Full) => Ok(IdFilter::Full),
        (IdFilter::Empty, other) | (other, IdFilter::Empty) => Ok(other.clone()),
        _ if lhs.is_same(rhs) => Ok(lhs.clone()),
        _ => {
            let largest = lhs.ids().len().max(rhs.ids().len());
            if exceeds_sparsity_limit(largest, size) {
                log::debug!(
                    "Merging id filters of {} and {} ids over {size} rows falls back to Full",
                    lhs.ids().len(),
                    rhs.ids().len(),
                );
                return Ok(IdFilter::Full);
            }
            let ids = lhs.row_ids().merge(rhs.row_ids()).dedup().collect_vec();
            Ok(IdFilter::new(size, factory.allocate(ids)?, 0))
        }
    }
}

impl Hash for IdFilter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        if let IdFilter::Partial(partial) = self {
            partial.ids.hash(state);
            partial.ids_offset.hash(state);
        }
    }
}
