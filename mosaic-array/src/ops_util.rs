//! Synchronized iteration over the arguments of a batch operator.
//!
//! Arguments are tuples of [`Required`] and [`Optional`] arrays. A row is valid when every
//! required argument holds a value there; optional arguments never invalidate a row.

use mosaic_buffer::BufferFactory;
use mosaic_error::{MosaicResult, mosaic_bail};

use crate::Array;
use crate::id_filter::IdFilter;

/// A single operator argument.
pub trait Argument: Sized {
    type Value: Clone + Default;
    /// What the scalar function receives for this argument.
    type Item: Clone;

    /// Whether an absent value invalidates the row.
    fn is_required(&self) -> bool;

    fn array(&self) -> &Array<Self::Value>;

    /// The same role around another array.
    fn with_array(&self, array: Array<Self::Value>) -> Self;

    /// The item for a row holding `value`, or `None` if the row is invalid.
    fn item(value: Option<&Self::Value>) -> Option<Self::Item>;

    /// Required and without a substitute for rows outside its filter.
    fn is_required_without_default(&self) -> bool {
        self.is_required() && self.array().missing_id_value().is_none()
    }
}

/// An argument that must be present: yields `T`.
#[derive(Clone, Debug)]
pub struct Required<T>(pub Array<T>);

/// An argument that may be absent: yields `Option<T>`.
#[derive(Clone, Debug)]
pub struct Optional<T>(pub Array<T>);

impl<T: Clone + Default> Argument for Required<T> {
    type Value = T;
    type Item = T;

    fn is_required(&self) -> bool {
        true
    }

    fn array(&self) -> &Array<T> {
        &self.0
    }

    fn with_array(&self, array: Array<T>) -> Self {
        Required(array)
    }

    #[inline]
    fn item(value: Option<&T>) -> Option<T> {
        value.cloned()
    }
}

impl<T: Clone + Default> Argument for Optional<T> {
    type Value = T;
    type Item = Option<T>;

    fn is_required(&self) -> bool {
        false
    }

    fn array(&self) -> &Array<T> {
        &self.0
    }

    fn with_array(&self, array: Array<T>) -> Self {
        Optional(array)
    }

    #[inline]
    fn item(value: Option<&T>) -> Option<Option<T>> {
        Some(value.cloned())
    }
}

/// A tuple of [`Argument`]s, of arity one to six.
pub trait Arguments: Sized {
    /// The tuple of items handed to a scalar function.
    type Items: Clone;

    fn sizes(&self) -> Vec<usize>;

    /// Each argument's filter, with whether it is required without a default.
    fn filters(&self) -> Vec<(&IdFilter, bool)>;

    /// Some required argument holds no value at all.
    fn any_required_all_missing(&self) -> bool;

    /// The items of a row outside every argument's filter, or `None` if such rows are invalid.
    fn default_items(&self) -> Option<Self::Items>;

    /// The items at dense `offset`, or `None` if the row is invalid. Requires aligned arguments.
    fn items_at(&self, offset: usize) -> Option<Self::Items>;

    /// Every argument re-expressed over `id_filter`, each keeping its own default.
    fn with_ids_in(&self, id_filter: &IdFilter, factory: BufferFactory<'_>) -> MosaicResult<Self>;

    /// Whether every argument shares one filter.
    fn all_same_filter(&self) -> bool {
        let filters = self.filters();
        filters.iter().all(|(filter, _)| filter.is_same(filters[0].0))
    }

    /// The common size of every argument.
    fn size(&self) -> MosaicResult<usize> {
        let sizes = self.sizes();
        if sizes.iter().any(|&size| size != sizes[0]) {
            mosaic_bail!(SizeMismatch: sizes);
        }
        Ok(sizes[0])
    }
}

macro_rules! impl_arguments {
    ($($arg:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($arg: Argument),+> Arguments for ($($arg,)+) {
            type Items = ($($arg::Item,)+);

            fn sizes(&self) -> Vec<usize> {
                let ($($arg,)+) = self;
                vec![$($arg.array().size()),+]
            }

            fn filters(&self) -> Vec<(&IdFilter, bool)> {
                let ($($arg,)+) = self;
                vec![$(($arg.array().id_filter(), $arg.is_required_without_default())),+]
            }

            fn any_required_all_missing(&self) -> bool {
                let ($($arg,)+) = self;
                false $(|| ($arg.is_required() && $arg.array().is_all_missing_form()))+
            }

            fn default_items(&self) -> Option<Self::Items> {
                let ($($arg,)+) = self;
                Some(($(<$arg as Argument>::item($arg.array().missing_id_value())?,)+))
            }

            #[inline]
            fn items_at(&self, offset: usize) -> Option<Self::Items> {
                let ($($arg,)+) = self;
                Some(($(<$arg as Argument>::item($arg.array().dense_data().get(offset))?,)+))
            }

            fn with_ids_in(
                &self,
                id_filter: &IdFilter,
                factory: BufferFactory<'_>,
            ) -> MosaicResult<Self> {
                let ($($arg,)+) = self;
                Ok(($(
                    $arg.with_array($arg.array().with_ids_in(
                        id_filter,
                        $arg.array().missing_id_value().cloned(),
                        factory,
                    )?),
                )+))
            }
        }
    };
}

impl_arguments!(A);
impl_arguments!(A, B);
impl_arguments!(A, B, C);
impl_arguments!(A, B, C, D);
impl_arguments!(A, B, C, D, E);
impl_arguments!(A, B, C, D, E, F);

/// The narrowest filter outside of which no row can be valid.
///
/// If some required argument has no default, only rows listed by all of those can be valid, so
/// their intersection bound is used. Otherwise any row may become valid through defaults, and the
/// union bound of every filter is used.
pub(crate) fn candidate_filter<A: Arguments>(
    size: usize,
    args: &A,
    factory: BufferFactory<'_>,
) -> MosaicResult<IdFilter> {
    let filters = args.filters();
    if filters.iter().any(|(_, required)| *required) {
        let filter = IdFilter::upper_bound_intersect(
            filters
                .iter()
                .filter(|(_, required)| *required)
                .map(|(filter, _)| *filter),
        );
        log::debug!(
            "Intersecting {} argument filters to a {:?} candidate filter",
            filters.len(),
            filter.kind()
        );
        Ok(filter.clone())
    } else {
        let filter = IdFilter::upper_bound_merge_in(
            size,
            filters.iter().map(|(filter, _)| *filter),
            factory,
        )?;
        log::debug!(
            "Merging {} argument filters to a {:?} candidate filter",
            filters.len(),
            filter.kind()
        );
        Ok(filter)
    }
}

/// How [`ArrayOpsUtil`] aligns its arguments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IterationMode {
    /// Convert every argument to dense form up front.
    Densify,
    /// Keep each argument's form and align them over a shared candidate filter.
    #[default]
    Native,
}

enum Visit<I> {
    Row(usize, I),
    Missing(usize, usize),
    Repeated(usize, usize, I),
}

/// Aligns the arguments of a batch operator over one shared [`IdFilter`] and walks their rows.
pub struct ArrayOpsUtil<A: Arguments> {
    size: usize,
    id_filter: IdFilter,
    args: A,
    default_items: Option<A::Items>,
    mode: IterationMode,
}

impl<A: Arguments> ArrayOpsUtil<A> {
    pub fn new(args: A, mode: IterationMode) -> MosaicResult<Self> {
        Self::new_in(args, mode, BufferFactory::Heap)
    }

    /// Align `args`, allocating the aligned columns through `factory`.
    ///
    /// Fails with `SizeMismatch` unless every argument has the same size.
    pub fn new_in(args: A, mode: IterationMode, factory: BufferFactory<'_>) -> MosaicResult<Self> {
        let size = args.size()?;
        let id_filter = match mode {
            IterationMode::Densify => {
                log::debug!("Densifying arguments over {size} rows");
                IdFilter::Full
            }
            IterationMode::Native => candidate_filter(size, &args, factory)?,
        };
        let args = args.with_ids_in(&id_filter, factory)?;
        let default_items = if id_filter.is_full() {
            None
        } else {
            args.default_items()
        };
        Ok(Self {
            size,
            id_filter,
            args,
            default_items,
            mode,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The candidate filter every argument is aligned to.
    pub fn id_filter(&self) -> &IdFilter {
        &self.id_filter
    }

    pub fn mode(&self) -> IterationMode {
        self.mode
    }

    /// The aligned arguments.
    pub fn args(&self) -> &A {
        &self.args
    }

    /// Walk rows `[from, to)` in ascending order.
    ///
    /// Valid rows go to `f`. Invalid rows go to `missing_fn(first, count)`, with adjacent invalid
    /// rows reported together. Runs of rows outside the candidate filter that are valid through
    /// argument defaults go to `repeated_fn(first, count, items)` once per run.
    pub fn iterate<F, M, R>(
        &self,
        from: usize,
        to: usize,
        mut f: F,
        mut missing_fn: M,
        mut repeated_fn: R,
    ) where
        F: FnMut(usize, A::Items),
        M: FnMut(usize, usize),
        R: FnMut(usize, usize, A::Items),
    {
        self.walk(from, to, |visit| match visit {
            Visit::Row(id, items) => f(id, items),
            Visit::Missing(first, count) => missing_fn(first, count),
            Visit::Repeated(first, count, items) => repeated_fn(first, count, items),
        })
    }

    /// Visit every valid row once, expanding repeated runs.
    pub fn iterate_simple<F>(&self, mut f: F)
    where
        F: FnMut(usize, A::Items),
    {
        self.walk(0, self.size, |visit| match visit {
            Visit::Row(id, items) => f(id, items),
            Visit::Missing(..) => {}
            Visit::Repeated(first, count, items) => {
                for id in first..first + count {
                    f(id, items.clone())
                }
            }
        })
    }

    /// A cheap upper bound on the number of valid rows.
    pub fn present_count_upper_estimate(&self) -> usize {
        if self.id_filter.is_full() || self.default_items.is_some() {
            self.size
        } else {
            self.id_filter.dense_len(self.size)
        }
    }

    fn walk<V>(&self, from: usize, to: usize, mut visit: V)
    where
        V: FnMut(Visit<A::Items>),
    {
        debug_assert!(from <= to && to <= self.size, "invalid range {from}..{to}");
        let mut missing = MissingRun::default();

        let gap = |first: usize, end: usize, visit: &mut V, missing: &mut MissingRun| {
            if first >= end {
                return;
            }
            match &self.default_items {
                Some(items) => {
                    missing.flush(visit);
                    visit(Visit::Repeated(first, end - first, items.clone()));
                }
                None => missing.extend(first, end - first, visit),
            }
        };

        match &self.id_filter {
            IdFilter::Empty => gap(from, to, &mut visit, &mut missing),
            IdFilter::Full => {
                for id in from..to {
                    match self.args.items_at(id) {
                        Some(items) => {
                            missing.flush(&mut visit);
                            visit(Visit::Row(id, items));
                        }
                        None => missing.extend(id, 1, &mut visit),
                    }
                }
            }
            IdFilter::Partial(partial) => {
                let (ids, ids_offset) = (partial.ids(), partial.ids_offset());
                let begin = ids.partition_point(|&id| id < ids_offset + from);
                let end = ids.partition_point(|&id| id < ids_offset + to);
                let mut next = from;
                for offset in begin..end {
                    let id = ids[offset] - ids_offset;
                    gap(next, id, &mut visit, &mut missing);
                    match self.args.items_at(offset) {
                        Some(items) => {
                            missing.flush(&mut visit);
                            visit(Visit::Row(id, items));
                        }
                        None => missing.extend(id, 1, &mut visit),
                    }
                    next = id + 1;
                }
                gap(next, to, &mut visit, &mut missing);
            }
        }
        missing.flush(&mut visit);
    }
}

/// Pending run of invalid rows, reported once it can no longer grow.
#[derive(Default)]
struct MissingRun {
    first: usize,
    count: usize,
}

impl MissingRun {
    fn extend<I, V: FnMut(Visit<I>)>(&mut self, first: usize, count: usize, visit: &mut V) {
        if self.count > 0 && self.first + self.count != first {
            self.flush(visit);
        }
        if self.count == 0 {
            self.first = first;
        }
        self.count += count;
    }

    fn flush<I, V: FnMut(Visit<I>)>(&mut self, visit: &mut V) {
        if self.count > 0 {
            visit(Visit::Missing(self.first, self.count));
            self.count = 0;
        }
    }
}
