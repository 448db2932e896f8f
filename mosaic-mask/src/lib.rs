//! Presence bitmaps for dense columns.
//!
//! A [`Mask`] records which slots of a dense column hold a value. Uniform masks store only their
//! length. Mixed masks wrap an arrow [`BooleanBuffer`] and lazily cache their runs of present
//! slots, which is what sparse traversal consumes.
#![deny(missing_docs)]

mod eq;
mod runs;

use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use arrow_buffer::BooleanBuffer;
use itertools::Either;

/// Presence of the slots of a dense column.
///
/// Construction canonicalizes: a bitmap with every bit set (or unset) becomes
/// [`Mask::AllTrue`] (or [`Mask::AllFalse`]), so [`Mask::Values`] always mixes both.
#[derive(Clone, Debug)]
pub enum Mask {
    /// Every slot is present; no bitmap is stored.
    AllTrue(usize),
    /// Every slot is absent.
    AllFalse(usize),
    /// Some slots are present.
    Values(Arc<MaskValues>),
}

/// The bitmap of a mixed [`Mask`].
#[derive(Debug)]
pub struct MaskValues {
    bits: BooleanBuffer,
    true_count: usize,
    runs: OnceLock<Vec<(usize, usize)>>,
}

impl MaskValues {
    pub(crate) fn boolean_buffer(&self) -> &BooleanBuffer {
        &self.bits
    }

    /// Half-open `(start, end)` ranges of present slots, ascending.
    fn runs(&self) -> &[(usize, usize)] {
        self.runs.get_or_init(|| self.bits.set_slices().collect())
    }
}

impl Mask {
    /// A mask of `len` present slots.
    pub fn new_true(len: usize) -> Self {
        Self::AllTrue(len)
    }

    /// A mask of `len` absent slots.
    pub fn new_false(len: usize) -> Self {
        Self::AllFalse(len)
    }

    /// A mask over a bitmap, where set bits mark present slots.
    pub fn from_buffer(bits: BooleanBuffer) -> Self {
        let len = bits.len();
        match bits.count_set_bits() {
            0 => Self::AllFalse(len),
            true_count if true_count == len => Self::AllTrue(len),
            true_count => Self::Values(Arc::new(MaskValues {
                bits,
                true_count,
                runs: OnceLock::new(),
            })),
        }
    }

    /// Number of slots, present or not.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        match self {
            Self::AllTrue(len) | Self::AllFalse(len) => *len,
            Self::Values(values) => values.bits.len(),
        }
    }

    /// Number of present slots.
    #[inline]
    pub fn true_count(&self) -> usize {
        match self {
            Self::AllTrue(len) => *len,
            Self::AllFalse(_) => 0,
            Self::Values(values) => values.true_count,
        }
    }

    /// Number of absent slots.
    #[inline]
    pub fn false_count(&self) -> usize {
        self.len() - self.true_count()
    }

    /// Whether every slot is present. Vacuously true for an empty mask.
    #[inline]
    pub fn all_true(&self) -> bool {
        self.true_count() == self.len()
    }

    /// Whether no slot is present. Vacuously true for an empty mask.
    #[inline]
    pub fn all_false(&self) -> bool {
        self.true_count() == 0
    }

    /// Whether slot `index` is present.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds of a mixed mask.
    #[inline]
    pub fn value(&self, index: usize) -> bool {
        match self {
            Self::AllTrue(_) => true,
            Self::AllFalse(_) => false,
            Self::Values(values) => values.bits.value(index),
        }
    }

    /// The `len` slots starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(
            offset + len <= self.len(),
            "slice {offset}+{len} out of bounds for mask of length {}",
            self.len()
        );
        match self {
            Self::AllTrue(_) => Self::AllTrue(len),
            Self::AllFalse(_) => Self::AllFalse(len),
            Self::Values(values) => Self::from_buffer(values.bits.slice(offset, len)),
        }
    }

    /// Positions of present slots, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        match self {
            Self::AllTrue(len) => Either::Left(0..*len),
            Self::AllFalse(_) => Either::Left(Range::default()),
            Self::Values(values) => Either::Right(values.bits.set_indices()),
        }
    }

    /// Maximal half-open `(start, end)` ranges of present slots, ascending.
    pub fn slices(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        match self {
            Self::AllTrue(len) => Either::Left((*len > 0).then_some((0, *len)).into_iter()),
            Self::AllFalse(_) => Either::Left(None.into_iter()),
            Self::Values(values) => Either::Right(values.runs().iter().copied()),
        }
    }
}

impl Hash for Mask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        self.slices().for_each(|run| run.hash(state));
    }
}

impl From<BooleanBuffer> for Mask {
    fn from(bits: BooleanBuffer) -> Self {
        Self::from_buffer(bits)
    }
}

impl FromIterator<bool> for Mask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self::from_buffer(BooleanBuffer::from_iter(iter))
    }
}
