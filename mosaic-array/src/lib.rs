//! Optional-value columns that switch between const, dense and sparse storage.
//!
//! An [`Array`] maps row ids `[0, size)` to optional values. Which rows are stored explicitly is
//! described by an [`IdFilter`]; rows it leaves out share one default, the missing-id value.
//! [`ArrayOpsUtil`] and [`ArrayPointwiseOp`] align several arrays of possibly different forms and
//! evaluate operators over them without densifying sparse inputs.

pub use array::*;
pub use builder::*;
pub use dense::*;
pub use id_filter::{DENSE_SPARSITY_LIMIT, IdFilter, IdFilterKind, PartialIds};
pub use ops_util::*;
pub use pointwise::*;

mod array;
pub mod array_util;
mod builder;
mod dense;
pub mod id_filter;
mod ops_util;
mod pointwise;
