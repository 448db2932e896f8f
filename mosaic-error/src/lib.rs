#![deny(missing_docs)]

//! This crate defines error & result types for Mosaic.
//!
//! Two regimes exist. Contract violations (malformed construction arguments, out-of-range
//! slices, non-ascending builder input) are programmer errors and are reported by
//! [`mosaic_panic!`] or debug assertions. Everything a caller can reasonably recover from is
//! returned as a [`MosaicError`].

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{env, fmt};

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    #[allow(clippy::panic)]
    fn from(msg: T) -> Self {
        if env::var("MOSAIC_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}\nBacktrace:\n{}", msg.into(), Backtrace::capture());
        } else {
            Self(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Mosaic.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum MosaicError {
    /// Batch operator arguments do not share a single size. Carries every observed size.
    #[error("argument sizes mismatch: {0:?}\nBacktrace:\n{1}")]
    SizeMismatch(Vec<usize>, Backtrace),
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Backtrace),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// The requested conversion cannot represent the value.
    #[error("{0}\nBacktrace:\n{1}")]
    Unsupported(ErrString, Backtrace),
    /// An allocator could not satisfy a request of `{0}` bytes with `{1}` bytes available.
    #[error("failed to allocate {0} bytes, {1} bytes available\nBacktrace:\n{2}")]
    AllocationFailed(usize, usize, Backtrace),
    /// An assertion failed.
    #[error("{0}\nBacktrace:\n{1}")]
    AssertionFailed(ErrString, Backtrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, Box<MosaicError>),
}

impl MosaicError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        MosaicError::Context(msg.into(), Box::new(self))
    }
}

impl Debug for MosaicError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return MosaicErrors as their error type.
pub type MosaicResult<T> = Result<T, MosaicError>;

/// A convenient macro for creating a MosaicError.
#[macro_export]
macro_rules! mosaic_err {
    (SizeMismatch: $sizes:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::MosaicError::SizeMismatch($sizes, Backtrace::capture())
        )
    }};
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::MosaicError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    (AllocationFailed: $requested:expr, $available:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::MosaicError::AllocationFailed($requested, $available, Backtrace::capture())
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::MosaicError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::mosaic_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a MosaicError.
#[macro_export]
macro_rules! mosaic_bail {
    ($($tt:tt)+) => {
        return Err($crate::mosaic_err!($($tt)+))
    };
}

/// A convenient macro for panicking with a MosaicError in the presence of a programmer error
/// (e.g., an invariant has been violated).
#[macro_export]
macro_rules! mosaic_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::mosaic_panic!($crate::mosaic_err!(OutOfBounds: $idx, $start, $stop))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::mosaic_panic!($crate::mosaic_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::MosaicError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::mosaic_panic!($crate::mosaic_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::MosaicError = $err;
        panic!("{}", err)
    }};
}

/// A trait for unwrapping a MosaicResult.
pub trait MosaicUnwrap {
    /// The type of the value being unwrapped.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn mosaic_unwrap(self) -> Self::Output;
}

impl<T, E> MosaicUnwrap for Result<T, E>
where
    E: Into<MosaicError>,
{
    type Output = T;

    #[inline(always)]
    fn mosaic_unwrap(self) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|err| mosaic_panic!(err))
    }
}

/// A trait for expect-ing a MosaicResult or an Option.
pub trait MosaicExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn mosaic_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> MosaicExpect for Result<T, E>
where
    E: Into<MosaicError>,
{
    type Output = T;

    #[inline(always)]
    fn mosaic_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| mosaic_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> MosaicExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn mosaic_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = MosaicError::AssertionFailed(msg.to_string().into(), Backtrace::capture());
            mosaic_panic!(err)
        })
    }
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub const fn must_use(error: crate::MosaicError) -> crate::MosaicError {
        error
    }
}
