#![deny(missing_docs)]

//! Buffers backing Mosaic arrays.
//!
//! A [`Buffer`] is an immutable, cheaply cloneable view over shared memory. Every buffer knows
//! whether it may be retained indefinitely ([`Buffer::is_owned`]) or whether it was produced by a
//! short-lived [`Arena`] (or explicitly detached with [`Buffer::make_unowned`]) and must be copied
//! with [`Buffer::make_owned`] before it escapes that scope.
//!
//! Allocating operations take a [`BufferFactory`], which is either the heap (the default) or an
//! arena with an optional byte budget.

pub use alloc::*;
pub use buffer::*;
pub use buffer_mut::*;

mod alloc;
mod buffer;
mod buffer_mut;
mod macros;
