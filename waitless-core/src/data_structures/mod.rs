//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`linked`] - Lock-free unordered linked collection and its iterator
//! - [`iterable_collection`] - Guard-agnostic read access
//! - `internal` - Node and marker (pub(crate))

pub(crate) mod internal;
pub mod iterable_collection;
pub mod linked;

pub use iterable_collection::IterableCollection;
pub use linked::{ConcurrentCollection, Iter};
