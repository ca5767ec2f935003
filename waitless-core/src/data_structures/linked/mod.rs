//! Unordered linked collection with per-node advisory locks.

mod concurrent_collection;
mod iter;

pub use concurrent_collection::ConcurrentCollection;
pub use iter::Iter;
