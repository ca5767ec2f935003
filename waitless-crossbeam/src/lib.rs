//! Crossbeam-based reclamation for waitless collections.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation, and the `EpochCollection`
//! alias for the collection that uses it.
//!
//! # Usage
//!
//! ```ignore
//! use waitless_crossbeam::EpochCollection;
//!
//! let collection = EpochCollection::new();
//! collection.add(42);
//! ```

pub mod epoch_guard;

use waitless_core::ConcurrentCollection;

// Export the Guard implementation
pub use epoch_guard::{EpochGuard, EpochRef};

/// Concurrent collection reclaiming memory through the global epoch collector.
///
/// Retired values are dropped whenever the collector gets to them, so values
/// may not borrow:
///
/// ```compile_fail
/// use waitless_crossbeam::EpochCollection;
///
/// let owner = String::from("borrowed");
/// let collection = EpochCollection::new();
/// collection.add(&owner);
/// collection.remove(&&owner);
/// ```
pub type EpochCollection<T> = ConcurrentCollection<T, EpochGuard>;
