pub mod common_tests;
pub mod data_structures;
pub mod error;
pub mod guard;

// Re-export the main types for convenience
pub use data_structures::{ConcurrentCollection, IterableCollection, Iter};
pub use error::CollectionError;
pub use guard::{DeferredGuard, DeferredRef, Guard};

/*

cargo llvm-cov --html

cargo miri test -p waitless-core --lib

sudo CARGO_PROFILE_RELEASE_DEBUG=true cargo flamegraph --bench collection_benchmark --root --

*/
