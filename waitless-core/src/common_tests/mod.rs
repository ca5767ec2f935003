//! Reusable test scenarios, generic over the reclamation guard.
//!
//! Each scenario is a plain function; the `tests/` directories of the
//! workspace crates instantiate them for the guards they provide.

pub mod collection_core_tests;

use crate::data_structures::IterableCollection;

/// Copy the current contents out, in chain order.
pub fn snapshot<C>(collection: &C) -> Vec<i32>
where
    C: IterableCollection<i32>,
{
    collection.iter().map(|value| *value).collect()
}
