use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use super::snapshot;
use crate::data_structures::ConcurrentCollection;
use crate::error::CollectionError;
use crate::guard::Guard;

/// Test basic add, contains and remove
pub fn test_basic_operations<G: Guard>() {
    let collection = ConcurrentCollection::<i32, G>::new();
    assert!(collection.is_empty());

    for value in [5, 10, 3, 7, 1] {
        assert!(collection.add(value));
    }
    assert_eq!(collection.len(), 5);
    assert!(!collection.is_empty());

    for value in [1, 3, 5, 7, 10] {
        assert!(collection.contains(&value));
    }
    assert!(!collection.contains(&2));
    assert!(!collection.contains(&99));

    assert!(collection.remove(&3));
    assert!(!collection.contains(&3));
    assert_eq!(collection.len(), 4);

    // Insertion order is kept
    assert_eq!(snapshot(&collection), vec![5, 10, 7, 1]);
}

/// With one thread the collection behaves like a plain list
pub fn test_single_thread_list_model<G: Guard>() {
    let collection = ConcurrentCollection::<i32, G>::new();
    let mut model: Vec<i32> = Vec::new();

    // Deterministic mix of adds and removes with plenty of duplicates
    for step in 0..500 {
        let value = (step * 7) % 13;
        if step % 3 == 2 {
            let expected = match model.iter().position(|v| *v == value) {
                Some(index) => {
                    model.remove(index);
                    true
                }
                None => false,
            };
            assert_eq!(collection.remove(&value), expected, "step {step}");
        } else {
            model.push(value);
            assert!(collection.add(value));
        }

        assert_eq!(collection.len(), model.len());
        assert_eq!(collection.contains(&value), model.contains(&value));
    }

    assert_eq!(snapshot(&collection), model);
}

/// Duplicates are kept and remove deletes the first match only
pub fn test_duplicates_remove_first_match<G: Guard>() {
    let collection: ConcurrentCollection<(i32, char), G> =
        [(1, 'a'), (2, 'b'), (1, 'c')].into_iter().collect();

    assert!(collection.remove(&(1, 'a')));
    assert_eq!(collection.to_vec(), vec![(2, 'b'), (1, 'c')]);

    let collection: ConcurrentCollection<i32, G> = [4, 2, 4, 4].into_iter().collect();
    assert!(collection.remove(&4));
    assert_eq!(snapshot(&collection), vec![2, 4, 4]);
    assert_eq!(collection.len(), 3);
}

/// Removing an absent value reports false and changes nothing
pub fn test_idempotent_remove<G: Guard>() {
    let collection: ConcurrentCollection<i32, G> = (0..5).collect();

    assert!(collection.remove(&2));
    for _ in 0..3 {
        assert!(!collection.remove(&2));
    }
    assert!(!collection.remove(&42));

    assert_eq!(snapshot(&collection), vec![0, 1, 3, 4]);

    let empty = ConcurrentCollection::<i32, G>::new();
    assert!(!empty.remove(&0));
    assert!(empty.is_empty());
}

/// After clear the collection is empty and usable again
pub fn test_clear_is_total<G: Guard>() {
    let collection: ConcurrentCollection<i32, G> = (0..100).collect();

    assert!(collection.clear());
    assert!(collection.is_empty());
    assert_eq!(collection.len(), 0);
    assert!(!collection.contains(&50));
    assert!(collection.iter().next().is_none());

    // Already empty
    assert!(!collection.clear());

    collection.add(7);
    collection.add(8);
    assert_eq!(snapshot(&collection), vec![7, 8]);
    assert!(collection.remove(&7));
    assert_eq!(snapshot(&collection), vec![8]);
}

/// Clearing a collection whose values were all removed reports no change
pub fn test_clear_after_removing_everything<G: Guard>() {
    let collection: ConcurrentCollection<i32, G> = (0..3).collect();
    for value in 0..3 {
        assert!(collection.remove(&value));
    }
    assert!(!collection.clear());
}

/// Iterator removal deletes the node last yielded, not the first equal value
pub fn test_iterator_removes_exact_node<G: Guard>() {
    let collection: ConcurrentCollection<(i32, u8), G> =
        [(1, 0), (2, 0), (2, 1), (3, 0)].into_iter().collect();

    let mut iter = collection.iter();
    for _ in 0..3 {
        iter.next();
    }
    assert_eq!(iter.remove(), Ok(true));
    drop(iter);

    // The first 2 is the one that survives
    assert_eq!(collection.to_vec(), vec![(1, 0), (2, 0), (3, 0)]);

    let collection: ConcurrentCollection<i32, G> = [1, 2, 2, 3].into_iter().collect();
    let mut iter = collection.iter();
    assert_eq!(iter.next().map(|v| *v), Some(1));
    assert_eq!(iter.next().map(|v| *v), Some(2));
    assert_eq!(iter.next().map(|v| *v), Some(2));
    assert_eq!(iter.remove(), Ok(true));
    drop(iter);

    assert_eq!(snapshot(&collection), vec![1, 2, 3]);
}

/// Iterator removal needs a preceding advance
pub fn test_iterator_remove_requires_next<G: Guard>() {
    let collection: ConcurrentCollection<i32, G> = [1, 2, 3].into_iter().collect();

    let mut iter = collection.iter();
    assert!(matches!(iter.remove(), Err(CollectionError::InvalidState(_))));

    iter.next();
    assert_eq!(iter.remove(), Ok(true));
    assert!(matches!(iter.remove(), Err(CollectionError::InvalidState(_))));
    drop(iter);

    assert_eq!(snapshot(&collection), vec![2, 3]);

    let empty = ConcurrentCollection::<i32, G>::new();
    let mut iter = empty.iter();
    assert!(iter.next().is_none());
    assert!(matches!(iter.remove(), Err(CollectionError::InvalidState(_))));
}

/// The iterator is a live view: values appended ahead of the cursor are seen
pub fn test_iterator_is_live<G: Guard>() {
    let collection: ConcurrentCollection<i32, G> = [1, 2].into_iter().collect();

    let mut iter = collection.iter();
    assert_eq!(iter.next().map(|v| *v), Some(1));

    collection.add(3);
    assert!(collection.remove(&2));

    let rest: Vec<i32> = iter.map(|v| *v).collect();
    assert_eq!(rest, vec![3]);
}

/// Bulk operations given the collection itself
pub fn test_self_argument_policies<G: Guard>() {
    let collection: ConcurrentCollection<i32, G> = [1, 2, 3].into_iter().collect();

    assert!(matches!(
        collection.add_all(&collection),
        Err(CollectionError::InvalidArgument(_))
    ));
    assert_eq!(snapshot(&collection), vec![1, 2, 3]);

    assert!(!collection.retain_all(&collection));
    assert_eq!(snapshot(&collection), vec![1, 2, 3]);

    assert!(collection.contains_all(&collection));

    assert!(collection.remove_all(&collection));
    assert!(collection.is_empty());

    // Already empty: nothing changes
    assert!(!collection.remove_all(&collection));
}

/// Bulk operations against another collection
pub fn test_bulk_operations<G: Guard>() {
    let collection: ConcurrentCollection<i32, G> = [1, 2, 3, 4].into_iter().collect();
    let other: ConcurrentCollection<i32, G> = [3, 4, 5].into_iter().collect();
    let empty = ConcurrentCollection::<i32, G>::new();

    assert_eq!(collection.add_all(&other), Ok(true));
    assert_eq!(snapshot(&collection), vec![1, 2, 3, 4, 3, 4, 5]);
    assert_eq!(collection.add_all(&empty), Ok(false));

    assert!(collection.contains_all(&other));
    assert!(collection.contains_all(&empty));
    assert!(!other.contains_all(&collection));

    // One occurrence per value of `other`
    assert!(collection.remove_all(&other));
    assert_eq!(snapshot(&collection), vec![1, 2, 3, 4]);
    assert!(!collection.remove_all(&empty));

    let keep: ConcurrentCollection<i32, G> = [2, 4, 6].into_iter().collect();
    assert!(collection.retain_all(&keep));
    assert_eq!(snapshot(&collection), vec![2, 4]);
    assert!(!collection.retain_all(&keep));

    // An empty argument empties the collection
    assert!(collection.retain_all(&empty));
    assert!(collection.is_empty());
    assert!(!collection.retain_all(&empty));

    // Arguments are never modified
    assert_eq!(snapshot(&other), vec![3, 4, 5]);
    assert_eq!(snapshot(&keep), vec![2, 4, 6]);
}

/// Predicate retain and iterator-style construction
pub fn test_retain_and_extend<G: Guard>() {
    let mut collection = ConcurrentCollection::<i32, G>::default();
    collection.extend(0..10);
    assert!(!collection.extend_from(std::iter::empty()));
    assert!(collection.extend_from([10, 11]));

    assert!(collection.retain(|value| value % 3 == 0));
    assert_eq!(snapshot(&collection), vec![0, 3, 6, 9]);
    assert!(!collection.retain(|_| true));

    assert_eq!(format!("{:?}", collection), "[0, 3, 6, 9]");

    let mut total = 0;
    for value in &collection {
        total += *value;
    }
    assert_eq!(total, 18);
}

/// Find returns a reference to the stored value
pub fn test_find<G: Guard>() {
    let collection: ConcurrentCollection<(i32, String), G> = ConcurrentCollection::new();
    collection.add((1, "one".to_string()));
    collection.add((2, "two".to_string()));

    let found = collection.find(&(2, "two".to_string()));
    assert_eq!(found.map(|entry| entry.1.clone()), Some("two".to_string()));
    assert!(collection.find(&(3, "three".to_string())).is_none());

    // A reference outlives the removal of its value
    let guarded = collection.find(&(1, "one".to_string()));
    assert!(collection.remove(&(1, "one".to_string())));
    assert_eq!(guarded.map(|entry| entry.0), Some(1));
}

/// N threads each adding M distinct values lose nothing
pub fn test_no_lost_updates<G: Guard + 'static>() {
    let collection = Arc::new(ConcurrentCollection::<i32, G>::new());
    let num_threads = 8;
    let per_thread = 500;

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let collection = Arc::clone(&collection);
            thread::spawn(move || {
                for i in 0..per_thread {
                    assert!(collection.add(thread_id * per_thread + i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(collection.len(), (num_threads * per_thread) as usize);
    for value in 0..num_threads * per_thread {
        assert!(collection.contains(&value), "lost {value}");
    }

    // Each thread's values appear in its own order
    let values = snapshot(&*collection);
    for thread_id in 0..num_threads {
        let own: Vec<i32> = values
            .iter()
            .copied()
            .filter(|v| v / per_thread == thread_id)
            .collect();
        let expected: Vec<i32> = (0..per_thread).map(|i| thread_id * per_thread + i).collect();
        assert_eq!(own, expected);
    }
}

/// Once every occurrence is removed the value stays gone
pub fn test_no_resurrection<G: Guard + 'static>() {
    let collection = Arc::new(ConcurrentCollection::<i32, G>::new());
    let copies = 64;
    for i in 0..copies {
        collection.add(i % 4);
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let collection = Arc::clone(&collection);
            thread::spawn(move || {
                let mut removed = 0usize;
                while collection.remove(&0) {
                    removed += 1;
                }
                removed
            })
        })
        .collect();

    let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(removed, (copies / 4) as usize);
    assert!(!collection.contains(&0));
    assert!(!collection.remove(&0));
    assert_eq!(collection.len(), (copies - copies / 4) as usize);

    let distinct: HashSet<i32> = snapshot(&*collection).into_iter().collect();
    assert_eq!(distinct, HashSet::from([1, 2, 3]));
}
