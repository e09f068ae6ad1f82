//! The bounded breadcrumb store.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::protocol::{Breadcrumb, Map, Value};

/// A bounded, thread safe log of breadcrumbs.
///
/// Appending to a full store evicts the oldest breadcrumb.  A store with a
/// capacity of zero ignores all appends.
#[derive(Debug)]
pub struct BreadcrumbStore {
    capacity: usize,
    crumbs: Mutex<VecDeque<Breadcrumb>>,
}

impl BreadcrumbStore {
    /// Creates an empty store holding at most `capacity` breadcrumbs.
    pub fn new(capacity: usize) -> BreadcrumbStore {
        BreadcrumbStore {
            capacity,
            crumbs: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a breadcrumb, evicting the oldest one if the store is full.
    pub fn append(&self, breadcrumb: Breadcrumb) {
        if self.capacity == 0 {
            return;
        }
        let mut crumbs = self.crumbs.lock().unwrap_or_else(PoisonError::into_inner);
        while crumbs.len() >= self.capacity {
            crumbs.pop_front();
        }
        crumbs.push_back(breadcrumb);
    }

    /// Returns a copy of the stored breadcrumbs, oldest first.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        let crumbs = self.crumbs.lock().unwrap_or_else(PoisonError::into_inner);
        crumbs.iter().cloned().collect()
    }

    /// Removes all breadcrumbs.
    pub fn clear(&self) {
        self.crumbs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// The number of stored breadcrumbs.
    pub fn len(&self) -> usize {
        self.crumbs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no breadcrumbs are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of stored breadcrumbs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Replaces non-primitive metadata values with their JSON string form.
pub(crate) fn flatten_metadata(metadata: &mut Map<String, Value>) {
    for value in metadata.values_mut() {
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            *value = Value::String(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::protocol::BreadcrumbType;

    fn crumb(message: &str) -> Breadcrumb {
        Breadcrumb::new(message, BreadcrumbType::Manual)
    }

    fn messages(store: &BreadcrumbStore) -> Vec<String> {
        store.snapshot().into_iter().map(|b| b.message).collect()
    }

    #[rstest]
    #[case(1, 1)]
    #[case(3, 10)]
    #[case(25, 26)]
    #[case(25, 100)]
    fn test_keeps_the_last_capacity_crumbs(#[case] capacity: usize, #[case] appended: usize) {
        let store = BreadcrumbStore::new(capacity);
        for i in 0..appended {
            store.append(crumb(&i.to_string()));
        }
        let expected: Vec<String> = (appended - capacity..appended)
            .map(|i| i.to_string())
            .collect();
        assert_eq!(messages(&store), expected);
    }

    #[test]
    fn test_capacity_one() {
        let store = BreadcrumbStore::new(1);
        store.append(crumb("A"));
        store.append(crumb("B"));
        assert_eq!(messages(&store), vec!["B"]);
    }

    #[test]
    fn test_zero_capacity_ignores_appends() {
        let store = BreadcrumbStore::new(0);
        store.append(crumb("A"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = BreadcrumbStore::new(5);
        store.append(crumb("A"));
        let snapshot = store.snapshot();
        store.append(crumb("B"));
        store.clear();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].message, "A");
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let store = Arc::new(BreadcrumbStore::new(10));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        store.append(crumb(&format!("{}-{}", t, i)));
                        assert!(store.snapshot().len() <= 10);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_flatten_metadata() {
        let mut metadata = Map::new();
        metadata.insert("n".into(), json!(1));
        metadata.insert("s".into(), json!("x"));
        metadata.insert("nested".into(), json!({"a": [1, 2]}));
        flatten_metadata(&mut metadata);
        assert_eq!(metadata["n"], json!(1));
        assert_eq!(metadata["s"], json!("x"));
        assert_eq!(metadata["nested"], json!("{\"a\":[1,2]}"));
    }
}
