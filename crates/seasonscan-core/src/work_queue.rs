//! Shared pull queue for the thread-pool backend

use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed list of work items claimed by index.
///
/// Each worker calls [`claim()`](WorkQueue::claim) until it returns `None`.
/// Every item is handed out exactly once, no matter how many workers pull.
pub struct WorkQueue<'a, T> {
    items: &'a [T],
    cursor: AtomicUsize,
}

impl<'a, T> WorkQueue<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unclaimed item with its position in the input.
    pub fn claim(&self) -> Option<(usize, &'a T)> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i).map(|item| (i, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_in_order() {
        let items = [10, 20, 30];
        let q = WorkQueue::new(&items);
        assert_eq!(q.claim(), Some((0, &10)));
        assert_eq!(q.claim(), Some((1, &20)));
        assert_eq!(q.claim(), Some((2, &30)));
        assert_eq!(q.claim(), None);
        // stays exhausted
        assert_eq!(q.claim(), None);
    }

    #[test]
    fn empty_queue() {
        let items: [u8; 0] = [];
        let q = WorkQueue::new(&items);
        assert_eq!(q.claim(), None);
    }

    #[test]
    fn each_item_claimed_once_across_threads() {
        let items: Vec<usize> = (0..1000).collect();
        let q = WorkQueue::new(&items);
        let seen = std::sync::Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some((_, v)) = q.claim() {
                        seen.lock().unwrap().push(*v);
                    }
                });
            }
        });

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, items);
    }
}
