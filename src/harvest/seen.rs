//! In-run deduplication of discovered repository ids.

use std::collections::HashSet;
use std::sync::Mutex;

/// Set of repository ids already seen during this run.
///
/// This only prevents workers racing on overlapping facets from double-counting
/// the same repository toward their ceilings; deduplication across runs is the
/// store's uniqueness constraint.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: Mutex<HashSet<i64>>,
}

impl SeenSet {
    /// Atomically record the id, returning true only for its first sighting.
    pub fn first_sighting(&self, id: i64) -> bool {
        self.ids.lock().expect("seen set lock poisoned").insert(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().expect("seen set lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn only_the_first_sighting_wins() {
        let seen = SeenSet::default();
        assert!(seen.first_sighting(1));
        assert!(!seen.first_sighting(1));
        assert!(seen.first_sighting(2));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn racing_threads_claim_each_id_exactly_once() {
        let seen = Arc::new(SeenSet::default());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let seen = Arc::clone(&seen);
            handles.push(std::thread::spawn(move || (0..1000).filter(|id| seen.first_sighting(*id)).count()));
        }

        let total: usize = handles.into_iter().map(|h| h.join().expect("thread panicked")).sum();
        assert_eq!(total, 1000);
        assert_eq!(seen.len(), 1000);
    }
}
