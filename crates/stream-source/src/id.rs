use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a stream, used for diagnostics only.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Allocate the next id. Ids start at 1 and are never reused.
pub fn next_source_id() -> SourceId {
    SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let a = next_source_id();
        let b = next_source_id();
        let c = next_source_id();
        assert!(a.0 >= 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| next_source_id()).collect::<Vec<_>>()))
            .collect();
        let mut all: Vec<SourceId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let n = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), n);
    }

    #[test]
    fn test_display() {
        assert_eq!(SourceId(7).to_string(), "stream#7");
    }
}
