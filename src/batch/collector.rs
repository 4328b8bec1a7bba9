//! Batch collector.

/// Default number of identifiers per sub-request.
pub const DEFAULT_BATCH_CAPACITY: usize = 20;

/// Returned when a [`Batch`] is already at capacity. Carries the rejected
/// identifier back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFull(pub String);

impl std::fmt::Display for BatchFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "batch full, cannot place {}", self.0)
    }
}

impl std::error::Error for BatchFull {}

/// Capacity-bounded, append-only group of identifiers forming one sub-request.
#[derive(Debug, Clone)]
pub struct Batch {
    ids: Vec<String>,
    capacity: usize,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an already-normalized identifier.
    pub fn append(&mut self, id: String) -> Result<(), BatchFull> {
        if self.ids.len() >= self.capacity {
            return Err(BatchFull(id));
        }
        self.ids.push(id);
        Ok(())
    }

    pub fn any(&self) -> bool {
        !self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn identifiers(&self) -> &[String] {
        &self.ids
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_defaults() {
        let batch = Batch::default();
        assert_eq!(batch.capacity(), 20);
        assert!(!batch.any());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_batch_append_until_full() {
        let mut batch = Batch::new(3);
        batch.append("1".into()).unwrap();
        batch.append("2".into()).unwrap();
        assert!(!batch.is_full());
        batch.append("3".into()).unwrap();
        assert!(batch.is_full());

        let err = batch.append("4".into()).unwrap_err();
        assert_eq!(err, BatchFull("4".into()));
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.identifiers(), &["1", "2", "3"]);
    }

    #[test]
    fn test_batch_keeps_duplicates_in_order() {
        let mut batch = Batch::new(5);
        for id in ["b", "a", "b"] {
            batch.append(id.to_string()).unwrap();
        }
        assert!(batch.any());
        assert_eq!(batch.identifiers(), &["b", "a", "b"]);
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let mut batch = Batch::new(0);
        assert!(batch.append("1".into()).is_err());
        assert!(!batch.any());
    }
}
