use crate::domain::IdentifierKind;
use crate::ports::document_store::Result;
use crate::ports::sequence::SequenceSource as SequenceSourceTrait;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory SequenceSource backed by one atomic counter per kind
///
/// `fetch_add` is the serialization point: concurrent callers never observe
/// the same value.
pub struct SequenceSource {
    members: AtomicU64,
    borrowings: AtomicU64,
    reservations: AtomicU64,
}

impl SequenceSource {
    pub fn new() -> Self {
        Self {
            members: AtomicU64::new(0),
            borrowings: AtomicU64::new(0),
            reservations: AtomicU64::new(0),
        }
    }

    fn counter(&self, kind: IdentifierKind) -> &AtomicU64 {
        match kind {
            IdentifierKind::Member => &self.members,
            IdentifierKind::Borrowing => &self.borrowings,
            IdentifierKind::Reservation => &self.reservations,
        }
    }
}

impl Default for SequenceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SequenceSourceTrait for SequenceSource {
    async fn next_value(&self, kind: IdentifierKind) -> Result<u64> {
        Ok(self.counter(kind).fetch_add(1, Ordering::SeqCst) + 1)
    }
}
