pub mod book_availability;
pub mod clock;
pub mod document_store;
pub mod sequence;

pub use book_availability::BookAvailability;
pub use clock::Clock;
pub use document_store::{CollectionKind, Document, DocumentStore, StoreError};
pub use sequence::SequenceSource;
