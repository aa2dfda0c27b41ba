pub mod document_store;
pub mod sequence;

pub use document_store::DocumentStore as InMemoryDocumentStore;
pub use sequence::SequenceSource as InMemorySequenceSource;
