pub mod document_store;
pub mod sequence;

// パブリックに型を再エクスポート
pub use document_store::DocumentStore as PostgresDocumentStore;
pub use sequence::SequenceSource as PostgresSequenceSource;
