// Database module
// Persistent vector storage for document chunks (LanceDB)

pub mod lancedb;

pub use self::lancedb::vector_store::{SearchResult, VectorStore};
pub use self::lancedb::{ChunkMetadata, ChunkRecord, StoreManifest};
