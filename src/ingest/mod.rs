//! Ingestion path: semantic chunking and the chunk-embed-index pipeline.
//! Runs asynchronously at ingestion time, independent of the query path.

pub mod chunker;
pub mod pipeline;

pub use chunker::{Chunk, ChunkerConfig, SemanticChunker, SourceRef};
pub use pipeline::{IngestReport, Ingestor};
