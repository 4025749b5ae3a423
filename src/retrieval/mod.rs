//! Query path: rewriting, hybrid retrieval, and budgeted compression.

pub mod compressor;
pub mod hybrid;
pub mod index;
pub mod memory;
pub mod rewriter;

pub use compressor::{CompressedContext, CompressedExcerpt, CompressorConfig, ContextCompressor};
pub use hybrid::{HybridSearch, SearchConfig, SearchResult};
pub use index::{ContentStore, IndexHit, LexicalIndex, SearchFilters, VectorIndex};
pub use memory::{MemoryContentStore, MemoryLexicalIndex, MemoryVectorIndex};
pub use rewriter::{QueryRewriter, RewriterConfig};
