//! Core domain types shared across subsystems.

mod chunk;
mod metadata;

pub use chunk::{Chunk, ChunkKind, LogStatement};
pub use metadata::{EmbeddingFailure, EmbeddingMetadata, content_hash, truncate_preview};
