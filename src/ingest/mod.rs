//! Ingestion pipeline: walk → chunk → filter → embed → store.
//!
//! Walks a file or directory, chunks every readable text file, drops
//! boilerplate chunks, embeds the rest in configured batches, and upserts
//! vectors with metadata under the repository namespace derived from the
//! ingestion root. Per-file and per-chunk failures are counted and skipped;
//! re-running over unchanged files is a no-op.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunking::{BoilerplateFilter, Chunker};
use crate::config::Config;
use crate::core::EmbeddingMetadata;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, IoError, Result};
use crate::store::VectorStore;

/// Outcome counts for one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Namespace the vectors were stored under.
    pub namespace: String,
    /// Files read and chunked.
    pub files_processed: usize,
    /// Files skipped (unreadable or binary).
    pub files_skipped: usize,
    /// Chunks embedded and stored (including unchanged upserts).
    pub chunks_stored: usize,
    /// Chunks whose stored state actually changed.
    pub chunks_changed: usize,
    /// Chunks classified as boilerplate and skipped.
    pub chunks_skipped_boilerplate: usize,
    /// Chunks whose embedding failed (recorded in the failure log).
    pub chunks_failed: usize,
}

/// The ingestion pipeline.
pub struct IngestPipeline {
    chunker: Chunker,
    filter: BoilerplateFilter,
    embeddings: Arc<EmbeddingClient>,
    store: Arc<VectorStore>,
    batch_size: usize,
}

impl IngestPipeline {
    /// Creates the pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the chunker configuration is invalid.
    pub fn new(
        config: &Config,
        embeddings: Arc<EmbeddingClient>,
        store: Arc<VectorStore>,
    ) -> Result<Self> {
        Ok(Self {
            chunker: Chunker::new(&config.chunking)?,
            filter: BoilerplateFilter::new(),
            embeddings,
            store,
            batch_size: config.store.batch_size,
        })
    }

    /// Ingests a file or directory.
    ///
    /// The namespace defaults to the root's file name. Non-recursive
    /// directory ingestion only takes the directory's immediate files.
    ///
    /// # Errors
    ///
    /// Returns an error when the path does not exist; per-file failures are
    /// counted, not fatal.
    pub fn generate_embeddings(
        &self,
        path: &Path,
        recursive: bool,
        namespace: Option<&str>,
    ) -> Result<IngestReport> {
        if !path.exists() {
            return Err(IoError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let namespace = namespace
            .map(str::to_string)
            .or_else(|| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| "default".to_string());

        let mut report = IngestReport {
            namespace: namespace.clone(),
            ..IngestReport::default()
        };

        let files = collect_files(path, recursive);
        info!(
            root = %path.display(),
            files = files.len(),
            namespace = %namespace,
            "ingestion started"
        );

        for file in files {
            match self.ingest_file(path, &file, &namespace, &mut report) {
                Ok(()) => report.files_processed += 1,
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "skipping file");
                    report.files_skipped += 1;
                }
            }
        }

        self.store.flush()?;
        info!(
            stored = report.chunks_stored,
            changed = report.chunks_changed,
            boilerplate = report.chunks_skipped_boilerplate,
            failed = report.chunks_failed,
            "ingestion finished"
        );
        Ok(report)
    }

    fn ingest_file(
        &self,
        root: &Path,
        file: &Path,
        namespace: &str,
        report: &mut IngestReport,
    ) -> Result<()> {
        let content = std::fs::read_to_string(file).map_err(|e| {
            Error::from(IoError::ReadFailed {
                path: file.display().to_string(),
                reason: e.to_string(),
            })
        })?;

        let relative = file
            .strip_prefix(root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        let relative = if relative.is_empty() {
            file.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            relative
        };

        let chunks = self.chunker.chunk(&relative, &content, None)?;
        let kept: Vec<_> = chunks
            .into_iter()
            .filter(|chunk| {
                let boilerplate = self.filter.is_boilerplate(chunk);
                if boilerplate {
                    report.chunks_skipped_boilerplate += 1;
                }
                !boilerplate
            })
            .collect();

        for batch in kept.chunks(self.batch_size.max(1)) {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let vectors = self.embeddings.embed_batch(&texts);

            for (chunk, vector) in batch.iter().zip(vectors) {
                match vector {
                    Some(vector) => {
                        let metadata =
                            EmbeddingMetadata::from_chunk(chunk, "ingest", namespace);
                        let changed =
                            self.store.store(&chunk.id(), vector, metadata, namespace)?;
                        report.chunks_stored += 1;
                        if changed {
                            report.chunks_changed += 1;
                        }
                    }
                    None => {
                        debug!(chunk = %chunk.id(), "embedding failed for chunk");
                        report.chunks_failed += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Source files under a root. A plain file ingests alone; a directory
/// ingests its immediate files, or the whole tree when recursive.
fn collect_files(root: &Path, recursive: bool) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| !is_hidden(e.path().strip_prefix(root).unwrap_or(e.path())))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Dot-files and dot-directories below the ingestion root are skipped.
fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s.starts_with('.') && s.len() > 1)
    })
}
