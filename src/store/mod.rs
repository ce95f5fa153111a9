//! Namespaced vector store with metadata side-store and persistence.
//!
//! Each namespace (one per repository) holds an HNSW index and a metadata
//! map that agree on key sets. Writes are serialized per namespace by a
//! write lock; readers take read locks. Namespaces are isolated: entries
//! stored under one namespace are only reachable from another through an
//! explicit multi-namespace query.
//!
//! Persistence is eventually consistent: dirty namespaces are flushed on an
//! interval and on graceful shutdown, so at most one flush window of data
//! can be lost on crash. Under the resident-memory soft cap, the least
//! recently queried namespaces have their index evicted to disk; metadata
//! stays resident.

mod index;
mod namespace;
pub mod persist;

pub use index::{IndexConfig, IndexHit, VectorIndex};
pub use namespace::NamespaceStore;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::core::EmbeddingMetadata;
use crate::embedding::FailureLog;
use crate::error::{Result, StoreError};

/// A scored hit from a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    /// Chunk identifier.
    pub id: String,
    /// Cosine similarity.
    pub score: f32,
    /// Namespace the entry lives in.
    pub namespace: String,
}

/// A full entry snapshot used by retrieval strategies.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Chunk identifier.
    pub id: String,
    /// The stored vector.
    pub vector: Vec<f32>,
    /// The stored metadata.
    pub metadata: EmbeddingMetadata,
}

/// Store-level metrics for the metrics endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreMetrics {
    /// Entry count per namespace.
    pub namespaces: HashMap<String, usize>,
    /// Total entries across namespaces.
    pub total_entries: usize,
    /// Recorded embedding failures.
    pub failure_count: usize,
}

/// The namespaced vector store.
pub struct VectorStore {
    config: StoreConfig,
    index_config: IndexConfig,
    data_root: PathBuf,
    namespaces: RwLock<HashMap<String, Arc<RwLock<NamespaceStore>>>>,
    usage: Mutex<HashMap<String, u64>>,
    clock: AtomicU64,
    failures: Arc<FailureLog>,
}

impl VectorStore {
    /// Opens the store at the given data root, restoring persisted
    /// namespaces and the failure log.
    ///
    /// Metadata loads eagerly; indices load lazily on first query
    /// (progressive loading for large stores).
    ///
    /// # Errors
    ///
    /// Returns an error when a namespace's metadata artifact exists but
    /// cannot be parsed.
    pub fn open(config: StoreConfig, data_root: &Path) -> Result<Self> {
        let failures = Arc::new(FailureLog::new());
        failures.restore(persist::load_failures(data_root));

        let index_config = IndexConfig::with_dimensions(config.dimensions);
        let mut namespaces = HashMap::new();
        for name in persist::list_namespaces(data_root) {
            let metadata = persist::load_metadata(data_root, &name)?;
            debug!(namespace = %name, entries = metadata.len(), "restored namespace metadata");
            namespaces.insert(
                name.clone(),
                Arc::new(RwLock::new(NamespaceStore::from_parts(
                    &name,
                    index_config,
                    None,
                    metadata,
                ))),
            );
        }
        info!(
            namespaces = namespaces.len(),
            failures = failures.len(),
            engine = %config.engine,
            "vector store opened"
        );

        Ok(Self {
            config,
            index_config,
            data_root: data_root.to_path_buf(),
            namespaces: RwLock::new(namespaces),
            usage: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            failures,
        })
    }

    /// Configured embedding dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// The shared embedding failure log.
    #[must_use]
    pub fn failures(&self) -> Arc<FailureLog> {
        Arc::clone(&self.failures)
    }

    /// Names of all known namespaces, sorted.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .namespaces
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Upserts a vector with its metadata under a namespace.
    ///
    /// Returns `true` when state changed; re-storing identical content is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Rejects wrong-dimension vectors and metadata naming a different
    /// namespace.
    pub fn store(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: EmbeddingMetadata,
        namespace: &str,
    ) -> Result<bool> {
        if vector.len() != self.config.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimensions,
                got: vector.len(),
            }
            .into());
        }
        if namespace.is_empty() {
            return Err(crate::error::Error::input("namespace must be non-empty"));
        }

        let ns = self.get_or_create(namespace);
        let changed = {
            let mut guard = ns.write().map_err(|_| poisoned())?;
            self.ensure_loaded(&mut guard)?;
            guard.store(id, vector, metadata)?
        };
        self.touch(namespace);
        self.enforce_memory_cap();
        Ok(changed)
    }

    /// Cosine-similarity query across one, several, or all namespaces.
    ///
    /// Results are filtered by `min_similarity`, sorted descending, and
    /// truncated to `k`. An empty `namespaces` slice searches the union.
    ///
    /// # Errors
    ///
    /// Rejects query vectors of wrong dimension.
    pub fn find_similar(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
        namespaces: &[String],
    ) -> Result<Vec<SimilarityHit>> {
        if query.len() != self.config.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimensions,
                got: query.len(),
            }
            .into());
        }

        let targets = self.resolve_targets(namespaces);
        let mut hits: Vec<SimilarityHit> = Vec::new();
        for name in targets {
            let Some(ns) = self.get_existing(&name) else {
                continue;
            };
            self.touch(&name);
            let ns_hits = {
                let mut guard = ns.write().map_err(|_| poisoned())?;
                self.ensure_loaded(&mut guard)?;
                guard
                    .index()
                    .map(|index| index.search(query, k, min_similarity))
                    .unwrap_or_default()
            };
            hits.extend(ns_hits.into_iter().map(|hit| SimilarityHit {
                id: hit.id,
                score: hit.score,
                namespace: name.clone(),
            }));
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// All entries whose file path equals or ends with `file_path`,
    /// optionally restricted to one namespace. Used for inspection, not
    /// ranking.
    #[must_use]
    pub fn find_by_file_path(
        &self,
        file_path: &str,
        namespace: Option<&str>,
    ) -> Vec<(String, EmbeddingMetadata)> {
        let targets = namespace.map_or_else(|| self.namespaces(), |ns| vec![ns.to_string()]);
        let mut out = Vec::new();
        for name in targets {
            let Some(ns) = self.get_existing(&name) else {
                continue;
            };
            if let Ok(guard) = ns.read() {
                out.extend(guard.find_by_file_path(file_path));
            }
        }
        out
    }

    /// Entry count for one namespace, or the total across all.
    #[must_use]
    pub fn size(&self, namespace: Option<&str>) -> usize {
        match namespace {
            Some(name) => self
                .get_existing(name)
                .and_then(|ns| ns.read().ok().map(|g| g.len()))
                .unwrap_or(0),
            None => self
                .namespaces()
                .iter()
                .map(|name| self.size(Some(name)))
                .sum(),
        }
    }

    /// Removes an entry from both the index and metadata map.
    ///
    /// Returns `true` if the entry existed.
    ///
    /// # Errors
    ///
    /// Returns an error when the namespace's on-disk index cannot be loaded
    /// for the removal.
    pub fn delete(&self, id: &str, namespace: &str) -> Result<bool> {
        let Some(ns) = self.get_existing(namespace) else {
            return Ok(false);
        };
        let mut guard = ns.write().map_err(|_| poisoned())?;
        self.ensure_loaded(&mut guard)?;
        Ok(guard.delete(id))
    }

    /// Consistent snapshot of entries for the given namespaces (all when
    /// empty), for retrieval strategies.
    ///
    /// # Errors
    ///
    /// Returns an error when an evicted index cannot be reloaded.
    pub fn entries(&self, namespaces: &[String]) -> Result<Vec<StoredEntry>> {
        let targets = self.resolve_targets(namespaces);
        let mut out = Vec::new();
        for name in targets {
            let Some(ns) = self.get_existing(&name) else {
                continue;
            };
            self.touch(&name);
            let mut guard = ns.write().map_err(|_| poisoned())?;
            self.ensure_loaded(&mut guard)?;
            let Some(index) = guard.index() else {
                continue;
            };
            let mut ids: Vec<&str> = index.iter().map(|(id, _)| id).collect();
            ids.sort_unstable();
            for id in ids {
                if let (Some(vector), Some(metadata)) =
                    (index.get(id), guard.metadata().get(id))
                {
                    out.push(StoredEntry {
                        id: id.to_string(),
                        vector: vector.to_vec(),
                        metadata: metadata.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Flushes dirty namespaces and the failure log to disk.
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure; remaining namespaces are still
    /// attempted.
    pub fn flush(&self) -> Result<()> {
        let mut first_error: Option<crate::error::Error> = None;
        for name in self.namespaces() {
            let Some(ns) = self.get_existing(&name) else {
                continue;
            };
            let Ok(mut guard) = ns.write() else { continue };
            if !guard.is_dirty() {
                continue;
            }
            let Some(index) = guard.index() else {
                continue;
            };
            match persist::save_namespace(&self.data_root, &name, index, guard.metadata()) {
                Ok(()) => guard.mark_clean(),
                Err(err) => {
                    warn!(namespace = %name, error = %err, "namespace flush failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Err(err) = persist::save_failures(&self.data_root, &self.failures.snapshot()) {
            first_error.get_or_insert(err);
        }

        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Current metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> StoreMetrics {
        let namespaces: HashMap<String, usize> = self
            .namespaces()
            .into_iter()
            .map(|name| {
                let size = self.size(Some(&name));
                (name, size)
            })
            .collect();
        let total_entries = namespaces.values().sum();
        StoreMetrics {
            namespaces,
            total_entries,
            failure_count: self.failures.len(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// An empty request means the union of all namespaces.
    fn resolve_targets(&self, namespaces: &[String]) -> Vec<String> {
        if namespaces.is_empty() {
            self.namespaces()
        } else {
            namespaces.to_vec()
        }
    }

    fn get_existing(&self, name: &str) -> Option<Arc<RwLock<NamespaceStore>>> {
        self.namespaces
            .read()
            .ok()
            .and_then(|map| map.get(name).cloned())
    }

    fn get_or_create(&self, name: &str) -> Arc<RwLock<NamespaceStore>> {
        if let Some(ns) = self.get_existing(name) {
            return ns;
        }
        let mut map = match self.namespaces.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(RwLock::new(NamespaceStore::new(name, self.index_config)))
            })
            .clone()
    }

    /// Loads an evicted index back from disk, or installs an empty one for
    /// a namespace that has never persisted vectors.
    fn ensure_loaded(&self, guard: &mut NamespaceStore) -> Result<()> {
        if guard.index_resident() {
            return Ok(());
        }
        let loaded = persist::load_index(&self.data_root, guard.name())?
            .unwrap_or_else(|| VectorIndex::new(self.index_config));
        debug!(namespace = %guard.name(), entries = loaded.len(), "index loaded");
        guard.install_index(loaded);
        Ok(())
    }

    fn touch(&self, name: &str) {
        let now = self.clock.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut usage) = self.usage.lock() {
            usage.insert(name.to_string(), now);
        }
    }

    /// Evicts least-recently-queried namespace indices while resident memory
    /// exceeds the soft cap. Evicted namespaces are persisted first.
    fn enforce_memory_cap(&self) {
        let cap = self.config.memory_soft_cap_bytes;
        loop {
            let resident: Vec<(String, usize)> = self
                .namespaces()
                .into_iter()
                .filter_map(|name| {
                    let ns = self.get_existing(&name)?;
                    let guard = ns.read().ok()?;
                    guard
                        .index_resident()
                        .then(|| (name, guard.memory_bytes()))
                })
                .collect();

            let total: usize = resident.iter().map(|(_, bytes)| bytes).sum();
            if total <= cap || resident.len() < 2 {
                return;
            }

            let usage = self.usage.lock().map(|u| u.clone()).unwrap_or_default();
            let Some((victim, _)) = resident
                .iter()
                .min_by_key(|(name, _)| usage.get(name).copied().unwrap_or(0))
            else {
                return;
            };

            let Some(ns) = self.get_existing(victim) else {
                return;
            };
            let Ok(mut guard) = ns.write() else { return };
            if guard.is_dirty() {
                if let Some(index) = guard.index() {
                    if let Err(err) = persist::save_namespace(
                        &self.data_root,
                        victim,
                        index,
                        guard.metadata(),
                    ) {
                        warn!(namespace = %victim, error = %err, "eviction flush failed; keeping resident");
                        return;
                    }
                    guard.mark_clean();
                }
            }
            info!(namespace = %victim, "evicting namespace index under memory pressure");
            guard.evict_index();
        }
    }
}

fn poisoned() -> crate::error::Error {
    crate::error::Error::Fatal {
        message: "store lock poisoned".to_string(),
    }
}
