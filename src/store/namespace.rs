//! Per-namespace index and metadata pair.
//!
//! A namespace is an isolation partition, typically one per repository. Its
//! index and metadata map always agree on key sets; mutations go through
//! [`NamespaceStore`] to preserve that invariant. The index may be evicted
//! to disk under memory pressure while the metadata stays resident.

use std::collections::HashMap;

use crate::core::EmbeddingMetadata;
use crate::error::{Result, StoreError};
use crate::store::index::{IndexConfig, VectorIndex};

/// One namespace's vectors and metadata.
#[derive(Debug)]
pub struct NamespaceStore {
    name: String,
    index_config: IndexConfig,
    index: Option<VectorIndex>,
    metadata: HashMap<String, EmbeddingMetadata>,
    revision: u64,
    dirty: bool,
}

impl NamespaceStore {
    /// Creates an empty namespace with a resident index.
    #[must_use]
    pub fn new(name: &str, index_config: IndexConfig) -> Self {
        Self {
            name: name.to_string(),
            index_config,
            index: Some(VectorIndex::new(index_config)),
            metadata: HashMap::new(),
            revision: 0,
            dirty: false,
        }
    }

    /// Creates a namespace from loaded parts. A `None` index means the
    /// vectors are still on disk (progressive loading).
    #[must_use]
    pub fn from_parts(
        name: &str,
        index_config: IndexConfig,
        index: Option<VectorIndex>,
        metadata: HashMap<String, EmbeddingMetadata>,
    ) -> Self {
        Self {
            name: name.to_string(),
            index_config,
            index,
            metadata,
            revision: 0,
            dirty: false,
        }
    }

    /// Namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Monotonic revision counter; bumped on every state change.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether in-memory state differs from the persisted artifacts.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks persisted state as up to date.
    pub const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Whether the index is resident in memory.
    #[must_use]
    pub const fn index_resident(&self) -> bool {
        self.index.is_some()
    }

    /// The resident index, if any.
    #[must_use]
    pub const fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    /// Installs a freshly loaded index.
    pub fn install_index(&mut self, index: VectorIndex) {
        self.index = Some(index);
    }

    /// Drops the resident index (it must have been persisted first).
    /// Metadata stays resident.
    pub fn evict_index(&mut self) {
        self.index = None;
    }

    /// The metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &HashMap<String, EmbeddingMetadata> {
        &self.metadata
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Returns `true` when the namespace holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Upserts an entry atomically into both the index and the metadata map.
    ///
    /// Returns `true` when state changed; storing an identical
    /// (vector, metadata) pair is a no-op.
    ///
    /// # Errors
    ///
    /// Rejects wrong-dimension vectors and metadata whose namespace field
    /// names a different namespace. An empty metadata namespace is filled in.
    pub fn store(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        mut metadata: EmbeddingMetadata,
    ) -> Result<bool> {
        if metadata.repository_namespace.is_empty() {
            metadata.repository_namespace = self.name.clone();
        } else if metadata.repository_namespace != self.name {
            return Err(StoreError::MetadataInconsistent {
                id: id.to_string(),
                reason: format!(
                    "metadata namespace {} does not match store namespace {}",
                    metadata.repository_namespace, self.name
                ),
            }
            .into());
        }

        let index = self.index.get_or_insert_with(|| {
            // Storing into an evicted namespace rebuilds an empty index; the
            // caller is expected to reload from disk before writing.
            VectorIndex::new(self.index_config)
        });

        let vector_changed = index.upsert(id, vector)?;
        let metadata_changed = self.metadata.get(id) != Some(&metadata);
        if metadata_changed {
            self.metadata.insert(id.to_string(), metadata);
        }

        let changed = vector_changed || metadata_changed;
        if changed {
            self.revision += 1;
            self.dirty = true;
        }
        Ok(changed)
    }

    /// Removes an entry from both the index and metadata map.
    /// Returns `true` if the entry existed.
    pub fn delete(&mut self, id: &str) -> bool {
        let in_meta = self.metadata.remove(id).is_some();
        let in_index = self.index.as_mut().is_some_and(|index| index.remove(id));
        let removed = in_meta || in_index;
        if removed {
            self.revision += 1;
            self.dirty = true;
        }
        removed
    }

    /// All entries whose `file_path` equals or ends with the given path.
    #[must_use]
    pub fn find_by_file_path(&self, file_path: &str) -> Vec<(String, EmbeddingMetadata)> {
        let mut out: Vec<(String, EmbeddingMetadata)> = self
            .metadata
            .iter()
            .filter(|(_, meta)| {
                meta.file_path == file_path || meta.file_path.ends_with(file_path)
            })
            .map(|(id, meta)| (id.clone(), meta.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Approximate resident bytes (index plus metadata content).
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        let index_bytes = self.index.as_ref().map_or(0, VectorIndex::memory_bytes);
        let metadata_bytes: usize = self
            .metadata
            .values()
            .map(|m| m.content.len() + m.file_path.len())
            .sum();
        index_bytes + metadata_bytes
    }

    /// Verifies the index/metadata key agreement invariant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MetadataInconsistent`] naming the first
    /// disagreeing key.
    pub fn check_consistency(&self) -> Result<()> {
        let Some(index) = &self.index else {
            return Ok(());
        };
        for (id, _) in index.iter() {
            if !self.metadata.contains_key(id) {
                return Err(StoreError::MetadataInconsistent {
                    id: id.to_string(),
                    reason: "indexed vector has no metadata".to_string(),
                }
                .into());
            }
        }
        for id in self.metadata.keys() {
            if !index.contains(id) {
                return Err(StoreError::MetadataInconsistent {
                    id: id.clone(),
                    reason: "metadata entry has no indexed vector".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, ChunkKind};

    fn meta(file_path: &str, namespace: &str) -> EmbeddingMetadata {
        let chunk = Chunk::new(
            file_path,
            0,
            ChunkKind::File,
            "content".to_string(),
            1,
            1,
            "java",
        );
        EmbeddingMetadata::from_chunk(&chunk, "test", namespace)
    }

    fn ns() -> NamespaceStore {
        NamespaceStore::new("repo-a", IndexConfig::with_dimensions(4))
    }

    #[test]
    fn test_store_and_consistency() {
        let mut store = ns();
        store
            .store("src/A.java#0", vec![1.0, 0.0, 0.0, 0.0], meta("src/A.java", "repo-a"))
            .unwrap();
        assert_eq!(store.len(), 1);
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_namespace_mismatch_rejected() {
        let mut store = ns();
        let result = store.store(
            "src/A.java#0",
            vec![1.0, 0.0, 0.0, 0.0],
            meta("src/A.java", "other-repo"),
        );
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_namespace_filled_in() {
        let mut store = ns();
        store
            .store("id#0", vec![1.0, 0.0, 0.0, 0.0], meta("f.java", ""))
            .unwrap();
        assert_eq!(
            store.metadata()["id#0"].repository_namespace,
            "repo-a"
        );
    }

    #[test]
    fn test_identical_upsert_is_noop() {
        let mut store = ns();
        let changed = store
            .store("id#0", vec![1.0, 0.0, 0.0, 0.0], meta("f.java", "repo-a"))
            .unwrap();
        assert!(changed);
        let revision = store.revision();

        let changed = store
            .store("id#0", vec![1.0, 0.0, 0.0, 0.0], meta("f.java", "repo-a"))
            .unwrap();
        assert!(!changed);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_delete_removes_both_sides() {
        let mut store = ns();
        store
            .store("id#0", vec![1.0, 0.0, 0.0, 0.0], meta("f.java", "repo-a"))
            .unwrap();
        assert!(store.delete("id#0"));
        assert!(!store.delete("id#0"));
        assert!(store.is_empty());
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_find_by_file_path_suffix_match() {
        let mut store = ns();
        store
            .store(
                "billing/src/A.java#0",
                vec![1.0, 0.0, 0.0, 0.0],
                meta("billing/src/A.java", "repo-a"),
            )
            .unwrap();
        store
            .store(
                "billing/src/B.java#0",
                vec![0.0, 1.0, 0.0, 0.0],
                meta("billing/src/B.java", "repo-a"),
            )
            .unwrap();

        let exact = store.find_by_file_path("billing/src/A.java");
        assert_eq!(exact.len(), 1);

        let suffix = store.find_by_file_path("A.java");
        assert_eq!(suffix.len(), 1);
        assert_eq!(suffix[0].0, "billing/src/A.java#0");

        let none = store.find_by_file_path("C.java");
        assert!(none.is_empty());
    }

    #[test]
    fn test_dirty_tracking() {
        let mut store = ns();
        assert!(!store.is_dirty());
        store
            .store("id#0", vec![1.0, 0.0, 0.0, 0.0], meta("f.java", "repo-a"))
            .unwrap();
        assert!(store.is_dirty());
        store.mark_clean();
        assert!(!store.is_dirty());
    }
}
