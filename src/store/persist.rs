//! On-disk layout and serialization for the vector store.
//!
//! Under the configured data root:
//!
//! ```text
//! vectors/<namespace>/index          bincode IndexSnapshot
//! vectors/<namespace>/metadata.json  map chunk_id → EmbeddingMetadata
//! vectors/failures.json              list of EmbeddingFailure
//! graph/call-graph.bin               bincode call-graph cache (optional)
//! ```
//!
//! Writes go to a temporary sibling and rename into place, so a crash mid
//! write leaves the previous artifact intact (eventual consistency: at most
//! one flush window of data can be lost).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::core::{EmbeddingFailure, EmbeddingMetadata};
use crate::error::{IoError, Result, StoreError};
use crate::store::index::{IndexSnapshot, VectorIndex};

/// Directory holding all namespace subdirectories.
#[must_use]
pub fn vectors_dir(data_root: &Path) -> PathBuf {
    data_root.join("vectors")
}

/// Directory for one namespace.
#[must_use]
pub fn namespace_dir(data_root: &Path, namespace: &str) -> PathBuf {
    vectors_dir(data_root).join(namespace)
}

/// Path of the failures artifact.
#[must_use]
pub fn failures_path(data_root: &Path) -> PathBuf {
    vectors_dir(data_root).join("failures.json")
}

/// Path of the call-graph cache artifact.
#[must_use]
pub fn call_graph_path(data_root: &Path) -> PathBuf {
    data_root.join("graph").join("call-graph.bin")
}

/// Lists namespaces that have a directory on disk.
#[must_use]
pub fn list_namespaces(data_root: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(vectors_dir(data_root)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

/// Persists a namespace's index and metadata.
///
/// # Errors
///
/// Returns an error when the directory cannot be created or either artifact
/// fails to serialize or write.
pub fn save_namespace(
    data_root: &Path,
    namespace: &str,
    index: &VectorIndex,
    metadata: &HashMap<String, EmbeddingMetadata>,
) -> Result<()> {
    let dir = namespace_dir(data_root, namespace);
    ensure_dir(&dir)?;

    write_bincode(&dir.join("index"), &index.snapshot())?;
    write_json(&dir.join("metadata.json"), metadata)?;
    Ok(())
}

/// Loads a namespace's metadata map. Missing file yields an empty map.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be parsed.
pub fn load_metadata(
    data_root: &Path,
    namespace: &str,
) -> Result<HashMap<String, EmbeddingMetadata>> {
    let path = namespace_dir(data_root, namespace).join("metadata.json");
    if !path.exists() {
        return Ok(HashMap::new());
    }
    read_json(&path)
}

/// Loads and rebuilds a namespace's index. Missing file yields `None`.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] when the artifact cannot be decoded.
pub fn load_index(data_root: &Path, namespace: &str) -> Result<Option<VectorIndex>> {
    let path = namespace_dir(data_root, namespace).join("index");
    if !path.exists() {
        return Ok(None);
    }
    let snapshot: IndexSnapshot = read_bincode(&path)?;
    Ok(Some(VectorIndex::from_snapshot(snapshot)?))
}

/// Persists the failure log.
///
/// # Errors
///
/// Returns an error when the artifact cannot be written.
pub fn save_failures(data_root: &Path, failures: &[EmbeddingFailure]) -> Result<()> {
    ensure_dir(&vectors_dir(data_root))?;
    write_json(&failures_path(data_root), &failures)
}

/// Loads the failure log. Missing or unreadable files yield an empty list;
/// a corrupt failure log is logged and discarded rather than blocking startup.
#[must_use]
pub fn load_failures(data_root: &Path) -> Vec<EmbeddingFailure> {
    let path = failures_path(data_root);
    if !path.exists() {
        return Vec::new();
    }
    match read_json::<Vec<EmbeddingFailure>>(&path) {
        Ok(failures) => failures,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "discarding unreadable failure log");
            Vec::new()
        }
    }
}

/// Serializes a value to a bincode artifact.
///
/// # Errors
///
/// Returns an error on serialization or write failure.
pub fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(StoreError::from)?;
    write_atomic(path, &bytes)
}

/// Reads a bincode artifact.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] when decoding fails.
pub fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    bincode::deserialize(&bytes).map_err(|e| {
        StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(StoreError::from)?;
    write_atomic(path, &json)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()).into())
}

/// Writes via a temporary sibling plus rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| IoError::WriteFailed {
        path: tmp.display().to_string(),
        reason: e.to_string(),
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        IoError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Creates a directory tree if missing.
///
/// # Errors
///
/// Returns [`IoError::DirectoryFailed`] on failure.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        IoError::DirectoryFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, ChunkKind};
    use crate::store::index::IndexConfig;
    use tempfile::TempDir;

    fn sample_metadata() -> HashMap<String, EmbeddingMetadata> {
        let chunk = Chunk::new(
            "src/A.java",
            0,
            ChunkKind::File,
            "class A {}".to_string(),
            1,
            1,
            "java",
        );
        let mut map = HashMap::new();
        map.insert(
            "src/A.java#0".to_string(),
            EmbeddingMetadata::from_chunk(&chunk, "test", "repo-a"),
        );
        map
    }

    #[test]
    fn test_namespace_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new(IndexConfig::with_dimensions(4));
        index.upsert("src/A.java#0", vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let metadata = sample_metadata();

        save_namespace(dir.path(), "repo-a", &index, &metadata).unwrap();

        assert_eq!(list_namespaces(dir.path()), vec!["repo-a".to_string()]);
        let loaded_meta = load_metadata(dir.path(), "repo-a").unwrap();
        assert_eq!(loaded_meta, metadata);

        let loaded_index = load_index(dir.path(), "repo-a").unwrap().unwrap();
        assert_eq!(loaded_index.len(), 1);
        assert!(loaded_index.contains("src/A.java#0"));
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = TempDir::new().unwrap();
        assert!(load_metadata(dir.path(), "nope").unwrap().is_empty());
        assert!(load_index(dir.path(), "nope").unwrap().is_none());
        assert!(load_failures(dir.path()).is_empty());
        assert!(list_namespaces(dir.path()).is_empty());
    }

    #[test]
    fn test_failures_roundtrip() {
        let dir = TempDir::new().unwrap();
        let failures = vec![EmbeddingFailure::new("text", "503")];
        save_failures(dir.path(), &failures).unwrap();
        let loaded = load_failures(dir.path());
        assert_eq!(loaded, failures);
    }

    #[test]
    fn test_corrupt_failures_discarded() {
        let dir = TempDir::new().unwrap();
        ensure_dir(&vectors_dir(dir.path())).unwrap();
        fs::write(failures_path(dir.path()), b"not json").unwrap();
        assert!(load_failures(dir.path()).is_empty());
    }

    #[test]
    fn test_corrupt_index_is_error() {
        let dir = TempDir::new().unwrap();
        let ns_dir = namespace_dir(dir.path(), "repo-a");
        ensure_dir(&ns_dir).unwrap();
        fs::write(ns_dir.join("index"), b"garbage").unwrap();
        let result = load_index(dir.path(), "repo-a");
        assert!(result.is_err());
    }
}
