//! HNSW vector index with deterministic construction.
//!
//! A hierarchical navigable small-world graph over cosine distance. Node
//! levels derive from a hash of the chunk identifier rather than an RNG, so
//! rebuilding an index from the same insertion sequence yields the same
//! graph and identical query results (the retrieval determinism guarantee).
//!
//! Deletions tombstone the slot; the graph keeps routing through deleted
//! nodes but never returns them. Small indices (at most the search expansion
//! factor) are scanned exhaustively, so approximation only kicks in at
//! scale.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Configuration for the HNSW graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of dimensions in the vectors.
    pub dimensions: usize,
    /// Max connections per node per layer (`M`).
    pub connectivity: usize,
    /// Candidate pool size during insertion (`ef_construction`).
    pub expansion_add: usize,
    /// Candidate pool size during search (`ef_search`).
    pub expansion_search: usize,
}

impl IndexConfig {
    /// Creates a configuration with default graph parameters.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
        }
    }
}

/// A similarity hit returned by the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Chunk identifier.
    pub id: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Internal candidate ordered by distance (smaller first when popped from
/// the wrapper heaps below).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance: f32,
    slot: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-node adjacency: one neighbour list per layer the node occupies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Neighbours {
    layers: Vec<Vec<usize>>,
}

/// HNSW index mapping chunk identifiers to vectors.
#[derive(Debug)]
pub struct VectorIndex {
    config: IndexConfig,
    keys: Vec<String>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    deleted: Vec<bool>,
    slots: HashMap<String, usize>,
    graph: Vec<Neighbours>,
    levels: Vec<usize>,
    entry_point: Option<usize>,
    live_count: usize,
}

impl VectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            keys: Vec::new(),
            vectors: Vec::new(),
            norms: Vec::new(),
            deleted: Vec::new(),
            slots: HashMap::new(),
            graph: Vec::new(),
            levels: Vec::new(),
            entry_point: None,
            live_count: 0,
        }
    }

    /// Returns the configured dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Number of live entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live_count
    }

    /// Returns `true` when the index holds no live entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Returns `true` when the identifier has a live entry.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.slots
            .get(id)
            .is_some_and(|&slot| !self.deleted[slot])
    }

    /// Returns the vector stored for an identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.slots
            .get(id)
            .filter(|&&slot| !self.deleted[slot])
            .map(|&slot| self.vectors[slot].as_slice())
    }

    /// Inserts or replaces a vector. Returns `true` when the index changed
    /// (inserting an identical vector under the same id is a no-op).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DimensionMismatch`] for wrong-sized vectors.
    pub fn upsert(&mut self, id: &str, vector: Vec<f32>) -> Result<bool> {
        if vector.len() != self.config.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimensions,
                got: vector.len(),
            }
            .into());
        }

        if let Some(&slot) = self.slots.get(id) {
            if !self.deleted[slot] && self.vectors[slot] == vector {
                return Ok(false);
            }
            self.remove(id);
        }

        self.insert_node(id, vector);
        Ok(true)
    }

    /// Removes an identifier. Returns `true` if it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(&slot) = self.slots.get(id) else {
            return false;
        };
        if self.deleted[slot] {
            return false;
        }
        self.deleted[slot] = true;
        self.live_count -= 1;
        self.slots.remove(id);

        if self.entry_point == Some(slot) {
            self.entry_point = self.pick_new_entry();
        }
        true
    }

    /// Finds the `k` most similar live entries with similarity at least
    /// `min_similarity`, descending by score.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> Vec<IndexHit> {
        if query.len() != self.config.dimensions || k == 0 || self.live_count == 0 {
            return Vec::new();
        }

        let candidate_slots = if self.live_count <= self.config.expansion_search {
            // Exhaustive for small indices.
            (0..self.vectors.len()).collect::<Vec<_>>()
        } else {
            self.graph_candidates(query)
        };

        let query_norm = norm(query);
        let mut hits: Vec<IndexHit> = candidate_slots
            .into_iter()
            .filter(|&slot| !self.deleted[slot])
            .map(|slot| IndexHit {
                id: self.keys[slot].clone(),
                score: cosine(query, query_norm, &self.vectors[slot], self.norms[slot]),
            })
            .filter(|hit| hit.score >= min_similarity)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        hits
    }

    /// Iterates over live `(id, vector)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.keys
            .iter()
            .enumerate()
            .filter(|&(slot, _)| !self.deleted[slot])
            .map(|(slot, key)| (key.as_str(), self.vectors[slot].as_slice()))
    }

    /// Serializable snapshot of live entries in slot order.
    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            config: self.config,
            entries: self
                .iter()
                .map(|(id, vector)| (id.to_string(), vector.to_vec()))
                .collect(),
        }
    }

    /// Rebuilds an index from a snapshot by re-inserting in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if any stored vector has wrong dimensions.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self> {
        let mut index = Self::new(snapshot.config);
        for (id, vector) in snapshot.entries {
            index.upsert(&id, vector)?;
        }
        Ok(index)
    }

    /// Approximate resident size in bytes.
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        self.vectors.len() * self.config.dimensions * std::mem::size_of::<f32>()
            + self.keys.iter().map(String::len).sum::<usize>()
    }

    // ------------------------------------------------------------------
    // Graph internals
    // ------------------------------------------------------------------

    /// Deterministic level for an identifier: geometric with p = 1/4.
    fn level_for(id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let h = hasher.finish();
        ((h.trailing_zeros() / 2) as usize).min(8)
    }

    fn insert_node(&mut self, id: &str, vector: Vec<f32>) {
        let slot = self.vectors.len();
        let level = Self::level_for(id);

        self.norms.push(norm(&vector));
        self.vectors.push(vector);
        self.keys.push(id.to_string());
        self.deleted.push(false);
        self.levels.push(level);
        self.graph.push(Neighbours {
            layers: vec![Vec::new(); level + 1],
        });
        self.slots.insert(id.to_string(), slot);
        self.live_count += 1;

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(slot);
            return;
        };

        let query = self.vectors[slot].clone();
        let query_norm = self.norms[slot];
        let entry_level = self.levels[entry];

        // Greedy descent through layers above the node's level.
        let mut current = entry;
        let mut layer = entry_level;
        while layer > level {
            current = self.greedy_step(&query, query_norm, current, layer);
            layer -= 1;
        }

        // Connect on each shared layer from the top down.
        let top = level.min(entry_level);
        for layer in (0..=top).rev() {
            let candidates =
                self.search_layer(&query, query_norm, current, layer, self.config.expansion_add);
            let max_links = self.max_links(layer);
            let selected: Vec<usize> = candidates
                .iter()
                .take(max_links)
                .map(|c| c.slot)
                .collect();

            for &neighbour in &selected {
                self.graph[slot].layers[layer].push(neighbour);
                if !self.graph[neighbour].layers[layer].contains(&slot) {
                    self.graph[neighbour].layers[layer].push(slot);
                    self.prune(neighbour, layer);
                }
            }

            if let Some(best) = candidates.first() {
                current = best.slot;
            }
        }

        if level > entry_level {
            self.entry_point = Some(slot);
        }
    }

    /// Single greedy hop-to-convergence on one layer.
    fn greedy_step(&self, query: &[f32], query_norm: f32, start: usize, layer: usize) -> usize {
        let mut current = start;
        let mut best = self.distance_to(query, query_norm, current);
        loop {
            let mut improved = false;
            for &neighbour in self.neighbours(current, layer) {
                let d = self.distance_to(query, query_norm, neighbour);
                if d < best {
                    best = d;
                    current = neighbour;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Best-first search on one layer returning up to `ef` candidates,
    /// nearest first.
    fn search_layer(
        &self,
        query: &[f32],
        query_norm: f32,
        start: usize,
        layer: usize,
        ef: usize,
    ) -> Vec<Candidate> {
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(start);

        let start_candidate = Candidate {
            distance: self.distance_to(query, query_norm, start),
            slot: start,
        };

        // to_visit is a min-heap by distance (Reverse); results a max-heap.
        let mut to_visit: BinaryHeap<std::cmp::Reverse<Candidate>> = BinaryHeap::new();
        to_visit.push(std::cmp::Reverse(start_candidate));
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();
        results.push(start_candidate);

        while let Some(std::cmp::Reverse(nearest)) = to_visit.pop() {
            let furthest = results.peek().map_or(f32::INFINITY, |c| c.distance);
            if nearest.distance > furthest && results.len() >= ef {
                break;
            }
            for &neighbour in self.neighbours(nearest.slot, layer) {
                if !visited.insert(neighbour) {
                    continue;
                }
                let candidate = Candidate {
                    distance: self.distance_to(query, query_norm, neighbour),
                    slot: neighbour,
                };
                let furthest = results.peek().map_or(f32::INFINITY, |c| c.distance);
                if results.len() < ef || candidate.distance < furthest {
                    to_visit.push(std::cmp::Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut sorted = results.into_vec();
        sorted.sort();
        sorted
    }

    /// Candidate slots for a query via the layered graph.
    fn graph_candidates(&self, query: &[f32]) -> Vec<usize> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        let query_norm = norm(query);
        let mut current = entry;
        for layer in (1..=self.levels[entry]).rev() {
            current = self.greedy_step(query, query_norm, current, layer);
        }
        self.search_layer(query, query_norm, current, 0, self.config.expansion_search)
            .into_iter()
            .map(|c| c.slot)
            .collect()
    }

    fn neighbours(&self, slot: usize, layer: usize) -> &[usize] {
        self.graph[slot]
            .layers
            .get(layer)
            .map_or(&[], Vec::as_slice)
    }

    /// Keeps a node's neighbour list within the layer's link budget,
    /// preferring nearer neighbours.
    fn prune(&mut self, slot: usize, layer: usize) {
        let max_links = self.max_links(layer);
        if self.graph[slot].layers[layer].len() <= max_links {
            return;
        }
        let base = self.vectors[slot].clone();
        let base_norm = self.norms[slot];
        let mut scored: Vec<Candidate> = self.graph[slot].layers[layer]
            .iter()
            .map(|&n| Candidate {
                distance: self.distance_to(&base, base_norm, n),
                slot: n,
            })
            .collect();
        scored.sort();
        scored.truncate(max_links);
        self.graph[slot].layers[layer] = scored.into_iter().map(|c| c.slot).collect();
    }

    const fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.connectivity * 2
        } else {
            self.config.connectivity
        }
    }

    fn distance_to(&self, query: &[f32], query_norm: f32, slot: usize) -> f32 {
        1.0 - cosine(query, query_norm, &self.vectors[slot], self.norms[slot])
    }

    /// Highest-level live node, for entry-point replacement after deletion.
    fn pick_new_entry(&self) -> Option<usize> {
        (0..self.vectors.len())
            .filter(|&slot| !self.deleted[slot])
            .max_by_key(|&slot| (self.levels[slot], std::cmp::Reverse(slot)))
    }
}

/// Serializable index state: configuration plus live entries in slot order.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Graph configuration.
    pub config: IndexConfig,
    /// Live `(id, vector)` entries.
    pub entries: Vec<(String, Vec<f32>)>,
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}
