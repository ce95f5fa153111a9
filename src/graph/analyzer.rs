//! Call-graph construction and traversal over parsed class files.
//!
//! Initialization enumerates classes under the configured roots, parses
//! each class once, and populates four append-only caches: the type cache,
//! the method table, and the forward/reverse call graphs. Initialization is
//! a one-shot task, normally spawned in the background; queries before it
//! completes see a partial graph and are never blocked. One unparsable
//! class is logged and skipped, never fatal.
//!
//! Forward analysis walks the forward graph from a root method with an
//! explicit visited set, expanding interface and abstract methods to their
//! concrete implementations, bounded by depth and a node cap.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::CallPathConfig;
use crate::error::{GraphError, Result};
use crate::graph::classfile::{TypeDescriptor, parse_class_file};
use crate::graph::model::{CallGraph, ExceptionNode, MethodNode, method_key, simple_key};

/// Superclass fallbacks for throwable types outside the scanned roots.
const BUILTIN_SUPERS: &[(&str, &str)] = &[
    ("java.lang.Exception", "java.lang.Throwable"),
    ("java.lang.Error", "java.lang.Throwable"),
    ("java.lang.RuntimeException", "java.lang.Exception"),
    ("java.io.IOException", "java.lang.Exception"),
    ("java.lang.IllegalArgumentException", "java.lang.RuntimeException"),
    ("java.lang.IllegalStateException", "java.lang.RuntimeException"),
    ("java.lang.NullPointerException", "java.lang.RuntimeException"),
    ("java.lang.UnsupportedOperationException", "java.lang.RuntimeException"),
];

/// Serializable call-graph cache (`graph/call-graph.bin`).
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphCache {
    /// Every indexed method node.
    pub methods: Vec<MethodNode>,
    /// Forward edges on unqualified keys.
    pub forward: BTreeMap<String, BTreeSet<String>>,
}

/// Analyzer statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GraphStats {
    /// Parsed classes in the type cache.
    pub classes: usize,
    /// Indexed methods.
    pub methods: usize,
    /// Forward edges.
    pub edges: usize,
}

/// The call-graph analyzer.
pub struct GraphAnalyzer {
    config: CallPathConfig,
    type_cache: DashMap<String, Arc<TypeDescriptor>>,
    methods: DashMap<String, Vec<MethodNode>>,
    forward: DashMap<String, BTreeSet<String>>,
    reverse: DashMap<String, BTreeSet<String>>,
    exception_cache: DashMap<String, Arc<ExceptionNode>>,
    ready: AtomicBool,
}

impl GraphAnalyzer {
    /// Creates an analyzer with empty caches.
    #[must_use]
    pub fn new(config: CallPathConfig) -> Self {
        Self {
            config,
            type_cache: DashMap::new(),
            methods: DashMap::new(),
            forward: DashMap::new(),
            reverse: DashMap::new(),
            exception_cache: DashMap::new(),
            ready: AtomicBool::new(false),
        }
    }

    /// Whether one-shot initialization has completed.
    ///
    /// Queries before readiness see a partial graph; they never block.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Scans the configured class roots and populates the caches.
    ///
    /// Unreadable roots and malformed classes are logged and skipped.
    pub fn initialize(&self) {
        for root in self.config.class_roots.clone() {
            self.scan_root(&root);
        }
        self.ready.store(true, Ordering::Release);
        let stats = self.stats();
        info!(
            classes = stats.classes,
            methods = stats.methods,
            edges = stats.edges,
            "call-graph initialization complete"
        );
    }

    /// Spawns initialization on a background thread.
    pub fn spawn_initialize(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        let analyzer = Arc::clone(self);
        std::thread::spawn(move || analyzer.initialize())
    }

    /// Current cache statistics.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            classes: self.type_cache.len(),
            methods: self.methods.iter().map(|e| e.value().len()).sum(),
            edges: self.forward.iter().map(|e| e.value().len()).sum(),
        }
    }

    fn scan_root(&self, root: &Path) {
        if !root.exists() {
            warn!(root = %root.display(), "class root missing, skipping");
            return;
        }
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "class"))
        {
            match parse_class_file(entry.path()) {
                Ok(descriptor) => self.index_class(descriptor),
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unparsable class");
                }
            }
        }
    }

    /// Whether a class belongs to the analyzed package scope.
    fn in_scope(&self, class_name: &str) -> bool {
        self.config.base_package.is_empty() || class_name.starts_with(&self.config.base_package)
    }

    /// Indexes one parsed class into the caches.
    pub fn index_class(&self, descriptor: TypeDescriptor) {
        if !self.in_scope(&descriptor.class_name) {
            return;
        }
        let descriptor = Arc::new(descriptor);
        self.type_cache
            .insert(descriptor.class_name.clone(), Arc::clone(&descriptor));

        for method in &descriptor.methods {
            if method.is_synthetic {
                continue;
            }
            let node = MethodNode {
                class_name: descriptor.class_name.clone(),
                method_name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                is_interface: descriptor.is_interface,
                is_abstract: method.is_abstract,
                source_file: descriptor.source_file.clone(),
                line_number: method.line_number,
            };
            let caller_key = node.key();
            {
                let mut overloads = self.methods.entry(caller_key.clone()).or_default();
                if !overloads.contains(&node) {
                    overloads.push(node);
                }
            }

            for call in &method.calls {
                if !self.config.include_libraries && !self.in_scope(&call.owner) {
                    continue;
                }
                let callee_key = method_key(&call.owner, &call.name);
                self.forward
                    .entry(caller_key.clone())
                    .or_default()
                    .insert(callee_key.clone());
                self.reverse
                    .entry(callee_key)
                    .or_default()
                    .insert(caller_key.clone());
            }
        }
        debug!(class = %descriptor.class_name, "indexed");
    }

    /// Looks up the node for a method path (either key form). Overloads
    /// resolve to the first indexed node unless the qualified form pins one.
    /// An unqualified path like `CustomerService.findById` resolves by
    /// package-suffix match.
    #[must_use]
    pub fn resolve(&self, method_path: &str) -> Option<MethodNode> {
        let key = simple_key(method_path);
        if let Some(overloads) = self.methods.get(key) {
            if let Some(qualifier) = method_path.strip_prefix(key)
                && !qualifier.is_empty()
            {
                return overloads
                    .iter()
                    .find(|n| n.descriptor == qualifier)
                    .cloned();
            }
            return overloads.first().cloned();
        }

        // Suffix fallback for paths without the package prefix.
        let needle = format!(".{key}");
        let mut matches: Vec<String> = self
            .methods
            .iter()
            .filter(|entry| entry.key().ends_with(&needle))
            .map(|entry| entry.key().clone())
            .collect();
        matches.sort();
        matches
            .first()
            .and_then(|full| self.methods.get(full))
            .and_then(|overloads| overloads.first().cloned())
    }

    /// Direct callees of a method key.
    #[must_use]
    pub fn callees_of(&self, key: &str) -> BTreeSet<String> {
        self.forward
            .get(simple_key(key))
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Direct callers of a method key (reverse graph).
    #[must_use]
    pub fn callers_of(&self, key: &str) -> BTreeSet<String> {
        self.reverse
            .get(simple_key(key))
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// The parsed type behind a class name, when indexed.
    #[must_use]
    pub fn type_of(&self, class_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.type_cache.get(class_name).map(|e| Arc::clone(e.value()))
    }

    /// All indexed types.
    #[must_use]
    pub fn types(&self) -> Vec<Arc<TypeDescriptor>> {
        self.type_cache.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Forward analysis: builds the bounded call graph rooted at a method.
    ///
    /// Interface and abstract nodes are expanded to their concrete
    /// implementations. The traversal carries a visited set, so cycles
    /// terminate; hitting `max_depth` or the node cap marks the graph
    /// truncated.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MethodNotFound`] for an unindexed root.
    pub fn analyze_method(&self, method_path: &str, max_depth: usize) -> Result<CallGraph> {
        let root_node = self.resolve(method_path).ok_or_else(|| GraphError::MethodNotFound {
            method: method_path.to_string(),
        })?;
        let root = root_node.key();

        let mut graph = CallGraph::rooted(&root);
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();

        graph.nodes.insert(root.clone(), root_node);
        visited.insert(root.clone());
        queue.push_back((root, 0));

        while let Some((key, depth)) = queue.pop_front() {
            if graph.node_count() >= self.config.max_nodes {
                graph.truncated = true;
                break;
            }
            if depth >= max_depth {
                graph.truncated = true;
                continue;
            }

            let node_is_dynamic = graph
                .nodes
                .get(&key)
                .is_some_and(|n| n.is_interface || n.is_abstract);

            let mut next: Vec<String> = self.callees_of(&key).into_iter().collect();
            if node_is_dynamic {
                next.extend(self.find_implementations(&key));
            }

            for callee in next {
                graph.add_edge(&key, &callee);
                if visited.insert(callee.clone()) {
                    let node = self
                        .resolve(&callee)
                        .unwrap_or_else(|| placeholder_node(&callee));
                    graph.nodes.insert(callee.clone(), node);
                    if graph.node_count() >= self.config.max_nodes {
                        graph.truncated = true;
                        break;
                    }
                    queue.push_back((callee, depth + 1));
                }
            }
        }

        Ok(graph)
    }

    /// Concrete implementations of an interface or abstract method:
    /// direct implementors, transitive interface inheritors, extenders of
    /// the declaring abstract class, and subclasses inheriting a concrete
    /// definition. A secondary raw scan indexes classes missed by the
    /// initial pass before giving up.
    #[must_use]
    pub fn find_implementations(&self, method_path: &str) -> Vec<String> {
        let key = simple_key(method_path);
        let Some((declaring_class, method_name)) = key.rsplit_once('.') else {
            return Vec::new();
        };

        let found = self.implementations_in_cache(declaring_class, method_name);
        if !found.is_empty() {
            return found;
        }

        // Safety net: raw-scan the roots for classes the cache is missing.
        self.scan_unindexed();
        self.implementations_in_cache(declaring_class, method_name)
    }

    /// Subtypes (of any kind) that redeclare the method themselves.
    #[must_use]
    pub fn find_overrides(&self, method_path: &str) -> Vec<String> {
        let key = simple_key(method_path);
        let Some((declaring_class, method_name)) = key.rsplit_once('.') else {
            return Vec::new();
        };

        // Collected up front: the subtype walks re-enter the type cache.
        let mut out: Vec<String> = self
            .types()
            .into_iter()
            .filter(|t| t.class_name != declaring_class)
            .filter(|t| self.is_subtype(&t.class_name, declaring_class))
            .filter(|t| {
                t.methods
                    .iter()
                    .any(|m| m.name == method_name && !m.is_synthetic)
            })
            .map(|t| method_key(&t.class_name, method_name))
            .collect();
        out.sort();
        out
    }

    fn implementations_in_cache(&self, declaring_class: &str, method_name: &str) -> Vec<String> {
        // Collected up front: the subtype walks re-enter the type cache.
        let mut out: Vec<String> = self
            .types()
            .into_iter()
            .filter(|t| !t.is_interface && !t.is_abstract)
            .filter(|t| {
                t.class_name == declaring_class || self.is_subtype(&t.class_name, declaring_class)
            })
            .filter(|t| self.resolves_concrete(&t.class_name, method_name))
            .map(|t| method_key(&t.class_name, method_name))
            .collect();
        out.sort();
        out
    }

    /// Whether `class_name` is a subtype of `ancestor` through superclasses
    /// and transitive interfaces.
    fn is_subtype(&self, class_name: &str, ancestor: &str) -> bool {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(class_name.to_string());

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if current == ancestor && current != class_name {
                return true;
            }
            let Some(descriptor) = self.type_of(&current) else {
                continue;
            };
            if let Some(super_name) = &descriptor.super_name {
                queue.push_back(super_name.clone());
            }
            for interface in &descriptor.interfaces {
                queue.push_back(interface.clone());
            }
        }
        false
    }

    /// Whether the class declares or inherits a concrete definition of the
    /// method.
    fn resolves_concrete(&self, class_name: &str, method_name: &str) -> bool {
        let mut current = Some(class_name.to_string());
        let mut visited: HashSet<String> = HashSet::new();
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                return false;
            }
            let Some(descriptor) = self.type_of(&name) else {
                return false;
            };
            if descriptor
                .methods
                .iter()
                .any(|m| m.name == method_name && !m.is_abstract && !m.is_synthetic)
            {
                return true;
            }
            current = descriptor.super_name.clone();
        }
        false
    }

    /// Parses and indexes classes under the roots that the type cache does
    /// not know yet.
    fn scan_unindexed(&self) {
        for root in self.config.class_roots.clone() {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(root)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "class"))
            {
                let Ok(descriptor) = parse_class_file(entry.path()) else {
                    continue;
                };
                if !self.type_cache.contains_key(&descriptor.class_name) {
                    self.index_class(descriptor);
                }
            }
        }
    }

    /// Walks an exception's superclass chain up to the Throwable-family
    /// root, memoizing the result. Classes outside the scanned scope fall
    /// back to the builtin table, then to a name-based default.
    #[must_use]
    pub fn analyze_exception_hierarchy(&self, class_name: &str) -> Arc<ExceptionNode> {
        if let Some(cached) = self.exception_cache.get(class_name) {
            return Arc::clone(cached.value());
        }

        let mut hierarchy = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(class_name.to_string());
        let mut current = self.super_of(class_name);
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                break;
            }
            hierarchy.push(name.clone());
            if name == "java.lang.Throwable" {
                break;
            }
            current = self.super_of(&name);
        }

        let unchecked = std::iter::once(class_name)
            .chain(hierarchy.iter().map(String::as_str))
            .any(|c| c == "java.lang.RuntimeException" || c == "java.lang.Error");

        let node = Arc::new(ExceptionNode {
            class_name: class_name.to_string(),
            hierarchy,
            checked: !unchecked,
        });
        self.exception_cache
            .insert(class_name.to_string(), Arc::clone(&node));
        node
    }

    fn super_of(&self, class_name: &str) -> Option<String> {
        if class_name == "java.lang.Throwable" || class_name == "java.lang.Object" {
            return None;
        }
        if let Some(descriptor) = self.type_of(class_name) {
            return descriptor.super_name.clone();
        }
        if let Some(&(_, super_name)) = BUILTIN_SUPERS.iter().find(|&&(c, _)| c == class_name) {
            return Some(super_name.to_string());
        }
        // Name-based default for unindexed application exceptions.
        if class_name.ends_with("Error") {
            Some("java.lang.Error".to_string())
        } else {
            Some("java.lang.Exception".to_string())
        }
    }

    /// Serializes the forward graph and method table.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache artifact cannot be written.
    pub fn save_cache(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            crate::store::persist::ensure_dir(parent)?;
        }
        let cache = GraphCache {
            methods: {
                let mut all: Vec<MethodNode> = self
                    .methods
                    .iter()
                    .flat_map(|e| e.value().clone())
                    .collect();
                all.sort_by(|a, b| a.qualified_key().cmp(&b.qualified_key()));
                all
            },
            forward: self
                .forward
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        };
        crate::store::persist::write_bincode(path, &cache)
    }

    /// Restores the caches from a serialized graph; the reverse graph is
    /// rebuilt by inversion. Marks the analyzer ready.
    ///
    /// # Errors
    ///
    /// Returns an error when the artifact is missing or corrupt.
    pub fn load_cache(&self, path: &Path) -> Result<()> {
        let cache: GraphCache = crate::store::persist::read_bincode(path)?;
        for node in cache.methods {
            self.methods.entry(node.key()).or_default().push(node);
        }
        for (caller, callees) in cache.forward {
            for callee in &callees {
                self.reverse
                    .entry(callee.clone())
                    .or_default()
                    .insert(caller.clone());
            }
            self.forward.insert(caller, callees);
        }
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Verifies the forward/reverse mirror invariant.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError::MethodNotFound`] naming the first edge whose
    /// mirror is missing.
    pub fn check_consistency(&self) -> Result<()> {
        for entry in &self.forward {
            for callee in entry.value() {
                let mirrored = self
                    .reverse
                    .get(callee)
                    .is_some_and(|callers| callers.contains(entry.key()));
                if !mirrored {
                    return Err(GraphError::MethodNotFound {
                        method: format!("missing reverse edge {} -> {}", entry.key(), callee),
                    }
                    .into());
                }
            }
        }
        for entry in &self.reverse {
            for caller in entry.value() {
                let mirrored = self
                    .forward
                    .get(caller)
                    .is_some_and(|callees| callees.contains(entry.key()));
                if !mirrored {
                    return Err(GraphError::MethodNotFound {
                        method: format!("missing forward edge {} -> {}", caller, entry.key()),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Node for a method referenced in bytecode but not indexed (outside the
/// base package or not yet scanned).
fn placeholder_node(key: &str) -> MethodNode {
    let (class_name, method_name) = key
        .rsplit_once('.')
        .map_or((key, ""), |(c, m)| (c, m));
    MethodNode {
        class_name: class_name.to_string(),
        method_name: method_name.to_string(),
        descriptor: String::new(),
        is_interface: false,
        is_abstract: false,
        source_file: None,
        line_number: None,
    }
}
