//! Call-graph and exception-hierarchy model types.
//!
//! Cyclic structures are modeled as immutable node identity (string keys)
//! plus side tables; traversals carry explicit visited sets. Nodes never
//! hold owning references to each other.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A method node. Identity is the `(class_name, method_name, descriptor)`
/// triple; the remaining fields are attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodNode {
    /// Fully qualified class name (dot-separated).
    pub class_name: String,
    /// Method name.
    pub method_name: String,
    /// JVM parameter descriptor, e.g. `(Ljava/lang/String;)V`.
    pub descriptor: String,
    /// Whether the declaring type is an interface.
    pub is_interface: bool,
    /// Whether the method itself is abstract.
    pub is_abstract: bool,
    /// Source file of the declaring class, when recorded.
    pub source_file: Option<String>,
    /// First line of the method body, when recorded.
    pub line_number: Option<usize>,
}

impl MethodNode {
    /// The unqualified method key: `class.method`.
    #[must_use]
    pub fn key(&self) -> String {
        method_key(&self.class_name, &self.method_name)
    }

    /// The overload-qualified key: `class.method(descriptor)`.
    #[must_use]
    pub fn qualified_key(&self) -> String {
        format!("{}{}", self.key(), self.descriptor)
    }
}

impl PartialEq for MethodNode {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.method_name == other.method_name
            && self.descriptor == other.descriptor
    }
}

impl Eq for MethodNode {}

impl std::hash::Hash for MethodNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.class_name.hash(state);
        self.method_name.hash(state);
        self.descriptor.hash(state);
    }
}

/// Builds the unqualified method key `class.method`.
#[must_use]
pub fn method_key(class_name: &str, method_name: &str) -> String {
    format!("{class_name}.{method_name}")
}

/// Strips an overload qualifier, turning `class.method(desc)` into
/// `class.method`. Both forms are accepted everywhere a method path is.
#[must_use]
pub fn simple_key(method_path: &str) -> &str {
    method_path
        .split_once('(')
        .map_or(method_path, |(head, _)| head)
}

/// A per-query call graph rooted at one method.
///
/// Edges are deduplicated; cycles are allowed and handled by traversal
/// visited sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    /// Key of the distinguished root node.
    pub root: String,
    /// Node attributes by method key.
    pub nodes: BTreeMap<String, MethodNode>,
    /// Forward edges: caller key → callee keys.
    pub edges: BTreeMap<String, BTreeSet<String>>,
    /// Set when traversal stopped at the depth or node cap.
    pub truncated: bool,
}

impl CallGraph {
    /// Creates an empty graph rooted at the given key.
    #[must_use]
    pub fn rooted(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Self::default()
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Adds a deduplicated edge.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// All edges as `(from, to)` pairs, deterministic order.
    #[must_use]
    pub fn edge_list(&self) -> Vec<(String, String)> {
        self.edges
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.clone(), to.clone())))
            .collect()
    }
}

/// An exception class with its superclass chain.
///
/// Cached process-wide by the analyzer, keyed by class name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionNode {
    /// Fully qualified exception class name.
    pub class_name: String,
    /// Superclass chain from the immediate parent up to the
    /// Throwable-family root.
    pub hierarchy: Vec<String>,
    /// `false` when `RuntimeException` or `Error` appears on the chain.
    pub checked: bool,
}

impl ExceptionNode {
    /// Whether the class descends from the Throwable root.
    #[must_use]
    pub fn is_throwable(&self) -> bool {
        self.class_name == "java.lang.Throwable"
            || self.hierarchy.iter().any(|c| c == "java.lang.Throwable")
    }
}

/// What a method does with an exception at one hop of a propagation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropagationAction {
    /// The method declares or raises the exception.
    Throws,
    /// The method has a matching catch handler.
    Catches,
    /// The method lets the exception pass through.
    Propagates,
}

/// One hop of a propagation chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationNode {
    /// Method key of the component.
    pub component: String,
    /// What the component does with the exception.
    pub action: PropagationAction,
    /// Source location, `file:line` when known.
    pub location: String,
    /// Free-form detail.
    pub details: String,
}

/// An ordered propagation record from a throw site toward its handler.
///
/// Always begins with a [`PropagationAction::Throws`] node; ends with a
/// [`PropagationAction::Catches`] node or at the configured depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationChain {
    /// Chain hops in order.
    pub nodes: Vec<PropagationNode>,
}

impl PropagationChain {
    /// Whether the chain reached a handler.
    #[must_use]
    pub fn handled(&self) -> bool {
        self.nodes
            .last()
            .is_some_and(|n| n.action == PropagationAction::Catches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(class: &str, method: &str, descriptor: &str) -> MethodNode {
        MethodNode {
            class_name: class.to_string(),
            method_name: method.to_string(),
            descriptor: descriptor.to_string(),
            is_interface: false,
            is_abstract: false,
            source_file: None,
            line_number: None,
        }
    }

    #[test]
    fn test_method_identity_is_triple() {
        let a = node("com.example.Foo", "run", "()V");
        let mut b = a.clone();
        b.is_abstract = true;
        b.line_number = Some(10);
        assert_eq!(a, b);

        let overload = node("com.example.Foo", "run", "(I)V");
        assert_ne!(a, overload);
    }

    #[test]
    fn test_method_keys() {
        let n = node("com.example.Foo", "run", "()V");
        assert_eq!(n.key(), "com.example.Foo.run");
        assert_eq!(n.qualified_key(), "com.example.Foo.run()V");
    }

    #[test]
    fn test_simple_key_strips_qualifier() {
        assert_eq!(simple_key("com.example.Foo.run(I)V"), "com.example.Foo.run");
        assert_eq!(simple_key("com.example.Foo.run"), "com.example.Foo.run");
    }

    #[test]
    fn test_call_graph_dedupes_edges() {
        let mut graph = CallGraph::rooted("a.A.m");
        graph.add_edge("a.A.m", "b.B.n");
        graph.add_edge("a.A.m", "b.B.n");
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_list(), vec![("a.A.m".to_string(), "b.B.n".to_string())]);
    }

    #[test]
    fn test_exception_node_checked() {
        let checked = ExceptionNode {
            class_name: "com.example.FooException".to_string(),
            hierarchy: vec![
                "java.lang.Exception".to_string(),
                "java.lang.Throwable".to_string(),
            ],
            checked: true,
        };
        assert!(checked.is_throwable());

        let unchecked = ExceptionNode {
            class_name: "com.example.BarException".to_string(),
            hierarchy: vec![
                "java.lang.RuntimeException".to_string(),
                "java.lang.Exception".to_string(),
                "java.lang.Throwable".to_string(),
            ],
            checked: false,
        };
        assert!(!unchecked.checked);
    }

    #[test]
    fn test_chain_handled() {
        let mut chain = PropagationChain::default();
        chain.nodes.push(PropagationNode {
            component: "svc.Foo.run".to_string(),
            action: PropagationAction::Throws,
            location: "Foo.java:10".to_string(),
            details: String::new(),
        });
        assert!(!chain.handled());
        chain.nodes.push(PropagationNode {
            component: "api.FooController.handle".to_string(),
            action: PropagationAction::Catches,
            location: "FooController.java:20".to_string(),
            details: String::new(),
        });
        assert!(chain.handled());
    }
}
