//! Exception propagation analysis.
//!
//! For every method declaring a given exception, walks the reverse call
//! graph from the throw site upward, recording at each hop whether the
//! caller catches the exception or lets it propagate. A branch stops at its
//! first handler or at the depth bound; the total number of chains is
//! capped to bound cost.

use std::collections::BTreeSet;

use crate::graph::analyzer::GraphAnalyzer;
use crate::graph::model::{
    MethodNode, PropagationAction, PropagationChain, PropagationNode, simple_key,
};

/// Maximum number of chains returned per analysis.
const MAX_CHAINS: usize = 10;

/// Builds propagation chains for an exception class.
///
/// Every chain begins with a `THROWS` node at a declaring method, followed
/// by a `PROPAGATES` node for the same method, then one node per caller hop
/// ending with a `CATCHES` node or at `max_depth`.
#[must_use]
pub fn analyze_exception_propagation(
    analyzer: &GraphAnalyzer,
    exception_class: &str,
    max_depth: usize,
) -> Vec<PropagationChain> {
    let simple_name = simple_name_of(exception_class);

    let mut throwers: Vec<(String, String)> = Vec::new();
    for descriptor in analyzer.types() {
        for method in &descriptor.methods {
            let declares = method.declared_throws.iter().any(|declared| {
                declared == exception_class || simple_name_of(declared) == simple_name
            });
            if declares {
                let key = crate::graph::model::method_key(&descriptor.class_name, &method.name);
                let location = location_of(analyzer.resolve(&key).as_ref(), &key);
                throwers.push((key, location));
            }
        }
    }
    throwers.sort();
    throwers.dedup();

    let mut chains: Vec<PropagationChain> = Vec::new();
    for (key, location) in throwers {
        if chains.len() >= MAX_CHAINS {
            break;
        }
        let mut prefix = PropagationChain::default();
        prefix.nodes.push(PropagationNode {
            component: key.clone(),
            action: PropagationAction::Throws,
            location: location.clone(),
            details: format!("declares throws {exception_class}"),
        });
        prefix.nodes.push(PropagationNode {
            component: key.clone(),
            action: PropagationAction::Propagates,
            location,
            details: "no handler in throwing method".to_string(),
        });
        walk_callers(
            analyzer,
            exception_class,
            &key,
            prefix,
            max_depth,
            &mut chains,
        );
    }

    chains.truncate(MAX_CHAINS);
    chains
}

/// Depth-first walk over the reverse graph, emitting one chain per branch.
fn walk_callers(
    analyzer: &GraphAnalyzer,
    exception_class: &str,
    current: &str,
    chain: PropagationChain,
    remaining_depth: usize,
    chains: &mut Vec<PropagationChain>,
) {
    if chains.len() >= MAX_CHAINS {
        return;
    }

    let callers: BTreeSet<String> = analyzer
        .callers_of(current)
        .into_iter()
        .filter(|caller| chain.nodes.iter().all(|n| n.component != *caller))
        .collect();

    if callers.is_empty() || remaining_depth == 0 {
        chains.push(chain);
        return;
    }

    for caller in callers {
        if chains.len() >= MAX_CHAINS {
            return;
        }
        let location = location_of(analyzer.resolve(&caller).as_ref(), &caller);
        let mut branch = chain.clone();
        if catches(analyzer, &caller, exception_class) {
            branch.nodes.push(PropagationNode {
                component: caller.clone(),
                action: PropagationAction::Catches,
                location,
                details: format!("handles {exception_class}"),
            });
            chains.push(branch);
        } else {
            branch.nodes.push(PropagationNode {
                component: caller.clone(),
                action: PropagationAction::Propagates,
                location,
                details: "no matching handler".to_string(),
            });
            walk_callers(
                analyzer,
                exception_class,
                &caller,
                branch,
                remaining_depth - 1,
                chains,
            );
        }
    }
}

/// Whether the method's exception table names the class, by exact or
/// simple-name suffix match. Catch-all entries (finally blocks) never match.
fn catches(analyzer: &GraphAnalyzer, method_key: &str, exception_class: &str) -> bool {
    let key = simple_key(method_key);
    let Some((class_name, method_name)) = key.rsplit_once('.') else {
        return false;
    };
    let Some(descriptor) = analyzer.type_of(class_name) else {
        return false;
    };
    let simple_name = simple_name_of(exception_class);

    descriptor
        .methods
        .iter()
        .filter(|m| m.name == method_name)
        .flat_map(|m| &m.catch_sites)
        .filter_map(|site| site.exception.as_deref())
        .any(|caught| {
            caught == exception_class
                || simple_name_of(caught) == simple_name
                || caught.ends_with(&format!(".{simple_name}"))
        })
}

fn simple_name_of(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

fn location_of(node: Option<&MethodNode>, key: &str) -> String {
    match node {
        Some(n) => {
            let file = n.source_file.clone().unwrap_or_else(|| n.class_name.clone());
            match n.line_number {
                Some(line) => format!("{file}:{line}"),
                None => file,
            }
        }
        None => key.to_string(),
    }
}
