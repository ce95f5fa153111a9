//! Method-level call graphs and exception hierarchies from compiled classes.
//!
//! The analyzer parses class files under the configured roots into a type
//! cache, builds forward and reverse call graphs, and answers call-path,
//! implementation-discovery, exception-hierarchy, and propagation queries.

mod analyzer;
mod classfile;
mod model;
mod propagation;
#[cfg(test)]
pub(crate) mod testkit;

pub use analyzer::{GraphAnalyzer, GraphCache, GraphStats};
pub use classfile::{CallSite, CatchSite, MethodInfo, TypeDescriptor, parse_class, parse_class_file};
pub use model::{
    CallGraph, ExceptionNode, MethodNode, PropagationAction, PropagationChain, PropagationNode,
    method_key, simple_key,
};
pub use propagation::analyze_exception_propagation;
