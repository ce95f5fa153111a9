//! Query category classification.
//!
//! A deterministic multi-label heuristic maps queries to the categories
//! that drive tool planning. The trait seam lets a model-based classifier
//! substitute without changing the plan schema.

use serde::{Deserialize, Serialize};

/// A tool-planning category. A query can carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryCategory {
    /// Locate code; answered by retrieval alone.
    CodeLocation,
    /// Understand what a method does; plans the call-path tool.
    MethodBehavior,
    /// Diagnose an error; plans the error-chain tool.
    ErrorDiagnosis,
    /// Assess a configuration change; plans the config-impact tool.
    ConfigImpact,
    /// Trace across repositories; plans the cross-repo tool.
    CrossComponent,
}

impl QueryCategory {
    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodeLocation => "code-location",
            Self::MethodBehavior => "method-behavior",
            Self::ErrorDiagnosis => "error-diagnosis",
            Self::ConfigImpact => "config-impact",
            Self::CrossComponent => "cross-component",
        }
    }
}

/// Trait for query classifiers.
pub trait QueryClassifier: Send + Sync {
    /// Labels a query with one or more categories, sorted and deduplicated.
    fn classify(&self, query: &str) -> Vec<QueryCategory>;
}

/// The deterministic substring heuristic.
#[derive(Debug, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Creates the classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

const METHOD_BEHAVIOR_TRIGGERS: &[&str] = &[
    "how does",
    "what does",
    "behavior",
    "behaviour",
    "call path",
    "calls",
    "invoke",
    "flow",
    "method",
];

const ERROR_DIAGNOSIS_TRIGGERS: &[&str] = &[
    "exception",
    "error",
    "fail",
    "crash",
    "throw",
    "stack trace",
    "diagnos",
];

const CONFIG_IMPACT_TRIGGERS: &[&str] = &[
    "config",
    "property",
    "properties",
    "setting",
    "feature flag",
    "what happens if i change",
];

const CROSS_COMPONENT_TRIGGERS: &[&str] = &[
    "across",
    "cross-repo",
    "cross repo",
    "repositories",
    "other repos",
    "downstream",
    "upstream",
    "between services",
];

const CODE_LOCATION_TRIGGERS: &[&str] =
    &["where is", "which file", "locate", "find the", "defined"];

impl QueryClassifier for HeuristicClassifier {
    fn classify(&self, query: &str) -> Vec<QueryCategory> {
        let normalized = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut categories = Vec::new();
        let mut push_if = |triggers: &[&str], category: QueryCategory| {
            if triggers.iter().any(|t| normalized.contains(t)) {
                categories.push(category);
            }
        };

        push_if(CODE_LOCATION_TRIGGERS, QueryCategory::CodeLocation);
        push_if(METHOD_BEHAVIOR_TRIGGERS, QueryCategory::MethodBehavior);
        push_if(ERROR_DIAGNOSIS_TRIGGERS, QueryCategory::ErrorDiagnosis);
        push_if(CONFIG_IMPACT_TRIGGERS, QueryCategory::ConfigImpact);
        push_if(CROSS_COMPONENT_TRIGGERS, QueryCategory::CrossComponent);

        if categories.is_empty() {
            categories.push(QueryCategory::CodeLocation);
        }
        categories.sort();
        categories.dedup();
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(query: &str) -> Vec<QueryCategory> {
        HeuristicClassifier::new().classify(query)
    }

    #[test]
    fn test_method_behavior() {
        let categories = classify("How does the CustomerService retrieve customer information?");
        assert!(categories.contains(&QueryCategory::MethodBehavior));
    }

    #[test]
    fn test_error_diagnosis() {
        let categories = classify("why does FooException get thrown during checkout");
        assert!(categories.contains(&QueryCategory::ErrorDiagnosis));
    }

    #[test]
    fn test_config_impact() {
        let categories = classify("what happens if I change the billing.retry config");
        assert!(categories.contains(&QueryCategory::ConfigImpact));
    }

    #[test]
    fn test_cross_component() {
        let categories = classify("trace the invoice flow across repositories");
        assert!(categories.contains(&QueryCategory::CrossComponent));
    }

    #[test]
    fn test_multi_label() {
        let categories = classify("how does the retry config change error behavior across repositories");
        assert!(categories.len() >= 3);
        assert!(categories.contains(&QueryCategory::MethodBehavior));
        assert!(categories.contains(&QueryCategory::ErrorDiagnosis));
        assert!(categories.contains(&QueryCategory::CrossComponent));
    }

    #[test]
    fn test_default_code_location() {
        let categories = classify("billing totals");
        assert_eq!(categories, vec![QueryCategory::CodeLocation]);
    }

    #[test]
    fn test_sorted_dedup() {
        let categories = classify("where is the method that calls the flow");
        let mut sorted = categories.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(categories, sorted);
    }
}
