//! Query-type classification.
//!
//! A lightweight substring heuristic labels queries as conceptual ("how
//! does X work"), implementation ("where is the method"), or mixed. The
//! label drives semantic thresholds, keyword boosts, and hybrid fusion
//! weights. Whitespace changes never change the label.

use serde::{Deserialize, Serialize};

/// Substrings indicating a conceptual question.
const CONCEPTUAL_TRIGGERS: &[&str] = &[
    "how to",
    "how does",
    "what is",
    "explain",
    "purpose",
    "architecture",
    "capability",
];

/// Substrings indicating an implementation lookup.
const IMPLEMENTATION_TRIGGERS: &[&str] = &[
    "implementation",
    "code for",
    "where is",
    "method",
    "class",
    "interface",
];

/// The query-type label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    /// Conceptual question (architecture, purpose, behaviour).
    Conceptual,
    /// Implementation lookup (specific code artifacts).
    Implementation,
    /// Both or neither trigger set matched.
    Mixed,
}

impl QueryType {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conceptual => "CONCEPTUAL",
            Self::Implementation => "IMPLEMENTATION",
            Self::Mixed => "MIXED",
        }
    }
}

/// Classifies a query by trigger-substring matches.
///
/// If both trigger sets hit, or neither does, the label is [`QueryType::Mixed`].
///
/// # Examples
///
/// ```
/// use repolens::retrieval::{QueryType, classify_query};
///
/// assert_eq!(
///     classify_query("How does the CustomerService retrieve customer information?"),
///     QueryType::Conceptual
/// );
/// assert_eq!(classify_query("where is the retry method"), QueryType::Implementation);
/// ```
#[must_use]
pub fn classify_query(text: &str) -> QueryType {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    let conceptual = CONCEPTUAL_TRIGGERS.iter().any(|t| normalized.contains(t));
    let implementation = IMPLEMENTATION_TRIGGERS.iter().any(|t| normalized.contains(t));

    match (conceptual, implementation) {
        (true, false) => QueryType::Conceptual,
        (false, true) => QueryType::Implementation,
        _ => QueryType::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("How does the CustomerService retrieve customer information?", QueryType::Conceptual)]
    #[test_case("explain the billing architecture", QueryType::Conceptual)]
    #[test_case("what is the purpose of the cache", QueryType::Conceptual)]
    #[test_case("where is the retry method", QueryType::Implementation)]
    #[test_case("code for the parser", QueryType::Implementation)]
    #[test_case("show me the BillingService class", QueryType::Implementation)]
    #[test_case("billing totals", QueryType::Mixed)]
    #[test_case("explain the implementation of retries", QueryType::Mixed; "both sets hit")]
    #[test_case("", QueryType::Mixed)]
    fn test_classification(query: &str, expected: QueryType) {
        assert_eq!(classify_query(query), expected);
    }

    #[test]
    fn test_stable_under_whitespace() {
        let a = classify_query("how   does\tthe cache work");
        let b = classify_query("how does the cache work");
        assert_eq!(a, b);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify_query("EXPLAIN THE CACHE"), QueryType::Conceptual);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(QueryType::Conceptual.as_str(), "CONCEPTUAL");
        assert_eq!(QueryType::Implementation.as_str(), "IMPLEMENTATION");
        assert_eq!(QueryType::Mixed.as_str(), "MIXED");
    }
}
