//! Calibrated confidence scoring.
//!
//! Confidence is a weighted sum of four normalized components: vector
//! search quality, tool success rate, evidence quality, and query clarity.
//! The weights come from configuration and must sum to 1.0 (enforced at
//! load). The score buckets into a rating, and the explanation surfaces
//! each component's raw score, weighted contribution, and share of the
//! total.

use serde::Serialize;

use crate::config::ConfidenceConfig;

/// Inputs to the confidence calculation.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceMetrics {
    /// Mean relevance of the top retrieved snippets, in `[0, 1]`.
    pub vector_search_score: f64,
    /// Tools executed for the answer.
    pub tool_execution_count: usize,
    /// Tools that succeeded.
    pub successful_tool_executions: usize,
    /// Evidence items gathered.
    pub evidence_count: usize,
    /// Evidence items deemed relevant.
    pub relevant_evidence_count: usize,
    /// Mean evidence quality, in `[0, 1]`.
    pub average_evidence_quality: f64,
    /// Query clarity heuristic, in `[0.1, 1.0]`.
    pub query_clarity: f64,
}

impl ConfidenceMetrics {
    /// Fraction of executed tools that succeeded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tool_success_rate(&self) -> f64 {
        if self.tool_execution_count == 0 {
            0.0
        } else {
            self.successful_tool_executions as f64 / self.tool_execution_count as f64
        }
    }

    /// Fraction of evidence deemed relevant.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn evidence_relevance_rate(&self) -> f64 {
        if self.evidence_count == 0 {
            0.0
        } else {
            self.relevant_evidence_count as f64 / self.evidence_count as f64
        }
    }
}

/// A rating bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceRating {
    /// `score ≥ very_high_threshold`
    VeryHigh,
    /// `score ≥ high_threshold`
    High,
    /// `score ≥ medium_threshold`
    Medium,
    /// `score ≥ low_threshold`
    Low,
    /// everything below
    VeryLow,
}

impl ConfidenceRating {
    /// Display form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::VeryLow => "Very Low",
        }
    }
}

/// One component's contribution in the explanation.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentScore {
    /// Component name.
    pub name: &'static str,
    /// Raw component score before weighting.
    pub raw: f64,
    /// Configured weight.
    pub weight: f64,
    /// `raw × weight`.
    pub weighted: f64,
    /// Percentage of the total score.
    pub percent_of_total: f64,
}

/// The full explanation payload.
#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceExplanation {
    /// Per-component breakdown.
    pub components: Vec<ComponentScore>,
    /// Final score.
    pub score: f64,
    /// Final rating.
    pub rating: &'static str,
}

/// The confidence calculator.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceCalculator {
    config: ConfidenceConfig,
}

impl ConfidenceCalculator {
    /// Creates a calculator from validated configuration.
    #[must_use]
    pub const fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    /// Vector component: mean relevance of top snippets, 0 when none.
    fn vector_component(metrics: &ConfidenceMetrics) -> f64 {
        metrics.vector_search_score.clamp(0.0, 1.0)
    }

    /// Tool component: success rate, neutral 0.5 when no tools ran.
    fn tool_component(metrics: &ConfidenceMetrics) -> f64 {
        if metrics.tool_execution_count == 0 {
            0.5
        } else {
            metrics.tool_success_rate()
        }
    }

    /// Evidence component: `0.6 × relevance + 0.4 × quality`, 0.3 with no
    /// evidence.
    fn evidence_component(metrics: &ConfidenceMetrics) -> f64 {
        if metrics.evidence_count == 0 {
            0.3
        } else {
            0.6 * metrics.evidence_relevance_rate()
                + 0.4 * metrics.average_evidence_quality.clamp(0.0, 1.0)
        }
    }

    /// Query component: the clarity heuristic clamped to `[0.1, 1.0]`.
    fn query_component(metrics: &ConfidenceMetrics) -> f64 {
        metrics.query_clarity.clamp(0.1, 1.0)
    }

    /// The weighted confidence score in `[0, 1]`.
    #[must_use]
    pub fn score(&self, metrics: &ConfidenceMetrics) -> f64 {
        let score = self.config.vector_weight * Self::vector_component(metrics)
            + self.config.tool_weight * Self::tool_component(metrics)
            + self.config.evidence_weight * Self::evidence_component(metrics)
            + self.config.query_weight * Self::query_component(metrics);
        score.clamp(0.0, 1.0)
    }

    /// Buckets a score into a rating.
    #[must_use]
    pub fn rating(&self, score: f64) -> ConfidenceRating {
        if score >= self.config.very_high_threshold {
            ConfidenceRating::VeryHigh
        } else if score >= self.config.high_threshold {
            ConfidenceRating::High
        } else if score >= self.config.medium_threshold {
            ConfidenceRating::Medium
        } else if score >= self.config.low_threshold {
            ConfidenceRating::Low
        } else {
            ConfidenceRating::VeryLow
        }
    }

    /// Builds the per-component explanation.
    #[must_use]
    pub fn explanation(&self, metrics: &ConfidenceMetrics) -> ConfidenceExplanation {
        let total = self.score(metrics);
        let parts = [
            ("vector", Self::vector_component(metrics), self.config.vector_weight),
            ("tool", Self::tool_component(metrics), self.config.tool_weight),
            (
                "evidence",
                Self::evidence_component(metrics),
                self.config.evidence_weight,
            ),
            ("query", Self::query_component(metrics), self.config.query_weight),
        ];

        let components = parts
            .into_iter()
            .map(|(name, raw, weight)| {
                let weighted = raw * weight;
                ComponentScore {
                    name,
                    raw,
                    weight,
                    weighted,
                    percent_of_total: if total > 0.0 {
                        100.0 * weighted / total
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        ConfidenceExplanation {
            components,
            score: total,
            rating: self.rating(total).as_str(),
        }
    }
}

/// Query clarity heuristic in `[0.1, 1.0]`.
///
/// Longer, identifier-bearing queries score higher: a vague "hello" sits
/// near the floor, a question naming a class and method near the top.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn query_clarity(query: &str) -> f64 {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return 0.1;
    }

    let words = trimmed.split_whitespace().count();
    let length_score = ((words.saturating_sub(2)) as f64 * 0.1).min(0.4);

    let has_identifier = trimmed.split_whitespace().any(|word| {
        let alnum: Vec<char> = word.chars().filter(|c| c.is_alphanumeric()).collect();
        alnum.len() > 2
            && alnum[0].is_uppercase()
            && alnum.iter().skip(1).any(|c| c.is_lowercase())
            && (alnum.iter().skip(1).any(char::is_ascii_uppercase) || word.contains('.'))
    });
    let identifier_score = if has_identifier { 0.25 } else { 0.0 };

    let question_score = if trimmed.ends_with('?') { 0.05 } else { 0.0 };

    (0.3 + length_score + identifier_score + question_score).clamp(0.1, 1.0)
}
