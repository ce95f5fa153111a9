//! Configuration with builder pattern and environment variable support.
//!
//! A single immutable [`Config`] value is built at startup and shared by
//! reference; later overrides (environment, CLI flags) rebuild a new value.
//! Resolution order: explicit values → environment variables → defaults.
//!
//! Every key can be overridden through a `REPOLENS_*` environment variable,
//! e.g. `chunking.max-chunk-size` → `REPOLENS_CHUNKING_MAX_CHUNK_SIZE`.
//! Validation happens once in [`ConfigBuilder::build`]; violations are fatal.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default maximum chunk size in characters.
const DEFAULT_MAX_CHUNK_SIZE: usize = 8000;
/// Default overlap between consecutive chunks in characters.
const DEFAULT_OVERLAP_SIZE: usize = 200;
/// Default minimum size for a trailing chunk before it is merged.
const DEFAULT_MIN_CHUNK_SIZE: usize = 500;
/// Default context overlap percentage for `context_before`/`context_after`.
const DEFAULT_CONTEXT_OVERLAP_PERCENTAGE: u8 = 10;
/// Default embedding dimensions.
const DEFAULT_DIMENSIONS: usize = 384;
/// Default embedding batch size.
const DEFAULT_BATCH_SIZE: usize = 32;
/// Default call-path traversal depth.
const DEFAULT_CALLPATH_MAX_DEPTH: usize = 5;
/// Default call-path node cap.
const DEFAULT_CALLPATH_MAX_NODES: usize = 500;
/// Default exception propagation depth.
const DEFAULT_MAX_PROPAGATION_DEPTH: usize = 10;
/// Default retry attempts for tools and embedding calls.
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for exponential backoff.
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
/// Default jitter fraction applied to backoff delays.
const DEFAULT_RETRY_JITTER: f64 = 0.25;
/// Default wall-time cap for a full query plan.
const DEFAULT_MAX_EXECUTION_TIME_SECS: u64 = 30;
/// Default per-tool timeout.
const DEFAULT_TOOL_TIMEOUT_MS: u64 = 10_000;
/// Default worker pool size (supports at least 50 concurrent executions).
const DEFAULT_WORKER_POOL_SIZE: usize = 64;
/// Default maximum queued submissions before backpressure.
const DEFAULT_MAX_QUEUE_DEPTH: usize = 256;
/// Default resident-memory soft cap in bytes before namespace eviction.
const DEFAULT_MEMORY_SOFT_CAP_BYTES: usize = 512 * 1024 * 1024;
/// Default persistence flush interval.
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;
/// Default embedding requests per second.
const DEFAULT_RATE_PER_SECOND: u32 = 10;
/// Default embedding requests per minute.
const DEFAULT_RATE_PER_MINUTE: u32 = 300;

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub max_chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub overlap_size: usize,
    /// Minimum size for the trailing chunk; smaller tails merge into the previous chunk.
    pub min_chunk_size: usize,
    /// Percentage of neighbour content copied into `context_before`/`context_after`.
    pub context_overlap_percentage: u8,
}

/// Vector store parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Embedding dimensions; vectors of any other dimension are rejected.
    pub dimensions: usize,
    /// Embedding batch size for ingestion.
    pub batch_size: usize,
    /// Index engine identifier (informational; `"hnsw"` is the in-process engine).
    pub engine: String,
    /// Resident-memory soft cap before least-recently-queried namespaces are evicted.
    pub memory_soft_cap_bytes: usize,
    /// Interval between persistence flushes.
    pub flush_interval: Duration,
}

/// Call-path analysis parameters.
#[derive(Debug, Clone)]
pub struct CallPathConfig {
    /// Maximum traversal depth for forward analysis.
    pub max_depth: usize,
    /// Hard cap on explored nodes per traversal.
    pub max_nodes: usize,
    /// Whether to traverse into classes outside the base package.
    pub include_libraries: bool,
    /// Base package prefix whose classes are indexed (e.g. `com.example`).
    pub base_package: String,
    /// Directories scanned for compiled classes.
    pub class_roots: Vec<PathBuf>,
}

/// Error-chain analysis parameters.
#[derive(Debug, Clone)]
pub struct ErrorChainConfig {
    /// Source roots scanned for throw/catch sites.
    pub scan_paths: Vec<PathBuf>,
    /// Whether analysis results are cached per exception class.
    pub cache_enabled: bool,
    /// Maximum reverse-graph depth for propagation chains.
    pub max_propagation_depth: usize,
}

/// Retry policy for tools and embedding calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum attempts per operation (first attempt included).
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Jitter fraction in `[0, 1)`: delay is scaled by `1 ± jitter`.
    pub jitter: f64,
}

impl RetryConfig {
    /// Computes the backoff delay for a zero-based attempt index,
    /// without jitter applied.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

/// Hybrid engine parameters.
#[derive(Debug, Clone, Copy)]
pub struct HybridConfig {
    /// Wall-time cap for the whole tool plan.
    pub max_execution_time: Duration,
    /// Per-tool attempt timeout.
    pub tool_timeout: Duration,
    /// Bounded worker pool size for tool execution.
    pub worker_pool_size: usize,
    /// Submissions beyond this queue depth are rejected with a retryable error.
    pub max_queue_depth: usize,
}

/// Confidence weights and rating thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceConfig {
    /// Weight of the vector-search component.
    pub vector_weight: f64,
    /// Weight of the tool-execution component.
    pub tool_weight: f64,
    /// Weight of the evidence component.
    pub evidence_weight: f64,
    /// Weight of the query-clarity component.
    pub query_weight: f64,
    /// Threshold for the Very High rating.
    pub very_high_threshold: f64,
    /// Threshold for the High rating.
    pub high_threshold: f64,
    /// Threshold for the Medium rating.
    pub medium_threshold: f64,
    /// Threshold for the Low rating.
    pub low_threshold: f64,
}

/// Embedding rate limits (token buckets).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests allowed per second.
    pub per_second: u32,
    /// Requests allowed per minute.
    pub per_minute: u32,
}

/// Immutable top-level configuration.
///
/// Built once at startup via [`Config::builder`]; shared by reference.
/// There is no runtime mutation: overrides rebuild a new value.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for persisted state (`vectors/`, `graph/`).
    pub data_root: PathBuf,
    /// Chunking parameters.
    pub chunking: ChunkingConfig,
    /// Vector store parameters.
    pub store: StoreConfig,
    /// Call-path analysis parameters.
    pub callpath: CallPathConfig,
    /// Error-chain analysis parameters.
    pub errorchain: ErrorChainConfig,
    /// Retry policy.
    pub retry: RetryConfig,
    /// Hybrid engine parameters.
    pub hybrid: HybridConfig,
    /// Confidence weights and thresholds.
    pub confidence: ConfidenceConfig,
    /// Embedding rate limits.
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Builds configuration from environment variables over defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any validated constraint is violated.
    pub fn from_env() -> Result<Self> {
        Self::builder().from_env().build()
    }
}

/// Reads and parses an environment variable, ignoring unset or unparsable values.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Reads a path-list environment variable (comma-separated).
fn env_paths(key: &str) -> Option<Vec<PathBuf>> {
    std::env::var(key).ok().map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    })
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    data_root: Option<PathBuf>,
    max_chunk_size: Option<usize>,
    overlap_size: Option<usize>,
    min_chunk_size: Option<usize>,
    context_overlap_percentage: Option<u8>,
    dimensions: Option<usize>,
    batch_size: Option<usize>,
    engine: Option<String>,
    memory_soft_cap_bytes: Option<usize>,
    flush_interval_secs: Option<u64>,
    callpath_max_depth: Option<usize>,
    callpath_max_nodes: Option<usize>,
    callpath_include_libraries: Option<bool>,
    callpath_base_package: Option<String>,
    callpath_class_roots: Option<Vec<PathBuf>>,
    errorchain_scan_paths: Option<Vec<PathBuf>>,
    errorchain_cache_enabled: Option<bool>,
    errorchain_max_propagation_depth: Option<usize>,
    retry_max_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_jitter: Option<f64>,
    max_execution_time_secs: Option<u64>,
    tool_timeout_ms: Option<u64>,
    worker_pool_size: Option<usize>,
    max_queue_depth: Option<usize>,
    vector_weight: Option<f64>,
    tool_weight: Option<f64>,
    evidence_weight: Option<f64>,
    query_weight: Option<f64>,
    very_high_threshold: Option<f64>,
    high_threshold: Option<f64>,
    medium_threshold: Option<f64>,
    low_threshold: Option<f64>,
    rate_per_second: Option<u32>,
    rate_per_minute: Option<u32>,
}

impl ConfigBuilder {
    /// Populates unset fields from `REPOLENS_*` environment variables.
    #[must_use]
    #[allow(clippy::cognitive_complexity)]
    pub fn from_env(mut self) -> Self {
        if self.data_root.is_none() {
            self.data_root = env_parse("REPOLENS_DATA_ROOT");
        }
        if self.max_chunk_size.is_none() {
            self.max_chunk_size = env_parse("REPOLENS_CHUNKING_MAX_CHUNK_SIZE");
        }
        if self.overlap_size.is_none() {
            self.overlap_size = env_parse("REPOLENS_CHUNKING_OVERLAP_SIZE");
        }
        if self.min_chunk_size.is_none() {
            self.min_chunk_size = env_parse("REPOLENS_CHUNKING_MIN_CHUNK_SIZE");
        }
        if self.context_overlap_percentage.is_none() {
            self.context_overlap_percentage =
                env_parse("REPOLENS_CHUNKING_CONTEXT_OVERLAP_PERCENTAGE");
        }
        if self.dimensions.is_none() {
            self.dimensions = env_parse("REPOLENS_VECTOR_STORE_DIMENSIONS");
        }
        if self.batch_size.is_none() {
            self.batch_size = env_parse("REPOLENS_VECTOR_STORE_BATCH_SIZE");
        }
        if self.engine.is_none() {
            self.engine = std::env::var("REPOLENS_VECTOR_STORE_ENGINE").ok();
        }
        if self.memory_soft_cap_bytes.is_none() {
            self.memory_soft_cap_bytes = env_parse("REPOLENS_VECTOR_STORE_MEMORY_SOFT_CAP_BYTES");
        }
        if self.flush_interval_secs.is_none() {
            self.flush_interval_secs = env_parse("REPOLENS_VECTOR_STORE_FLUSH_INTERVAL_SECS");
        }
        if self.callpath_max_depth.is_none() {
            self.callpath_max_depth = env_parse("REPOLENS_CALLPATH_MAX_DEPTH");
        }
        if self.callpath_max_nodes.is_none() {
            self.callpath_max_nodes = env_parse("REPOLENS_CALLPATH_MAX_NODES");
        }
        if self.callpath_include_libraries.is_none() {
            self.callpath_include_libraries = env_parse("REPOLENS_CALLPATH_INCLUDE_LIBRARIES");
        }
        if self.callpath_base_package.is_none() {
            self.callpath_base_package = std::env::var("REPOLENS_CALLPATH_BASE_PACKAGE").ok();
        }
        if self.callpath_class_roots.is_none() {
            self.callpath_class_roots = env_paths("REPOLENS_CALLPATH_CLASS_ROOTS");
        }
        if self.errorchain_scan_paths.is_none() {
            self.errorchain_scan_paths = env_paths("REPOLENS_ERRORCHAIN_SCAN_PATHS");
        }
        if self.errorchain_cache_enabled.is_none() {
            self.errorchain_cache_enabled = env_parse("REPOLENS_ERRORCHAIN_CACHE_ENABLED");
        }
        if self.errorchain_max_propagation_depth.is_none() {
            self.errorchain_max_propagation_depth =
                env_parse("REPOLENS_ERRORCHAIN_MAX_PROPAGATION_DEPTH");
        }
        if self.retry_max_attempts.is_none() {
            self.retry_max_attempts = env_parse("REPOLENS_MCP_RETRY_MAX_ATTEMPTS");
        }
        if self.retry_base_delay_ms.is_none() {
            self.retry_base_delay_ms = env_parse("REPOLENS_MCP_RETRY_BASE_DELAY_MS");
        }
        if self.retry_jitter.is_none() {
            self.retry_jitter = env_parse("REPOLENS_MCP_RETRY_JITTER");
        }
        if self.max_execution_time_secs.is_none() {
            self.max_execution_time_secs = env_parse("REPOLENS_HYBRID_MAX_EXECUTION_TIME_SECONDS");
        }
        if self.tool_timeout_ms.is_none() {
            self.tool_timeout_ms = env_parse("REPOLENS_MCP_TOOL_TIMEOUT_MS");
        }
        if self.worker_pool_size.is_none() {
            self.worker_pool_size = env_parse("REPOLENS_MCP_WORKER_POOL_SIZE");
        }
        if self.max_queue_depth.is_none() {
            self.max_queue_depth = env_parse("REPOLENS_MCP_MAX_QUEUE_DEPTH");
        }
        if self.vector_weight.is_none() {
            self.vector_weight = env_parse("REPOLENS_CONFIDENCE_VECTOR_WEIGHT");
        }
        if self.tool_weight.is_none() {
            self.tool_weight = env_parse("REPOLENS_CONFIDENCE_TOOL_WEIGHT");
        }
        if self.evidence_weight.is_none() {
            self.evidence_weight = env_parse("REPOLENS_CONFIDENCE_EVIDENCE_WEIGHT");
        }
        if self.query_weight.is_none() {
            self.query_weight = env_parse("REPOLENS_CONFIDENCE_QUERY_WEIGHT");
        }
        if self.very_high_threshold.is_none() {
            self.very_high_threshold = env_parse("REPOLENS_CONFIDENCE_VERY_HIGH_THRESHOLD");
        }
        if self.high_threshold.is_none() {
            self.high_threshold = env_parse("REPOLENS_CONFIDENCE_HIGH_THRESHOLD");
        }
        if self.medium_threshold.is_none() {
            self.medium_threshold = env_parse("REPOLENS_CONFIDENCE_MEDIUM_THRESHOLD");
        }
        if self.low_threshold.is_none() {
            self.low_threshold = env_parse("REPOLENS_CONFIDENCE_LOW_THRESHOLD");
        }
        if self.rate_per_second.is_none() {
            self.rate_per_second = env_parse("REPOLENS_EMBEDDING_RATE_PER_SECOND");
        }
        if self.rate_per_minute.is_none() {
            self.rate_per_minute = env_parse("REPOLENS_EMBEDDING_RATE_PER_MINUTE");
        }
        self
    }

    /// Sets the data root.
    #[must_use]
    pub fn data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_root = Some(path.into());
        self
    }

    /// Sets the maximum chunk size.
    #[must_use]
    pub const fn max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = Some(size);
        self
    }

    /// Sets the chunk overlap size.
    #[must_use]
    pub const fn overlap_size(mut self, size: usize) -> Self {
        self.overlap_size = Some(size);
        self
    }

    /// Sets the minimum trailing chunk size.
    #[must_use]
    pub const fn min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = Some(size);
        self
    }

    /// Sets the embedding dimensions.
    #[must_use]
    pub const fn dimensions(mut self, dims: usize) -> Self {
        self.dimensions = Some(dims);
        self
    }

    /// Sets the embedding batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the call-path base package.
    #[must_use]
    pub fn base_package(mut self, package: impl Into<String>) -> Self {
        self.callpath_base_package = Some(package.into());
        self
    }

    /// Sets the compiled-class scan roots.
    #[must_use]
    pub fn class_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.callpath_class_roots = Some(roots);
        self
    }

    /// Sets the error-chain scan roots.
    #[must_use]
    pub fn scan_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.errorchain_scan_paths = Some(paths);
        self
    }

    /// Sets the retry attempt cap.
    #[must_use]
    pub const fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = Some(attempts);
        self
    }

    /// Sets the retry base delay in milliseconds.
    #[must_use]
    pub const fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.retry_base_delay_ms = Some(ms);
        self
    }

    /// Sets the confidence weights.
    #[must_use]
    pub const fn confidence_weights(
        mut self,
        vector: f64,
        tool: f64,
        evidence: f64,
        query: f64,
    ) -> Self {
        self.vector_weight = Some(vector);
        self.tool_weight = Some(tool);
        self.evidence_weight = Some(evidence);
        self.query_weight = Some(query);
        self
    }

    /// Sets the plan wall-time cap in seconds.
    #[must_use]
    pub const fn max_execution_time_secs(mut self, secs: u64) -> Self {
        self.max_execution_time_secs = Some(secs);
        self
    }

    /// Sets the per-tool timeout in milliseconds.
    #[must_use]
    pub const fn tool_timeout_ms(mut self, ms: u64) -> Self {
        self.tool_timeout_ms = Some(ms);
        self
    }

    /// Builds the configuration, validating all constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when chunk sizes are zero, overlap is not
    /// smaller than the chunk size, dimensions are zero, confidence weights
    /// do not sum to 1.0, or rating thresholds are not strictly descending.
    pub fn build(self) -> Result<Config> {
        let chunking = ChunkingConfig {
            max_chunk_size: self.max_chunk_size.unwrap_or(DEFAULT_MAX_CHUNK_SIZE),
            overlap_size: self.overlap_size.unwrap_or(DEFAULT_OVERLAP_SIZE),
            min_chunk_size: self.min_chunk_size.unwrap_or(DEFAULT_MIN_CHUNK_SIZE),
            context_overlap_percentage: self
                .context_overlap_percentage
                .unwrap_or(DEFAULT_CONTEXT_OVERLAP_PERCENTAGE),
        };

        if chunking.max_chunk_size == 0 {
            return Err(Error::config("chunking.max-chunk-size must be > 0"));
        }
        if chunking.overlap_size >= chunking.max_chunk_size {
            return Err(Error::config(format!(
                "chunking.overlap-size {} must be less than chunking.max-chunk-size {}",
                chunking.overlap_size, chunking.max_chunk_size
            )));
        }
        if chunking.context_overlap_percentage > 50 {
            return Err(Error::config(
                "chunking.context-overlap-percentage must be <= 50",
            ));
        }

        let store = StoreConfig {
            dimensions: self.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            engine: self.engine.unwrap_or_else(|| "hnsw".to_string()),
            memory_soft_cap_bytes: self
                .memory_soft_cap_bytes
                .unwrap_or(DEFAULT_MEMORY_SOFT_CAP_BYTES),
            flush_interval: Duration::from_secs(
                self.flush_interval_secs
                    .unwrap_or(DEFAULT_FLUSH_INTERVAL_SECS),
            ),
        };

        if store.dimensions == 0 {
            return Err(Error::config("vector-store.dimensions must be > 0"));
        }

        let retry = RetryConfig {
            max_attempts: self
                .retry_max_attempts
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
                .max(1),
            base_delay: Duration::from_millis(
                self.retry_base_delay_ms
                    .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            ),
            jitter: self.retry_jitter.unwrap_or(DEFAULT_RETRY_JITTER),
        };

        if !(0.0..1.0).contains(&retry.jitter) {
            return Err(Error::config("mcp.retry.jitter must be in [0, 1)"));
        }

        let confidence = ConfidenceConfig {
            vector_weight: self.vector_weight.unwrap_or(0.40),
            tool_weight: self.tool_weight.unwrap_or(0.30),
            evidence_weight: self.evidence_weight.unwrap_or(0.20),
            query_weight: self.query_weight.unwrap_or(0.10),
            very_high_threshold: self.very_high_threshold.unwrap_or(0.90),
            high_threshold: self.high_threshold.unwrap_or(0.75),
            medium_threshold: self.medium_threshold.unwrap_or(0.50),
            low_threshold: self.low_threshold.unwrap_or(0.25),
        };

        let weight_sum = confidence.vector_weight
            + confidence.tool_weight
            + confidence.evidence_weight
            + confidence.query_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(Error::config(format!(
                "confidence weights must sum to 1.0, got {weight_sum}"
            )));
        }
        if !(confidence.very_high_threshold > confidence.high_threshold
            && confidence.high_threshold > confidence.medium_threshold
            && confidence.medium_threshold > confidence.low_threshold
            && confidence.low_threshold > 0.0)
        {
            return Err(Error::config(
                "confidence thresholds must be strictly descending and positive",
            ));
        }

        let hybrid = HybridConfig {
            max_execution_time: Duration::from_secs(
                self.max_execution_time_secs
                    .unwrap_or(DEFAULT_MAX_EXECUTION_TIME_SECS)
                    .max(1),
            ),
            tool_timeout: Duration::from_millis(
                self.tool_timeout_ms.unwrap_or(DEFAULT_TOOL_TIMEOUT_MS).max(1),
            ),
            worker_pool_size: self
                .worker_pool_size
                .unwrap_or(DEFAULT_WORKER_POOL_SIZE)
                .max(1),
            max_queue_depth: self.max_queue_depth.unwrap_or(DEFAULT_MAX_QUEUE_DEPTH),
        };

        let callpath = CallPathConfig {
            max_depth: self.callpath_max_depth.unwrap_or(DEFAULT_CALLPATH_MAX_DEPTH),
            max_nodes: self.callpath_max_nodes.unwrap_or(DEFAULT_CALLPATH_MAX_NODES),
            include_libraries: self.callpath_include_libraries.unwrap_or(false),
            base_package: self.callpath_base_package.unwrap_or_default(),
            class_roots: self
                .callpath_class_roots
                .unwrap_or_else(|| vec![PathBuf::from("target/classes")]),
        };

        let errorchain = ErrorChainConfig {
            scan_paths: self
                .errorchain_scan_paths
                .unwrap_or_else(|| vec![PathBuf::from("src")]),
            cache_enabled: self.errorchain_cache_enabled.unwrap_or(true),
            max_propagation_depth: self
                .errorchain_max_propagation_depth
                .unwrap_or(DEFAULT_MAX_PROPAGATION_DEPTH),
        };

        let rate_limit = RateLimitConfig {
            per_second: self.rate_per_second.unwrap_or(DEFAULT_RATE_PER_SECOND).max(1),
            per_minute: self.rate_per_minute.unwrap_or(DEFAULT_RATE_PER_MINUTE).max(1),
        };

        Ok(Config {
            data_root: self
                .data_root
                .unwrap_or_else(|| PathBuf::from(".repolens")),
            chunking,
            store,
            callpath,
            errorchain,
            retry,
            hybrid,
            confidence,
            rate_limit,
        })
    }
}
