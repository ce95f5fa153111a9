//! Batched embedding client with retry, failure recording, and rate limiting.
//!
//! Wraps any [`Embedder`] with the standard retry discipline: transient
//! failures back off exponentially with jitter up to the configured attempt
//! cap; permanent failures are recorded in the [`FailureLog`] keyed by
//! content hash. Within a batch every slot fails independently and output
//! order equals input order. Provider-side rate limiting uses per-second and
//! per-minute token buckets.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::config::{RateLimitConfig, RetryConfig};
use crate::core::{EmbeddingFailure, content_hash};
use crate::embedding::Embedder;
use crate::error::{EmbeddingError, Error, Result};

/// Thread-safe log of embedding failures, keyed by content hash.
///
/// Entries persist until cleared or a later embedding of the same text
/// succeeds.
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: Mutex<HashMap<String, EmbeddingFailure>>,
}

impl FailureLog {
    /// Creates an empty failure log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed attempt for the given text.
    pub fn record(&self, text: &str, cause: &str) {
        let hash = content_hash(text);
        if let Ok(mut entries) = self.entries.lock() {
            entries
                .entry(hash)
                .and_modify(|f| f.record_attempt(cause))
                .or_insert_with(|| EmbeddingFailure::new(text, cause));
        }
    }

    /// Removes the failure entry for a text that has since embedded
    /// successfully.
    pub fn clear_success(&self, text: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&content_hash(text));
        }
    }

    /// Removes all entries.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` when no failures are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, for persistence and the metrics endpoint.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EmbeddingFailure> {
        self.entries
            .lock()
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Restores entries from persisted state.
    pub fn restore(&self, failures: Vec<EmbeddingFailure>) {
        if let Ok(mut entries) = self.entries.lock() {
            for failure in failures {
                entries.insert(failure.text_hash.clone(), failure);
            }
        }
    }
}

/// A single token bucket.
#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: u32, window_secs: f64) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / window_secs,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = Instant::now();
    }

    /// Takes one token, or returns how long until one becomes available.
    fn take(&mut self) -> Option<Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }
}

/// Per-second and per-minute token-bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    second: Mutex<Bucket>,
    minute: Mutex<Bucket>,
}

impl RateLimiter {
    /// Creates a limiter from rate-limit configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            second: Mutex::new(Bucket::new(config.per_second, 1.0)),
            minute: Mutex::new(Bucket::new(config.per_minute, 60.0)),
        }
    }

    /// Blocks until both buckets grant a token.
    pub fn acquire(&self) {
        loop {
            let wait = self.try_acquire();
            match wait {
                None => return,
                Some(delay) => std::thread::sleep(delay),
            }
        }
    }

    /// Attempts to take one token from each bucket; returns the wait time
    /// until the next token when either bucket is empty.
    fn try_acquire(&self) -> Option<Duration> {
        let (Ok(mut second), Ok(mut minute)) = (self.second.lock(), self.minute.lock()) else {
            return None;
        };
        match second.take() {
            Some(wait) => Some(wait),
            None => match minute.take() {
                None => None,
                Some(wait) => {
                    // Return the per-second token; only the minute bucket ran dry.
                    second.tokens = (second.tokens + 1.0).min(second.capacity);
                    Some(wait)
                }
            },
        }
    }
}

/// Embedding client enforcing the retry and rate-limit discipline.
///
/// The result of a batch call has the same length and order as its input;
/// failed slots are `None` with a recorded [`EmbeddingFailure`].
pub struct EmbeddingClient {
    embedder: Box<dyn Embedder>,
    dimensions: usize,
    retry: RetryConfig,
    limiter: RateLimiter,
    failures: std::sync::Arc<FailureLog>,
}

impl EmbeddingClient {
    /// Creates a client around the given embedder.
    #[must_use]
    pub fn new(
        embedder: Box<dyn Embedder>,
        retry: RetryConfig,
        rate_limit: RateLimitConfig,
        failures: std::sync::Arc<FailureLog>,
    ) -> Self {
        let dimensions = embedder.dimensions();
        Self {
            embedder,
            dimensions,
            retry,
            limiter: RateLimiter::new(rate_limit),
            failures,
        }
    }

    /// Returns the embedding dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns the shared failure log.
    #[must_use]
    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Embeds a single text under the retry policy.
    ///
    /// A success clears any prior failure record for the same content; a
    /// final failure records one.
    ///
    /// # Errors
    ///
    /// Returns the final classification error after retries are exhausted.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.embed_with_retry(text) {
            Ok(vector) => {
                self.failures.clear_success(text);
                Ok(vector)
            }
            Err(err) => {
                self.failures.record(text, &err.to_string());
                Err(err)
            }
        }
    }

    /// Embeds a batch; output index `i` corresponds to input index `i`.
    ///
    /// Slot failures are independent: one failed text never aborts its
    /// siblings. Failed slots are `None` with a recorded failure.
    #[must_use]
    pub fn embed_batch(&self, texts: &[&str]) -> Vec<Option<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text).ok()).collect()
    }

    fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire();
            let result = self
                .embedder
                .embed(text)
                .and_then(|v| self.validate(v));

            match result {
                Ok(vector) => return Ok(vector),
                Err(err) if err.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.jittered_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "embedding retry");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempts = attempt + 1, error = %err, "embedding failed");
                    return Err(err);
                }
            }
        }
    }

    /// Rejects empty, NaN, or wrong-dimension vectors as permanent failures.
    fn validate(&self, vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.is_empty() {
            return Err(EmbeddingError::Permanent {
                reason: "provider returned empty result".to_string(),
            }
            .into());
        }
        if vector.len() != self.dimensions {
            return Err(EmbeddingError::BadDimensions {
                expected: self.dimensions,
                got: vector.len(),
            }
            .into());
        }
        if vector.iter().any(|v| v.is_nan()) {
            return Err(EmbeddingError::Permanent {
                reason: "provider returned NaN component".to_string(),
            }
            .into());
        }
        Ok(vector)
    }

    /// Backoff delay `base × 2^attempt × (1 ± jitter)`.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.delay_for_attempt(attempt).as_secs_f64();
        let jitter = self.retry.jitter;
        let factor = if jitter > 0.0 {
            1.0 + rand::rng().random_range(-jitter..=jitter)
        } else {
            1.0
        };
        Duration::from_secs_f64((base * factor).max(0.0))
    }
}
