//! Cache-bust probe.
//!
//! Before each timed trial the harness fetches a large slice of an unrelated
//! dataset as a literal and throws it away. That evicts warm entries from any
//! response cache between the two variants so neither benefits from the
//! other's work.
//!
//! The probe's own request must not be cacheable either, otherwise the
//! second invocation would come back instantly and evict nothing. Each
//! invocation therefore asks for a slightly different number of elements,
//! always at or below the provider cap.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::client::{ClientError, ComputeClient, MAX_LITERAL_ELEMENTS};
use crate::expr::Expr;

/// Dataset fetched by the default probe.
pub const DEFAULT_PROBE_DATASET: &str = "NASA/ORNL/DAYMET";

/// Number of distinct request sizes the probe cycles through.
const JITTER: u64 = 97;

/// Issues a large, never-repeating literal fetch and discards the result.
#[derive(Debug)]
pub struct CacheBustProbe {
    dataset: String,
    limit: usize,
    invocations: AtomicU64,
}

impl Default for CacheBustProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_DATASET, MAX_LITERAL_ELEMENTS)
    }
}

impl CacheBustProbe {
    /// Creates a probe fetching up to `limit` elements of `dataset`.
    ///
    /// A zero limit is raised to one.
    pub fn new(dataset: impl Into<String>, limit: usize) -> Self {
        Self {
            dataset: dataset.into(),
            limit: limit.max(1),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Element count requested by invocation `n`.
    fn size_for(&self, n: u64) -> usize {
        let span = JITTER.min(self.limit as u64);
        self.limit - (n % span) as usize
    }

    /// Runs the probe once and returns the number of elements fetched.
    ///
    /// Failures are returned to the caller, who treats them as fatal for
    /// the trial.
    pub fn run(&self, client: &dyn ComputeClient) -> Result<usize, ClientError> {
        let n = self.invocations.fetch_add(1, Ordering::Relaxed);
        let size = self.size_for(n);
        let fetched = client
            .fetch_all(&Expr::dataset(self.dataset.as_str()).limit(size))?
            .len();
        debug!(dataset = %self.dataset, requested = size, fetched, "Cache-bust probe");
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Catalog, InMemoryClient};

    #[test]
    fn test_sizes_never_exceed_limit_and_vary() {
        let probe = CacheBustProbe::default();
        let sizes: Vec<usize> = (0..JITTER).map(|n| probe.size_for(n)).collect();
        assert!(sizes.iter().all(|s| *s <= MAX_LITERAL_ELEMENTS && *s > 0));
        assert_ne!(sizes[0], sizes[1]);
        let mut unique = sizes.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), sizes.len());
    }

    #[test]
    fn test_tiny_limit() {
        let probe = CacheBustProbe::new("A", 0);
        assert_eq!(probe.limit(), 1);
        assert_eq!(probe.size_for(5), 1);
    }

    #[test]
    fn test_repeat_invocations_miss_cache() {
        let client = InMemoryClient::new(Catalog::demo()).with_cache(100_000);
        let probe = CacheBustProbe::default();

        assert_eq!(probe.run(&client).unwrap(), 366);
        assert_eq!(probe.run(&client).unwrap(), 366);
        assert_eq!(client.stats().cache_hits, 0);
        assert_eq!(client.stats().cache_misses, 2);
    }

    #[test]
    fn test_unknown_dataset_propagates() {
        let client = InMemoryClient::new(Catalog::new());
        let err = CacheBustProbe::new("NOPE", 10).run(&client).unwrap_err();
        assert!(matches!(err, ClientError::MalformedQuery(_)));
    }
}
