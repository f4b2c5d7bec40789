//! Paged fuzzy scan with a running top-K.
//!
//! The scanner walks a [`PageSource`] in fixed-size pages, scores each
//! record's string field against the query and merges the page into the
//! running top-K before fetching the next one. Memory stays bounded by
//! `limit + batch_size` candidates.
//!
//! A scan never fails. A page error stops the walk and the outcome carries
//! the partial results plus the offset and error that interrupted it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::distance::EditDistanceScorer;
use super::topk::TopKSelector;
use crate::storage::{StoreError, StoreResult};
use crate::types::ScoredCandidate;

/// Records fetched in one page by default
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A paginated record source.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Number of records the scan should cover.
    async fn total(&self) -> StoreResult<u64>;

    /// Records `[offset, offset + limit)` in a stable order.
    async fn fetch_page(&self, offset: usize, limit: usize) -> StoreResult<Vec<Self::Item>>;
}

/// How a scan ended.
#[derive(Debug)]
pub enum ScanStatus {
    Complete,
    /// A store call failed; records from `offset` on were not scanned
    Interrupted { offset: usize, error: StoreError },
    Cancelled { offset: usize },
}

/// Results of a scan plus how far it got.
#[derive(Debug)]
pub struct ScanOutcome<T> {
    /// Best matches, ascending distance
    pub results: Vec<ScoredCandidate<T, usize>>,
    pub status: ScanStatus,
    pub pages_scanned: usize,
}

impl<T> ScanOutcome<T> {
    fn new() -> Self {
        Self {
            results: Vec::new(),
            status: ScanStatus::Complete,
            pages_scanned: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, ScanStatus::Complete)
    }

    /// Interrupted or cancelled, with whatever was gathered before
    pub fn is_partial(&self) -> bool {
        !self.is_complete()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchScanner {
    batch_size: usize,
    selector: TopKSelector,
    max_distance: Option<usize>,
    ignore_case: bool,
}

impl Default for BatchScanner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchScanner {
    /// A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            selector: TopKSelector::default(),
            max_distance: None,
            ignore_case: true,
        }
    }

    pub fn with_selector(mut self, selector: TopKSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Drop candidates farther than `max` edits from the query.
    pub fn with_max_distance(mut self, max: usize) -> Self {
        self.max_distance = Some(max);
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.ignore_case = false;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Scan `source` and keep the `limit` records whose field is closest to
    /// `query`.
    ///
    /// Records for which `field_of` yields `None` are skipped.
    pub async fn scan_and_rank<P, F>(
        &self,
        source: &P,
        query: &str,
        scorer: &mut EditDistanceScorer,
        field_of: F,
        limit: usize,
        cancel: &CancellationToken,
    ) -> ScanOutcome<P::Item>
    where
        P: PageSource + ?Sized,
        F: Fn(&P::Item) -> Option<&str> + Send,
    {
        let mut outcome = ScanOutcome::new();

        let total = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                outcome.status = ScanStatus::Cancelled { offset: 0 };
                return outcome;
            }
            total = source.total() => match total {
                Ok(total) => usize::try_from(total).unwrap_or(usize::MAX),
                Err(error) => {
                    warn!(%error, "Fuzzy scan could not count records");
                    outcome.status = ScanStatus::Interrupted { offset: 0, error };
                    return outcome;
                }
            },
        };

        let mut offset = 0;
        let mut skipped = 0usize;
        while offset < total {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(offset, "Fuzzy scan cancelled");
                    outcome.status = ScanStatus::Cancelled { offset };
                    break;
                }
                page = source.fetch_page(offset, self.batch_size) => page,
            };
            let page = match page {
                Ok(page) => page,
                Err(error) => {
                    warn!(offset, %error, "Fuzzy scan stopped early, returning partial results");
                    outcome.status = ScanStatus::Interrupted { offset, error };
                    break;
                }
            };
            // Source shrank under us
            if page.is_empty() {
                break;
            }

            let fetched = page.len();
            let mut merged = std::mem::take(&mut outcome.results);
            merged.reserve(fetched);
            for item in page {
                let Some(value) = field_of(&item) else {
                    skipped += 1;
                    continue;
                };
                let distance = if self.ignore_case {
                    scorer.distance_ignore_case(query, value)
                } else {
                    scorer.distance(query, value)
                };
                if self.max_distance.is_some_and(|max| distance > max) {
                    continue;
                }
                merged.push(ScoredCandidate::new(item, distance));
            }
            outcome.results = self.selector.select(merged, limit, |c| c.score);
            outcome.pages_scanned += 1;
            offset += fetched;
        }

        debug!(
            pages = outcome.pages_scanned,
            kept = outcome.results.len(),
            skipped,
            "Fuzzy scan finished"
        );
        outcome
    }
}
