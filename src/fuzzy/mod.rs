//! Fuzzy string matching: edit distance, top-K selection and paged scans.

pub mod batch;
pub mod distance;
pub mod topk;

pub use batch::{BatchScanner, DEFAULT_BATCH_SIZE, PageSource, ScanOutcome, ScanStatus};
pub use distance::{DistanceMatrix, EditDistanceScorer, PooledScorer, ScorerPool};
pub use topk::{QUICKSELECT_THRESHOLD, TopKSelector, select_top_k};
