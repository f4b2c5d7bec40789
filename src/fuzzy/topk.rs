//! Ascending top-K selection.
//!
//! Small inputs are sorted outright. Above the quickselect threshold the
//! selector partitions around a random pivot (three-way, so runs of equal
//! scores cannot degrade it) and only sorts the K survivors.

use rand::Rng;
use std::cmp::Ordering;

/// Inputs longer than this use quickselect instead of a full sort
pub const QUICKSELECT_THRESHOLD: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKSelector {
    threshold: usize,
}

impl Default for TopKSelector {
    fn default() -> Self {
        Self::new(QUICKSELECT_THRESHOLD)
    }
}

impl TopKSelector {
    pub const fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Return the `k` items with the lowest score, sorted ascending.
    ///
    /// Ties at the cut-off are broken arbitrarily.
    pub fn select<T, S, F>(&self, mut items: Vec<T>, k: usize, score_of: F) -> Vec<T>
    where
        S: PartialOrd,
        F: Fn(&T) -> S,
    {
        if k == 0 {
            return Vec::new();
        }
        if items.len() <= k {
            sort_by_score(&mut items, &score_of);
            return items;
        }
        if items.len() > self.threshold {
            quickselect(items, k, &score_of)
        } else {
            sort_by_score(&mut items, &score_of);
            items.truncate(k);
            items
        }
    }
}

/// [`TopKSelector::select`] with the default threshold.
pub fn select_top_k<T, S, F>(items: Vec<T>, k: usize, score_of: F) -> Vec<T>
where
    S: PartialOrd,
    F: Fn(&T) -> S,
{
    TopKSelector::default().select(items, k, score_of)
}

fn sort_by_score<T, S, F>(items: &mut [T], score_of: &F)
where
    S: PartialOrd,
    F: Fn(&T) -> S,
{
    items.sort_by(|a, b| {
        score_of(a)
            .partial_cmp(&score_of(b))
            .unwrap_or(Ordering::Equal)
    });
}

fn quickselect<T, S, F>(mut items: Vec<T>, k: usize, score_of: &F) -> Vec<T>
where
    S: PartialOrd,
    F: Fn(&T) -> S,
{
    let mut rng = rand::rng();
    let mut selected = Vec::with_capacity(k);
    let mut remaining = k;

    while remaining > 0 && !items.is_empty() {
        if items.len() <= remaining {
            selected.append(&mut items);
            break;
        }

        let pivot = score_of(&items[rng.random_range(0..items.len())]);
        let mut less = Vec::new();
        let mut equal = Vec::new();
        let mut greater = Vec::new();
        for item in std::mem::take(&mut items) {
            match score_of(&item).partial_cmp(&pivot) {
                Some(Ordering::Less) => less.push(item),
                Some(Ordering::Greater) => greater.push(item),
                // Unordered scores land with the pivot
                _ => equal.push(item),
            }
        }

        if remaining <= less.len() {
            items = less;
            continue;
        }
        remaining -= less.len();
        selected.append(&mut less);

        if remaining <= equal.len() {
            equal.truncate(remaining);
            selected.append(&mut equal);
            break;
        }
        remaining -= equal.len();
        selected.append(&mut equal);
        items = greater;
    }

    sort_by_score(&mut selected, score_of);
    selected
}
