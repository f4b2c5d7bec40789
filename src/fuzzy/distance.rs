//! Levenshtein distance over a reusable matrix.
//!
//! # Buffer reuse
//! A scorer keeps one [`DistanceMatrix`] and two char buffers for its whole
//! lifetime. The matrix grows to the largest table ever requested and is
//! never shrunk, so a scan over thousands of similar-length strings
//! allocates once. Each call rewrites only the subregion it reads, boundary
//! row and column included, so nothing leaks from a previous, larger call.
//!
//! A scorer is `&mut`-only. Concurrent requests take their own scorer from a
//! [`ScorerPool`].

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// Idle scorers kept by a pool; extra ones are dropped on return.
const MAX_IDLE_SCORERS: usize = 32;

/// Row-major 2D arena of DP cells.
#[derive(Debug, Default)]
pub struct DistanceMatrix {
    cells: Vec<usize>,
    rows: usize,
    cols: usize,
}

impl DistanceMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of allocated cells
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Make room for a `rows x cols` table.
    ///
    /// Returns `true` when the buffer had to be reallocated. Each dimension
    /// only ever grows.
    fn reserve(&mut self, rows: usize, cols: usize) -> bool {
        if rows <= self.rows && cols <= self.cols {
            return false;
        }
        self.rows = rows.max(self.rows);
        self.cols = cols.max(self.cols);
        self.cells = vec![0; self.rows * self.cols];
        true
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> usize {
        self.cells[row * self.cols + col]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, value: usize) {
        let idx = row * self.cols + col;
        self.cells[idx] = value;
    }
}

/// Edit distance with unit insertion, deletion and substitution costs.
#[derive(Debug, Default)]
pub struct EditDistanceScorer {
    matrix: DistanceMatrix,
    shorter: Vec<char>,
    longer: Vec<char>,
    reallocations: usize,
}

impl EditDistanceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Levenshtein distance between `a` and `b`, compared char by char.
    pub fn distance(&mut self, a: &str, b: &str) -> usize {
        if a == b {
            return 0;
        }
        self.load(a.chars(), b.chars());
        self.compute()
    }

    /// Like [`distance`](Self::distance) but folds both sides to lowercase.
    pub fn distance_ignore_case(&mut self, a: &str, b: &str) -> usize {
        self.load(
            a.chars().flat_map(char::to_lowercase),
            b.chars().flat_map(char::to_lowercase),
        );
        self.compute()
    }

    pub fn matrix(&self) -> &DistanceMatrix {
        &self.matrix
    }

    /// How many times the matrix had to grow
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    fn load(&mut self, a: impl Iterator<Item = char>, b: impl Iterator<Item = char>) {
        self.shorter.clear();
        self.longer.clear();
        self.shorter.extend(a);
        self.longer.extend(b);
        // Columns follow the shorter string
        if self.shorter.len() > self.longer.len() {
            std::mem::swap(&mut self.shorter, &mut self.longer);
        }
    }

    fn compute(&mut self) -> usize {
        let shorter = &self.shorter;
        let longer = &self.longer;

        if shorter == longer {
            return 0;
        }
        if shorter.is_empty() {
            return longer.len();
        }

        let rows = longer.len() + 1;
        let cols = shorter.len() + 1;
        if self.matrix.reserve(rows, cols) {
            self.reallocations += 1;
        }
        let matrix = &mut self.matrix;

        for col in 0..cols {
            matrix.set(0, col, col);
        }
        for row in 1..rows {
            matrix.set(row, 0, row);
            let current = longer[row - 1];
            for col in 1..cols {
                let cost = usize::from(current != shorter[col - 1]);
                let deletion = matrix.get(row - 1, col) + 1;
                let insertion = matrix.get(row, col - 1) + 1;
                let substitution = matrix.get(row - 1, col - 1) + cost;
                matrix.set(row, col, deletion.min(insertion).min(substitution));
            }
        }

        matrix.get(rows - 1, cols - 1)
    }
}

/// Hands out one scorer per concurrent request and keeps their buffers.
#[derive(Debug, Default)]
pub struct ScorerPool {
    idle: Mutex<Vec<EditDistanceScorer>>,
}

impl ScorerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an idle scorer, or a fresh one when all are in use.
    pub fn checkout(&self) -> PooledScorer<'_> {
        let scorer = self.idle.lock().pop().unwrap_or_default();
        PooledScorer { pool: self, scorer }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn give_back(&self, scorer: EditDistanceScorer) {
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE_SCORERS {
            idle.push(scorer);
        }
    }
}

/// A scorer on loan from a [`ScorerPool`]; returned on drop.
#[derive(Debug)]
pub struct PooledScorer<'a> {
    pool: &'a ScorerPool,
    scorer: EditDistanceScorer,
}

impl Deref for PooledScorer<'_> {
    type Target = EditDistanceScorer;

    fn deref(&self) -> &Self::Target {
        &self.scorer
    }
}

impl DerefMut for PooledScorer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.scorer
    }
}

impl Drop for PooledScorer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.scorer));
    }
}
