//! Common types for zoneqa-vector.

/// A single nearest-neighbour hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Insertion position of the matching row.
    pub row: usize,
    /// Squared Euclidean distance to the query (lower is closer).
    pub distance: f32,
}

impl SearchHit {
    /// Create a new search hit.
    pub fn new(row: usize, distance: f32) -> Self {
        Self { row, distance }
    }
}
