//! Distance functions for vector comparison.
//!
//! The index ranks rows by squared Euclidean distance (L2²). Taking the square
//! root is monotonic, so ranking on L2² gives the same order as L2 and saves a
//! `sqrt` per row.

/// Compute the squared Euclidean (L2²) distance between two vectors.
///
/// Lower means more similar; identical vectors have distance 0.
///
/// Both slices must have the same length. Callers inside this crate check
/// dimensions before calling.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let mut sum = 0.0f32;

    // Manual loop unrolling for better performance
    let chunks = a.len() / 4;
    let remainder = a.len() % 4;

    for i in 0..chunks {
        let base = i * 4;
        let d0 = a[base] - b[base];
        let d1 = a[base + 1] - b[base + 1];
        let d2 = a[base + 2] - b[base + 2];
        let d3 = a[base + 3] - b[base + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
    }

    let start = chunks * 4;
    for i in 0..remainder {
        let idx = start + i;
        let d = a[idx] - b[idx];
        sum += d * d;
    }

    sum
}

/// Returns `true` if every component is finite (no NaN, no infinity).
pub fn is_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_euclidean_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!(squared_euclidean(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn test_squared_euclidean_known_value() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 2.0];
        // 1 + 4 + 4
        assert!((squared_euclidean(&a, &b) - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_unrolled_and_remainder_paths_agree() {
        // 7 components: one unrolled block of 4 plus a remainder of 3
        let a: Vec<f32> = (0..7).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..7).map(|i| (i * 2) as f32).collect();
        let naive: f32 = a.iter().zip(&b).map(|(x, y)| (x - y) * (x - y)).sum();
        assert!((squared_euclidean(&a, &b) - naive).abs() < 1e-4);
    }

    #[test]
    fn test_is_finite() {
        assert!(is_finite(&[0.0, 1.5, -3.0]));
        assert!(!is_finite(&[0.0, f32::NAN]));
        assert!(!is_finite(&[f32::INFINITY]));
    }
}
