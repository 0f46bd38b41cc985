//! Column-marginal projection.
//!
//! Moves a column onto the set of vectors whose entries sum to the target
//! marginal (exactly, or to the nearest point of a symmetric slack band
//! around it) without introducing negative entries.

/// Project one column so its sum reaches `target`.
///
/// The shift onto the sum hyperplane is additive and shared by every
/// entry. With a positive `slack` the column is only moved to the nearest
/// edge of the band `[target - slack, target + slack]`. If the shift would
/// drive entries negative, they are clipped to zero and the resulting
/// surplus is removed proportionally from the remaining positive entries.
pub fn project_marginal_column(col: &mut [f64], target: f64, slack: f64) {
    let n = col.len();
    if n == 0 {
        return;
    }

    let sum: f64 = col.iter().sum();
    let goal = clamp_to_band(sum, target, slack).max(0.0);
    let shift = (goal - sum) / n as f64;
    for v in col.iter_mut() {
        *v += shift;
    }

    if col.iter().any(|&v| v < 0.0) {
        let positive_sum: f64 = col.iter().filter(|&&v| v > 0.0).sum();
        if positive_sum > 0.0 {
            // Clipping the negatives raises the sum above the goal; take
            // the surplus back proportionally from the positive mass.
            let scale = goal / positive_sum;
            for v in col.iter_mut() {
                *v = if *v > 0.0 { *v * scale } else { 0.0 };
            }
        } else {
            let fill = goal / n as f64;
            for v in col.iter_mut() {
                *v = fill;
            }
        }
    }
}

#[inline]
fn clamp_to_band(sum: f64, target: f64, slack: f64) -> f64 {
    if slack > 0.0 {
        sum.clamp(target - slack, target + slack)
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colsum(col: &[f64]) -> f64 {
        col.iter().sum()
    }

    #[test]
    fn test_exact_shift() {
        let mut col = vec![0.5, 0.3, 0.2];
        project_marginal_column(&mut col, 2.0, 0.0);
        assert!((colsum(&col) - 2.0).abs() < 1e-12);
        // Uniform additive correction.
        assert!((col[0] - col[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_clip_and_redistribute() {
        let mut col = vec![0.9, 0.05, 0.05];
        project_marginal_column(&mut col, 0.3, 0.0);
        assert!((colsum(&col) - 0.3).abs() < 1e-12);
        assert!(col.iter().all(|&v| v >= 0.0));
        // The small entries hit zero and the deficit lands on the big one.
        assert_eq!(col[1], 0.0);
        assert_eq!(col[2], 0.0);
        assert!((col[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_zero_column_fills_uniformly() {
        let mut col = vec![0.0; 4];
        project_marginal_column(&mut col, 1.0, 0.0);
        for &v in &col {
            assert!((v - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_target_zeroes_column() {
        let mut col = vec![0.4, 0.6];
        project_marginal_column(&mut col, 0.0, 0.0);
        assert!(col.iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn test_band_leaves_nearby_sum_alone() {
        let mut col = vec![0.6, 0.45];
        project_marginal_column(&mut col, 1.0, 0.1);
        // Sum is 1.05, inside the band, so nothing moves.
        assert_eq!(col, vec![0.6, 0.45]);
    }

    #[test]
    fn test_band_moves_to_nearest_edge() {
        let mut col = vec![1.0, 0.5];
        project_marginal_column(&mut col, 1.0, 0.1);
        assert!((colsum(&col) - 1.1).abs() < 1e-12);
    }
}
