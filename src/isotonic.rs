use crate::errors::CalibrationError;
use serde::{Deserialize, Serialize};

/// Monotonicity regime for the isotonic projection.
///
/// Serializes with the wire shape `{"mode": "exact"}` or
/// `{"mode": "epsilon", "eps": 0.01}`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum NearlyIsotonic {
    /// Strict non-decreasing order.
    #[default]
    Exact,
    /// Local decreases of at most `eps` are tolerated and left unmerged.
    Epsilon { eps: f64 },
}

impl NearlyIsotonic {
    /// Parse a configuration from its JSON wire shape.
    pub fn from_json(json: &str) -> Result<Self, CalibrationError> {
        serde_json::from_str(json).map_err(|e| {
            CalibrationError::InvalidParameter(
                "nearly".to_string(),
                r#"{"mode": "exact"} or {"mode": "epsilon", "eps": x}"#.to_string(),
                e.to_string(),
            )
        })
    }

    /// The tolerated local decrease, zero in exact mode.
    pub fn slack(&self) -> f64 {
        match self {
            NearlyIsotonic::Exact => 0.0,
            NearlyIsotonic::Epsilon { eps } => *eps,
        }
    }
}

/// Weighted isotonic projection under an order permutation.
///
/// Finds the weighted least-squares fit to `values` that is non-decreasing
/// when read in the order given by `perm`, and writes it back to the
/// original positions in `out`. A positive `slack` switches to the
/// nearly-isotonic regime: a decrease from one position to the next is
/// left in place whenever it is no greater than `slack`, and only larger
/// violations are pooled.
///
/// We use the "pool adjacent violators" algorithm: scan in the required
/// order, and whenever a value breaks monotonicity relative to its
/// predecessor block, merge the violating blocks into their weighted
/// average, continuing leftward until order holds again.
pub fn project_isotonic(values: &[f64], weights: &[f64], perm: &[usize], slack: f64, out: &mut [f64]) {
    debug_assert_eq!(values.len(), weights.len());
    debug_assert_eq!(values.len(), perm.len());
    debug_assert_eq!(values.len(), out.len());

    // Block stack: (sum_wy, sum_w, value, start position in perm order).
    let mut blocks: Vec<(f64, f64, f64, usize)> = Vec::with_capacity(values.len());

    for (pos, &idx) in perm.iter().enumerate() {
        let mut sum_wy = weights[idx] * values[idx];
        let mut sum_w = weights[idx];
        let mut start = pos;

        // Merge down
        while let Some(&(prev_wy, prev_w, prev_val, prev_start)) = blocks.last() {
            let curr_val = block_value(sum_wy, sum_w, values[idx]);
            if prev_val - curr_val > slack {
                sum_wy += prev_wy;
                sum_w += prev_w;
                start = prev_start;
                blocks.pop();
            } else {
                break;
            }
        }
        let val = block_value(sum_wy, sum_w, values[idx]);
        blocks.push((sum_wy, sum_w, val, start));
    }

    // Expand the blocks back to original positions.
    for (b, &(_, _, val, start)) in blocks.iter().enumerate() {
        let end = if b + 1 < blocks.len() { blocks[b + 1].3 } else { perm.len() };
        for &idx in &perm[start..end] {
            out[idx] = val;
        }
    }
}

#[inline]
fn block_value(sum_wy: f64, sum_w: f64, fallback: f64) -> f64 {
    // Zero total weight leaves the raw value in place.
    if sum_w > 0.0 {
        sum_wy / sum_w
    } else {
        fallback
    }
}
