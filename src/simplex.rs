//! Euclidean projection onto the probability simplex.

/// Project a row vector onto the probability simplex in place.
///
/// Uses the standard sort-and-threshold method: sort the entries
/// descending, find the largest prefix for which subtracting a shared
/// threshold keeps the prefix positive while the vector sums to one,
/// subtract that threshold everywhere and clip the remainder at zero.
pub fn project_simplex(row: &mut [f64]) {
    let n = row.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        row[0] = 1.0;
        return;
    }

    let mut sorted = row.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumsum = 0.0;
    let mut theta = 0.0;
    for (k, &v) in sorted.iter().enumerate() {
        cumsum += v;
        let t = (cumsum - 1.0) / (k + 1) as f64;
        if v - t > 0.0 {
            theta = t;
        }
    }

    for v in row.iter_mut() {
        *v = (*v - theta).max(0.0);
    }
}
