use tenderscope_core::stats;

/// Standardize each column of a row-major matrix to zero mean and unit
/// variance (population statistics). Constant columns become all zeros.
///
/// Fitted on the given rows only; nothing is retained between calls.
pub fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dims = rows.first().map(|r| r.len()).unwrap_or(0);
    let params: Vec<(f64, f64)> = (0..dims)
        .map(|d| {
            let column: Vec<f64> = rows.iter().map(|r| r[d]).collect();
            stats::population_mean_std(&column).unwrap_or((0.0, 0.0))
        })
        .collect();

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&params)
                .map(|(x, (mean, std))| if *std > f64::EPSILON { (x - mean) / std } else { 0.0 })
                .collect()
        })
        .collect()
}
