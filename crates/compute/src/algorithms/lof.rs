/// Local outlier factor of every row, with `k` nearest neighbors (Euclidean).
///
/// `k` is clamped to `n - 1`. A LOF near 1 means the point is as dense as its
/// neighbors; values well above 1 mark points in sparser regions than their
/// neighborhood. Brute force, O(n²) distances.
pub fn local_outlier_factor(rows: &[Vec<f64>], k: usize) -> Vec<f64> {
    let n = rows.len();
    let k = k.min(n.saturating_sub(1));
    if k == 0 {
        return vec![1.0; n];
    }

    let dist: Vec<Vec<f64>> = rows
        .iter()
        .map(|a| rows.iter().map(|b| euclidean(a, b)).collect())
        .collect();

    // k nearest neighbors of each point, excluding itself.
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|p| {
            let mut others: Vec<usize> = (0..n).filter(|&o| o != p).collect();
            others.sort_by(|&a, &b| dist[p][a].total_cmp(&dist[p][b]));
            others.truncate(k);
            others
        })
        .collect();

    let k_distance: Vec<f64> = (0..n)
        .map(|p| neighbors[p].last().map(|&o| dist[p][o]).unwrap_or(0.0))
        .collect();

    let lrd: Vec<f64> = (0..n)
        .map(|p| {
            let reach = neighbors[p]
                .iter()
                .map(|&o| k_distance[o].max(dist[p][o]))
                .sum::<f64>()
                / k as f64;
            1.0 / (reach + 1e-10)
        })
        .collect();

    (0..n)
        .map(|p| {
            let neighbor_lrd = neighbors[p].iter().map(|&o| lrd[o]).sum::<f64>() / k as f64;
            neighbor_lrd / lrd[p]
        })
        .collect()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
