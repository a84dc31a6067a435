use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// A node of an isolation tree.
#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Isolation forest over dense feature vectors.
///
/// Each tree is grown on a random subsample (without replacement) by picking
/// a random feature and a uniform split value between that feature's min and
/// max, down to `ceil(log2(sample_size))` levels. Points that isolate in few
/// splits are anomalous.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Grow `n_trees` trees over `rows`. Deterministic for a given `seed`.
    pub fn fit(rows: &[Vec<f64>], n_trees: usize, max_samples: usize, seed: u64) -> Self {
        let n = rows.len();
        if n == 0 {
            return Self {
                trees: Vec::new(),
                sample_size: 0,
            };
        }

        let sample_size = max_samples.clamp(1, n);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let trees = (0..n_trees)
            .map(|_| {
                let sample = index::sample(&mut rng, n, sample_size).into_vec();
                grow(rows, sample, 0, max_depth, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Anomaly score in (0, 1]: `2^(-E[h(x)] / c(sample_size))`.
    ///
    /// Scores near 1 are anomalies, scores well below 0.5 are normal. A forest
    /// with nothing to compare against scores everything 0.5.
    pub fn score(&self, row: &[f64]) -> f64 {
        let c = average_path_length(self.sample_size);
        if self.trees.is_empty() || c <= 0.0 {
            return 0.5;
        }
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| path_length(tree, row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_depth / c)
    }

    pub fn score_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.score(r)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn grow(rows: &[Vec<f64>], sample: Vec<usize>, depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    let dims = rows[sample[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..dims)
        .filter_map(|f| {
            let (min, max) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][f]), hi.max(rows[i][f]))
            });
            (max > min).then_some((f, min, max))
        })
        .collect();

    // All remaining points are identical.
    if splittable.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let value = rng.gen_range(min..max);
    let (left, right): (Vec<usize>, Vec<usize>) = sample.into_iter().partition(|&i| rows[i][feature] < value);

    Node::Split {
        feature,
        value,
        left: Box::new(grow(rows, left, depth + 1, max_depth, rng)),
        right: Box::new(grow(rows, right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            value,
            left,
            right,
        } => {
            let x = row.get(*feature).copied().unwrap_or(0.0);
            if x < *value {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 5) as f64 * 0.1, (i % 7) as f64 * 0.1])
            .collect();
        rows.push(vec![25.0, -30.0]);
        rows
    }

    #[test]
    fn outlier_scores_highest() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::fit(&rows, 100, 256, 42);
        let scores = forest.score_all(&rows);
        let (argmax, _) = scores
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &s)| if s > acc.1 { (i, s) } else { acc });
        assert_eq!(argmax, rows.len() - 1);
        assert!(scores[argmax] > 0.6);
    }

    #[test]
    fn same_seed_same_scores() {
        let rows = cluster_with_outlier();
        let a = IsolationForest::fit(&rows, 50, 32, 7).score_all(&rows);
        let b = IsolationForest::fit(&rows, 50, 32, 7).score_all(&rows);
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_inputs() {
        let empty = IsolationForest::fit(&[], 10, 256, 1);
        assert_eq!(empty.score(&[1.0]), 0.5);

        let single = IsolationForest::fit(&[vec![3.0]], 10, 256, 1);
        assert_eq!(single.score(&[3.0]), 0.5);
    }

    #[test]
    fn c_factor_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.24).abs() < 0.01);
    }
}
