use serde::{Deserialize, Serialize};

/// Summary statistics plus bucket counts for one tensor snapshot.
///
/// `bucket_limit[i]` is the inclusive upper edge of `bucket[i]`; the lower edge is
/// the previous limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub num: usize,
    pub sum: f64,
    pub sum_squares: f64,
    pub bucket_limit: Vec<f64>,
    pub bucket: Vec<u64>,
}

/// Exponentially spaced edges: ±1e-12·1.1^k up to 1e20, mirrored around zero.
fn default_edges() -> Vec<f64> {
    let mut positive = Vec::new();
    let mut v = 1e-12;
    while v < 1e20 {
        positive.push(v);
        v *= 1.1;
    }
    let mut edges: Vec<f64> = positive.iter().rev().map(|x| -x).collect();
    edges.push(0.0);
    edges.extend(positive);
    edges.push(f64::MAX);
    edges
}

impl Histogram {
    /// Buckets `values`, dropping the empty buckets on either end. Non-finite values are ignored.
    pub fn from_values(values: &[f64]) -> Histogram {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Histogram {
                min: 0.0,
                max: 0.0,
                num: 0,
                sum: 0.0,
                sum_squares: 0.0,
                bucket_limit: Vec::new(),
                bucket: Vec::new(),
            };
        }

        let edges = default_edges();
        let mut counts = vec![0u64; edges.len()];
        for &v in &finite {
            // first edge >= v
            let idx = edges.partition_point(|&edge| edge < v);
            counts[idx.min(edges.len() - 1)] += 1;
        }

        let first = counts.iter().position(|&c| c > 0).unwrap_or(0);
        let last = counts.iter().rposition(|&c| c > 0).unwrap_or(0);

        Histogram {
            min: finite.iter().copied().fold(f64::INFINITY, f64::min),
            max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            num: finite.len(),
            sum: finite.iter().sum(),
            sum_squares: finite.iter().map(|v| v * v).sum(),
            bucket_limit: edges[first..=last].to_vec(),
            bucket: counts[first..=last].to_vec(),
        }
    }
}
