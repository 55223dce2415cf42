pub struct BceLoss;

const EPS: f64 = 1e-12;

impl BceLoss {
    /// -mean(y·ln(p+ε) + (1-y)·ln(1-p+ε)); pair with a Sigmoid output.
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len().max(1) as f64;
        predicted.iter().zip(expected)
            .map(|(p, y)| -(y * (p + EPS).ln() + (1.0 - y) * (1.0 - p + EPS).ln()))
            .sum::<f64>() / n
    }

    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected)
            .map(|(p, y)| (p - y) / ((p + EPS) * (1.0 - p + EPS)))
            .collect()
    }
}
