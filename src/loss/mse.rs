pub struct MseLoss;

impl MseLoss {
    /// mean((predicted - expected)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len().max(1) as f64;
        predicted.iter().zip(expected)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n
    }

    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected)
            .map(|(a, b)| a - b)
            .collect()
    }
}
