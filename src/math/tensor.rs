use serde::{Deserialize, Serialize};

use crate::error::{CallbackError, Result};
use crate::math::matrix::Matrix;

/// N-dimensional buffer: a shape plus row-major data.
///
/// Only used at the export boundary, where the caller describes the example
/// input by shape rather than by a concrete batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Tensor {
        let len = shape.iter().product();
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; len],
        }
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Views the tensor as `(batch, features)`, collapsing every trailing axis.
    pub fn to_batch_matrix(&self) -> Result<Matrix> {
        let Some((&batch, rest)) = self.shape.split_first() else {
            return Err(CallbackError::shape_mismatch("at least one axis", "scalar"));
        };
        let features = rest.iter().product::<usize>();
        Matrix::from_flat(batch, features, &self.data).ok_or_else(|| {
            CallbackError::shape_mismatch(
                format!("{} elements for shape {:?}", batch * features, self.shape),
                format!("{} elements", self.data.len()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_collapse_trailing_axes() {
        let t = Tensor::zeros(&[2, 3, 4]);
        assert_eq!(t.numel(), 24);
        let m = t.to_batch_matrix().unwrap();
        assert_eq!(m.shape(), (2, 12));
        assert!(m.to_flat().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn scalar_has_no_batch_axis() {
        assert!(matches!(
            Tensor::zeros(&[]).to_batch_matrix(),
            Err(CallbackError::ShapeMismatch { .. })
        ));
    }
}
