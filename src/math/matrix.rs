use rand::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub, Mul};

/// Dense row-major matrix of `f64`; the only numeric container the network uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    /// Xavier (Glorot) initialization: N(0, sqrt(1 / fan_in)), with `rows` as fan-in.
    pub fn xavier(rows: usize, cols: usize) -> Matrix {
        let mut rng = rand::thread_rng();
        let std_dev = (1.0 / rows.max(1) as f64).sqrt();
        let data = (0..rows)
            .map(|_| (0..cols).map(|_| standard_normal(&mut rng) * std_dev).collect())
            .collect();
        Matrix { rows, cols, data }
    }

    /// Builds a matrix from rows. An empty `data` yields a 0×0 matrix.
    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        let cols = data.first().map_or(0, Vec::len);
        Matrix {
            rows: data.len(),
            cols,
            data,
        }
    }

    /// Reshapes a flat row-major buffer. Returns `None` when the length does not fit.
    pub fn from_flat(rows: usize, cols: usize, flat: &[f64]) -> Option<Matrix> {
        if flat.len() != rows * cols {
            return None;
        }
        let data = if cols == 0 {
            vec![Vec::new(); rows]
        } else {
            flat.chunks(cols).map(<[f64]>::to_vec).collect()
        };
        Some(Matrix { rows, cols, data })
    }

    /// Row-major copy of every element.
    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().flatten().copied().collect()
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for (i, row) in self.data.iter().enumerate() {
            for (j, &x) in row.iter().enumerate() {
                res.data[j][i] = x;
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        assert_eq!((self.rows, self.cols), (other.rows, other.cols), "hadamard shape mismatch");
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x * y).collect())
            .collect();
        Matrix::from_data(data)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// One N(0, 1) sample via the Box-Muller transform.
fn standard_normal(rng: &mut ThreadRng) -> f64 {
    // (0, 1] keeps ln() finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        assert_eq!(self.shape(), rhs.shape(), "Matrices are of incorrect sizes");
        let data = self
            .data
            .into_iter()
            .zip(rhs.data)
            .map(|(a, b)| a.into_iter().zip(b).map(|(x, y)| x + y).collect())
            .collect();
        Matrix { rows: self.rows, cols: self.cols, data }
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.shape(), rhs.shape(), "Matrices are of incorrect sizes");
        let data = self
            .data
            .into_iter()
            .zip(rhs.data)
            .map(|(a, b)| a.into_iter().zip(b).map(|(x, y)| x - y).collect())
            .collect();
        Matrix { rows: self.rows, cols: self.cols, data }
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        assert_eq!(self.cols, rhs.rows, "Matrices are of incorrect sizes");
        let mut res = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for j in 0..rhs.cols {
                res.data[i][j] = (0..self.cols).map(|k| self.data[i][k] * rhs.data[k][j]).sum();
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_round_trip_keeps_row_major_order() {
        let m = Matrix::from_flat(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(m.data, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(m.to_flat(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(Matrix::from_flat(2, 2, &[1.0]).is_none());
    }

    #[test]
    fn product_and_transpose() {
        let a = Matrix::from_data(vec![vec![1.0, 2.0]]);
        let b = Matrix::from_data(vec![vec![3.0], vec![4.0]]);
        assert_eq!((&a * &b).data, vec![vec![11.0]]);
        assert_eq!(a.transpose().data, vec![vec![1.0], vec![2.0]]);
    }
}
