//! Output archive: a flat collection of named, row-major f64 arrays.

use nalgebra::DMatrix;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::errors::{
    DataSourceError,
    Result,
};
use crate::pipeline::NmfResult;
use crate::utils::serde::{
    load_compressed,
    save_compressed,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArray {
    pub shape: Vec<usize>,
    /// Row-major values.
    pub data: Vec<f64>,
}

impl NamedArray {
    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn from_matrix(m: &DMatrix<f64>) -> Self {
        // nalgebra is column-major; the transpose's storage is our row-major order.
        Self {
            shape: vec![m.nrows(), m.ncols()],
            data: m.transpose().as_slice().to_vec(),
        }
    }

    pub fn to_matrix(&self) -> Result<DMatrix<f64>> {
        match self.shape.as_slice() {
            [rows, cols] if rows * cols == self.data.len() => {
                Ok(DMatrix::from_row_slice(*rows, *cols, &self.data))
            }
            _ => Err(DataSourceError::Other {
                context: format!(
                    "array of shape {:?} with {} values is not a matrix",
                    self.shape,
                    self.data.len()
                ),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NmfArchive {
    pub arrays: BTreeMap<String, NamedArray>,
}

impl NmfArchive {
    pub fn insert(&mut self, name: &str, array: NamedArray) {
        self.arrays.insert(name.to_string(), array);
    }

    pub fn get(&self, name: &str) -> Option<&NamedArray> {
        self.arrays.get(name)
    }

    /// Collects the arrays that survive a run:
    /// `W`, `H`, `mz_axis`, `shape`, `noise_prob`, `noise_sqrt_avg`,
    /// `noise_sqrt_std` and `min_intensities`.
    pub fn from_result(result: &NmfResult) -> Self {
        let mut out = Self::default();
        out.insert("W", NamedArray::from_matrix(&result.factorization.w));
        out.insert("H", NamedArray::from_matrix(&result.factorization.h_full));
        out.insert(
            "mz_axis",
            NamedArray {
                shape: vec![result.mz_axis.len(), 2],
                data: result.mz_axis.iter().flat_map(|b| [b.mz, b.ppm]).collect(),
            },
        );
        let mins = &result.noise.min_intensities;
        out.insert(
            "shape",
            NamedArray::vector(vec![mins.height as f64, mins.width as f64]),
        );
        out.insert("noise_prob", NamedArray::vector(result.noise.prob.clone()));
        out.insert(
            "noise_sqrt_avg",
            NamedArray::vector(result.noise.sqrt_median.clone()),
        );
        out.insert(
            "noise_sqrt_std",
            NamedArray::vector(result.noise.sqrt_std.clone()),
        );
        out.insert(
            "min_intensities",
            NamedArray {
                shape: vec![mins.height, mins.width],
                data: mins.data.clone(),
            },
        );
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_compressed(self, path.as_ref())?;
        info!(
            "Saved NMF and noise stats ({} arrays) to {}",
            self.arrays.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_compressed(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_is_stored_row_major() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let arr = NamedArray::from_matrix(&m);
        assert_eq!(arr.shape, vec![2, 3]);
        assert_eq!(arr.data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(arr.to_matrix().unwrap(), m);
    }

    #[test]
    fn test_vector_is_not_a_matrix() {
        let arr = NamedArray::vector(vec![1.0, 2.0]);
        assert!(arr.to_matrix().is_err());
    }
}
