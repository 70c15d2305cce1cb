//! Lazy access to the (bin, row, column) intensity cube.
//!
//! The cube is usually far too large to hold in memory, so the factorization
//! only ever touches it through two operations:
//!
//! 1. [`ChunkedCube::bin_totals`], a reduction over both spatial axes.
//! 2. [`ChunkedCube::slice_bins`], which materializes a handful of bins as
//!    the columns of a dense `pixels x bins` matrix.
//!
//! Any backing store that can answer those two questions can be plugged in.
//!
//! Pixels are always flattened row-major (`row * width + col`).

use nalgebra::DMatrix;
use rayon::prelude::*;
use std::ops::Range;

use crate::errors::{
    DataSourceError,
    Result,
};

/// Number of bins pulled into memory at once by the default reduction.
pub const DEFAULT_REDUCTION_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeShape {
    pub bins: usize,
    pub height: usize,
    pub width: usize,
}

impl CubeShape {
    pub fn pixels(&self) -> usize {
        self.height * self.width
    }
}

/// Dense row-major 2-D image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl Image {
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![0.0; height * width],
        }
    }

    pub fn try_new(height: usize, width: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != height * width {
            return Err(DataSourceError::ImageShapeMismatch {
                expected: (height, width),
                other: (data.len(), 1),
                context: "Image data length does not match its dimensions".to_string(),
            }
            .into());
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Replaces negative values (interpolation artifacts) with zero.
    pub fn clamp_negative(&mut self) {
        for x in self.data.iter_mut() {
            if *x < 0.0 {
                *x = 0.0;
            }
        }
    }
}

pub trait ChunkedCube: Sync {
    fn shape(&self) -> CubeShape;

    /// Materializes the requested bins as columns of a `pixels x bins.len()`
    /// matrix, in the order given.
    fn slice_bins(&self, bins: &[usize]) -> Result<DMatrix<f64>>;

    /// Total intensity of every bin, summed over rows and columns.
    ///
    /// The default streams the cube `DEFAULT_REDUCTION_CHUNK` bins at a time.
    fn bin_totals(&self) -> Result<Vec<f64>> {
        let num_bins = self.shape().bins;
        let mut out = Vec::with_capacity(num_bins);
        let all_bins: Vec<usize> = (0..num_bins).collect();
        for chunk in all_bins.chunks(DEFAULT_REDUCTION_CHUNK) {
            let dense = self.slice_bins(chunk)?;
            out.extend(dense.column_iter().map(|c| c.sum()));
        }
        Ok(out)
    }
}

/// Anything that can hand out contiguous ranges of columns of a
/// `num_rows x num_cols` matrix.
///
/// This is what the NNLS projection consumes, so targets can live in memory
/// or be pulled lazily from a cube.
pub trait ColumnSource: Sync {
    fn num_rows(&self) -> usize;
    fn num_cols(&self) -> usize;
    fn load_columns(&self, cols: Range<usize>) -> Result<DMatrix<f64>>;
}

impl ColumnSource for DMatrix<f64> {
    fn num_rows(&self) -> usize {
        self.nrows()
    }

    fn num_cols(&self) -> usize {
        self.ncols()
    }

    fn load_columns(&self, cols: Range<usize>) -> Result<DMatrix<f64>> {
        if cols.end > self.ncols() {
            return Err(DataSourceError::BinOutOfRange {
                bin: cols.end - 1,
                num_bins: self.ncols(),
            }
            .into());
        }
        Ok(self.columns(cols.start, cols.len()).into_owned())
    }
}

/// Column view over a subset of cube bins, materialized on demand.
pub struct BinColumns<'a, C: ChunkedCube + ?Sized> {
    cube: &'a C,
    bins: Vec<usize>,
}

impl<'a, C: ChunkedCube + ?Sized> BinColumns<'a, C> {
    pub fn new(cube: &'a C, bins: Vec<usize>) -> Self {
        Self { cube, bins }
    }

    pub fn all(cube: &'a C) -> Self {
        let bins = (0..cube.shape().bins).collect();
        Self { cube, bins }
    }
}

impl<C: ChunkedCube + ?Sized> ColumnSource for BinColumns<'_, C> {
    fn num_rows(&self) -> usize {
        self.cube.shape().pixels()
    }

    fn num_cols(&self) -> usize {
        self.bins.len()
    }

    fn load_columns(&self, cols: Range<usize>) -> Result<DMatrix<f64>> {
        self.cube.slice_bins(&self.bins[cols])
    }
}

/// Fully materialized cube, mostly useful for small datasets and tests.
#[derive(Debug, Clone)]
pub struct DenseCube {
    height: usize,
    width: usize,
    images: Vec<Image>,
}

impl DenseCube {
    pub fn try_new(height: usize, width: usize, images: Vec<Image>) -> Result<Self> {
        for (i, img) in images.iter().enumerate() {
            if img.height != height || img.width != width {
                return Err(DataSourceError::ImageShapeMismatch {
                    expected: (height, width),
                    other: (img.height, img.width),
                    context: format!("bin {} of dense cube", i),
                }
                .into());
            }
        }
        Ok(Self {
            height,
            width,
            images,
        })
    }

    /// Builds a cube from a `pixels x bins` matrix whose columns are flattened images.
    pub fn from_columns(height: usize, width: usize, columns: &DMatrix<f64>) -> Result<Self> {
        if columns.nrows() != height * width {
            return Err(DataSourceError::ImageShapeMismatch {
                expected: (height, width),
                other: (columns.nrows(), 1),
                context: "column length does not match the image size".to_string(),
            }
            .into());
        }
        let images = columns
            .column_iter()
            .map(|c| Image {
                height,
                width,
                data: c.iter().copied().collect(),
            })
            .collect();
        Ok(Self {
            height,
            width,
            images,
        })
    }

    pub fn image(&self, bin: usize) -> Option<&Image> {
        self.images.get(bin)
    }
}

impl ChunkedCube for DenseCube {
    fn shape(&self) -> CubeShape {
        CubeShape {
            bins: self.images.len(),
            height: self.height,
            width: self.width,
        }
    }

    fn slice_bins(&self, bins: &[usize]) -> Result<DMatrix<f64>> {
        let pixels = self.height * self.width;
        let mut out = DMatrix::zeros(pixels, bins.len());
        for (j, &bin) in bins.iter().enumerate() {
            let img = self.images.get(bin).ok_or(DataSourceError::BinOutOfRange {
                bin,
                num_bins: self.images.len(),
            })?;
            out.column_mut(j).copy_from_slice(&img.data);
        }
        Ok(out)
    }

    fn bin_totals(&self) -> Result<Vec<f64>> {
        Ok(self.images.par_iter().map(|img| img.total()).collect())
    }
}

/// Per-bin image accessor used by the noise analysis.
pub trait ImageSource: Sync {
    fn height(&self) -> usize;
    fn width(&self) -> usize;

    /// Full-extent image of all signal within `mz +/- ppm`.
    fn get_image(&self, mz: f64, ppm: f64) -> Result<Image>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_cube() -> DenseCube {
        let images = (0..5)
            .map(|b| Image {
                height: 2,
                width: 3,
                data: (0..6).map(|p| (b * 10 + p) as f64).collect(),
            })
            .collect();
        DenseCube::try_new(2, 3, images).unwrap()
    }

    #[test]
    fn test_slice_bins_flattens_row_major() {
        let cube = toy_cube();
        let dense = cube.slice_bins(&[3, 1]).unwrap();
        assert_eq!(dense.shape(), (6, 2));
        assert_eq!(dense[(0, 0)], 30.0);
        assert_eq!(dense[(4, 0)], 34.0);
        assert_eq!(dense[(5, 1)], 15.0);
    }

    #[test]
    fn test_slice_out_of_range() {
        let cube = toy_cube();
        let res = cube.slice_bins(&[0, 7]);
        assert!(matches!(
            res,
            Err(crate::NmfError::DataSource(DataSourceError::BinOutOfRange {
                bin: 7,
                num_bins: 5
            }))
        ));
    }

    #[test]
    fn test_streamed_totals_match_dense_totals() {
        struct Streamed(DenseCube);
        impl ChunkedCube for Streamed {
            fn shape(&self) -> CubeShape {
                self.0.shape()
            }
            fn slice_bins(&self, bins: &[usize]) -> Result<DMatrix<f64>> {
                self.0.slice_bins(bins)
            }
        }
        let cube = toy_cube();
        let expected = cube.bin_totals().unwrap();
        let streamed = Streamed(cube).bin_totals().unwrap();
        assert_eq!(expected, streamed);
        assert_eq!(expected[0], 15.0);
    }

    #[test]
    fn test_bin_columns_view() {
        let cube = toy_cube();
        let view = BinColumns::new(&cube, vec![4, 2, 0]);
        assert_eq!(view.num_rows(), 6);
        assert_eq!(view.num_cols(), 3);
        let cols = view.load_columns(1..3).unwrap();
        assert_eq!(cols[(0, 0)], 20.0);
        assert_eq!(cols[(0, 1)], 0.0);
    }

    #[test]
    fn test_clamp_negative() {
        let mut img = Image::try_new(1, 3, vec![-1.0, 0.5, -0.0]).unwrap();
        img.clamp_negative();
        assert_eq!(img.data, vec![0.0, 0.5, -0.0]);
    }
}
