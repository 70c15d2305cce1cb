use serde::{
    Deserialize,
    Serialize,
};

/// One m/z bin: its center and the +/- ppm tolerance around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MzBin {
    pub mz: f64,
    pub ppm: f64,
}

impl MzBin {
    pub fn new(mz: f64, ppm: f64) -> Self {
        Self { mz, ppm }
    }

    pub fn lower(&self) -> f64 {
        self.mz * (1.0 - self.ppm * 1e-6)
    }

    pub fn upper(&self) -> f64 {
        self.mz * (1.0 + self.ppm * 1e-6)
    }
}

/// Ordered m/z axis, positionally aligned with the bin axis of a cube.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MzAxis(Vec<MzBin>);

impl MzAxis {
    pub fn new(bins: Vec<MzBin>) -> Self {
        Self(bins)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&MzBin> {
        self.0.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MzBin> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[MzBin] {
        &self.0
    }
}

impl From<Vec<(f64, f64)>> for MzAxis {
    fn from(pairs: Vec<(f64, f64)>) -> Self {
        Self(pairs.into_iter().map(|(mz, ppm)| MzBin { mz, ppm }).collect())
    }
}

impl<'a> IntoIterator for &'a MzAxis {
    type Item = &'a MzBin;
    type IntoIter = std::slice::Iter<'a, MzBin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
