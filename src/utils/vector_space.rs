use nalgebra::{DMatrix, DVector};

/// Euclidean space of a given dimension, with cached identity and constant
/// vectors. Used for tangent spaces of configuration manifolds.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSpace {
    pub dim: usize,
    pub eye: DMatrix<f64>,
    pub ones: DVector<f64>,
    pub zeros: DVector<f64>,
}

impl VectorSpace {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            eye: DMatrix::identity(dim, dim),
            ones: DVector::from_element(dim, 1.0),
            zeros: DVector::zeros(dim),
        }
    }
}
