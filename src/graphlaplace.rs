//! Graph Laplacian stuff.
//!
//! Adjacency of coordinates inside one tomogram is a box test: two
//! coordinates are connected iff each of the three axis-wise absolute
//! differences is within the distance threshold. This is not a Euclidean
//! ball, pickers bound each axis independently.
//!
//! The number of connected components of the adjacency graph is the
//! multiplicity of the zero eigenvalue of the Laplacian L = D - A, so we
//! take the full dense eigendecomposition of L and keep the near-zero part
//! of the spectrum. Everything is dense f64, matching the float64
//! arithmetic of the numpy computation this reproduces. O(n^2) storage and O(n^3)
//! decomposition, n being the coordinate count of one tomogram.

use ndarray::{Array1, Array2, Axis};

use nalgebra::{DMatrix, SymmetricEigen};

use crate::coordset::Coordinate3D;

/// Scale factor of the near-zero eigenvalue selection threshold.
/// An eigenvalue counts as zero when `|lambda| < ZERO_EIGENVALUE_SCALE / sqrt(n)`
/// with n the number of coordinates of the tomogram group.
/// The formula is a heuristic inherited from the xmipptomo
/// connected-components protocol, with no documented sensitivity analysis. Kept as a named constant so it can be
/// questioned in one place.
pub const ZERO_EIGENVALUE_SCALE: f64 = 1.0e-3;

/// Symmetric 0/1 adjacency matrix of one tomogram group under the box
/// distance rule. The diagonal stays 0, a coordinate is never adjacent to
/// itself. Duplicate positions are kept as distinct rows and simply end up
/// connected to each other.
pub fn adjacency_matrix(coords: &[Coordinate3D], distance_threshold: f64) -> Array2<f64> {
    let nbcoord = coords.len();
    let mut adjacency = Array2::<f64>::zeros((nbcoord, nbcoord));
    for j in 0..nbcoord {
        let cj = coords[j].position();
        for k in (j + 1)..nbcoord {
            let ck = coords[k].position();
            if (cj[0] - ck[0]).abs() <= distance_threshold
                && (cj[1] - ck[1]).abs() <= distance_threshold
                && (cj[2] - ck[2]).abs() <= distance_threshold
            {
                adjacency[[j, k]] = 1.;
                adjacency[[k, j]] = 1.;
            }
        }
    }
    adjacency
} // end of adjacency_matrix

//==========================================================================

/// The unnormalized graph Laplacian L = D - A of one tomogram group,
/// together with the degrees (row sums of A).
pub struct GraphLaplacian {
    laplacian: Array2<f64>,
    degrees: Array1<f64>,
} // end of struct GraphLaplacian

/// Eigendecomposition of the Laplacian. `vectors` stores eigenvectors as
/// columns, column j pairing with `values[j]`. Order of eigenvalues is
/// whatever the solver produces, nothing downstream relies on it.
pub struct LaplacianSpectrum {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
} // end of struct LaplacianSpectrum

impl GraphLaplacian {
    /// build L = D - A from an adjacency matrix
    pub fn from_adjacency(adjacency: &Array2<f64>) -> Self {
        let degrees = adjacency.sum_axis(Axis(1));
        let mut laplacian = -adjacency.clone();
        for i in 0..degrees.len() {
            laplacian[[i, i]] = degrees[i];
        }
        GraphLaplacian { laplacian, degrees }
    } // end of from_adjacency

    pub fn get_nbrow(&self) -> usize {
        self.degrees.len()
    }

    pub fn get_degrees(&self) -> &Array1<f64> {
        &self.degrees
    }

    pub fn get_matrix(&self) -> &Array2<f64> {
        &self.laplacian
    }

    /// full dense eigendecomposition. L is real symmetric so the spectrum
    /// is real, there is no imaginary part to strip.
    pub fn eigen_decompose(&self) -> LaplacianSpectrum {
        let nbrow = self.get_nbrow();
        log::debug!("GraphLaplacian doing full eigendecomposition, size {}", nbrow);
        let mat = DMatrix::<f64>::from_row_iterator(nbrow, nbrow, self.laplacian.iter().cloned());
        let eigen = SymmetricEigen::new(mat);
        let values = Array1::<f64>::from_iter(eigen.eigenvalues.iter().cloned());
        let vectors =
            Array2::<f64>::from_shape_fn((nbrow, nbrow), |(i, j)| eigen.eigenvectors[(i, j)]);
        LaplacianSpectrum { values, vectors }
    } // end of eigen_decompose
} // end of impl GraphLaplacian

impl LaplacianSpectrum {
    /// indices of the near-zero eigenvalues for a tomogram group of
    /// `set_len` coordinates. Their count is the expected number of
    /// connected components, up to the tolerance heuristic
    /// [ZERO_EIGENVALUE_SCALE].
    pub fn near_zero_indices(&self, set_len: usize) -> Vec<usize> {
        let epsil = ZERO_EIGENVALUE_SCALE / (set_len as f64).sqrt();
        let indices: Vec<usize> = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.abs() < epsil)
            .map(|(i, _)| i)
            .collect();
        log::debug!(
            "near_zero_indices : {} eigenvalues below {:.3e} out of {}",
            indices.len(),
            epsil,
            self.values.len()
        );
        indices
    } // end of near_zero_indices
} // end of impl LaplacianSpectrum

//==========================================================================

// end of mod tests
