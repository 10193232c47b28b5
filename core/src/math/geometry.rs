use ndarray::{Array1, Array2, Axis};

/// Planar geometry over `(easting, northing)` rows.
pub struct GeometryHelper;

impl GeometryHelper {
    pub fn to_matrix(points: &[(f64, f64)]) -> Array2<f64> {
        let mut matrix = Array2::zeros((points.len(), 2));
        for (row, (easting, northing)) in points.iter().enumerate() {
            matrix[[row, 0]] = *easting;
            matrix[[row, 1]] = *northing;
        }
        matrix
    }

    pub fn centroid(points: &[(f64, f64)]) -> Option<(f64, f64)> {
        let centre: Array1<f64> = Self::to_matrix(points).mean_axis(Axis(0))?;
        Some((centre[0], centre[1]))
    }

    pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - b.0).hypot(a.1 - b.1)
    }

    /// Symmetric distance matrix between every pair of points.
    pub fn pairwise_distances(points: &[(f64, f64)]) -> Array2<f64> {
        let n = points.len();
        let mut distances = Array2::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let d = Self::distance(points[i], points[j]);
                distances[[i, j]] = d;
                distances[[j, i]] = d;
            }
        }
        distances
    }

    pub fn min_pairwise_distance(points: &[(f64, f64)]) -> Option<f64> {
        if points.len() < 2 {
            return None;
        }
        let distances = Self::pairwise_distances(points);
        let n = points.len();
        (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| distances[[i, j]])
            .reduce(f64::min)
    }
}
