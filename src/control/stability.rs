use nalgebra::{Complex, DMatrix, DVector};

/// Eigenvalues of the closed loop system `A - BK`
pub fn closed_loop_eigenvalues(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    k: &DMatrix<f64>,
) -> DVector<Complex<f64>> {
    (a - b * k).complex_eigenvalues()
}

/// Continuous time: every eigenvalue in the open left half plane
pub fn is_stable_continuous(eigenvalues: &DVector<Complex<f64>>) -> bool {
    eigenvalues.iter().all(|lambda| lambda.re < 0.0)
}

/// Discrete time: every eigenvalue strictly inside the unit circle
pub fn is_stable_discrete(eigenvalues: &DVector<Complex<f64>>) -> bool {
    eigenvalues.iter().all(|lambda| lambda.norm_sqr() < 1.0)
}
