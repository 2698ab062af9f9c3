use thiserror::Error;

pub type Result<T> = std::result::Result<T, LqrError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LqrError {
    #[error("{matrix} should be {expected:?} but is {found:?}")]
    DimensionMismatch {
        matrix: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("{0} is singular")]
    Singular(&'static str),
    #[error("{method} did not converge after {iterations} iterations")]
    NoConvergence {
        method: &'static str,
        iterations: usize,
    },
    #[error("{method} converged to a solution that does not stabilize the closed loop")]
    NotStabilizing { method: &'static str },
    #[error("least squares solve failed: {0}")]
    LeastSquares(&'static str),
    #[error("{matrix} must be 1x1 but is {rows}x{cols}")]
    NotScalar {
        matrix: &'static str,
        rows: usize,
        cols: usize,
    },
}
