use nalgebra::{DMatrix, DVector};

use crate::error::{LqrError, Result};

fn scalar(matrix: &'static str, m: &DMatrix<f64>) -> Result<f64> {
    if m.shape() != (1, 1) {
        return Err(LqrError::NotScalar {
            matrix,
            rows: m.nrows(),
            cols: m.ncols(),
        });
    }
    Ok(m[(0, 0)])
}

/// Sum of discounted stage costs `x q x + u r u` over `horizon` steps of the
/// closed loop `u = -k x`, `x' = a x + b u`, one entry per initial condition
/// in `xs`.
#[allow(clippy::too_many_arguments)]
pub fn scalar_loss(
    a: f64,
    b: f64,
    q: f64,
    r: f64,
    k: f64,
    xs: &DVector<f64>,
    horizon: usize,
    gamma: f64,
) -> DVector<f64> {
    let mut xs = xs.clone();
    let mut v = DVector::zeros(xs.len());
    for j in 0..horizon {
        let us = &xs * -k;
        v += (xs.component_mul(&xs) * q + us.component_mul(&us) * r) * gamma.powi(j as i32);
        xs = &xs * a + &us * b;
    }
    v
}

/// Discounted loss of the closed loop from a batch of initial conditions.
///
/// Only defined for a scalar state and a scalar control: every matrix must be
/// 1x1. It is the reference the learned value function is compared against.
#[allow(clippy::too_many_arguments)]
pub fn true_loss(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    k: &DMatrix<f64>,
    xs: &DVector<f64>,
    horizon: usize,
    gamma: f64,
) -> Result<DVector<f64>> {
    Ok(scalar_loss(
        scalar("A", a)?,
        scalar("B", b)?,
        scalar("Q", q)?,
        scalar("R", r)?,
        scalar("K", k)?,
        xs,
        horizon,
        gamma,
    ))
}
