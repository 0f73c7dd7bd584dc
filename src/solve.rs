//! Sparse symmetric solvers for the constrained harmonic systems.
//!
//! The systems handed in here are positive semi-definite (negated
//! Laplacian sub-blocks) and usually well conditioned once at least one
//! Dirichlet vertex pins each island. The backend is a trait so callers
//! can swap the solver without touching the pipeline.

use sprs::CsMat;
use tracing::{debug, trace};

/// Why a solve did not converge.
#[derive(Debug, Clone, Copy)]
pub struct SolveFailure {
    /// Iterations performed before giving up.
    pub iterations: usize,
    /// Residual norm at the last iteration, may be NaN.
    pub residual: f64,
}

impl std::fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no convergence after {} iterations (residual {:.3e})",
            self.iterations, self.residual
        )
    }
}

/// A solver for sparse symmetric positive (semi-)definite systems `A x = b`.
pub trait SparseSolverBackend: Send + Sync {
    /// Backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Solve `A x = b`. `A` is square CSR, symmetric, positive
    /// semi-definite.
    fn solve(&self, a: &CsMat<f64>, b: &[f64]) -> Result<Vec<f64>, SolveFailure>;
}

/// Sparse matrix-vector product for CSR matrices.
pub(crate) fn mul_vec(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0; a.rows()];
    for (i, row) in a.outer_iterator().enumerate() {
        let mut sum = 0.0;
        for (j, &v) in row.iter() {
            sum += v * x[j];
        }
        y[i] = sum;
    }
    y
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Jacobi-preconditioned conjugate gradient. The default backend.
#[derive(Debug, Clone)]
pub struct ConjugateGradient {
    /// Relative residual tolerance.
    pub tolerance: f64,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 10_000,
        }
    }
}

impl SparseSolverBackend for ConjugateGradient {
    fn name(&self) -> &'static str {
        "conjugate-gradient"
    }

    fn solve(&self, a: &CsMat<f64>, b: &[f64]) -> Result<Vec<f64>, SolveFailure> {
        let n = b.len();
        let b_norm = dot(b, b).sqrt();
        if b_norm == 0.0 {
            return Ok(vec![0.0; n]);
        }

        // Jacobi preconditioner: inverse diagonal, with a floor for
        // (near-)zero entries.
        let mut inv_diag = vec![1.0; n];
        for (i, row) in a.outer_iterator().enumerate() {
            if let Some(&d) = row.get(i) {
                if d.abs() > 1e-12 {
                    inv_diag[i] = 1.0 / d;
                }
            }
        }

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, di)| ri * di).collect();
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        for iteration in 0..self.max_iterations {
            let ap = mul_vec(a, &p);
            let pap = dot(&p, &ap);
            if !pap.is_finite() || pap.abs() < f64::MIN_POSITIVE {
                return Err(SolveFailure {
                    iterations: iteration,
                    residual: dot(&r, &r).sqrt(),
                });
            }

            let alpha = rz / pap;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }

            let r_norm = dot(&r, &r).sqrt();
            if !r_norm.is_finite() {
                return Err(SolveFailure {
                    iterations: iteration,
                    residual: r_norm,
                });
            }
            if r_norm <= self.tolerance * b_norm {
                trace!(iterations = iteration + 1, residual = r_norm, "CG converged");
                return Ok(x);
            }

            for i in 0..n {
                z[i] = r[i] * inv_diag[i];
            }
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Err(SolveFailure {
            iterations: self.max_iterations,
            residual: dot(&r, &r).sqrt(),
        })
    }
}

/// Gauss-Seidel relaxation. Simpler and slower than CG; useful as a
/// cross-check and for systems where the diagonal strongly dominates.
#[derive(Debug, Clone)]
pub struct GaussSeidel {
    /// Convergence threshold on the largest per-entry update.
    pub tolerance: f64,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for GaussSeidel {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 20_000,
        }
    }
}

impl SparseSolverBackend for GaussSeidel {
    fn name(&self) -> &'static str {
        "gauss-seidel"
    }

    fn solve(&self, a: &CsMat<f64>, b: &[f64]) -> Result<Vec<f64>, SolveFailure> {
        let n = b.len();
        if b.iter().all(|&v| v == 0.0) {
            return Ok(vec![0.0; n]);
        }

        let mut x = vec![0.0; n];
        let mut max_delta = f64::MAX;

        for iteration in 0..self.max_iterations {
            max_delta = 0.0;
            for (i, row) in a.outer_iterator().enumerate() {
                let mut sum = b[i];
                let mut diag = 0.0;
                for (j, &v) in row.iter() {
                    if j == i {
                        diag = v;
                    } else {
                        sum -= v * x[j];
                    }
                }
                if diag.abs() < 1e-12 {
                    continue;
                }
                let new_x = sum / diag;
                let delta = (new_x - x[i]).abs();
                if delta > max_delta {
                    max_delta = delta;
                }
                x[i] = new_x;
            }

            if !max_delta.is_finite() {
                return Err(SolveFailure {
                    iterations: iteration,
                    residual: max_delta,
                });
            }
            if max_delta < self.tolerance {
                debug!(
                    iterations = iteration + 1,
                    "Gauss-Seidel converged"
                );
                return Ok(x);
            }
        }

        Err(SolveFailure {
            iterations: self.max_iterations,
            residual: max_delta,
        })
    }
}
