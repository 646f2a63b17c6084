//! Solver configuration.

use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};

/// Preconditioner applied to the residual each CG iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preconditioner {
    /// Plain CG, `z = r`
    None,
    /// Diagonal scaling, `z_i = r_i / A_ii`
    Jacobi,
}

/// Implicit velocity solve configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of CG iterations
    pub max_iterations: usize,
    /// Absolute bound on every residual component
    pub tolerance: f64,
    /// Residual preconditioner
    pub preconditioner: Preconditioner,
    /// Keep the residual norm of every iteration in the report
    pub record_history: bool,
    /// Active node count from which the operator product runs on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1_000_000,
            tolerance: 0.01,
            preconditioner: Preconditioner::Jacobi,
            record_history: false,
            parallel_threshold: 4096,
        }
    }
}

impl SolverConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_preconditioner(mut self, preconditioner: Preconditioner) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    pub fn with_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }

    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Reject settings the CG loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(SolverError::InvalidConfig {
                name: "tolerance",
                value: self.tolerance.to_string(),
                expected: "positive finite value",
            });
        }
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidConfig {
                name: "max_iterations",
                value: "0".into(),
                expected: ">= 1",
            });
        }
        Ok(())
    }
}
