//! Conjugate Gradient driver for the implicit MPM velocity solve.
//!
//! Solves `(M + K) v = f` for the nodal velocities of the active grid nodes:
//!
//! ```text
//! v = v_nodes                      (Init)
//! r = f - A v                      (ResidualComputed)
//! z = D^-1 r,  P = z,  rho = r.z
//!
//! for k in 1..=max_iterations:     (Iterating)
//!     w     = A P
//!     alpha = rho / (P.w)
//!     v     = v + alpha P
//!     r     = r - alpha w
//!     if max |r_i| <= tol: converged
//!     z     = D^-1 r
//!     beta  = (r.z) / rho
//!     rho   = r.z
//!     P     = z + beta P
//! ```
//!
//! `D` is the operator diagonal with [`Preconditioner::Jacobi`] and the
//! identity with [`Preconditioner::None`]. The converged velocity is written
//! back to the nodes; on any other outcome the nodes are left untouched.

use std::sync::atomic::{AtomicBool, Ordering};

use mpm_model::{Dimension, GridNode};
use tracing::{debug, trace, warn};

use crate::adjacency::NodeAdjacency;
use crate::config::{Preconditioner, SolverConfig};
use crate::error::{Result, SolverError};
use crate::operator::OperatorStore;
use crate::product::{apply_operator, operator_diagonal, Blocked};
use crate::residual::{compute_residual, max_abs, within_tolerance};
use crate::workspace::{gather_node, scatter_node, Workspace};

/// How a solve ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Every residual component within tolerance
    Converged,
    /// Iteration cap exhausted
    IterationCapReached,
    /// Degenerate step (`P.w <= 0` or a non-finite scalar)
    Breakdown,
    /// Cancellation flag raised by the caller
    Cancelled,
}

/// Driver state, traced as the solve advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvePhase {
    Init,
    ResidualComputed,
    Iterating,
    Finished(ConvergenceStatus),
}

/// Outcome of one solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub status: ConvergenceStatus,
    /// CG iterations performed (0 if the initial guess already converged)
    pub iterations: usize,
    /// Euclidean norm of the initial residual
    pub initial_residual_norm: f64,
    /// Euclidean norm of the final residual
    pub residual_norm: f64,
    /// Largest final residual component magnitude
    pub max_residual: f64,
    /// Residual norm after each iteration, when recording is enabled
    pub residual_history: Vec<f64>,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

/// Implicit velocity solver: operator store, workspace and CG driver.
///
/// Per timestep: [`initialise`](Self::initialise), [`resize`](Self::resize)
/// to the active node count, let the assembler fill
/// [`operator_mut`](Self::operator_mut) and the forces in
/// [`workspace_mut`](Self::workspace_mut), then [`solve`](Self::solve).
#[derive(Debug, Clone, Default)]
pub struct ImplicitSolver {
    config: SolverConfig,
    operator: OperatorStore,
    workspace: Workspace,
    adjacency: NodeAdjacency,
}

impl ImplicitSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    /// Empty the operator and the workspace for a new timestep.
    pub fn initialise(&mut self) {
        self.operator.initialise();
        self.workspace.initialise();
    }

    /// Size the workspace for `node_count` active nodes.
    pub fn resize(&mut self, node_count: usize, dimension: Dimension) {
        self.workspace.resize(node_count, dimension);
    }

    pub fn operator(&self) -> &OperatorStore {
        &self.operator
    }

    pub fn operator_mut(&mut self) -> &mut OperatorStore {
        &mut self.operator
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    /// Solve for the velocities of `nodes` and write them back on convergence.
    ///
    /// `nodes[i]` is active node `i`. Errors are precondition violations
    /// only; non-convergence is reported through [`SolveReport::status`].
    pub fn solve<N: GridNode>(&mut self, nodes: &mut [N]) -> Result<SolveReport> {
        self.run(nodes, None)
    }

    /// [`solve`](Self::solve), checking `cancel` once per iteration.
    pub fn solve_with_cancellation<N: GridNode>(
        &mut self,
        nodes: &mut [N],
        cancel: &AtomicBool,
    ) -> Result<SolveReport> {
        self.run(nodes, Some(cancel))
    }

    fn run<N: GridNode>(&mut self, nodes: &mut [N], cancel: Option<&AtomicBool>) -> Result<SolveReport> {
        self.config.validate()?;

        let s = self.workspace.node_count;
        if nodes.len() != s {
            return Err(SolverError::NodeCountMismatch {
                expected: s,
                found: nodes.len(),
            });
        }
        self.operator.validate(s)?;

        let dim = self.workspace.dimension;
        let tol = self.config.tolerance;
        let parallel = s >= self.config.parallel_threshold;
        debug!(
            nodes = s,
            entries = self.operator.len(),
            dimension = dim.components(),
            parallel,
            "starting implicit velocity solve"
        );

        let mut phase = SolvePhase::Init;
        trace!(?phase);
        self.adjacency.rebuild(&self.operator, s);
        for (i, node) in nodes.iter().enumerate() {
            scatter_node(&mut self.workspace.velocity, s, dim, i, node.velocity());
        }
        self.prepare_preconditioner();

        let initial_residual_norm =
            compute_residual(&self.operator, &self.adjacency, &mut self.workspace, parallel);
        phase = SolvePhase::ResidualComputed;
        trace!(?phase, residual = initial_residual_norm);

        let mut history = Vec::new();
        if self.config.record_history {
            history.reserve(self.config.max_iterations.min(1024));
        }

        let op = &self.operator;
        let adj = &self.adjacency;
        let ws = &mut self.workspace;

        let mut iterations = 0;
        let status = if within_tolerance(&ws.residual, tol) {
            ConvergenceStatus::Converged
        } else {
            phase = SolvePhase::Iterating;
            trace!(?phase);

            precondition(ws);
            ws.direction.copy_from(&ws.preconditioned);
            let mut rho = ws.residual.dot(&ws.preconditioned);
            let mut status = ConvergenceStatus::IterationCapReached;

            for iter in 1..=self.config.max_iterations {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    status = ConvergenceStatus::Cancelled;
                    break;
                }
                iterations = iter;

                apply_operator(
                    op,
                    adj,
                    dim,
                    &Blocked::new(&ws.direction, s),
                    &mut ws.node_major,
                    &mut ws.product,
                    parallel,
                );

                let pw = ws.direction.dot(&ws.product);
                let alpha = rho / pw;
                if !pw.is_finite() || pw <= 0.0 || !alpha.is_finite() {
                    warn!(iteration = iter, pw, rho, "degenerate CG step length");
                    status = ConvergenceStatus::Breakdown;
                    break;
                }

                ws.velocity.axpy(alpha, &ws.direction, 1.0);
                ws.residual.axpy(-alpha, &ws.product, 1.0);

                let norm = ws.residual.norm();
                if self.config.record_history {
                    history.push(norm);
                }
                trace!(iteration = iter, residual = norm, alpha);

                if within_tolerance(&ws.residual, tol) {
                    status = ConvergenceStatus::Converged;
                    break;
                }

                precondition(ws);
                let rho_new = ws.residual.dot(&ws.preconditioned);
                let beta = rho_new / rho;
                if !beta.is_finite() {
                    warn!(iteration = iter, rho, rho_new, "degenerate CG direction update");
                    status = ConvergenceStatus::Breakdown;
                    break;
                }
                rho = rho_new;
                ws.direction.axpy(1.0, &ws.preconditioned, beta);
            }
            status
        };
        phase = SolvePhase::Finished(status);
        trace!(?phase);

        let residual_norm = ws.residual.norm();
        let max_residual = max_abs(&ws.residual);

        match status {
            ConvergenceStatus::Converged => {
                for (i, node) in nodes.iter_mut().enumerate() {
                    node.set_velocity(gather_node(&ws.velocity, s, dim, i));
                }
                debug!(iterations, residual = residual_norm, "implicit velocity solve converged");
            }
            ConvergenceStatus::IterationCapReached => {
                warn!(
                    iterations,
                    residual = residual_norm,
                    max_residual,
                    "implicit velocity solve did not converge"
                );
            }
            ConvergenceStatus::Breakdown | ConvergenceStatus::Cancelled => {
                warn!(?status, iterations, residual = residual_norm, "implicit velocity solve stopped");
            }
        }

        Ok(SolveReport {
            status,
            iterations,
            initial_residual_norm,
            residual_norm,
            max_residual,
            residual_history: history,
        })
    }

    /// Fill `inverse_diagonal` for the configured preconditioner.
    fn prepare_preconditioner(&mut self) {
        let ws = &mut self.workspace;
        match self.config.preconditioner {
            Preconditioner::None => ws.inverse_diagonal.fill(1.0),
            Preconditioner::Jacobi => {
                operator_diagonal(&self.operator, ws.dimension, ws.node_count, &mut ws.inverse_diagonal);
                // Zero or non-finite diagonal entries fall back to the identity.
                ws.inverse_diagonal.apply(|d| {
                    *d = if d.is_finite() && d.abs() > f64::EPSILON {
                        1.0 / *d
                    } else {
                        1.0
                    }
                });
            }
        }
    }
}

/// `z = D^-1 r`
#[inline]
fn precondition(ws: &mut Workspace) {
    ws.preconditioned.copy_from(&ws.residual);
    ws.preconditioned.component_mul_assign(&ws.inverse_diagonal);
}
