//! Implicit velocity solve for Material Point Method grids.
//!
//! Given lumped nodal mass, a symmetric stiffness operator and nodal forces
//! for the active grid nodes of a timestep, finds the nodal velocities that
//! satisfy the discretised momentum balance `(M + K) v = f` with a
//! matrix-free Conjugate Gradient iteration, and writes them back to the
//! nodes.
//!
//! # Architecture
//!
//! ```text
//! Assembler (external) ──► OperatorStore (COO pattern + coefficient channels)
//!                          Workspace     (blocked force / velocity / residual)
//!                                │
//!                                ▼
//!                   NodeAdjacency ──► product (A·v per node, no matrix)
//!                                │
//!                                ▼
//!                   residual (r = f − A·v, |r_i| <= tol)
//!                                │
//!                                ▼
//!                   cg::ImplicitSolver ──► GridNode::set_velocity
//! ```
//!
//! # Example
//!
//! ```
//! use mpm_model::{Dimension, Node};
//! use mpm_solver::{EntryCoefficients, ImplicitSolver, SolverConfig};
//!
//! let mut solver = ImplicitSolver::new(SolverConfig::default());
//! solver.initialise();
//! solver.resize(2, Dimension::Two);
//!
//! let op = solver.operator_mut();
//! op.push_entry(0, 0, EntryCoefficients::normal(1.0, 4.0, 4.0, 0.0));
//! op.push_entry(1, 1, EntryCoefficients::normal(1.0, 4.0, 4.0, 0.0));
//! solver.workspace_mut().force_axis_mut(0).copy_from_slice(&[5.0, 5.0]);
//!
//! let mut nodes = vec![Node::new(0, 1.0), Node::new(1, 1.0)];
//! let report = solver.solve(&mut nodes).expect("well-formed system");
//!
//! assert!(report.converged());
//! assert!((nodes[0].velocity.x - 1.0).abs() < 1e-12);
//! ```

pub mod adjacency;
pub mod cg;
pub mod config;
pub mod error;
pub mod operator;
pub mod product;
pub mod residual;
pub mod workspace;

pub use adjacency::{Link, NodeAdjacency};
pub use cg::{ConvergenceStatus, ImplicitSolver, SolvePhase, SolveReport};
pub use config::{Preconditioner, SolverConfig};
pub use error::{Result, SolverError};
pub use operator::{EntryCoefficients, OperatorStore};
pub use product::{apply_operator, node_product, node_product_scan, operator_diagonal, Blocked, NodalField};
pub use residual::{compute_residual, max_abs, within_tolerance};
pub use workspace::{blocked_to_matrix, gather_node, matrix_to_blocked, scatter_node, Workspace};
