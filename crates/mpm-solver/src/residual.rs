//! Residual and convergence evaluation.
//!
//! - **Residual**: `r = f - A * v` over every active node, blocked layout
//! - **Convergence**: every component satisfies `|r_i| <= tol`
//!
//! The tolerance is absolute, not scaled by the force magnitude, so forces
//! and masses must be supplied in consistent units for it to mean anything.

use crate::adjacency::NodeAdjacency;
use crate::operator::OperatorStore;
use crate::product::{apply_operator, Blocked};
use crate::workspace::Workspace;
use nalgebra::DVector;

/// Fill `workspace.residual` with `force - A * velocity`.
///
/// Uses `workspace.product` as the destination of the operator product.
/// Returns the Euclidean norm of the residual.
pub fn compute_residual(
    store: &OperatorStore,
    adjacency: &NodeAdjacency,
    workspace: &mut Workspace,
    parallel: bool,
) -> f64 {
    let Workspace {
        dimension,
        node_count,
        force,
        velocity,
        residual,
        product,
        node_major,
        ..
    } = workspace;

    apply_operator(
        store,
        adjacency,
        *dimension,
        &Blocked::new(velocity, *node_count),
        node_major,
        product,
        parallel,
    );

    residual.copy_from(force);
    *residual -= &*product;
    residual.norm()
}

/// `false` as soon as any component exceeds `tolerance` in magnitude.
///
/// Non-finite components never pass.
pub fn within_tolerance(residual: &DVector<f64>, tolerance: f64) -> bool {
    residual.iter().all(|r| r.abs() <= tolerance)
}

/// Largest component magnitude (infinity norm); zero for an empty vector.
pub fn max_abs(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |m: f64, x| m.max(x.abs()))
}
