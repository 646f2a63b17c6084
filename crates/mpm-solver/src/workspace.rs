//! Blocked vector workspace.
//!
//! Every per-node vector of the solve lives here in blocked layout: a flat
//! `DVector` of length `dim * S` holding all x components, then all y
//! components, then (3D) all z components. Index of component `axis` of node
//! `i` is `axis * S + i`.
//!
//! Buffers are sized once by [`Workspace::resize`] and reused by every CG
//! iteration; nothing in the iteration loop allocates.

use mpm_model::Dimension;
use nalgebra::{DMatrix, DVector, Vector3};

#[derive(Debug, Clone)]
pub struct Workspace {
    pub(crate) dimension: Dimension,
    pub(crate) node_count: usize,
    /// External minus internal nodal force (right-hand side)
    pub(crate) force: DVector<f64>,
    /// Velocity iterate
    pub(crate) velocity: DVector<f64>,
    /// `force - A * velocity`
    pub(crate) residual: DVector<f64>,
    /// CG search direction (P)
    pub(crate) direction: DVector<f64>,
    /// Operator applied to the search direction (w)
    pub(crate) product: DVector<f64>,
    /// Preconditioned residual (z)
    pub(crate) preconditioned: DVector<f64>,
    /// Reciprocal operator diagonal for Jacobi scaling
    pub(crate) inverse_diagonal: DVector<f64>,
    /// Node-major scratch for the operator product
    pub(crate) node_major: Vec<Vector3<f64>>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Empty 2D workspace
    pub fn new() -> Self {
        Self {
            dimension: Dimension::Two,
            node_count: 0,
            force: DVector::zeros(0),
            velocity: DVector::zeros(0),
            residual: DVector::zeros(0),
            direction: DVector::zeros(0),
            product: DVector::zeros(0),
            preconditioned: DVector::zeros(0),
            inverse_diagonal: DVector::zeros(0),
            node_major: Vec::new(),
        }
    }

    /// Drop all per-node state. The dimension is kept.
    pub fn initialise(&mut self) {
        self.resize(0, self.dimension);
    }

    /// Size every buffer for `node_count` active nodes in `dimension`,
    /// zero-filled.
    pub fn resize(&mut self, node_count: usize, dimension: Dimension) {
        let n = dimension.components() * node_count;
        self.dimension = dimension;
        self.node_count = node_count;
        for buffer in [
            &mut self.force,
            &mut self.velocity,
            &mut self.residual,
            &mut self.direction,
            &mut self.product,
            &mut self.preconditioned,
            &mut self.inverse_diagonal,
        ] {
            *buffer = DVector::zeros(n);
        }
        self.node_major.clear();
        self.node_major.resize(node_count, Vector3::zeros());
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Active node count (S).
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Length of every blocked buffer, `dim * S`.
    pub fn blocked_len(&self) -> usize {
        self.dimension.components() * self.node_count
    }

    pub fn force(&self) -> &DVector<f64> {
        &self.force
    }

    /// Force components along `axis` for all nodes.
    pub fn force_axis(&self, axis: usize) -> &[f64] {
        let s = self.node_count;
        &self.force.as_slice()[axis * s..(axis + 1) * s]
    }

    pub fn force_axis_mut(&mut self, axis: usize) -> &mut [f64] {
        let s = self.node_count;
        &mut self.force.as_mut_slice()[axis * s..(axis + 1) * s]
    }

    pub fn add_force(&mut self, node: usize, axis: usize, value: f64) {
        self.force[axis * self.node_count + node] += value;
    }

    /// Set the whole force of `node`; z is ignored in 2D.
    pub fn set_force(&mut self, node: usize, force: Vector3<f64>) {
        scatter_node(&mut self.force, self.node_count, self.dimension, node, force);
    }

    pub fn velocity(&self) -> &DVector<f64> {
        &self.velocity
    }

    pub fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    pub fn direction(&self) -> &DVector<f64> {
        &self.direction
    }

    /// Velocity iterate of one node.
    pub fn node_velocity(&self, node: usize) -> Vector3<f64> {
        gather_node(&self.velocity, self.node_count, self.dimension, node)
    }

    /// Velocity iterate as a `dim x S` matrix, one column per node.
    pub fn velocity_matrix(&self) -> DMatrix<f64> {
        blocked_to_matrix(&self.velocity, self.dimension)
    }
}

/// Read node `node` out of a blocked vector.
#[inline]
pub fn gather_node(v: &DVector<f64>, node_count: usize, dim: Dimension, node: usize) -> Vector3<f64> {
    let mut out = Vector3::zeros();
    for axis in 0..dim.components() {
        out[axis] = v[axis * node_count + node];
    }
    out
}

/// Write node `node` into a blocked vector; components beyond `dim` are
/// dropped.
#[inline]
pub fn scatter_node(
    v: &mut DVector<f64>,
    node_count: usize,
    dim: Dimension,
    node: usize,
    value: Vector3<f64>,
) {
    for axis in 0..dim.components() {
        v[axis * node_count + node] = value[axis];
    }
}

/// Blocked vector to `dim x S` matrix.
///
/// # Panics
/// If the vector length is not a multiple of the component count.
pub fn blocked_to_matrix(v: &DVector<f64>, dim: Dimension) -> DMatrix<f64> {
    let d = dim.components();
    assert_eq!(v.len() % d, 0, "blocked vector length {} not divisible by {}", v.len(), d);
    let s = v.len() / d;
    DMatrix::from_fn(d, s, |axis, node| v[axis * s + node])
}

/// `dim x S` matrix back to a blocked vector.
pub fn matrix_to_blocked(m: &DMatrix<f64>) -> DVector<f64> {
    let s = m.ncols();
    DVector::from_fn(m.nrows() * s, |k, _| m[(k / s, k % s)])
}
