//! Matrix-free operator-vector product.
//!
//! Applies `A = M + K` to a nodal field straight from the coordinate-list
//! store, one node at a time. Node `r` receives `B_n * v[col[n]]` for every
//! entry with `row[n] == r`, and `B_n * v[row[n]]` for every off-diagonal
//! entry with `col[n] == r`. Blocks are symmetric, so the transposed action
//! uses the same block.

use crate::adjacency::NodeAdjacency;
use crate::operator::OperatorStore;
use mpm_model::Dimension;
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;

/// Read access to a per-node vector field, whatever its layout.
pub trait NodalField {
    fn node_count(&self) -> usize;

    fn component(&self, node: usize, axis: usize) -> f64;

    /// Components `0..dim` of `node`, zero beyond.
    #[inline]
    fn node(&self, node: usize, dim: Dimension) -> Vector3<f64> {
        let mut out = Vector3::zeros();
        for axis in 0..dim.components() {
            out[axis] = self.component(node, axis);
        }
        out
    }
}

/// View over a blocked vector (`axis * S + node`).
#[derive(Debug, Clone, Copy)]
pub struct Blocked<'a> {
    data: &'a [f64],
    node_count: usize,
}

impl<'a> Blocked<'a> {
    pub fn new(v: &'a DVector<f64>, node_count: usize) -> Self {
        Self {
            data: v.as_slice(),
            node_count,
        }
    }
}

impl NodalField for Blocked<'_> {
    fn node_count(&self) -> usize {
        self.node_count
    }

    #[inline]
    fn component(&self, node: usize, axis: usize) -> f64 {
        self.data[axis * self.node_count + node]
    }
}

/// `dim x S` matrix layout, one column per node.
impl NodalField for DMatrix<f64> {
    fn node_count(&self) -> usize {
        self.ncols()
    }

    #[inline]
    fn component(&self, node: usize, axis: usize) -> f64 {
        self[(axis, node)]
    }
}

/// `(A v)` restricted to `node`, using the adjacency index.
pub fn node_product<F: NodalField + ?Sized>(
    store: &OperatorStore,
    adjacency: &NodeAdjacency,
    dim: Dimension,
    node: usize,
    field: &F,
) -> Vector3<f64> {
    let mut acc = Vector3::zeros();
    for link in adjacency.links(node) {
        acc += store.block(link.entry, dim) * field.node(link.neighbour, dim);
    }
    acc
}

/// `(A v)` restricted to `node` by scanning the whole pattern twice.
///
/// O(E) per call. Same sum as [`node_product`] up to summation order; kept
/// for callers without an adjacency index and as its reference.
pub fn node_product_scan<F: NodalField + ?Sized>(
    store: &OperatorStore,
    dim: Dimension,
    node: usize,
    field: &F,
) -> Vector3<f64> {
    let rows = store.row_index();
    let cols = store.col_index();
    let mut acc = Vector3::zeros();

    for n in 0..store.len() {
        if rows[n] == node {
            acc += store.block(n, dim) * field.node(cols[n], dim);
        }
    }
    for n in 0..store.len() {
        if cols[n] == node && rows[n] != node {
            acc += store.block(n, dim) * field.node(rows[n], dim);
        }
    }
    acc
}

/// `out = A * field` for every node, in blocked layout.
///
/// Per-node results go through the node-major `scratch` (length S) and are
/// then scattered into `out` (length `dim * S`). With `parallel` set the
/// node loop runs on the rayon pool; each node's sum is independent, so the
/// result is the same either way.
pub fn apply_operator<F: NodalField + Sync + ?Sized>(
    store: &OperatorStore,
    adjacency: &NodeAdjacency,
    dim: Dimension,
    field: &F,
    scratch: &mut [Vector3<f64>],
    out: &mut DVector<f64>,
    parallel: bool,
) {
    let s = scratch.len();
    debug_assert_eq!(out.len(), dim.components() * s);

    if parallel {
        scratch
            .par_iter_mut()
            .enumerate()
            .for_each(|(node, value)| *value = node_product(store, adjacency, dim, node, field));
    } else {
        for (node, value) in scratch.iter_mut().enumerate() {
            *value = node_product(store, adjacency, dim, node, field);
        }
    }

    for axis in 0..dim.components() {
        let block = &mut out.as_mut_slice()[axis * s..(axis + 1) * s];
        for (slot, value) in block.iter_mut().zip(scratch.iter()) {
            *slot = value[axis];
        }
    }
}

/// Diagonal of `A` in blocked layout, written into `out` (length `dim * S`).
///
/// Only self entries touch the diagonal.
pub fn operator_diagonal(store: &OperatorStore, dim: Dimension, node_count: usize, out: &mut DVector<f64>) {
    out.fill(0.0);
    let rows = store.row_index();
    let cols = store.col_index();
    for n in 0..store.len() {
        if rows[n] != cols[n] {
            continue;
        }
        let b = store.block(n, dim);
        for axis in 0..dim.components() {
            out[axis * node_count + rows[n]] += b[(axis, axis)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::EntryCoefficients;
    use approx::assert_relative_eq;

    fn chain_store() -> OperatorStore {
        let mut store = OperatorStore::new();
        store.push_entry(0, 0, EntryCoefficients::normal(1.0, 4.0, 3.0, 2.0).with_shear(0.5, 0.2, 0.1));
        store.push_entry(1, 1, EntryCoefficients::normal(2.0, 5.0, 4.0, 3.0).with_shear(-0.5, 0.0, 0.3));
        store.push_entry(2, 2, EntryCoefficients::normal(1.5, 6.0, 5.0, 4.0));
        store.push_entry(0, 1, EntryCoefficients::normal(0.0, -1.0, -1.5, -0.5).with_shear(0.25, 0.0, 0.0));
        store.push_entry(2, 1, EntryCoefficients::normal(0.0, -2.0, -0.5, -1.0).with_shear(0.0, 0.1, 0.2));
        store
    }

    #[test]
    fn self_entry_on_unit_x_returns_mass_plus_kxx() {
        let mut store = OperatorStore::new();
        store.push_entry(0, 0, EntryCoefficients::normal(1.0, 4.0, 9.0, 0.0));
        let mut adj = NodeAdjacency::new();
        adj.rebuild(&store, 1);

        let v = DMatrix::from_row_slice(2, 1, &[1.0, 0.0]);
        let out = node_product(&store, &adj, Dimension::Two, 0, &v);
        assert_eq!(out, Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(node_product_scan(&store, Dimension::Two, 0, &v), out);
    }

    #[test]
    fn off_diagonal_entry_acts_on_both_nodes() {
        let mut store = OperatorStore::new();
        store.push_entry(0, 1, EntryCoefficients::normal(0.0, 2.0, 3.0, 0.0).with_shear(1.0, 0.0, 0.0));
        let mut adj = NodeAdjacency::new();
        adj.rebuild(&store, 2);

        // node 0 at rest, node 1 moving in x
        let v = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(node_product(&store, &adj, Dimension::Two, 0, &v), Vector3::new(2.0, 1.0, 0.0));
        assert_eq!(node_product(&store, &adj, Dimension::Two, 1, &v), Vector3::zeros());
    }

    #[test]
    fn adjacency_product_matches_double_scan() {
        let store = chain_store();
        let mut adj = NodeAdjacency::new();
        adj.rebuild(&store, 3);

        for dim in [Dimension::Two, Dimension::Three] {
            let d = dim.components();
            let v = DMatrix::from_fn(d, 3, |a, i| 0.3 * a as f64 - 0.7 * i as f64 + 1.0);
            for node in 0..3 {
                let fast = node_product(&store, &adj, dim, node, &v);
                let slow = node_product_scan(&store, dim, node, &v);
                assert_relative_eq!(fast, slow, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn blocked_and_matrix_fields_give_same_product() {
        let store = chain_store();
        let mut adj = NodeAdjacency::new();
        adj.rebuild(&store, 3);

        let blocked = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0, 0.0, -1.0, 0.25, 0.75, 2.0]);
        let matrix = crate::workspace::blocked_to_matrix(&blocked, Dimension::Three);
        let view = Blocked::new(&blocked, 3);

        for node in 0..3 {
            assert_eq!(
                node_product(&store, &adj, Dimension::Three, node, &view),
                node_product(&store, &adj, Dimension::Three, node, &matrix),
            );
        }
    }

    #[test]
    fn apply_matches_assembled_csr() {
        let store = chain_store();
        let mut adj = NodeAdjacency::new();
        adj.rebuild(&store, 3);

        for dim in [Dimension::Two, Dimension::Three] {
            let n = dim.components() * 3;
            let v = DVector::from_fn(n, |k, _| (k as f64 * 0.37).sin());
            let mut scratch = vec![Vector3::zeros(); 3];
            let mut seq = DVector::zeros(n);
            let mut par = DVector::zeros(n);

            apply_operator(&store, &adj, dim, &Blocked::new(&v, 3), &mut scratch, &mut seq, false);
            apply_operator(&store, &adj, dim, &Blocked::new(&v, 3), &mut scratch, &mut par, true);

            let csr = store.to_csr(3, dim).unwrap();
            let reference = &csr * &v;
            assert_relative_eq!(seq, reference, epsilon = 1e-12);
            assert_eq!(seq, par);
        }
    }

    #[test]
    fn diagonal_sums_self_entries_only() {
        let store = chain_store();
        let mut diag = DVector::zeros(6);
        operator_diagonal(&store, Dimension::Two, 3, &mut diag);
        assert_eq!(diag.as_slice(), &[5.0, 7.0, 7.5, 4.0, 6.0, 6.5]);
    }
}
