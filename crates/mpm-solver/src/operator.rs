//! Sparse operator store.
//!
//! Holds the coordinate-list pattern of the implicit velocity operator
//! `A = M + K` together with one coefficient channel per mass/stiffness
//! component. Only one triangle of the symmetric operator is stored: entry
//! `n` couples node `row[n]` with node `col[n]` through the symmetric block
//!
//! ```text
//!       | Kxx+M  Kxy    Kxz   |
//! B_n = | Kxy    Kyy+M  Kyz   |      (upper-left 2x2 in 2D)
//!       | Kxz    Kyz    Kzz+M |
//! ```
//!
//! and, when `row[n] != col[n]`, also acts transposed from `col[n]` back to
//! `row[n]`. Self entries act once.
//!
//! Channels are private and only grow together through
//! [`OperatorStore::push_entry`], so the pattern and every channel always
//! have the same length.

use crate::error::{Result, SolverError};
use mpm_model::Dimension;
use nalgebra::Matrix3;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Mass and stiffness coefficients of one pattern entry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryCoefficients {
    /// Lumped mass
    pub mass: f64,
    pub kxx: f64,
    pub kyy: f64,
    pub kzz: f64,
    pub kxy: f64,
    pub kxz: f64,
    pub kyz: f64,
}

impl EntryCoefficients {
    /// Mass-only entry (diagonal lumped mass)
    pub fn mass(mass: f64) -> Self {
        Self {
            mass,
            ..Self::default()
        }
    }

    /// Normal stiffness plus mass, no shear coupling
    pub fn normal(mass: f64, kxx: f64, kyy: f64, kzz: f64) -> Self {
        Self {
            mass,
            kxx,
            kyy,
            kzz,
            ..Self::default()
        }
    }

    pub fn with_shear(mut self, kxy: f64, kxz: f64, kyz: f64) -> Self {
        self.kxy = kxy;
        self.kxz = kxz;
        self.kyz = kyz;
        self
    }

    /// The symmetric `dim x dim` block this entry contributes; rows and
    /// columns beyond `dim` are zero.
    #[rustfmt::skip]
    pub fn block(&self, dim: Dimension) -> Matrix3<f64> {
        let m = self.mass;
        match dim {
            Dimension::Two => Matrix3::new(
                self.kxx + m, self.kxy, 0.0,
                self.kxy, self.kyy + m, 0.0,
                0.0, 0.0, 0.0,
            ),
            Dimension::Three => Matrix3::new(
                self.kxx + m, self.kxy, self.kxz,
                self.kxy, self.kyy + m, self.kyz,
                self.kxz, self.kyz, self.kzz + m,
            ),
        }
    }
}

/// Coordinate-list pattern with parallel coefficient channels
#[derive(Debug, Clone, Default)]
pub struct OperatorStore {
    row_index: Vec<usize>,
    col_index: Vec<usize>,
    mass: Vec<f64>,
    kxx: Vec<f64>,
    kyy: Vec<f64>,
    kzz: Vec<f64>,
    kxy: Vec<f64>,
    kxz: Vec<f64>,
    kyz: Vec<f64>,
}

impl OperatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the pattern and every channel. Capacity is kept for the next
    /// timestep.
    pub fn initialise(&mut self) {
        self.row_index.clear();
        self.col_index.clear();
        self.mass.clear();
        self.kxx.clear();
        self.kyy.clear();
        self.kzz.clear();
        self.kxy.clear();
        self.kxz.clear();
        self.kyz.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.row_index.reserve(additional);
        self.col_index.reserve(additional);
        self.mass.reserve(additional);
        self.kxx.reserve(additional);
        self.kyy.reserve(additional);
        self.kzz.reserve(additional);
        self.kxy.reserve(additional);
        self.kxz.reserve(additional);
        self.kyz.reserve(additional);
    }

    /// Append an entry coupling `row` and `col`; returns its index.
    pub fn push_entry(&mut self, row: usize, col: usize, c: EntryCoefficients) -> usize {
        self.row_index.push(row);
        self.col_index.push(col);
        self.mass.push(c.mass);
        self.kxx.push(c.kxx);
        self.kyy.push(c.kyy);
        self.kzz.push(c.kzz);
        self.kxy.push(c.kxy);
        self.kxz.push(c.kxz);
        self.kyz.push(c.kyz);
        self.row_index.len() - 1
    }

    /// Accumulate into an existing entry.
    ///
    /// # Panics
    /// If `n` is not a valid entry index.
    pub fn add_to_entry(&mut self, n: usize, c: EntryCoefficients) {
        self.mass[n] += c.mass;
        self.kxx[n] += c.kxx;
        self.kyy[n] += c.kyy;
        self.kzz[n] += c.kzz;
        self.kxy[n] += c.kxy;
        self.kxz[n] += c.kxz;
        self.kyz[n] += c.kyz;
    }

    /// Number of pattern entries (E).
    pub fn len(&self) -> usize {
        self.row_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_index.is_empty()
    }

    pub fn row_index(&self) -> &[usize] {
        &self.row_index
    }

    pub fn col_index(&self) -> &[usize] {
        &self.col_index
    }

    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    pub fn kxx(&self) -> &[f64] {
        &self.kxx
    }

    pub fn kyy(&self) -> &[f64] {
        &self.kyy
    }

    pub fn kzz(&self) -> &[f64] {
        &self.kzz
    }

    pub fn kxy(&self) -> &[f64] {
        &self.kxy
    }

    pub fn kxz(&self) -> &[f64] {
        &self.kxz
    }

    pub fn kyz(&self) -> &[f64] {
        &self.kyz
    }

    /// `(row, col, coefficients)` of entry `n`.
    pub fn entry(&self, n: usize) -> (usize, usize, EntryCoefficients) {
        (
            self.row_index[n],
            self.col_index[n],
            EntryCoefficients {
                mass: self.mass[n],
                kxx: self.kxx[n],
                kyy: self.kyy[n],
                kzz: self.kzz[n],
                kxy: self.kxy[n],
                kxz: self.kxz[n],
                kyz: self.kyz[n],
            },
        )
    }

    /// Block of entry `n`, see [`EntryCoefficients::block`].
    #[inline]
    pub fn block(&self, n: usize, dim: Dimension) -> Matrix3<f64> {
        self.entry(n).2.block(dim)
    }

    /// Check the store against the active node count before a solve.
    pub fn validate(&self, node_count: usize) -> Result<()> {
        let expected = self.row_index.len();
        let channels: [(&'static str, usize); 8] = [
            ("col_index", self.col_index.len()),
            ("mass", self.mass.len()),
            ("kxx", self.kxx.len()),
            ("kyy", self.kyy.len()),
            ("kzz", self.kzz.len()),
            ("kxy", self.kxy.len()),
            ("kxz", self.kxz.len()),
            ("kyz", self.kyz.len()),
        ];
        for (channel, found) in channels {
            if found != expected {
                return Err(SolverError::ChannelLengthMismatch {
                    channel,
                    expected,
                    found,
                });
            }
        }

        for (entry, (&row, &col)) in self.row_index.iter().zip(&self.col_index).enumerate() {
            if row >= node_count || col >= node_count {
                return Err(SolverError::EntryOutOfBounds {
                    entry,
                    row,
                    col,
                    node_count,
                });
            }
        }

        Ok(())
    }

    /// Assemble the full symmetric operator in blocked layout
    /// (index `axis * node_count + node`).
    ///
    /// Both triangles are materialised, duplicates are summed. The solver
    /// itself never builds this; it exists for diagnostics and as a
    /// reference for the matrix-free product.
    pub fn to_csr(&self, node_count: usize, dim: Dimension) -> Result<CsrMatrix<f64>> {
        self.validate(node_count)?;

        let d = dim.components();
        let n = d * node_count;
        let mut coo = CooMatrix::new(n, n);

        for e in 0..self.len() {
            let (row, col, c) = self.entry(e);
            let b = c.block(dim);
            for a in 0..d {
                for k in 0..d {
                    let v = b[(a, k)];
                    if v == 0.0 {
                        continue;
                    }
                    coo.push(a * node_count + row, k * node_count + col, v);
                    if row != col {
                        coo.push(a * node_count + col, k * node_count + row, v);
                    }
                }
            }
        }

        Ok(CsrMatrix::from(&coo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_channels_aligned() {
        let mut store = OperatorStore::new();
        let c = EntryCoefficients::normal(1.0, 4.0, 5.0, 6.0).with_shear(0.5, 0.25, 0.125);
        assert_eq!(store.push_entry(0, 1, c), 0);
        assert_eq!(store.push_entry(1, 1, EntryCoefficients::mass(2.0)), 1);

        assert_eq!(store.len(), 2);
        assert_eq!(store.row_index(), &[0, 1]);
        assert_eq!(store.col_index(), &[1, 1]);
        assert_eq!(store.mass(), &[1.0, 2.0]);
        assert_eq!(store.kxy(), &[0.5, 0.0]);
        assert_eq!(store.kyz(), &[0.125, 0.0]);
        assert_eq!(store.entry(0), (0, 1, c));
        assert!(store.validate(2).is_ok());
    }

    #[test]
    fn add_to_entry_accumulates() {
        let mut store = OperatorStore::new();
        let n = store.push_entry(0, 0, EntryCoefficients::normal(1.0, 2.0, 2.0, 0.0));
        store.add_to_entry(n, EntryCoefficients::normal(0.5, 1.0, 0.0, 0.0));
        let (_, _, c) = store.entry(n);
        assert_eq!(c.mass, 1.5);
        assert_eq!(c.kxx, 3.0);
        assert_eq!(c.kyy, 2.0);
    }

    #[test]
    fn initialise_twice_leaves_store_empty() {
        let mut store = OperatorStore::new();
        store.push_entry(0, 0, EntryCoefficients::mass(1.0));
        store.initialise();
        assert!(store.is_empty());
        store.initialise();
        assert!(store.is_empty());
        assert!(store.kzz().is_empty());
    }

    #[test]
    fn validate_rejects_out_of_range_nodes() {
        let mut store = OperatorStore::new();
        store.push_entry(0, 3, EntryCoefficients::mass(1.0));
        let err = store.validate(2).unwrap_err();
        assert_eq!(
            err,
            SolverError::EntryOutOfBounds {
                entry: 0,
                row: 0,
                col: 3,
                node_count: 2
            }
        );
    }

    #[test]
    fn block_2d_ignores_z_channels() {
        let c = EntryCoefficients::normal(1.0, 4.0, 5.0, 6.0).with_shear(0.5, 7.0, 8.0);
        let b = c.block(Dimension::Two);
        assert_eq!(b[(0, 0)], 5.0);
        assert_eq!(b[(1, 1)], 6.0);
        assert_eq!(b[(0, 1)], 0.5);
        assert_eq!(b[(1, 0)], 0.5);
        assert_eq!(b[(2, 2)], 0.0);
        assert_eq!(b[(0, 2)], 0.0);

        let b3 = c.block(Dimension::Three);
        assert_eq!(b3[(2, 2)], 7.0);
        assert_eq!(b3[(0, 2)], 7.0);
        assert_eq!(b3[(2, 1)], 8.0);
    }

    #[test]
    fn csr_contains_both_triangles() {
        let mut store = OperatorStore::new();
        store.push_entry(0, 0, EntryCoefficients::normal(1.0, 4.0, 4.0, 0.0));
        store.push_entry(1, 1, EntryCoefficients::normal(1.0, 4.0, 4.0, 0.0));
        store.push_entry(0, 1, EntryCoefficients::normal(0.0, -1.0, -2.0, 0.0));

        let csr = store.to_csr(2, Dimension::Two).unwrap();
        assert_eq!(csr.nrows(), 4);
        let dense = nalgebra::DMatrix::from(&csr);
        // x block
        assert_eq!(dense[(0, 0)], 5.0);
        assert_eq!(dense[(0, 1)], -1.0);
        assert_eq!(dense[(1, 0)], -1.0);
        // y block
        assert_eq!(dense[(2, 3)], -2.0);
        assert_eq!(dense[(3, 2)], -2.0);
        assert_eq!(dense, dense.transpose());
    }
}
