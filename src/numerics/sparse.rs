//! Sparse storage helpers for assembled operators.
//!
//! Global Jacobians are accumulated as COO triplets, one list per cell batch,
//! and converted to CSR once; duplicate (row, col) pairs from neighbouring
//! cells are summed by the conversion.

use std::collections::BTreeMap;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// A single `(row, col, value)` contribution.
pub type Triplet = (usize, usize, f64);

/// Build a CSR matrix from triplets, summing duplicates.
///
/// With `with_diagonal`, a structural zero is inserted on every diagonal
/// position so later row operations can always address `(i, i)`.
pub fn assemble_csr(
    nrows: usize,
    ncols: usize,
    triplets: &[Triplet],
    with_diagonal: bool,
) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for &(i, j, v) in triplets {
        coo.push(i, j, v);
    }
    if with_diagonal {
        for i in 0..nrows.min(ncols) {
            coo.push(i, i, 0.0);
        }
    }
    CsrMatrix::from(&coo)
}

/// Fused `Aᵀ x + y`, the contraction used for every adjoint gradient.
pub fn transpose_mul_add(a: &CsrMatrix<f64>, x: &DVector<f64>, y: &DVector<f64>) -> DVector<f64> {
    let mut out = y.clone();
    for (i, row) in a.row_iter().enumerate() {
        let xi = x[i];
        if xi == 0.0 {
            continue;
        }
        for (&j, &v) in row.col_indices().iter().zip(row.values()) {
            out[j] += v * xi;
        }
    }
    out
}

/// Dense copy, used by the direct solver and by tests.
pub fn to_dense(a: &CsrMatrix<f64>) -> nalgebra::DMatrix<f64> {
    let mut dense = nalgebra::DMatrix::zeros(a.nrows(), a.ncols());
    for (i, j, v) in a.triplet_iter() {
        dense[(i, j)] += *v;
    }
    dense
}

/// CSR storage with small dense `b × b` blocks, one block row per node.
///
/// Blocks are stored row-major and contiguously in `values`.
#[derive(Clone, Debug)]
pub struct BlockCsrMatrix {
    pub block_size: usize,
    pub row_offsets: Vec<usize>,
    pub block_cols: Vec<usize>,
    pub values: Vec<f64>,
}

impl BlockCsrMatrix {
    /// Group the entries of a square CSR matrix into `block_size` blocks.
    pub fn from_csr(a: &CsrMatrix<f64>, block_size: usize) -> Self {
        let b = block_size;
        let nblocks = a.nrows().div_ceil(b);
        let mut rows: Vec<BTreeMap<usize, Vec<f64>>> = vec![BTreeMap::new(); nblocks];

        for (i, j, v) in a.triplet_iter() {
            let block = rows[i / b]
                .entry(j / b)
                .or_insert_with(|| vec![0.0; b * b]);
            block[(i % b) * b + j % b] += *v;
        }

        let mut row_offsets = Vec::with_capacity(nblocks + 1);
        let mut block_cols = Vec::new();
        let mut values = Vec::new();
        row_offsets.push(0);
        for row in rows {
            for (col, block) in row {
                block_cols.push(col);
                values.extend(block);
            }
            row_offsets.push(block_cols.len());
        }

        Self {
            block_size,
            row_offsets,
            block_cols,
            values,
        }
    }

    pub fn num_block_rows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Mutable view of block `k` in storage order.
    pub fn block_mut(&mut self, k: usize) -> &mut [f64] {
        let bb = self.block_size * self.block_size;
        &mut self.values[k * bb..(k + 1) * bb]
    }

    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let b = self.block_size;
        let n = self.num_block_rows() * b;
        let mut triplets = Vec::with_capacity(self.values.len());
        for brow in 0..self.num_block_rows() {
            for k in self.row_offsets[brow]..self.row_offsets[brow + 1] {
                let bcol = self.block_cols[k];
                for r in 0..b {
                    for c in 0..b {
                        triplets.push((brow * b + r, bcol * b + c, self.values[k * b * b + r * b + c]));
                    }
                }
            }
        }
        assemble_csr(n, n, &triplets, false)
    }
}
