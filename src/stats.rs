//! Partition quality statistics for a distributed sparse matrix

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::spy::SpyMatrix;

/// Summary of how a matrix is distributed over processors
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartitionStats {
    pub rows: u32,
    pub cols: u32,
    pub nonzeros: usize,
    /// Declared processor count, or one more than the largest id seen
    pub procs: u64,
    /// Nonzeros owned by each processor that owns any
    pub nonzeros_per_proc: BTreeMap<u32, usize>,
    /// Fraction of matrix cells that are nonzero
    pub sparsity: f64,
    /// Largest processor load relative to the mean, at least 1
    pub load_imbalance: f64,
    /// Sum over rows and columns of (owning processors - 1)
    pub communication_volume: u64,
}

impl PartitionStats {
    pub fn from_matrix(matrix: &SpyMatrix) -> Self {
        let d = &matrix.descriptor;
        let nonzeros = matrix.entries.len();

        let mut nonzeros_per_proc = BTreeMap::new();
        let mut row_owners = HashSet::new();
        let mut col_owners = HashSet::new();
        let mut busy_rows = HashSet::new();
        let mut busy_cols = HashSet::new();

        for e in &matrix.entries {
            *nonzeros_per_proc.entry(e.proc).or_insert(0) += 1;
            row_owners.insert((e.row, e.proc));
            col_owners.insert((e.col, e.proc));
            busy_rows.insert(e.row);
            busy_cols.insert(e.col);
        }

        let seen_procs = nonzeros_per_proc
            .keys()
            .next_back()
            .map_or(0, |&max| u64::from(max) + 1);
        let procs = seen_procs.max(d.procs.map_or(0, u64::from));

        let cells = u64::from(d.rows) * u64::from(d.cols);
        let sparsity = if cells == 0 {
            0.0
        } else {
            nonzeros as f64 / cells as f64
        };

        let max_load = nonzeros_per_proc.values().copied().max().unwrap_or(0);
        let load_imbalance = if nonzeros == 0 {
            1.0
        } else {
            (procs as f64 * max_load as f64 / nonzeros as f64).max(1.0)
        };

        // each row (column) needs one word per extra owner
        let communication_volume = (row_owners.len() - busy_rows.len()
            + col_owners.len()
            - busy_cols.len()) as u64;

        Self {
            rows: d.rows,
            cols: d.cols,
            nonzeros,
            procs,
            nonzeros_per_proc,
            sparsity,
            load_imbalance,
            communication_volume,
        }
    }

    /// Number of processors owning at least one nonzero
    pub fn active_procs(&self) -> usize {
        self.nonzeros_per_proc.len()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
