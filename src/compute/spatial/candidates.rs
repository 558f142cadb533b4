//! Broad-phase query modes and the candidate tables they produce.

use crate::error::{GridWeightsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bounding-box relation tested by a spatial index query.
///
/// The mode only selects the broad-phase relation; exact geometric
/// predicates are left to the weight algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Source box intersects the query box (shared edges count).
    Overlaps,
    /// Source box lies entirely inside the query box.
    Contains,
    /// Source boxes at minimum distance from the query box centre; every tie
    /// is returned.
    Nearest,
}

impl QueryMode {
    pub const ALL: [QueryMode; 3] = [QueryMode::Overlaps, QueryMode::Contains, QueryMode::Nearest];

    pub fn name(&self) -> &'static str {
        match self {
            QueryMode::Overlaps => "overlaps",
            QueryMode::Contains => "contains",
            QueryMode::Nearest => "nearest",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueryMode {
    type Err = GridWeightsError;

    fn from_str(s: &str) -> Result<Self> {
        QueryMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| GridWeightsError::InvalidInput(format!("unknown query mode: {}", s)))
    }
}

/// Candidate source ids per target, produced by one query mode.
///
/// Row `t` lists the global source ids whose bounding box satisfied the
/// mode's relation against target `t`, in partition order and then build
/// order. The table is a superset filter: false positives are expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTable {
    mode: QueryMode,
    rows: Vec<Vec<usize>>,
}

impl CandidateTable {
    pub fn new(mode: QueryMode, rows: Vec<Vec<usize>>) -> Self {
        Self { mode, rows }
    }

    /// A table with `targets` empty rows.
    pub fn empty(mode: QueryMode, targets: usize) -> Self {
        Self {
            mode,
            rows: vec![Vec::new(); targets],
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Number of targets (rows), including those without candidates.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Candidates of one target. Out-of-range targets have none.
    pub fn candidates(&self, target: usize) -> &[usize] {
        self.rows.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, target: usize, source: usize) -> bool {
        self.candidates(target).contains(&source)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, &[usize])> {
        self.rows.iter().enumerate().map(|(t, row)| (t, row.as_slice()))
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<usize>> {
        self.rows
    }

    /// Total number of (target, source) candidate pairs.
    pub fn total_candidates(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Merge per-partition query results.
    ///
    /// Each part is `(offset, rows)` with partition-local ids. Parts must be
    /// supplied in ascending partition order; rows are concatenated in that
    /// order and local ids are shifted by the partition offset.
    pub(crate) fn merge_partitions<I>(mode: QueryMode, targets: usize, parts: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<Vec<usize>>)>,
    {
        let mut rows = vec![Vec::new(); targets];
        for (offset, part_rows) in parts {
            for (row, local) in rows.iter_mut().zip(part_rows) {
                row.extend(local.into_iter().map(|id| id + offset));
            }
        }
        Self { mode, rows }
    }

    /// Compressed sparse row layout: `(indptr, indices)` with
    /// `indptr.len() == len() + 1`.
    pub fn to_csr(&self) -> (Vec<usize>, Vec<usize>) {
        let mut indptr = Vec::with_capacity(self.rows.len() + 1);
        let mut indices = Vec::with_capacity(self.total_candidates());
        indptr.push(0);
        for row in &self.rows {
            indices.extend_from_slice(row);
            indptr.push(indices.len());
        }
        (indptr, indices)
    }

    /// Rebuild a table from compressed sparse row arrays.
    ///
    /// # Examples
    ///
    /// ```
    /// use grid_weights::compute::spatial::{CandidateTable, QueryMode};
    ///
    /// let table = CandidateTable::from_csr(QueryMode::Overlaps, &[0, 2, 2, 3], &[4, 5, 1]).unwrap();
    /// assert_eq!(table.candidates(0), &[4, 5]);
    /// assert!(table.candidates(1).is_empty());
    /// assert_eq!(table.candidates(2), &[1]);
    /// ```
    pub fn from_csr(mode: QueryMode, indptr: &[usize], indices: &[usize]) -> Result<Self> {
        let Some((&first, rest)) = indptr.split_first() else {
            return Err(GridWeightsError::InvalidInput(
                "indptr must contain at least one entry".to_string(),
            ));
        };
        if first != 0 {
            return Err(GridWeightsError::InvalidInput(format!(
                "indptr must start at 0, got: {}",
                first
            )));
        }

        let mut rows = Vec::with_capacity(rest.len());
        let mut lower = first;
        for &upper in rest {
            if upper < lower || upper > indices.len() {
                return Err(GridWeightsError::InvalidInput(format!(
                    "indptr entry {} out of order or beyond {} indices",
                    upper,
                    indices.len()
                )));
            }
            rows.push(indices[lower..upper].to_vec());
            lower = upper;
        }

        if lower != indices.len() {
            return Err(GridWeightsError::InvalidInput(format!(
                "indptr ends at {} but there are {} indices",
                lower,
                indices.len()
            )));
        }

        Ok(Self { mode, rows })
    }
}
