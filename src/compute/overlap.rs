//! Conservative overlap weights: f64 clipping of candidate pairs.
//!
//! For each target cell `t` and each candidate source cell `s` the weight is
//! `area(s ∩ t) / area(t)`, the fraction of the target covered by the source.
//! Each target is ear-cut into triangles and every candidate source is
//! clipped against them in f64 (see `clip`), so cells that share vertices
//! tile without gaps or overlaps beyond rounding. Clipping handles
//! non-convex cells, holes and intersections made of several disjoint pieces.
//!
//! Weights below `epsilon` are dropped: they are bounding-box false positives
//! (e.g. cells sharing only an edge) or numerically negligible slivers. No
//! renormalization happens here. A target whose weights sum to less than one
//! is only partly covered by the supplied sources, which callers may want to
//! see (mask or coastline edges).
//!
//! Targets are processed in parallel, but each target's terms are produced
//! and summed in the candidate table's order, so results are reproducible
//! bit for bit.

use crate::compute::clip::TargetPieces;
use crate::compute::spatial::CandidateTable;
use crate::error::{GridWeightsError, Result};
use crate::geometry::{GeometryCollection, normalize, validate};
use geo::Polygon;
use grid_weights_types::config::RegridConfig;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Fraction of target cell `target` covered by source cell `source`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// All weights produced by one algorithm.
///
/// Entries are grouped by target in ascending target order; within a target
/// they keep the candidate table's order. Targets that failed (degenerate or
/// malformed geometry) have no entries and are listed in
/// [`WeightTable::failures`].
#[derive(Debug)]
pub struct WeightTable {
    algorithm: &'static str,
    entries: Vec<WeightEntry>,
    indptr: Vec<usize>,
    lookup: FxHashMap<(usize, usize), usize>,
    failures: Vec<(usize, GridWeightsError)>,
}

impl WeightTable {
    /// Assemble a table from one row of entries per target.
    pub fn from_rows(
        algorithm: &'static str,
        rows: Vec<Vec<WeightEntry>>,
        failures: Vec<(usize, GridWeightsError)>,
    ) -> Self {
        let mut entries = Vec::with_capacity(rows.iter().map(Vec::len).sum());
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        indptr.push(0);
        for row in rows {
            entries.extend(row);
            indptr.push(entries.len());
        }

        let lookup = entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| ((entry.source, entry.target), pos))
            .collect();

        Self {
            algorithm,
            entries,
            indptr,
            lookup,
            failures,
        }
    }

    /// Name of the algorithm that produced the table.
    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    /// Number of weight entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of target cells the table was computed for.
    pub fn targets(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &WeightEntry> {
        self.entries.iter()
    }

    /// Entries of one target, in candidate order.
    pub fn for_target(&self, target: usize) -> &[WeightEntry] {
        match (self.indptr.get(target), self.indptr.get(target + 1)) {
            (Some(&lower), Some(&upper)) => &self.entries[lower..upper],
            _ => &[],
        }
    }

    /// Weight of the `(source, target)` pair, if it survived the epsilon cut.
    pub fn get(&self, source: usize, target: usize) -> Option<f64> {
        self.lookup
            .get(&(source, target))
            .map(|&pos| self.entries[pos].weight)
    }

    /// Sum of a target's weights: 1 when fully covered, less when partly
    /// covered, 0 when uncovered or failed.
    pub fn coverage(&self, target: usize) -> f64 {
        self.for_target(target).iter().map(|entry| entry.weight).sum()
    }

    pub fn coverages(&self) -> Vec<f64> {
        (0..self.targets()).map(|t| self.coverage(t)).collect()
    }

    /// Targets whose weights could not be computed, with the cause.
    pub fn failures(&self) -> &[(usize, GridWeightsError)] {
        &self.failures
    }
}

fn rejection(id: usize, polygon: &Polygon<f64>) -> GridWeightsError {
    match validate(id, polygon) {
        Err(err) => err,
        Ok(()) => GridWeightsError::malformed(id, "polygon could not be normalized"),
    }
}

fn target_weights(
    sources: &[Option<Polygon<f64>>],
    source: &GeometryCollection,
    target: &GeometryCollection,
    t: usize,
    candidates: &[usize],
    epsilon: f64,
) -> Result<Vec<WeightEntry>> {
    let target_polygon = normalize(t, &target[t])?;
    let pieces = TargetPieces::new(&target_polygon);
    let target_area = pieces.area();
    if !target_area.is_finite() {
        return Err(GridWeightsError::malformed(t, "area is not finite"));
    }
    if target_area <= 0.0 {
        return Err(GridWeightsError::DegenerateTarget { id: t });
    }

    let mut seen = FxHashSet::default();
    let mut row = Vec::with_capacity(candidates.len());
    for &s in candidates {
        if !seen.insert(s) {
            log::debug!("Ignoring repeated candidate {} for target {}", s, t);
            continue;
        }

        let source_polygon = sources[s]
            .as_ref()
            .ok_or_else(|| rejection(s, &source[s]))?;

        let weight = pieces.overlap_area(source_polygon) / target_area;
        // NaN fails the comparison
        if !(weight >= epsilon && weight.is_finite()) {
            continue;
        }

        row.push(WeightEntry {
            source: s,
            target: t,
            weight,
        });
    }
    Ok(row)
}

/// Conservative weights for every target in `candidates`.
///
/// # Errors
///
/// - `InvalidInput` when the candidate table does not have one row per target
///   or names a source id outside `source`
/// - `Config` for an invalid configuration
/// - with `config.strict`, the first per-target failure in target order
///   (`DegenerateTarget`, `MalformedGeometry`); otherwise those are recorded
///   in [`WeightTable::failures`]
///
/// # Examples
///
/// ```rust
/// use grid_weights::compute::{SpatialIndex, QueryMode, conservative_weights};
/// use grid_weights::geometry::{rectangle, GeometryCollection};
/// use grid_weights::RegridConfig;
///
/// let source = GeometryCollection::new(vec![
///     rectangle(0.0, 0.0, 0.5, 1.0),
///     rectangle(0.5, 0.0, 1.0, 1.0),
/// ]);
/// let target = GeometryCollection::new(vec![rectangle(0.0, 0.0, 1.0, 1.0)]);
///
/// let index = SpatialIndex::build(&source)?;
/// let candidates = index.query(target.polygons(), QueryMode::Overlaps);
/// let weights = conservative_weights(&source, &target, &candidates, &RegridConfig::default())?;
///
/// assert_eq!(weights.len(), 2);
/// assert!((weights.coverage(0) - 1.0).abs() < 1e-12);
/// # Ok::<(), grid_weights::GridWeightsError>(())
/// ```
pub fn conservative_weights(
    source: &GeometryCollection,
    target: &GeometryCollection,
    candidates: &CandidateTable,
    config: &RegridConfig,
) -> Result<WeightTable> {
    config.validate().map_err(GridWeightsError::Config)?;

    if candidates.len() != target.len() {
        return Err(GridWeightsError::InvalidInput(format!(
            "candidate table has {} rows for {} targets",
            candidates.len(),
            target.len()
        )));
    }
    if let Some((t, &s)) = candidates
        .iter()
        .find_map(|(t, row)| row.iter().find(|&&s| s >= source.len()).map(|s| (t, s)))
    {
        return Err(GridWeightsError::InvalidInput(format!(
            "target {} lists source {} but the source collection has {} cells",
            t,
            s,
            source.len()
        )));
    }

    let normalize_source = |(id, polygon): (usize, &Polygon<f64>)| normalize(id, polygon).ok();
    let sources: Vec<Option<Polygon<f64>>> = if config.parallel {
        source.polygons().par_iter().enumerate().map(normalize_source).collect()
    } else {
        source.polygons().iter().enumerate().map(normalize_source).collect()
    };

    let compute_row = |t: usize| {
        target_weights(
            &sources,
            source,
            target,
            t,
            candidates.candidates(t),
            config.epsilon,
        )
    };
    let results: Vec<Result<Vec<WeightEntry>>> = if config.parallel {
        (0..target.len()).into_par_iter().map(compute_row).collect()
    } else {
        (0..target.len()).map(compute_row).collect()
    };

    let mut rows = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (t, result) in results.into_iter().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) if config.strict || !err.is_geometry_error() => return Err(err),
            Err(err) => {
                log::warn!("No weights for target {}: {}", t, err);
                failures.push((t, err));
                rows.push(Vec::new());
            }
        }
    }

    let table = WeightTable::from_rows("conservative", rows, failures);
    for (t, coverage) in table.coverages().into_iter().enumerate() {
        if coverage > 1.0 + config.tolerance {
            log::warn!(
                "Target {} is over-covered (sum of weights {}); source cells overlap",
                t,
                coverage
            );
        }
    }

    log::debug!(
        "Computed {} conservative weights for {} targets ({} failed)",
        table.len(),
        table.targets(),
        table.failures().len()
    );
    Ok(table)
}
