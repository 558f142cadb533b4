//! Weighting algorithms and the per-variable algorithm configuration.
//!
//! Algorithms form a closed set ([`Algorithm`]); each variant knows which
//! index query mode it needs and how to turn a candidate table into a weight
//! table. [`Algorithms`] assigns the variables of a dataset to algorithms and
//! is validated completely when it is constructed, before any index or
//! weight work starts.
//!
//! ```rust
//! use grid_weights::{Algorithm, Algorithms, GridWeightsError};
//!
//! let algorithms = Algorithms::new([("a", "conservative"), ("b", "conservative")])?;
//! assert_eq!(algorithms.algorithm_for("a"), Some(Algorithm::Conservative));
//! assert_eq!(algorithms.unique(), vec![Algorithm::Conservative]);
//!
//! let err = Algorithms::new([("a", "not-existing"), ("b", "invalid")]).unwrap_err();
//! assert_eq!(err.to_string(), "unknown algorithms: not-existing, invalid");
//! # Ok::<(), GridWeightsError>(())
//! ```

use crate::compute::overlap::{WeightTable, conservative_weights};
use crate::compute::spatial::{CandidateTable, QueryMode};
use crate::error::{GridWeightsError, Result};
use crate::geometry::GeometryCollection;
use grid_weights_types::config::RegridConfig;
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A weighting algorithm known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Area-weighted remapping that preserves the field's spatial integral.
    Conservative,
}

static REGISTRY: Lazy<FxHashMap<&'static str, Algorithm>> = Lazy::new(|| {
    Algorithm::ALL
        .iter()
        .map(|algorithm| (algorithm.name(), *algorithm))
        .collect()
});

impl Algorithm {
    pub const ALL: [Algorithm; 1] = [Algorithm::Conservative];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Conservative => "conservative",
        }
    }

    /// Index query mode whose candidates this algorithm consumes.
    pub fn indexing_mode(&self) -> QueryMode {
        match self {
            Algorithm::Conservative => QueryMode::Overlaps,
        }
    }

    /// Look up a registered algorithm by name.
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY.get(name).copied()
    }

    /// Names of all registered algorithms, sorted.
    pub fn registered() -> Vec<&'static str> {
        let mut names: Vec<_> = REGISTRY.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Compute this algorithm's weights from candidates produced with
    /// [`Algorithm::indexing_mode`].
    pub fn compute(
        &self,
        source: &GeometryCollection,
        target: &GeometryCollection,
        candidates: &CandidateTable,
        config: &RegridConfig,
    ) -> Result<WeightTable> {
        if candidates.mode() != self.indexing_mode() {
            return Err(GridWeightsError::InvalidInput(format!(
                "{} weights need '{}' candidates, got '{}'",
                self.name(),
                self.indexing_mode(),
                candidates.mode()
            )));
        }

        match self {
            Algorithm::Conservative => conservative_weights(source, target, candidates, config),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = GridWeightsError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::from_name(s).ok_or_else(|| GridWeightsError::UnknownAlgorithm(vec![s.to_string()]))
    }
}

/// Variables assigned to an algorithm in [`AlgorithmOptions::algorithms`]:
/// either one name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableList {
    One(String),
    Many(Vec<String>),
}

impl VariableList {
    fn into_vec(self) -> Vec<String> {
        match self {
            VariableList::One(name) => vec![name],
            VariableList::Many(names) => names,
        }
    }
}

/// Caller-facing construction options for [`Algorithms`].
///
/// Exactly one of `variables` (variable → algorithm) or `algorithms`
/// (algorithm → variables) may be given. `default` applies to dataset
/// variables neither form mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlgorithmOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<IndexMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithms: Option<IndexMap<String, VariableList>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl AlgorithmOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }
}

/// Assignment of dataset variables to weighting algorithms.
///
/// Invariant: every variable maps to exactly one registered algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Algorithms {
    variables: IndexMap<String, Algorithm>,
}

/// Items that occur more than once, in order of first occurrence.
fn repeated<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = IndexSet::new();
    let mut repeated = IndexSet::new();
    for item in items {
        if !seen.insert(item) {
            repeated.insert(item);
        }
    }
    repeated.into_iter().map(str::to_string).collect()
}

impl Algorithms {
    /// Build from explicit `(variable, algorithm name)` pairs.
    ///
    /// # Errors
    ///
    /// - `UnknownAlgorithm` naming every unregistered name, deduplicated, in
    ///   order of first occurrence
    /// - `DuplicateVariableAssignment` naming every variable given twice
    pub fn new<I, K, N>(variables: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        N: AsRef<str>,
    {
        let pairs = variables
            .into_iter()
            .map(|(variable, name)| (variable.into(), name.as_ref().to_string()))
            .collect();
        Self::assemble::<&str>(pairs, None, None)
    }

    /// Build from `(variable, algorithm name)` pairs, completing the
    /// assignment for `dataset_variables` with `default`.
    ///
    /// # Errors
    ///
    /// As [`Algorithms::new`], plus `MissingConfiguration` when dataset
    /// variables remain unassigned and no default is given. An unregistered
    /// default is reported as an unknown algorithm.
    pub fn by_variable<V, I, K, N>(
        dataset_variables: &[V],
        variables: I,
        default: Option<&str>,
    ) -> Result<Self>
    where
        V: AsRef<str>,
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        N: AsRef<str>,
    {
        let pairs = variables
            .into_iter()
            .map(|(variable, name)| (variable.into(), name.as_ref().to_string()))
            .collect();
        Self::assemble(pairs, Some(dataset_variables), default)
    }

    /// Build from `(algorithm name, variables)` groups, completing the
    /// assignment for `dataset_variables` with `default`.
    ///
    /// ```rust
    /// use grid_weights::{Algorithms, GridWeightsError};
    ///
    /// let err = Algorithms::by_algorithm(
    ///     &["t", "u"],
    ///     [("conservative", vec!["t", "u"]), ("conservative", vec!["u"])],
    ///     None,
    /// )
    /// .unwrap_err();
    /// assert!(matches!(err, GridWeightsError::DuplicateVariableAssignment(ref v) if v == &["u"]));
    /// ```
    pub fn by_algorithm<V, I, N, L, K>(
        dataset_variables: &[V],
        algorithms: I,
        default: Option<&str>,
    ) -> Result<Self>
    where
        V: AsRef<str>,
        I: IntoIterator<Item = (N, L)>,
        N: AsRef<str>,
        L: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let pairs = algorithms
            .into_iter()
            .flat_map(|(name, variables)| {
                let name = name.as_ref().to_string();
                variables
                    .into_iter()
                    .map(move |variable| (variable.into(), name.clone()))
            })
            .collect();
        Self::assemble(pairs, Some(dataset_variables), default)
    }

    /// Build from deserialized [`AlgorithmOptions`].
    pub fn from_options<V: AsRef<str>>(
        dataset_variables: &[V],
        options: &AlgorithmOptions,
    ) -> Result<Self> {
        let default = options.default.as_deref();
        match (&options.variables, &options.algorithms) {
            (Some(_), Some(_)) => Err(GridWeightsError::Config(
                "specify either 'variables' or 'algorithms', not both".to_string(),
            )),
            (Some(variables), None) => Self::by_variable(
                dataset_variables,
                variables.iter().map(|(variable, name)| (variable.as_str(), name.as_str())),
                default,
            ),
            (None, Some(algorithms)) => Self::by_algorithm(
                dataset_variables,
                algorithms
                    .iter()
                    .map(|(name, variables)| (name.as_str(), variables.clone().into_vec())),
                default,
            ),
            (None, None) => Self::by_variable(
                dataset_variables,
                std::iter::empty::<(String, String)>(),
                default,
            ),
        }
    }

    fn assemble<V: AsRef<str>>(
        pairs: Vec<(String, String)>,
        dataset_variables: Option<&[V]>,
        default: Option<&str>,
    ) -> Result<Self> {
        let unknown: IndexSet<&str> = pairs
            .iter()
            .map(|(_, name)| name.as_str())
            .chain(default)
            .filter(|name| Algorithm::from_name(name).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(GridWeightsError::UnknownAlgorithm(
                unknown.into_iter().map(str::to_string).collect(),
            ));
        }

        let duplicates = repeated(pairs.iter().map(|(variable, _)| variable.as_str()));
        if !duplicates.is_empty() {
            return Err(GridWeightsError::DuplicateVariableAssignment(duplicates));
        }

        let mut variables: IndexMap<String, Algorithm> = pairs
            .into_iter()
            .filter_map(|(variable, name)| Algorithm::from_name(&name).map(|a| (variable, a)))
            .collect();

        let missing: Vec<String> = dataset_variables
            .unwrap_or_default()
            .iter()
            .map(|variable| variable.as_ref())
            .filter(|variable| !variables.contains_key(*variable))
            .map(str::to_string)
            .collect();

        if !missing.is_empty() {
            let Some(default) = default.and_then(Algorithm::from_name) else {
                return Err(GridWeightsError::MissingConfiguration(missing));
            };
            for variable in missing {
                variables.insert(variable, default);
            }
        }

        Ok(Self { variables })
    }

    /// Algorithm assigned to `variable`.
    pub fn algorithm_for(&self, variable: &str) -> Option<Algorithm> {
        self.variables.get(variable).copied()
    }

    /// `(variable, algorithm)` pairs in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, Algorithm)> {
        self.variables
            .iter()
            .map(|(variable, algorithm)| (variable.as_str(), *algorithm))
    }

    /// Variables assigned to `algorithm`, in insertion order.
    pub fn variables_for(&self, algorithm: Algorithm) -> Vec<&str> {
        self.variables()
            .filter(|(_, assigned)| *assigned == algorithm)
            .map(|(variable, _)| variable)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Algorithms in use, deduplicated in insertion order.
    pub fn unique(&self) -> Vec<Algorithm> {
        self.variables
            .values()
            .copied()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn unique_names(&self) -> Vec<&'static str> {
        self.unique().iter().map(Algorithm::name).collect()
    }

    /// Index query modes needed by the algorithms in use, deduplicated in the
    /// order of [`Algorithms::unique`].
    pub fn indexing_modes(&self) -> Vec<QueryMode> {
        self.unique()
            .iter()
            .map(Algorithm::indexing_mode)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }
}
