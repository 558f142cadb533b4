use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Tolerances and execution flags for index construction and weight
/// computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegridConfig {
    /// Raw weights below this value are discarded as bounding-box false
    /// positives or numerically negligible slivers.
    #[serde(default = "RegridConfig::default_epsilon")]
    pub epsilon: f64,

    /// Allowed excess of a target's summed weights over 1.0 before it is
    /// reported as over-covered.
    #[serde(default = "RegridConfig::default_tolerance")]
    pub tolerance: f64,

    /// Abort on the first geometry or partition failure instead of recording
    /// it and continuing.
    #[serde(default)]
    pub strict: bool,

    /// Fan out partition and per-target work across the rayon thread pool.
    #[serde(default = "RegridConfig::default_parallel")]
    pub parallel: bool,
}

impl RegridConfig {
    const fn default_epsilon() -> f64 {
        1e-9
    }

    const fn default_tolerance() -> f64 {
        1e-9
    }

    const fn default_parallel() -> bool {
        true
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that tolerances are finite and non-negative.
    pub fn validate(&self) -> Result<(), String> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(format!(
                "epsilon must be finite and non-negative, got: {}",
                self.epsilon
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(format!(
                "tolerance must be finite and non-negative, got: {}",
                self.tolerance
            ));
        }
        Ok(())
    }

    /// Load configuration from a JSON string.
    ///
    /// ```rust
    /// use grid_weights_types::config::RegridConfig;
    ///
    /// let config = RegridConfig::from_json(r#"{ "epsilon": 1e-12, "strict": true }"#).unwrap();
    /// assert!(config.strict);
    /// assert!(config.parallel);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: RegridConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from a TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: RegridConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            epsilon: Self::default_epsilon(),
            tolerance: Self::default_tolerance(),
            strict: false,
            parallel: Self::default_parallel(),
        }
    }
}
