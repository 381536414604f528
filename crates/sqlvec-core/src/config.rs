use crate::error::{Result, VecError};
use crate::kernels::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Per-connection configuration for the vec0 module and its functions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Name the virtual table module registers under
    /// Default: "vec0"
    #[serde(default = "default_module_name")]
    pub module_name: String,

    /// Upper bound for a declared vector dimension
    /// Default: 8192
    #[serde(default = "default_max_dimensions")]
    pub max_dimensions: usize,

    /// Upper bound for `k` / `LIMIT` in KNN queries
    /// Default: 4096
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Resolution used when ranking distances; rows whose distances round
    /// to the same multiple are ordered by rowid. `0.0` compares exactly.
    /// Default: 1e-6
    #[serde(default = "default_tie_resolution")]
    pub tie_resolution: f64,

    /// Metric for numeric vector columns declared without `distance_metric=`
    #[serde(default)]
    pub default_metric: DistanceMetric,
}

fn default_module_name() -> String {
    "vec0".to_string()
}

fn default_max_dimensions() -> usize {
    8192
}

fn default_max_k() -> usize {
    4096
}

fn default_tie_resolution() -> f64 {
    1e-6
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionConfig {
    pub fn new() -> Self {
        Self {
            module_name: default_module_name(),
            max_dimensions: default_max_dimensions(),
            max_k: default_max_k(),
            tie_resolution: default_tie_resolution(),
            default_metric: DistanceMetric::default(),
        }
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    pub fn with_max_dimensions(mut self, max_dimensions: usize) -> Self {
        self.max_dimensions = max_dimensions;
        self
    }

    pub fn with_max_k(mut self, max_k: usize) -> Self {
        self.max_k = max_k;
        self
    }

    /// Set the ranking resolution (`0.0` for exact comparison)
    pub fn with_tie_resolution(mut self, resolution: f64) -> Self {
        self.tie_resolution = resolution;
        self
    }

    pub fn with_default_metric(mut self, metric: DistanceMetric) -> Self {
        self.default_metric = metric;
        self
    }

    /// Check the configuration before it is used to register anything
    pub fn validate(&self) -> Result<()> {
        let name = &self.module_name;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(VecError::Config(format!(
                "invalid module name '{}': use letters, digits and underscores",
                name
            )));
        }
        if self.max_dimensions == 0 {
            return Err(VecError::Config("max_dimensions must be positive".into()));
        }
        if self.max_k == 0 {
            return Err(VecError::Config("max_k must be positive".into()));
        }
        validate_tie_resolution(self.tie_resolution)?;
        if self.default_metric == DistanceMetric::Hamming {
            return Err(VecError::Config(
                "hamming cannot be the default metric for numeric columns".into(),
            ));
        }
        Ok(())
    }
}

/// Tie resolutions must be finite and non-negative
pub fn validate_tie_resolution(resolution: f64) -> Result<()> {
    if !resolution.is_finite() || resolution < 0.0 {
        return Err(VecError::Config(format!(
            "tie_resolution must be a finite, non-negative number (got {})",
            resolution
        )));
    }
    Ok(())
}
