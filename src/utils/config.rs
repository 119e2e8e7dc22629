//! Configuration management
//!
//! Model options for the online sampler plus the logging section used by
//! the command-line tool. Files are TOML.

use crate::models::align::WeightingMode;
use crate::models::gibbs::DEFAULT_POOL_SIZE;
use crate::models::lda::LdaError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Online LDA configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineLdaConfig {
    /// Number of topics
    pub n_topics: usize,
    /// Gibbs sweeps per slice
    pub n_iter: usize,
    /// Document-topic prior (alpha)
    pub alpha: f64,
    /// Word-topic prior for the first slice (eta)
    pub eta: f64,
    /// Number of most recent slices considered by the aligner
    pub window_size: usize,
    /// Blend between the latest slice (1.0) and the weighted history (0.0)
    pub theta: f64,
    /// Offset weighting scheme
    pub weighting: WeightingMode,
    /// Decay rate `k` for decay weighting
    pub decay_rate: f64,
    /// Log likelihood is recorded every `refresh` sweeps
    pub refresh: usize,
    /// Random seed for reproducibility
    pub random_seed: Option<u64>,
    /// Number of pre-drawn uniform variates
    pub pool_size: usize,
    /// Iteration cap for held-out inference
    pub transform_max_iter: usize,
    /// Tolerance for held-out inference
    pub transform_tol: f64,
    /// Score slice t+1 under the model fitted on slice t
    pub evaluate_next_slice: bool,
}

impl Default for OnlineLdaConfig {
    fn default() -> Self {
        Self {
            n_topics: 10,
            n_iter: 2000,
            alpha: 0.1,
            eta: 0.01,
            window_size: 1,
            theta: 0.5,
            weighting: WeightingMode::Similarity,
            decay_rate: 1.0,
            refresh: 10,
            random_seed: None,
            pool_size: DEFAULT_POOL_SIZE,
            transform_max_iter: 20,
            transform_tol: 1e-16,
            evaluate_next_slice: false,
        }
    }
}

impl OnlineLdaConfig {
    /// Create a new configuration with specified number of topics
    pub fn new(n_topics: usize) -> Self {
        Self {
            n_topics,
            ..Default::default()
        }
    }

    /// Set number of sweeps per slice
    pub fn n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    /// Set alpha (document-topic prior)
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set eta (word-topic prior of the first slice)
    pub fn eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    /// Set alignment window size
    pub fn window_size(mut self, n: usize) -> Self {
        self.window_size = n;
        self
    }

    /// Set blend factor
    pub fn theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    /// Set weighting mode
    pub fn weighting(mut self, mode: WeightingMode) -> Self {
        self.weighting = mode;
        self
    }

    pub fn decay_rate(mut self, k: f64) -> Self {
        self.decay_rate = k;
        self
    }

    /// Set likelihood logging interval
    pub fn refresh(mut self, n: usize) -> Self {
        self.refresh = n;
        self
    }

    /// Set random seed
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn pool_size(mut self, n: usize) -> Self {
        self.pool_size = n;
        self
    }

    /// Set held-out inference stopping rule
    pub fn transform_limits(mut self, max_iter: usize, tol: f64) -> Self {
        self.transform_max_iter = max_iter;
        self.transform_tol = tol;
        self
    }

    pub fn evaluate_next_slice(mut self, enabled: bool) -> Self {
        self.evaluate_next_slice = enabled;
        self
    }

    /// Check every option is in range
    pub fn validate(&self) -> Result<(), LdaError> {
        if self.n_topics == 0 {
            return Err(LdaError::InvalidTopicCount);
        }
        let invalid = |msg: &str| Err(LdaError::InvalidParameter(msg.to_string()));
        if self.n_iter == 0 {
            return invalid("n_iter must be positive");
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return invalid("alpha must be positive");
        }
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return invalid("eta must be positive");
        }
        if self.window_size == 0 {
            return invalid("window_size must be positive");
        }
        if !(0.0..=1.0).contains(&self.theta) {
            return invalid("theta must be in [0, 1]");
        }
        if !(self.decay_rate.is_finite() && self.decay_rate > 0.0) {
            return invalid("decay_rate must be positive");
        }
        if self.refresh == 0 {
            return invalid("refresh must be positive");
        }
        if self.pool_size == 0 {
            return invalid("pool_size must be positive");
        }
        if !(self.transform_tol >= 0.0) {
            return invalid("transform_tol must be non-negative");
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter, e.g. "info" or "online_lda=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub model: OnlineLdaConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LdaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self, LdaError> {
        let config: Config = toml::from_str(content)?;
        config.model.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LdaError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = OnlineLdaConfig::default();
        assert_eq!(config.n_iter, 2000);
        assert_eq!(config.window_size, 1);
        assert_eq!(config.pool_size, 131_072);
        assert!(config.random_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(OnlineLdaConfig::new(0).validate().is_err());
        assert!(OnlineLdaConfig::new(3).theta(1.2).validate().is_err());
        assert!(OnlineLdaConfig::new(3).alpha(0.0).validate().is_err());
        assert!(OnlineLdaConfig::new(3).window_size(0).validate().is_err());
        assert!(OnlineLdaConfig::new(3).refresh(0).validate().is_err());
        assert!(OnlineLdaConfig::new(3).theta(0.0).window_size(4).validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [model]
            n_topics = 4
            weighting = "decay"
            random_seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.model.n_topics, 4);
        assert_eq!(config.model.weighting, WeightingMode::Decay);
        assert_eq!(config.model.random_seed, Some(7));
        assert_eq!(config.model.alpha, 0.1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_seed() {
        let negative = Config::from_toml("[model]\nrandom_seed = -3\n");
        assert!(matches!(negative, Err(LdaError::ConfigParse(_))));

        let text = Config::from_toml("[model]\nrandom_seed = \"abc\"\n");
        assert!(matches!(text, Err(LdaError::ConfigParse(_))));
    }

    #[test]
    fn test_out_of_range_values_rejected_on_load() {
        let result = Config::from_toml("[model]\ntheta = 2.0\n");
        assert!(matches!(result, Err(LdaError::InvalidParameter(_))));
    }

    #[test]
    fn test_save_and_load() {
        let config = Config {
            model: OnlineLdaConfig::new(5).window_size(3).random_seed(11),
            logging: LoggingConfig::default(),
        };

        let file = NamedTempFile::new().unwrap();
        config.save(file.path()).unwrap();
        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
