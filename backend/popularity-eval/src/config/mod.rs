use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "RECSYS_EVAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Input
    pub click_log_path: String,

    // Catalog
    pub n_top: usize,

    // Evaluation
    pub n_recommendations: usize,
    pub n_random_iterations: usize,
    pub precision_k_values: Vec<usize>,
    pub precision_random_draws: usize,
    pub coverage_trials: usize,
    pub n_bootstrap: usize,
    pub significance_level: f64,

    /// Master seed; drawn from entropy when unset
    #[serde(default)]
    pub random_seed: Option<u64>,

    // Output
    pub output_format: OutputFormat,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("click_log_path", "data/processed/clicks_clean.csv")?
            .set_default("n_top", 10)?
            .set_default("n_recommendations", 10)?
            .set_default("n_random_iterations", 100)?
            .set_default("precision_k_values", vec![1, 3, 5, 10])?
            .set_default("precision_random_draws", 100)?
            .set_default("coverage_trials", 100)?
            .set_default("n_bootstrap", 1000)?
            .set_default("significance_level", 0.05)?
            .set_default("output_format", "text")?
            .set_default("log_level", "info")?
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("precision_k_values"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.click_log_path.is_empty() {
            return Err(AppError::Configuration(
                "click_log_path is required".to_string(),
            ));
        }

        self.evaluation(0).validate()
    }

    /// Evaluation parameters with the master seed resolved.
    pub fn evaluation(&self, seed: u64) -> EvaluationConfig {
        EvaluationConfig {
            n_top: self.n_top,
            n_recommendations: self.n_recommendations,
            n_random_iterations: self.n_random_iterations,
            precision_k_values: self.precision_k_values.clone(),
            precision_random_draws: self.precision_random_draws,
            coverage_trials: self.coverage_trials,
            n_bootstrap: self.n_bootstrap,
            significance_level: self.significance_level,
            seed,
        }
    }
}

/// Parameters of a single comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub n_top: usize,
    pub n_recommendations: usize,
    pub n_random_iterations: usize,
    pub precision_k_values: Vec<usize>,
    pub precision_random_draws: usize,
    pub coverage_trials: usize,
    pub n_bootstrap: usize,
    pub significance_level: f64,
    pub seed: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            n_top: 10,
            n_recommendations: 10,
            n_random_iterations: 100,
            precision_k_values: vec![1, 3, 5, 10],
            precision_random_draws: 100,
            coverage_trials: 100,
            n_bootstrap: 1000,
            significance_level: 0.05,
            seed: 0,
        }
    }
}

impl EvaluationConfig {
    /// Default parameters with a fixed seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("n_top", self.n_top),
            ("n_recommendations", self.n_recommendations),
            ("n_random_iterations", self.n_random_iterations),
            ("precision_random_draws", self.precision_random_draws),
            ("coverage_trials", self.coverage_trials),
            ("n_bootstrap", self.n_bootstrap),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(AppError::Configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.precision_k_values.is_empty() {
            return Err(AppError::Configuration(
                "precision_k_values must not be empty".to_string(),
            ));
        }

        if self.precision_k_values[0] == 0
            || self.precision_k_values.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(AppError::Configuration(format!(
                "precision_k_values must be positive and strictly ascending, got {:?}",
                self.precision_k_values
            )));
        }

        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(AppError::Configuration(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("RECSYS_EVAL_") {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();

        let config = Config::from_env().expect("defaults should load");
        assert_eq!(config.click_log_path, "data/processed/clicks_clean.csv");
        assert_eq!(config.n_top, 10);
        assert_eq!(config.n_recommendations, 10);
        assert_eq!(config.precision_k_values, vec![1, 3, 5, 10]);
        assert_eq!(config.n_bootstrap, 1000);
        assert_eq!(config.random_seed, None);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("RECSYS_EVAL_N_TOP", "20");
        std::env::set_var("RECSYS_EVAL_PRECISION_K_VALUES", "1,5");
        std::env::set_var("RECSYS_EVAL_RANDOM_SEED", "7");
        std::env::set_var("RECSYS_EVAL_OUTPUT_FORMAT", "json");

        let config = Config::from_env().expect("overrides should load");
        clear_env();

        assert_eq!(config.n_top, 20);
        assert_eq!(config.precision_k_values, vec![1, 5]);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_evaluation_validation() {
        assert!(EvaluationConfig::default().validate().is_ok());

        let mut invalid = EvaluationConfig::default();
        invalid.n_bootstrap = 0;
        assert!(invalid.validate().is_err());

        invalid = EvaluationConfig::default();
        invalid.precision_k_values = vec![3, 1];
        assert!(invalid.validate().is_err());

        invalid = EvaluationConfig::default();
        invalid.precision_k_values = vec![0, 1];
        assert!(invalid.validate().is_err());

        invalid = EvaluationConfig::default();
        invalid.significance_level = 1.0;
        assert!(invalid.validate().is_err());
    }
}
