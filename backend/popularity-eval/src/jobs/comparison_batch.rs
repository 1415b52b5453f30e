// ============================================
// Comparison Batch Job
// ============================================
//
// Workflow:
// 1. Load the cleaned click export (CSV from the ETL, or JSON Lines)
// 2. Resolve the master seed (configured, or drawn once and logged)
// 3. Build popularity tables and run every evaluation component
// 4. Render the report as text or JSON
//
// Usage:
//   RECSYS_EVAL_CLICK_LOG_PATH=clicks_clean.csv RECSYS_EVAL_RANDOM_SEED=42 popularity-eval

use crate::config::{Config, OutputFormat};
use crate::error::Result;
use crate::services::click_log::ClickLog;
use crate::services::report::{ComparisonReport, ReportAssembler};
use tracing::info;

/// Report of a finished run plus its rendering in the configured format
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub report: ComparisonReport,
    pub rendered: String,
}

pub struct ComparisonBatchJob {
    config: Config,
}

impl ComparisonBatchJob {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<JobOutcome> {
        let seed = self.resolve_seed();
        let seed_source = if self.config.random_seed.is_some() {
            "config"
        } else {
            "entropy"
        };

        info!(
            path = %self.config.click_log_path,
            seed,
            seed_source,
            "Starting comparison batch job"
        );

        let log = ClickLog::load(&self.config.click_log_path)?;
        let report = ReportAssembler::new(self.config.evaluation(seed)).run(&log)?;
        let rendered = render(&report, self.config.output_format)?;

        info!(
            run_id = %report.run_id,
            duration_ms = report.duration_ms,
            "Comparison batch job completed"
        );

        Ok(JobOutcome { report, rendered })
    }

    fn resolve_seed(&self) -> u64 {
        self.config.random_seed.unwrap_or_else(rand::random)
    }
}

pub fn render(report: &ComparisonReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(report.to_string()),
        OutputFormat::Json => report.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::io::Write;

    fn config(path: &str, output_format: OutputFormat) -> Config {
        Config {
            click_log_path: path.to_string(),
            n_top: 5,
            n_recommendations: 2,
            n_random_iterations: 10,
            precision_k_values: vec![1, 2],
            precision_random_draws: 10,
            coverage_trials: 10,
            n_bootstrap: 50,
            significance_level: 0.05,
            random_seed: Some(42),
            output_format,
            log_level: "info".to_string(),
        }
    }

    fn write_log() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let rows = [
            (1, "a1", 2, 25),
            (1, "a2", 2, 25),
            (2, "a1", 2, 27),
            (3, "a3", 1, 33),
            (4, "a3", 1, 41),
            (4, "a4", 1, 41),
            (5, "a5", 2, 64),
        ];
        for (user, article, gender, age) in rows {
            writeln!(
                file,
                r#"{{"ehr_id": {}, "article_id": "{}", "gender": {}, "age": {}, "title": "T {}", "url": "/{}", "action_type": "CLICKED"}}"#,
                user, article, gender, age, article, article
            )
            .unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_run_with_fixed_seed() {
        let file = write_log();
        let path = file.path().to_str().unwrap();

        let outcome = ComparisonBatchJob::new(config(path, OutputFormat::Json))
            .run()
            .unwrap();
        assert_eq!(outcome.report.config.seed, 42);
        assert_eq!(outcome.report.summary.users, 5);

        let json: serde_json::Value = serde_json::from_str(&outcome.rendered).unwrap();
        assert_eq!(json["config"]["seed"], 42);
        assert_eq!(json["summary"]["articles"], 5);
    }

    #[test]
    fn test_text_output() {
        let file = write_log();
        let path = file.path().to_str().unwrap();

        let outcome = ComparisonBatchJob::new(config(path, OutputFormat::Text))
            .run()
            .unwrap();
        assert!(outcome.rendered.contains("POPULARITY BASELINE COMPARISON"));
        assert!(outcome.rendered.contains("Seed: 42"));
    }

    #[test]
    fn test_missing_file() {
        let job = ComparisonBatchJob::new(config("/nonexistent/clicks.jsonl", OutputFormat::Text));
        let err = job.run().unwrap_err();
        assert!(matches!(err, AppError::Io(msg) if msg.contains("/nonexistent/clicks.jsonl")));
    }
}
