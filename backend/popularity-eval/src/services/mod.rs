pub mod baselines;
pub mod catalog;
pub mod click_log;
pub mod coverage;
pub mod evaluation;
pub mod precision;
pub mod report;
pub mod significance;

pub use catalog::{Catalog, CatalogBuilder};
pub use click_log::ClickLog;
pub use coverage::CoverageAnalyzer;
pub use evaluation::EvaluationEngine;
pub use precision::PrecisionAtK;
pub use report::{ComparisonReport, ReportAssembler};
pub use significance::SignificanceTester;
