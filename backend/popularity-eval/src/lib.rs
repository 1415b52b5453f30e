pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{Config, EvaluationConfig};
pub use error::{AppError, Result};
pub use services::{
    Catalog, CatalogBuilder, ClickLog, ComparisonReport, CoverageAnalyzer, EvaluationEngine,
    PrecisionAtK, ReportAssembler, SignificanceTester,
};
