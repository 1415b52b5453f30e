// ============================================
// Comparison Report
// ============================================
//
// Runs every component over one click log and collects the results into a
// single typed report. A failing component fails the whole run; no partial
// report is produced.
//
// Each randomised component owns an RNG derived from the master seed:
//   evaluation   seed
//   precision@K  seed + 1
//   coverage     seed + 2
//   bootstrap    seed + 3

use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::models::{ArticleId, Method};
use crate::services::catalog::{ArticleRow, Catalog, CatalogBuilder, SegmentTopRow};
use crate::services::click_log::ClickLog;
use crate::services::coverage::{CoverageAnalyzer, CoverageReport};
use crate::services::evaluation::{EvaluationEngine, EvaluationReport, MethodMetrics};
use crate::services::precision::{PrecisionAtK, PrecisionAtKRow};
use crate::services::significance::{
    PairwiseSignificance, SignificanceReport, SignificanceTester,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Segment vs global hit-rate gaps below this many percent count as a tie
const COMPARABLE_THRESHOLD_PCT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub events: usize,
    pub users: usize,
    pub articles: usize,
    pub segments: usize,
}

/// Popularity tables in flat, export-ready form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogTables {
    pub segment_tops: Vec<SegmentTopRow>,
    pub global_top: Vec<ArticleId>,
    pub articles_info: Vec<ArticleRow>,
}

impl From<&Catalog> for CatalogTables {
    fn from(catalog: &Catalog) -> Self {
        Self {
            segment_tops: catalog.segment_top_rows(),
            global_top: catalog.global_top.clone(),
            articles_info: catalog.article_rows(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationVerdict {
    Comparable,
    SegmentBetter,
    GlobalBetter,
}

impl SegmentationVerdict {
    fn from_improvement(segment_vs_global_pct: f64) -> Self {
        if segment_vs_global_pct.abs() < COMPARABLE_THRESHOLD_PCT {
            SegmentationVerdict::Comparable
        } else if segment_vs_global_pct > 0.0 {
            SegmentationVerdict::SegmentBetter
        } else {
            SegmentationVerdict::GlobalBetter
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SegmentationVerdict::Comparable => {
                "Segment tops and the global top perform comparably (difference < 5%); \
                 the global top is the simpler choice"
            }
            SegmentationVerdict::SegmentBetter => {
                "Segmentation gives a clear improvement over the global top"
            }
            SegmentationVerdict::GlobalBetter => {
                "The global top beats segmentation; segments may lack data"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conclusions {
    /// Segment or global, whichever has the higher hit rate (segment on a tie)
    pub best_method: Method,
    pub best_vs_random_hit_rate_improvement: f64,
    pub verdict: SegmentationVerdict,
}

impl Conclusions {
    fn from_evaluation(evaluation: &EvaluationReport) -> Self {
        let (best_method, best_vs_random) =
            if evaluation.segment.hit_rate >= evaluation.global.hit_rate {
                (Method::Segment, &evaluation.segment_vs_random)
            } else {
                (Method::Global, &evaluation.global_vs_random)
            };

        Self {
            best_method,
            best_vs_random_hit_rate_improvement: best_vs_random.hit_rate_improvement,
            verdict: SegmentationVerdict::from_improvement(
                evaluation.segment_vs_global.hit_rate_improvement,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub config: EvaluationConfig,
    pub summary: RunSummary,
    pub tables: CatalogTables,
    pub evaluation: EvaluationReport,
    pub precision_at_k: Vec<PrecisionAtKRow>,
    pub coverage: CoverageReport,
    pub significance: SignificanceReport,
    pub conclusions: Conclusions,
}

impl ComparisonReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Orchestrates one comparison run
pub struct ReportAssembler {
    config: EvaluationConfig,
}

impl ReportAssembler {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, log: &ClickLog) -> Result<ComparisonReport> {
        self.config.validate()?;

        let start_time = Instant::now();
        let generated_at = Utc::now();
        let run_id = Uuid::new_v4();
        let seed = self.config.seed;

        info!(
            run_id = %run_id,
            seed,
            events = log.len(),
            "Starting comparison run"
        );

        let catalog = CatalogBuilder::new(self.config.n_top).build(log)?;
        let users = log.users();

        let evaluation = EvaluationEngine::new(
            &catalog,
            self.config.n_recommendations,
            self.config.n_random_iterations,
        )
        .evaluate(&users, &mut StdRng::seed_from_u64(seed))?;

        let precision_at_k = PrecisionAtK::new(
            &catalog,
            self.config.precision_k_values.clone(),
            self.config.precision_random_draws,
        )
        .compute(&users, &mut StdRng::seed_from_u64(seed.wrapping_add(1)))?;

        let coverage = CoverageAnalyzer::new(
            &catalog,
            self.config.n_recommendations,
            self.config.coverage_trials,
        )
        .analyze(&mut StdRng::seed_from_u64(seed.wrapping_add(2)))?;

        let significance = SignificanceTester::new(
            &catalog,
            self.config.n_recommendations,
            self.config.n_bootstrap,
            self.config.significance_level,
        )
        .test(&users, &mut StdRng::seed_from_u64(seed.wrapping_add(3)));

        let conclusions = Conclusions::from_evaluation(&evaluation);
        let duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            run_id = %run_id,
            users = users.len(),
            articles = catalog.n_articles(),
            best_method = conclusions.best_method.as_str(),
            duration_ms,
            "Comparison run completed"
        );

        Ok(ComparisonReport {
            run_id,
            generated_at,
            duration_ms,
            config: self.config.clone(),
            summary: RunSummary {
                events: log.len(),
                users: users.len(),
                articles: catalog.n_articles(),
                segments: catalog.n_segments(),
            },
            tables: CatalogTables::from(&catalog),
            evaluation,
            precision_at_k,
            coverage,
            significance,
            conclusions,
        })
    }
}

// ============================================
// Text rendering
// ============================================

const WIDE_RULE: &str =
    "================================================================================";
const RULE: &str = "------------------------------------------------------------";

fn write_metrics_row(
    f: &mut fmt::Formatter<'_>,
    method: Method,
    m: &MethodMetrics,
) -> fmt::Result {
    writeln!(
        f,
        "{:<20} {:<12.4} {:<12.4} {:<12.4} {:<12}",
        method.display_name(),
        m.hit_rate,
        m.avg_clicks_in_top,
        m.precision,
        m.users_with_hits
    )
}

fn write_pairwise(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    result: &PairwiseSignificance,
    significance_level: f64,
) -> fmt::Result {
    writeln!(f, "\n{}:", label)?;
    writeln!(f, "  Mean difference: {:.4}", result.mean_diff)?;
    writeln!(
        f,
        "  95% CI: [{:.4}, {:.4}]",
        result.ci_95.lower, result.ci_95.upper
    )?;
    writeln!(f, "  p-value: {:.4}", result.p_value)?;
    if result.significant {
        writeln!(f, "  Significant (p < {})", significance_level)
    } else {
        writeln!(f, "  Not significant")
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eval = &self.evaluation;

        writeln!(f, "{}", WIDE_RULE)?;
        writeln!(f, "POPULARITY BASELINE COMPARISON")?;
        writeln!(f, "{}", WIDE_RULE)?;
        writeln!(f, "Run {} at {}", self.run_id, self.generated_at.to_rfc3339())?;
        writeln!(f, "Seed: {}", self.config.seed)?;
        writeln!(
            f,
            "Events: {}  Users: {}  Articles: {}  Segments: {}",
            self.summary.events,
            self.summary.users,
            self.summary.articles,
            self.summary.segments
        )?;
        writeln!(f, "1. Segment tops (gender x age group)")?;
        writeln!(f, "2. Global top-{} for everyone", self.config.n_recommendations)?;
        writeln!(f, "3. Random recommendations")?;
        writeln!(f, "{}", WIDE_RULE)?;

        writeln!(f, "\nMAIN METRICS")?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "{:<20} {:<12} {:<12} {:<12} {:<12}",
            "Method", "Hit Rate", "Avg Clicks", "Precision", "Users w/hits"
        )?;
        write_metrics_row(f, Method::Segment, &eval.segment)?;
        write_metrics_row(f, Method::Global, &eval.global)?;
        write_metrics_row(f, Method::Random, &eval.random)?;

        writeln!(f, "\nRELATIVE IMPROVEMENTS")?;
        writeln!(f, "{}", RULE)?;
        for (label, imp) in [
            ("Segment tops vs Random", &eval.segment_vs_random),
            ("Global top vs Random", &eval.global_vs_random),
            ("Segment tops vs Global top", &eval.segment_vs_global),
        ] {
            writeln!(f, "\n{}:", label)?;
            writeln!(f, "  Hit Rate: {:+.1}%", imp.hit_rate_improvement)?;
            writeln!(f, "  Avg clicks: {:+.1}%", imp.avg_clicks_improvement)?;
            writeln!(f, "  Precision: {:+.1}%", imp.precision_improvement)?;
        }

        writeln!(f, "\nPRECISION@K")?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "{:<5} {:<12} {:<12} {:<12} {:<15} {:<15}",
            "K", "Segment", "Global", "Random", "Seg vs Rand", "Seg vs Glob"
        )?;
        for row in &self.precision_at_k {
            writeln!(
                f,
                "{:<5} {:<12.4} {:<12.4} {:<12.4} {:<15} {:<15}",
                row.k,
                row.segment,
                row.global,
                row.random,
                format!("{:+.1}%", row.segment_vs_random_pct),
                format!("{:+.1}%", row.segment_vs_global_pct)
            )?;
        }

        let cov = &self.coverage;
        writeln!(f, "\nCATALOG COVERAGE")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Segment tops:")?;
        writeln!(
            f,
            "  Coverage: {:.4} ({} articles)",
            cov.segment_coverage, cov.segment_unique_articles
        )?;
        writeln!(f, "  Gini coefficient: {:.4}", cov.segment_gini)?;
        writeln!(f, "\nGlobal top:")?;
        writeln!(
            f,
            "  Coverage: {:.4} ({} articles)",
            cov.global_coverage, cov.global_unique_articles
        )?;
        writeln!(f, "\nRandom (simulated):")?;
        writeln!(f, "  Coverage: {:.4}", cov.random_coverage)?;
        writeln!(f, "\nConcentration ratios (lower = more concentrated):")?;
        writeln!(
            f,
            "  Segment/Random: {:.2}x",
            cov.concentration_ratio_segment_vs_random
        )?;
        writeln!(
            f,
            "  Global/Random: {:.2}x",
            cov.concentration_ratio_global_vs_random
        )?;

        let sig = &self.significance;
        writeln!(
            f,
            "\nSTATISTICAL SIGNIFICANCE (bootstrap, n={})",
            sig.n_bootstrap
        )?;
        writeln!(f, "{}", RULE)?;
        let level = self.config.significance_level;
        write_pairwise(f, "Segment tops vs Random", &sig.segment_vs_random, level)?;
        write_pairwise(f, "Global top vs Random", &sig.global_vs_random, level)?;
        write_pairwise(f, "Segment tops vs Global top", &sig.segment_vs_global, level)?;

        let conclusions = &self.conclusions;
        writeln!(f, "\n{}", WIDE_RULE)?;
        writeln!(f, "CONCLUSIONS")?;
        writeln!(f, "{}", WIDE_RULE)?;
        writeln!(
            f,
            "\n1. Best method by hit rate: {}",
            conclusions.best_method.display_name()
        )?;
        writeln!(
            f,
            "2. Improvement over random: {:.1}%",
            conclusions.best_vs_random_hit_rate_improvement
        )?;
        writeln!(f, "3. {}", conclusions.verdict.describe())?;
        writeln!(f, "\n{}", WIDE_RULE)
    }
}
