// ============================================
// Evaluation Engine
// ============================================
//
// Scores the three baselines against each user's click set:
//   hit_rate  = users with >= 1 recommended article clicked / users
//   precision = mean over users of |matches| / |recommendation list|
//
// Ground truth is the same click log the popularity tables were built from
// (no held-out split). Numbers describe how well each heuristic explains
// observed behaviour, and are comparable only across methods of one run.

use crate::error::Result;
use crate::models::{ArticleId, UserProfile};
use crate::services::baselines::sample_articles;
use crate::services::catalog::Catalog;
use crate::utils::{fraction, mean, median, relative_improvement};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMetrics {
    pub hit_rate: f64,
    pub avg_clicks_in_top: f64,
    pub median_clicks_in_top: f64,
    pub precision: f64,
    pub users_with_hits: usize,
}

/// Relative improvements of one method over another, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub hit_rate_improvement: f64,
    pub avg_clicks_improvement: f64,
    pub precision_improvement: f64,
}

impl Improvement {
    pub fn between(a: &MethodMetrics, b: &MethodMetrics, label: &str) -> Result<Self> {
        Ok(Self {
            hit_rate_improvement: relative_improvement(
                a.hit_rate,
                b.hit_rate,
                &format!("{} hit rate", label),
            )?,
            avg_clicks_improvement: relative_improvement(
                a.avg_clicks_in_top,
                b.avg_clicks_in_top,
                &format!("{} average clicks", label),
            )?,
            precision_improvement: relative_improvement(
                a.precision,
                b.precision,
                &format!("{} precision", label),
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub users_evaluated: usize,
    pub segment: MethodMetrics,
    pub global: MethodMetrics,
    pub random: MethodMetrics,
    pub segment_vs_random: Improvement,
    pub global_vs_random: Improvement,
    pub segment_vs_global: Improvement,
}

/// Per-method accumulator over users
#[derive(Debug, Default)]
struct MethodTally {
    /// Sum of per-user hit indicators (fractions for the random baseline)
    hits: f64,
    clicks: Vec<f64>,
    precisions: Vec<f64>,
}

impl MethodTally {
    fn record(&mut self, hit: f64, clicks: f64, precision: Option<f64>) {
        self.hits += hit;
        self.clicks.push(clicks);
        if let Some(precision) = precision {
            self.precisions.push(precision);
        }
    }

    fn finish(self, total_users: usize) -> MethodMetrics {
        MethodMetrics {
            hit_rate: fraction(self.hits, total_users as f64),
            avg_clicks_in_top: mean(&self.clicks),
            median_clicks_in_top: median(&self.clicks),
            precision: mean(&self.precisions),
            // sums of random hit fractions carry rounding error (0.1 * 10 < 1.0)
            users_with_hits: self.hits.round() as usize,
        }
    }
}

/// Overlap of one recommendation list with a user's clicks.
/// Precision is `None` for an empty list.
fn score_list(user: &UserProfile, recs: &[&ArticleId]) -> (usize, Option<f64>) {
    let matches = user.matches(recs.iter().copied());
    let precision = if recs.is_empty() {
        None
    } else {
        Some(matches as f64 / recs.len() as f64)
    };
    (matches, precision)
}

pub struct EvaluationEngine<'a> {
    catalog: &'a Catalog,
    n_recommendations: usize,
    n_random_iterations: usize,
}

impl<'a> EvaluationEngine<'a> {
    pub fn new(
        catalog: &'a Catalog,
        n_recommendations: usize,
        n_random_iterations: usize,
    ) -> Self {
        Self {
            catalog,
            n_recommendations,
            n_random_iterations,
        }
    }

    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        users: &[UserProfile],
        rng: &mut R,
    ) -> Result<EvaluationReport> {
        if users.is_empty() {
            warn!("No users to evaluate; metrics default to zero");
        }

        let mut segment = MethodTally::default();
        let mut global = MethodTally::default();
        let mut random = MethodTally::default();

        let global_recs: Vec<&ArticleId> = self
            .catalog
            .global_top
            .iter()
            .take(self.n_recommendations)
            .collect();

        for user in users {
            let segment_recs: Vec<&ArticleId> = self
                .catalog
                .segment_top(&user.segment)
                .iter()
                .take(self.n_recommendations)
                .collect();
            let (matches, precision) = score_list(user, &segment_recs);
            segment.record(indicator(matches), matches as f64, precision);

            let (matches, precision) = score_list(user, &global_recs);
            global.record(indicator(matches), matches as f64, precision);

            let (hit, clicks, precision) = self.score_random(user, rng);
            random.record(hit, clicks, precision);
        }

        let segment = segment.finish(users.len());
        let global = global.finish(users.len());
        let random = random.finish(users.len());

        info!(
            users = users.len(),
            segment_hit_rate = segment.hit_rate,
            global_hit_rate = global.hit_rate,
            random_hit_rate = random.hit_rate,
            "Baseline evaluation completed"
        );

        Ok(EvaluationReport {
            users_evaluated: users.len(),
            segment_vs_random: Improvement::between(&segment, &random, "segment vs random")?,
            global_vs_random: Improvement::between(&global, &random, "global vs random")?,
            segment_vs_global: Improvement::between(&segment, &global, "segment vs global")?,
            segment,
            global,
            random,
        })
    }

    /// Random baseline averaged over independent draws for one user
    fn score_random<R: Rng + ?Sized>(
        &self,
        user: &UserProfile,
        rng: &mut R,
    ) -> (f64, f64, Option<f64>) {
        let mut hits = Vec::with_capacity(self.n_random_iterations);
        let mut clicks = Vec::with_capacity(self.n_random_iterations);
        let mut precisions = Vec::with_capacity(self.n_random_iterations);

        for _ in 0..self.n_random_iterations {
            let recs = sample_articles(&self.catalog.all_articles, self.n_recommendations, rng);
            let (matches, precision) = score_list(user, &recs);
            hits.push(indicator(matches));
            clicks.push(matches as f64);
            precisions.extend(precision);
        }

        let precision = if precisions.is_empty() {
            None
        } else {
            Some(mean(&precisions))
        };
        (mean(&hits), mean(&clicks), precision)
    }
}

fn indicator(matches: usize) -> f64 {
    if matches > 0 {
        1.0
    } else {
        0.0
    }
}
