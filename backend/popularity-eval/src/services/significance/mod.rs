// ============================================
// Bootstrap Significance Test
// ============================================
//
// Resamples users with replacement `n_bootstrap` times and recomputes each
// method's hit rate per resample:
//   - segment/global: against the fixed popularity tables
//   - random: one fresh draw per sampled user (never reused)
//
// For each pair (A, B) the per-resample differences A - B give:
//   mean_diff, 95% percentile CI [P2.5, P97.5],
//   one-sided p-value = share of differences <= 0  (H1: A beats B)

use crate::models::{ArticleId, UserProfile};
use crate::services::baselines::sample_articles;
use crate::services::catalog::Catalog;
use crate::utils::{fraction, mean, percentile};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CI_LOWER_PERCENTILE: f64 = 2.5;
const CI_UPPER_PERCENTILE: f64 = 97.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseSignificance {
    pub mean_diff: f64,
    pub ci_95: ConfidenceInterval,
    pub p_value: f64,
    pub significant: bool,
}

impl PairwiseSignificance {
    fn from_differences(diffs: &[f64], significance_level: f64) -> Self {
        if diffs.is_empty() {
            return Self {
                mean_diff: 0.0,
                ci_95: ConfidenceInterval {
                    lower: 0.0,
                    upper: 0.0,
                },
                p_value: 1.0,
                significant: false,
            };
        }

        let non_positive = diffs.iter().filter(|d| **d <= 0.0).count();
        let p_value = non_positive as f64 / diffs.len() as f64;

        Self {
            mean_diff: mean(diffs),
            ci_95: ConfidenceInterval {
                lower: percentile(diffs, CI_LOWER_PERCENTILE),
                upper: percentile(diffs, CI_UPPER_PERCENTILE),
            },
            p_value,
            significant: p_value < significance_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceReport {
    pub n_bootstrap: usize,
    pub segment_vs_random: PairwiseSignificance,
    pub global_vs_random: PairwiseSignificance,
    pub segment_vs_global: PairwiseSignificance,
}

/// Hit rates of one bootstrap resample
#[derive(Debug, Clone, Copy)]
struct ResampleHitRates {
    segment: f64,
    global: f64,
    random: f64,
}

pub struct SignificanceTester<'a> {
    catalog: &'a Catalog,
    n_recommendations: usize,
    n_bootstrap: usize,
    significance_level: f64,
}

impl<'a> SignificanceTester<'a> {
    pub fn new(
        catalog: &'a Catalog,
        n_recommendations: usize,
        n_bootstrap: usize,
        significance_level: f64,
    ) -> Self {
        Self {
            catalog,
            n_recommendations,
            n_bootstrap,
            significance_level,
        }
    }

    pub fn test<R: Rng + ?Sized>(&self, users: &[UserProfile], rng: &mut R) -> SignificanceReport {
        if users.is_empty() {
            warn!("No users to resample; bootstrap differences are zero");
        }

        // Deterministic methods hit or miss a given user the same way in every resample
        let global_recs: Vec<&ArticleId> = self
            .catalog
            .global_top
            .iter()
            .take(self.n_recommendations)
            .collect();
        let segment_hits: Vec<bool> = users
            .iter()
            .map(|user| {
                let recs = self
                    .catalog
                    .segment_top(&user.segment)
                    .iter()
                    .take(self.n_recommendations);
                user.matches(recs) > 0
            })
            .collect();
        let global_hits: Vec<bool> = users
            .iter()
            .map(|user| user.matches(global_recs.iter().copied()) > 0)
            .collect();

        let mut segment_vs_random = Vec::with_capacity(self.n_bootstrap);
        let mut global_vs_random = Vec::with_capacity(self.n_bootstrap);
        let mut segment_vs_global = Vec::with_capacity(self.n_bootstrap);

        for _ in 0..self.n_bootstrap {
            let rates = self.resample(users, &segment_hits, &global_hits, rng);
            segment_vs_random.push(rates.segment - rates.random);
            global_vs_random.push(rates.global - rates.random);
            segment_vs_global.push(rates.segment - rates.global);
        }

        let report = SignificanceReport {
            n_bootstrap: self.n_bootstrap,
            segment_vs_random: PairwiseSignificance::from_differences(
                &segment_vs_random,
                self.significance_level,
            ),
            global_vs_random: PairwiseSignificance::from_differences(
                &global_vs_random,
                self.significance_level,
            ),
            segment_vs_global: PairwiseSignificance::from_differences(
                &segment_vs_global,
                self.significance_level,
            ),
        };

        info!(
            n_bootstrap = self.n_bootstrap,
            users = users.len(),
            segment_vs_random_p = report.segment_vs_random.p_value,
            global_vs_random_p = report.global_vs_random.p_value,
            segment_vs_global_p = report.segment_vs_global.p_value,
            "Bootstrap significance test completed"
        );

        report
    }

    fn resample<R: Rng + ?Sized>(
        &self,
        users: &[UserProfile],
        segment_hits: &[bool],
        global_hits: &[bool],
        rng: &mut R,
    ) -> ResampleHitRates {
        let n = users.len();
        let (mut segment, mut global, mut random) = (0usize, 0usize, 0usize);

        for _ in 0..n {
            let idx = rng.gen_range(0..n);
            segment += usize::from(segment_hits[idx]);
            global += usize::from(global_hits[idx]);

            let recs = sample_articles(&self.catalog.all_articles, self.n_recommendations, rng);
            if users[idx].matches(recs) > 0 {
                random += 1;
            }
        }

        ResampleHitRates {
            segment: fraction(segment as f64, n as f64),
            global: fraction(global as f64, n as f64),
            random: fraction(random as f64, n as f64),
        }
    }
}
