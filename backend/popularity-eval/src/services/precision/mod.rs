use crate::error::Result;
use crate::models::{ArticleId, UserProfile};
use crate::services::baselines::sample_articles;
use crate::services::catalog::Catalog;
use crate::utils::{mean, relative_improvement};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Precision of the three methods at one cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionAtKRow {
    pub k: usize,
    pub segment: f64,
    pub global: f64,
    pub random: f64,
    pub segment_vs_random_pct: f64,
    pub global_vs_random_pct: f64,
    pub segment_vs_global_pct: f64,
}

/// Precision@K over an ascending list of cutoffs.
///
/// Precision is `matches / K`: a list shorter than K counts its missing slots
/// as misses. Users whose segment (or global) list is empty are left out of
/// that method's mean. The random baseline takes fresh draws for every K.
pub struct PrecisionAtK<'a> {
    catalog: &'a Catalog,
    k_values: Vec<usize>,
    random_draws: usize,
}

impl<'a> PrecisionAtK<'a> {
    pub fn new(catalog: &'a Catalog, k_values: Vec<usize>, random_draws: usize) -> Self {
        Self {
            catalog,
            k_values,
            random_draws,
        }
    }

    pub fn compute<R: Rng + ?Sized>(
        &self,
        users: &[UserProfile],
        rng: &mut R,
    ) -> Result<Vec<PrecisionAtKRow>> {
        self.k_values
            .iter()
            .map(|&k| self.compute_row(k, users, rng))
            .collect()
    }

    fn compute_row<R: Rng + ?Sized>(
        &self,
        k: usize,
        users: &[UserProfile],
        rng: &mut R,
    ) -> Result<PrecisionAtKRow> {
        let mut segment_precisions = Vec::with_capacity(users.len());
        let mut global_precisions = Vec::with_capacity(users.len());
        let mut random_precisions = Vec::with_capacity(users.len());

        let global_recs: Vec<&ArticleId> = self.catalog.global_top.iter().take(k).collect();

        for user in users {
            let segment_recs: Vec<&ArticleId> = self
                .catalog
                .segment_top(&user.segment)
                .iter()
                .take(k)
                .collect();
            if !segment_recs.is_empty() {
                segment_precisions.push(precision_at(user, &segment_recs, k));
            }

            if !global_recs.is_empty() {
                global_precisions.push(precision_at(user, &global_recs, k));
            }

            let draws: Vec<f64> = (0..self.random_draws)
                .map(|_| {
                    let recs = sample_articles(&self.catalog.all_articles, k, rng);
                    precision_at(user, &recs, k)
                })
                .collect();
            random_precisions.push(mean(&draws));
        }

        let segment = mean(&segment_precisions);
        let global = mean(&global_precisions);
        let random = mean(&random_precisions);

        debug!(k, segment, global, random, "Precision@K computed");

        Ok(PrecisionAtKRow {
            k,
            segment,
            global,
            random,
            segment_vs_random_pct: relative_improvement(
                segment,
                random,
                &format!("precision@{} segment vs random", k),
            )?,
            global_vs_random_pct: relative_improvement(
                global,
                random,
                &format!("precision@{} global vs random", k),
            )?,
            segment_vs_global_pct: relative_improvement(
                segment,
                global,
                &format!("precision@{} segment vs global", k),
            )?,
        })
    }
}

fn precision_at(user: &UserProfile, recs: &[&ArticleId], k: usize) -> f64 {
    user.matches(recs.iter().copied()) as f64 / k as f64
}
