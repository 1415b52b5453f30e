use crate::error::Result;
use crate::models::ArticleId;
use crate::services::baselines::sample_articles;
use crate::services::catalog::Catalog;
use crate::utils::{checked_ratio, fraction, mean};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub segment_coverage: f64,
    pub global_coverage: f64,
    pub random_coverage: f64,
    pub segment_unique_articles: usize,
    pub global_unique_articles: usize,
    pub segment_gini: f64,
    /// Coverage relative to random; below 1.0 means more concentrated than chance
    pub concentration_ratio_segment_vs_random: f64,
    pub concentration_ratio_global_vs_random: f64,
}

/// Catalog coverage and concentration of the recommendation methods
pub struct CoverageAnalyzer<'a> {
    catalog: &'a Catalog,
    n_recommendations: usize,
    trials: usize,
}

impl<'a> CoverageAnalyzer<'a> {
    pub fn new(catalog: &'a Catalog, n_recommendations: usize, trials: usize) -> Self {
        Self {
            catalog,
            n_recommendations,
            trials,
        }
    }

    pub fn analyze<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CoverageReport> {
        let n_articles = self.catalog.n_articles();
        if n_articles == 0 {
            warn!("Empty catalog; coverage defaults to zero");
        }

        let segment_entries = self.segment_entries();
        let segment_articles: HashSet<&ArticleId> = segment_entries.iter().copied().collect();
        let global_articles: HashSet<&ArticleId> = self
            .catalog
            .global_top
            .iter()
            .take(self.n_recommendations)
            .collect();

        let segment_coverage = fraction(segment_articles.len() as f64, n_articles as f64);
        let global_coverage = fraction(global_articles.len() as f64, n_articles as f64);
        let random_coverage = self.simulate_random_coverage(rng);

        // Appearances of each article across segment lists
        let mut frequency: HashMap<&ArticleId, usize> = HashMap::new();
        for article_id in segment_entries {
            *frequency.entry(article_id).or_insert(0) += 1;
        }
        let counts: Vec<usize> = frequency.into_values().collect();
        let segment_gini = gini(&counts);

        info!(
            segment_coverage,
            global_coverage,
            random_coverage,
            segment_gini,
            "Coverage analysis completed"
        );

        Ok(CoverageReport {
            segment_coverage,
            global_coverage,
            random_coverage,
            segment_unique_articles: segment_articles.len(),
            global_unique_articles: global_articles.len(),
            segment_gini,
            concentration_ratio_segment_vs_random: checked_ratio(
                segment_coverage,
                random_coverage,
                "segment vs random coverage",
            )?,
            concentration_ratio_global_vs_random: checked_ratio(
                global_coverage,
                random_coverage,
                "global vs random coverage",
            )?,
        })
    }

    /// Every entry of every segment's top-n list, duplicates included
    fn segment_entries(&self) -> Vec<&'a ArticleId> {
        self.catalog
            .segment_tops
            .values()
            .flat_map(|articles| articles.iter().take(self.n_recommendations))
            .collect()
    }

    /// Mean coverage of `trials` simulations, each drawing one random list
    /// per discovered segment
    fn simulate_random_coverage<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let n_articles = self.catalog.n_articles();
        let n_segments = self.catalog.n_segments();

        let trials: Vec<f64> = (0..self.trials)
            .map(|_| {
                let mut covered: HashSet<&ArticleId> = HashSet::new();
                for _ in 0..n_segments {
                    covered.extend(sample_articles(
                        &self.catalog.all_articles,
                        self.n_recommendations,
                        rng,
                    ));
                }
                fraction(covered.len() as f64, n_articles as f64)
            })
            .collect();

        mean(&trials)
    }
}

/// Gini coefficient of non-negative counts; 0.0 when there is nothing to compare.
///
/// `G = 2 * sum(i * x_i) / (n * sum(x)) - (n + 1) / n` over ascending counts, 1-indexed.
pub fn gini(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if counts.is_empty() || total == 0 {
        return 0.0;
    }

    let mut sorted = counts.to_vec();
    sorted.sort_unstable();

    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| (i + 1) as f64 * x as f64)
        .sum();

    (2.0 * weighted) / (n * total as f64) - (n + 1.0) / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ClickEvent, Gender};
    use crate::services::catalog::CatalogBuilder;
    use crate::services::click_log::ClickLog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn click(user: &str, article: &str, gender: Gender, age: u32) -> ClickEvent {
        ClickEvent {
            user_id: user.into(),
            article_id: article.into(),
            gender,
            age,
            title: String::new(),
            url: String::new(),
        }
    }

    fn catalog(n_top: usize) -> Catalog {
        let log = ClickLog::new(vec![
            click("u1", "a1", Gender::Male, 25),
            click("u1", "a2", Gender::Male, 25),
            click("u2", "a1", Gender::Female, 70),
            click("u3", "a3", Gender::Female, 35),
            click("u4", "a4", Gender::Male, 50),
            click("u5", "a5", Gender::Male, 50),
            click("u5", "a1", Gender::Male, 50),
            click("u6", "a6", Gender::Female, 15),
        ]);
        CatalogBuilder::new(n_top).build(&log).unwrap()
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0, 0]), 0.0);
        assert!(gini(&[7]).abs() < 1e-12);
        assert!(gini(&[3, 3, 3]).abs() < 1e-12);
        // (2 * (1*0 + 2*0 + 3*6)) / (3 * 6) - 4/3 = 2/3
        assert!((gini(&[0, 6, 0]) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_coverage_values() {
        let catalog = catalog(1);
        let report = CoverageAnalyzer::new(&catalog, 1, 50)
            .analyze(&mut StdRng::seed_from_u64(3))
            .unwrap();

        // segment top-1: male/18-29 a1, female/60+ a1, female/30-44 a3,
        // male/45-59 a4, female/0-17 a6
        assert_eq!(report.segment_unique_articles, 4);
        assert!((report.segment_coverage - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(report.global_unique_articles, 1);
        assert!((report.global_coverage - 1.0 / 6.0).abs() < 1e-12);

        // a1 appears twice, a3, a4, a6 once each
        assert!((report.segment_gini - gini(&[2, 1, 1, 1])).abs() < 1e-12);

        for coverage in [
            report.segment_coverage,
            report.global_coverage,
            report.random_coverage,
        ] {
            assert!((0.0..=1.0).contains(&coverage));
        }
        assert!(report.random_coverage > 0.0);
    }

    #[test]
    fn test_random_coverage_saturates() {
        let catalog = catalog(10);
        let report = CoverageAnalyzer::new(&catalog, 6, 20)
            .analyze(&mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(report.random_coverage, 1.0);

        let report = CoverageAnalyzer::new(&catalog, 50, 20)
            .analyze(&mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(report.random_coverage, 1.0);
        assert_eq!(report.global_coverage, 1.0);
    }

    #[test]
    fn test_empty_catalog_ratio_is_undefined() {
        let catalog = CatalogBuilder::new(5).build(&ClickLog::default()).unwrap();
        let err = CoverageAnalyzer::new(&catalog, 5, 10)
            .analyze(&mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, AppError::UndefinedRatio(_)));
    }
}
