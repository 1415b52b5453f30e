//! Non-personalized baseline recommenders.
//!
//! All three are pure lookups over a built [`Catalog`]; only the random
//! baseline draws from the caller-supplied RNG.

use crate::models::{ArticleId, Gender, Recommendation, SegmentKey};
use crate::services::catalog::Catalog;
use rand::seq::index;
use rand::Rng;
use tracing::debug;

/// Top articles of the `(gender, age group)` segment, in table order
pub fn recommend_segment(
    gender: Gender,
    age: u32,
    catalog: &Catalog,
    n: usize,
) -> Vec<Recommendation> {
    let segment = SegmentKey::from_age(gender, age);
    let top = catalog.segment_top(&segment);
    join_with_catalog(catalog, top.iter().take(n))
}

/// Top articles across all users, in table order
pub fn recommend_global(catalog: &Catalog, n: usize) -> Vec<Recommendation> {
    join_with_catalog(catalog, catalog.global_top.iter().take(n))
}

/// `min(n, catalog size)` distinct articles drawn uniformly, in sample order
pub fn recommend_random<R: Rng + ?Sized>(
    catalog: &Catalog,
    n: usize,
    rng: &mut R,
) -> Vec<Recommendation> {
    let sampled = sample_articles(&catalog.all_articles, n, rng);
    join_with_catalog(catalog, sampled.into_iter())
}

/// Draw up to `n` distinct articles without replacement.
///
/// Requests larger than the pool are clamped to the pool size.
pub fn sample_articles<'a, R: Rng + ?Sized>(
    articles: &'a [ArticleId],
    n: usize,
    rng: &mut R,
) -> Vec<&'a ArticleId> {
    let amount = n.min(articles.len());
    if amount < n {
        debug!(
            requested = n,
            available = articles.len(),
            "Random sample clamped to catalog size"
        );
    }

    index::sample(rng, articles.len(), amount)
        .into_iter()
        .map(|idx| &articles[idx])
        .collect()
}

fn join_with_catalog<'a, I>(catalog: &Catalog, article_ids: I) -> Vec<Recommendation>
where
    I: Iterator<Item = &'a ArticleId>,
{
    article_ids
        .filter_map(|article_id| {
            catalog
                .articles_info
                .get(article_id)
                .map(|info| Recommendation {
                    article_id: article_id.clone(),
                    title: info.title.clone(),
                    url: info.url.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClickEvent;
    use crate::services::catalog::CatalogBuilder;
    use crate::services::click_log::ClickLog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn catalog() -> Catalog {
        let click = |user: &str, article: &str, gender: Gender, age: u32| ClickEvent {
            user_id: user.into(),
            article_id: article.into(),
            gender,
            age,
            title: format!("title {}", article),
            url: format!("/articles/{}", article),
        };
        let log = ClickLog::new(vec![
            click("u1", "a1", Gender::Male, 25),
            click("u1", "a2", Gender::Male, 25),
            click("u2", "a2", Gender::Male, 27),
            click("u3", "a3", Gender::Female, 64),
            click("u4", "a4", Gender::Female, 35),
        ]);
        CatalogBuilder::new(10).build(&log).unwrap()
    }

    fn ids(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.article_id.0.as_str()).collect()
    }

    #[test]
    fn test_recommend_segment() {
        let catalog = catalog();

        let recs = recommend_segment(Gender::Male, 20, &catalog, 10);
        assert_eq!(ids(&recs), vec!["a2", "a1"]);
        assert_eq!(recs[0].title, "title a2");
        assert_eq!(recs[0].url, "/articles/a2");

        let truncated = recommend_segment(Gender::Male, 20, &catalog, 1);
        assert_eq!(ids(&truncated), vec!["a2"]);

        // no clicks from that segment
        assert!(recommend_segment(Gender::Female, 12, &catalog, 10).is_empty());
    }

    #[test]
    fn test_recommend_global() {
        let catalog = catalog();
        assert_eq!(ids(&recommend_global(&catalog, 2)), vec!["a2", "a1"]);
        assert_eq!(recommend_global(&catalog, 100).len(), 4);
    }

    #[test]
    fn test_recommend_random_distinct_and_clamped() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(7);

        let recs = recommend_random(&catalog, 3, &mut rng);
        assert_eq!(recs.len(), 3);
        let unique: HashSet<_> = recs.iter().map(|r| r.article_id.clone()).collect();
        assert_eq!(unique.len(), 3);

        let all = recommend_random(&catalog, 50, &mut rng);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_recommend_random_reproducible() {
        let catalog = catalog();
        let first = recommend_random(&catalog, 2, &mut StdRng::seed_from_u64(11));
        let second = recommend_random(&catalog, 2, &mut StdRng::seed_from_u64(11));
        assert_eq!(first, second);
    }

    #[test]
    fn test_lookups_do_not_mutate_catalog() {
        let catalog = catalog();
        let before = catalog.clone();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..5 {
            recommend_segment(Gender::Male, 25, &catalog, 2);
            recommend_global(&catalog, 2);
            recommend_random(&catalog, 2, &mut rng);
        }
        assert_eq!(catalog, before);
    }
}
