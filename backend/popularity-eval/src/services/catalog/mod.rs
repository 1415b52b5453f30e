use crate::error::{AppError, Result};
use crate::models::{ArticleId, ArticleInfo, SegmentKey};
use crate::services::click_log::ClickLog;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Click counts per article, remembering first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickCounts {
    counts: Vec<(ArticleId, usize)>,
    position: HashMap<ArticleId, usize>,
}

impl ClickCounts {
    fn record(&mut self, article_id: &ArticleId) {
        match self.position.get(article_id) {
            Some(&pos) => self.counts[pos].1 += 1,
            None => {
                self.position.insert(article_id.clone(), self.counts.len());
                self.counts.push((article_id.clone(), 1));
            }
        }
    }

    pub fn get(&self, article_id: &ArticleId) -> usize {
        self.position
            .get(article_id)
            .map(|&pos| self.counts[pos].1)
            .unwrap_or(0)
    }

    /// Distinct articles seen
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Articles by descending count; ties keep first-seen order (stable sort)
    pub fn ranked(&self) -> Vec<(ArticleId, usize)> {
        let mut ranked = self.counts.clone();
        ranked.sort_by_key(|(_, count)| Reverse(*count));
        ranked
    }

    fn top(&self, n: usize) -> Vec<ArticleId> {
        self.ranked()
            .into_iter()
            .take(n)
            .map(|(article_id, _)| article_id)
            .collect()
    }
}

/// Per-segment and global click aggregates, rebuilt on every run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleStats {
    pub segments: BTreeMap<SegmentKey, ClickCounts>,
    pub global: ClickCounts,
}

impl ArticleStats {
    pub fn segment_clicks(&self, segment: &SegmentKey, article_id: &ArticleId) -> usize {
        self.segments
            .get(segment)
            .map(|counts| counts.get(article_id))
            .unwrap_or(0)
    }
}

/// Popularity tables and article catalog derived from a click log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub n_top: usize,
    pub stats: ArticleStats,
    pub segment_tops: BTreeMap<SegmentKey, Vec<ArticleId>>,
    pub global_top: Vec<ArticleId>,
    pub articles_info: HashMap<ArticleId, ArticleInfo>,
    /// Distinct articles in first-seen order
    pub all_articles: Vec<ArticleId>,
}

/// Flat row of a segment top table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentTopRow {
    pub gender: u8,
    pub gender_label: &'static str,
    pub age_group: u8,
    pub age_group_label: &'static str,
    pub rank: usize,
    pub article_id: ArticleId,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRow {
    pub article_id: ArticleId,
    pub title: String,
    pub url: String,
}

impl Catalog {
    pub fn n_segments(&self) -> usize {
        self.segment_tops.len()
    }

    pub fn n_articles(&self) -> usize {
        self.all_articles.len()
    }

    pub fn segment_top(&self, segment: &SegmentKey) -> &[ArticleId] {
        self.segment_tops
            .get(segment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Segment tops as `(gender, age_group, rank, article)` rows,
    /// ordered by gender, age group, rank
    pub fn segment_top_rows(&self) -> Vec<SegmentTopRow> {
        self.segment_tops
            .iter()
            .flat_map(|(segment, articles)| {
                articles.iter().enumerate().map(move |(idx, article_id)| {
                    let info = self.articles_info.get(article_id);
                    SegmentTopRow {
                        gender: segment.gender.code(),
                        gender_label: segment.gender.label(),
                        age_group: segment.age_group.index(),
                        age_group_label: segment.age_group.label(),
                        rank: idx + 1,
                        article_id: article_id.clone(),
                        title: info.map(|i| i.title.clone()).unwrap_or_default(),
                        url: info.map(|i| i.url.clone()).unwrap_or_default(),
                    }
                })
            })
            .collect()
    }

    /// `(article_id, title, url)` rows in first-seen order
    pub fn article_rows(&self) -> Vec<ArticleRow> {
        self.all_articles
            .iter()
            .filter_map(|article_id| {
                self.articles_info.get(article_id).map(|info| ArticleRow {
                    article_id: article_id.clone(),
                    title: info.title.clone(),
                    url: info.url.clone(),
                })
            })
            .collect()
    }
}

/// Builds segment and global top-N tables from a click log
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    n_top: usize,
}

impl CatalogBuilder {
    pub fn new(n_top: usize) -> Self {
        Self { n_top }
    }

    pub fn build(&self, log: &ClickLog) -> Result<Catalog> {
        if self.n_top == 0 {
            return Err(AppError::Configuration(
                "n_top must be greater than 0".to_string(),
            ));
        }

        let mut stats = ArticleStats::default();
        let mut articles_info: HashMap<ArticleId, ArticleInfo> = HashMap::new();
        let mut all_articles: Vec<ArticleId> = Vec::new();

        for event in log.events() {
            stats
                .segments
                .entry(event.segment())
                .or_default()
                .record(&event.article_id);
            stats.global.record(&event.article_id);

            // First occurrence wins for conflicting title/url
            if !articles_info.contains_key(&event.article_id) {
                articles_info.insert(
                    event.article_id.clone(),
                    ArticleInfo {
                        title: event.title.clone(),
                        url: event.url.clone(),
                    },
                );
                all_articles.push(event.article_id.clone());
            }
        }

        let segment_tops: BTreeMap<SegmentKey, Vec<ArticleId>> = stats
            .segments
            .iter()
            .map(|(segment, counts)| (*segment, counts.top(self.n_top)))
            .collect();
        let global_top = stats.global.top(self.n_top);

        if log.is_empty() {
            warn!("Click log is empty; catalog tables are empty");
        }

        info!(
            events = log.len(),
            segments = segment_tops.len(),
            articles = all_articles.len(),
            n_top = self.n_top,
            "Catalog built"
        );

        Ok(Catalog {
            n_top: self.n_top,
            stats,
            segment_tops,
            global_top,
            articles_info,
            all_articles,
        })
    }
}
