use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub String);

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

impl From<&str> for ArticleId {
    fn from(id: &str) -> Self {
        ArticleId(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gender as coded in the click export (1 = female, 2 = male)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Gender {
    Female = 1,
    Male = 2,
}

impl Gender {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }
}

impl TryFrom<u8> for Gender {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Gender::Female),
            2 => Ok(Gender::Male),
            other => Err(format!("gender must be 1 or 2, got {}", other)),
        }
    }
}

impl From<Gender> for u8 {
    fn from(gender: Gender) -> Self {
        gender.code()
    }
}

/// Age bucket used for demographic segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Under18,
    From18To29,
    From30To44,
    From45To59,
    Over60,
}

impl AgeGroup {
    /// Bucket thresholds: <18, <30, <45, <60, rest
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=17 => AgeGroup::Under18,
            18..=29 => AgeGroup::From18To29,
            30..=44 => AgeGroup::From30To44,
            45..=59 => AgeGroup::From45To59,
            _ => AgeGroup::Over60,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            AgeGroup::Under18 => 0,
            AgeGroup::From18To29 => 1,
            AgeGroup::From30To44 => 2,
            AgeGroup::From45To59 => 3,
            AgeGroup::Over60 => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Under18 => "0-17",
            AgeGroup::From18To29 => "18-29",
            AgeGroup::From30To44 => "30-44",
            AgeGroup::From45To59 => "45-59",
            AgeGroup::Over60 => "60+",
        }
    }
}

/// Demographic segment: (gender, age group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub gender: Gender,
    pub age_group: AgeGroup,
}

impl SegmentKey {
    pub fn new(gender: Gender, age_group: AgeGroup) -> Self {
        Self { gender, age_group }
    }

    pub fn from_age(gender: Gender, age: u32) -> Self {
        Self::new(gender, AgeGroup::from_age(age))
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gender.label(), self.age_group.label())
    }
}

/// A single click, immutable after load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub user_id: UserId,
    pub article_id: ArticleId,
    pub gender: Gender,
    pub age: u32,
    pub title: String,
    pub url: String,
}

impl ClickEvent {
    pub fn age_group(&self) -> AgeGroup {
        AgeGroup::from_age(self.age)
    }

    pub fn segment(&self) -> SegmentKey {
        SegmentKey::from_age(self.gender, self.age)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleInfo {
    pub title: String,
    pub url: String,
}

/// One entry of a recommendation list, joined with the article catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub article_id: ArticleId,
    pub title: String,
    pub url: String,
}

/// Evaluation-time view of a user.
///
/// `clicks` is the user's full click set, i.e. the same data the popularity
/// tables are built from. Scores measure how well each heuristic explains
/// observed behaviour, not held-out accuracy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub segment: SegmentKey,
    pub clicks: HashSet<ArticleId>,
}

impl UserProfile {
    /// Number of recommended articles the user actually clicked
    pub fn matches<'a, I>(&self, recommended: I) -> usize
    where
        I: IntoIterator<Item = &'a ArticleId>,
    {
        let mut seen: HashSet<&ArticleId> = HashSet::new();
        recommended
            .into_iter()
            .filter(|id| seen.insert(*id) && self.clicks.contains(*id))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Segment,
    Global,
    Random,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Segment => "segment",
            Method::Global => "global",
            Method::Random => "random",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Method::Segment => "Segment tops",
            Method::Global => "Global top",
            Method::Random => "Random",
        }
    }
}
