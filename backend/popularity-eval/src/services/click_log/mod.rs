use crate::error::{AppError, Result};
use crate::models::{ArticleId, ClickEvent, Gender, UserId, UserProfile};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

const CLICKED_ACTION: &str = "CLICKED";

/// In-memory click log, in input order
#[derive(Debug, Clone, Default)]
pub struct ClickLog {
    events: Vec<ClickEvent>,
}

/// Row of the processed click export (CSV or JSON Lines). Extra columns are ignored.
#[derive(Debug, Deserialize)]
struct ClickRow {
    #[serde(alias = "ehr_id", deserialize_with = "id_from_any")]
    user_id: String,
    #[serde(deserialize_with = "id_from_any")]
    article_id: String,
    #[serde(deserialize_with = "gender_from_any")]
    gender: Gender,
    #[serde(deserialize_with = "age_from_any")]
    age: u32,
    title: String,
    url: String,
    #[serde(default)]
    action_type: Option<String>,
}

impl ClickRow {
    fn is_click(&self) -> bool {
        self.action_type
            .as_deref()
            .map_or(true, |action| action == CLICKED_ACTION)
    }
}

/// Scalar cell as exported by pandas: integer columns holding NaN come out
/// as floats (`25.0`)
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl RawValue {
    fn integral(&self) -> Option<i64> {
        match *self {
            RawValue::Int(value) => Some(value),
            RawValue::Float(value)
                if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 =>
            {
                Some(value as i64)
            }
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            RawValue::Int(value) => value.to_string(),
            RawValue::Float(value) => value.to_string(),
            RawValue::Str(value) => format!("{:?}", value),
        }
    }
}

fn id_from_any<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawValue::deserialize(deserializer)?;
    match raw {
        RawValue::Str(id) => Ok(id),
        _ => raw.integral().map(|id| id.to_string()).ok_or_else(|| {
            D::Error::custom(format!("id must be integral, got {}", raw.describe()))
        }),
    }
}

fn age_from_any<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawValue::deserialize(deserializer)?;
    raw.integral()
        .and_then(|age| u32::try_from(age).ok())
        .ok_or_else(|| {
            D::Error::custom(format!(
                "age must be a non-negative integer, got {}",
                raw.describe()
            ))
        })
}

fn gender_from_any<'de, D>(deserializer: D) -> std::result::Result<Gender, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawValue::deserialize(deserializer)?;
    let code = raw
        .integral()
        .and_then(|code| u8::try_from(code).ok())
        .ok_or_else(|| {
            D::Error::custom(format!("gender must be 1 or 2, got {}", raw.describe()))
        })?;
    Gender::try_from(code).map_err(D::Error::custom)
}

impl From<ClickRow> for ClickEvent {
    fn from(row: ClickRow) -> Self {
        ClickEvent {
            user_id: UserId(row.user_id),
            article_id: ArticleId(row.article_id),
            gender: row.gender,
            age: row.age,
            title: row.title,
            url: row.url,
        }
    }
}

/// Click rows kept so far, plus how many non-click rows were dropped
#[derive(Default)]
struct RowCollector {
    events: Vec<ClickEvent>,
    skipped: usize,
}

impl RowCollector {
    fn push(&mut self, row: ClickRow) {
        if row.is_click() {
            self.events.push(ClickEvent::from(row));
        } else {
            self.skipped += 1;
        }
    }

    fn finish(self) -> ClickLog {
        if self.skipped > 0 {
            debug!(skipped = self.skipped, "Skipped non-click rows");
        }
        ClickLog::new(self.events)
    }
}

impl ClickLog {
    pub fn new(events: Vec<ClickEvent>) -> Self {
        Self { events }
    }

    /// Load a click export from disk.
    ///
    /// `.csv` files are read as CSV with a header row; anything else as JSON Lines.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| AppError::Io(format!("{}: {}", path.display(), e)))?;

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let (log, format) = if is_csv {
            (Self::from_csv(BufReader::new(file))?, "csv")
        } else {
            (Self::from_json_lines(BufReader::new(file))?, "jsonl")
        };

        info!(
            path = %path.display(),
            format,
            events = log.len(),
            "Click log loaded"
        );
        Ok(log)
    }

    /// Parse one JSON object per line.
    ///
    /// Fails on the first row with a missing or mistyped column. Rows carrying
    /// an `action_type` other than `CLICKED` are skipped.
    pub fn from_json_lines<R: BufRead>(reader: R) -> Result<Self> {
        let mut rows = RowCollector::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let row: ClickRow = serde_json::from_str(line)
                .map_err(|e| AppError::InputSchema(format!("line {}: {}", idx + 1, e)))?;
            rows.push(row);
        }

        Ok(rows.finish())
    }

    /// Parse a CSV export with a header row (the ETL's `to_csv(index=False)` layout).
    ///
    /// Same column rules as [`ClickLog::from_json_lines`]; columns are matched by
    /// header name, so order and extra columns do not matter.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = RowCollector::default();

        for (idx, record) in csv_reader.deserialize::<ClickRow>().enumerate() {
            let row = record.map_err(|e| {
                // header is line 1
                let line = e
                    .position()
                    .map(|pos| pos.line())
                    .unwrap_or(idx as u64 + 2);
                AppError::InputSchema(format!("line {}: {}", line, e))
            })?;
            rows.push(row);
        }

        Ok(rows.finish())
    }

    pub fn events(&self) -> &[ClickEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct users in first-seen order, each with their full click set.
    ///
    /// Demographics come from the user's first event.
    pub fn users(&self) -> Vec<UserProfile> {
        let mut index: HashMap<&UserId, usize> = HashMap::new();
        let mut profiles: Vec<UserProfile> = Vec::new();
        let mut conflicting: HashSet<&UserId> = HashSet::new();

        for event in &self.events {
            match index.get(&event.user_id) {
                Some(&pos) => {
                    let profile = &mut profiles[pos];
                    if profile.segment != event.segment() {
                        conflicting.insert(&event.user_id);
                    }
                    profile.clicks.insert(event.article_id.clone());
                }
                None => {
                    index.insert(&event.user_id, profiles.len());
                    profiles.push(UserProfile {
                        user_id: event.user_id.clone(),
                        segment: event.segment(),
                        clicks: HashSet::from([event.article_id.clone()]),
                    });
                }
            }
        }

        if !conflicting.is_empty() {
            warn!(
                users = conflicting.len(),
                "Users with conflicting demographics; keeping first-seen segment"
            );
        }

        profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeGroup, SegmentKey};
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_json_lines() {
        let input = r#"
{"ehr_id": 101, "article_id": 7, "gender": 2, "age": 25, "title": "Sleep", "url": "/a/7", "action_type": "CLICKED"}
{"user_id": "u2", "article_id": "8", "gender": 1, "age": 70, "title": "Diet", "url": "/a/8"}

{"ehr_id": 101, "article_id": 9, "gender": 2, "age": 25, "title": "Run", "url": "/a/9", "action_type": "VIEWED"}
"#;
        let log = ClickLog::from_json_lines(Cursor::new(input)).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].user_id, UserId::from("101"));
        assert_eq!(log.events()[0].article_id, ArticleId::from("7"));
        assert_eq!(log.events()[1].gender, Gender::Female);
        assert_eq!(log.events()[1].age_group(), AgeGroup::Over60);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let input = r#"{"ehr_id": 1, "article_id": 7, "gender": 2, "title": "t", "url": "u"}"#;
        let err = ClickLog::from_json_lines(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, AppError::InputSchema(msg) if msg.contains("line 1")));
    }

    #[test]
    fn test_wrong_type_is_schema_error() {
        let input = r#"{"ehr_id": 1, "article_id": 7, "gender": 3, "age": 20, "title": "t", "url": "u"}"#;
        assert!(matches!(
            ClickLog::from_json_lines(Cursor::new(input)),
            Err(AppError::InputSchema(_))
        ));

        let input = r#"{"ehr_id": 1, "article_id": 7, "gender": 1, "age": -4, "title": "t", "url": "u"}"#;
        assert!(matches!(
            ClickLog::from_json_lines(Cursor::new(input)),
            Err(AppError::InputSchema(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"ehr_id": "u1", "article_id": "a1", "gender": 1, "age": 33, "title": "t", "url": "u"}}"#
        )
        .unwrap();

        let log = ClickLog::load(file.path()).unwrap();
        assert_eq!(log.len(), 1);

        assert!(matches!(
            ClickLog::load("/nonexistent/clicks.jsonl"),
            Err(AppError::Io(_))
        ));
    }

    #[test]
    fn test_parse_csv_etl_layout() {
        // header as written by the ETL: action_type dropped, extra columns kept
        let input = "ehr_id,article_id,gender,age,title,url,tags\n\
                     101,7,2,25,Sleep hygiene,/a/7,health\n\
                     102,8,1,70,\"Diet, after 60\",/a/8,food\n";
        let log = ClickLog::from_csv(input.as_bytes()).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].user_id, UserId::from("101"));
        assert_eq!(log.events()[0].article_id, ArticleId::from("7"));
        assert_eq!(log.events()[0].gender, Gender::Male);
        assert_eq!(log.events()[1].title, "Diet, after 60");
        assert_eq!(log.events()[1].age_group(), AgeGroup::Over60);
    }

    #[test]
    fn test_csv_skips_non_clicks_and_reports_line() {
        let input = "user_id,article_id,gender,age,title,url,action_type\n\
                     u1,a1,2,25,t,u,CLICKED\n\
                     u1,a2,2,25,t,u,VIEWED\n\
                     u2,a3,1,41,t,u,\n";
        let log = ClickLog::from_csv(input.as_bytes()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[1].article_id, ArticleId::from("a3"));

        let input = "ehr_id,article_id,gender,age,title,url\n\
                     1,a1,2,25,t,u\n\
                     2,a2,2,,t,u\n";
        let err = ClickLog::from_csv(input.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::InputSchema(msg) if msg.starts_with("line 3")));
    }

    #[test]
    fn test_integral_floats_accepted() {
        let input = r#"{"ehr_id": 1.0, "article_id": 7.0, "gender": 2.0, "age": 25.0, "title": "t", "url": "u"}"#;
        let log = ClickLog::from_json_lines(Cursor::new(input)).unwrap();
        assert_eq!(log.events()[0].user_id, UserId::from("1"));
        assert_eq!(log.events()[0].article_id, ArticleId::from("7"));
        assert_eq!(log.events()[0].gender, Gender::Male);
        assert_eq!(log.events()[0].age, 25);

        let input = "ehr_id,article_id,gender,age,title,url\n1.0,7,1.0,33.0,t,u\n";
        let log = ClickLog::from_csv(input.as_bytes()).unwrap();
        assert_eq!(log.events()[0].user_id, UserId::from("1"));
        assert_eq!(log.events()[0].age, 33);

        // fractional values are still rejected
        let input = r#"{"ehr_id": 1, "article_id": 7, "gender": 2, "age": 25.5, "title": "t", "url": "u"}"#;
        assert!(matches!(
            ClickLog::from_json_lines(Cursor::new(input)),
            Err(AppError::InputSchema(_))
        ));
        let input = r#"{"ehr_id": 1.5, "article_id": 7, "gender": 2, "age": 25, "title": "t", "url": "u"}"#;
        assert!(matches!(
            ClickLog::from_json_lines(Cursor::new(input)),
            Err(AppError::InputSchema(_))
        ));
    }

    #[test]
    fn test_load_picks_reader_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "ehr_id,article_id,gender,age,title,url").unwrap();
        writeln!(file, "1,10,2,23,Gym,/10").unwrap();
        writeln!(file, "2,10,1,61,Gym,/10").unwrap();
        file.flush().unwrap();

        let log = ClickLog::load(file.path()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.users().len(), 2);
    }

    #[test]
    fn test_users_first_seen_order_and_click_sets() {
        let event = |user: &str, article: &str, gender: Gender, age: u32| ClickEvent {
            user_id: user.into(),
            article_id: article.into(),
            gender,
            age,
            title: String::new(),
            url: String::new(),
        };
        let log = ClickLog::new(vec![
            event("u2", "a1", Gender::Female, 70),
            event("u1", "a1", Gender::Male, 25),
            event("u2", "a2", Gender::Female, 70),
            event("u1", "a1", Gender::Male, 25),
            // conflicting demographics keep the first segment
            event("u1", "a3", Gender::Female, 50),
        ]);

        let users = log.users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].user_id, UserId::from("u2"));
        assert_eq!(users[0].clicks.len(), 2);
        assert_eq!(users[1].user_id, UserId::from("u1"));
        assert_eq!(users[1].clicks.len(), 2);
        assert_eq!(
            users[1].segment,
            SegmentKey::new(Gender::Male, AgeGroup::From18To29)
        );
    }
}
