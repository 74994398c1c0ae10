//! Core domain model and merge rules for judgesync.
//!
//! Problems and contests are identified by a natural key (`domain` plus the
//! source-provided id) and referenced downstream by the store-assigned `no`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "judgesync-core";

/// Judge platform a record was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    AtCoder,
    Codeforces,
    Yukicoder,
    Aoj,
    LeetCode,
}

impl Domain {
    /// Every domain, in the order a full crawl visits them.
    pub const ALL: [Domain; 5] = [
        Domain::AtCoder,
        Domain::Codeforces,
        Domain::Yukicoder,
        Domain::Aoj,
        Domain::LeetCode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::AtCoder => "atcoder",
            Domain::Codeforces => "codeforces",
            Domain::Yukicoder => "yukicoder",
            Domain::Aoj => "aoj",
            Domain::LeetCode => "leetcode",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemKey {
    pub domain: Domain,
    pub problem_id: String,
}

impl ProblemKey {
    pub fn new(domain: Domain, problem_id: impl Into<String>) -> Self {
        Self {
            domain,
            problem_id: problem_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContestKey {
    pub domain: Domain,
    pub contest_id: String,
}

impl ContestKey {
    pub fn new(domain: Domain, contest_id: impl Into<String>) -> Self {
        Self {
            domain,
            contest_id: contest_id.into(),
        }
    }
}

/// Always-assign problem values as fetched from a source.
///
/// `contest_id` and `difficulty` follow the latest fetch, absent included.
/// `slug` and `frontend_id` are only written when present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProblemFields {
    pub contest_id: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    pub frontend_id: Option<String>,
    pub difficulty: Option<f64>,
}

/// Create-or-update command for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemUpsert {
    pub key: ProblemKey,
    pub fields: ProblemFields,
    pub seen_at: DateTime<Utc>,
}

/// Persisted problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub no: i64,
    pub domain: Domain,
    pub problem_id: String,
    pub contest_id: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    pub frontend_id: Option<String>,
    pub difficulty: Option<f64>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Problem {
    /// Build the record inserted on first sighting. `no` and `first_seen_at`
    /// are create-only and never touched by [`Problem::merge`].
    pub fn create(no: i64, upsert: &ProblemUpsert) -> Self {
        let fields = &upsert.fields;
        Self {
            no,
            domain: upsert.key.domain,
            problem_id: upsert.key.problem_id.clone(),
            contest_id: fields.contest_id.clone(),
            title: fields.title.clone(),
            slug: fields.slug.clone(),
            frontend_id: fields.frontend_id.clone(),
            difficulty: fields.difficulty,
            first_seen_at: upsert.seen_at,
            last_seen_at: upsert.seen_at,
        }
    }

    /// Apply the always-assign fields of a later sighting.
    pub fn merge(&mut self, upsert: &ProblemUpsert) {
        let fields = &upsert.fields;
        self.title = fields.title.clone();
        self.contest_id = fields.contest_id.clone();
        self.difficulty = fields.difficulty;
        assign_if_present(&mut self.slug, &fields.slug);
        assign_if_present(&mut self.frontend_id, &fields.frontend_id);
        self.last_seen_at = upsert.seen_at;
    }

    pub fn key(&self) -> ProblemKey {
        ProblemKey::new(self.domain, self.problem_id.clone())
    }
}

/// Always-assign contest values as fetched from a source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContestFields {
    pub title: String,
    pub start_time_seconds: i64,
    pub duration_seconds: i64,
    pub rated: Option<String>,
    pub problem_no_list: Vec<i64>,
}

/// Create-or-update command for one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestUpsert {
    pub key: ContestKey,
    pub fields: ContestFields,
    pub seen_at: DateTime<Utc>,
}

/// Persisted contest. `problem_no_list` holds problem `no` values only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub no: i64,
    pub domain: Domain,
    pub contest_id: String,
    pub title: String,
    pub start_time_seconds: i64,
    pub duration_seconds: i64,
    pub rated: Option<String>,
    pub problem_no_list: Vec<i64>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Contest {
    pub fn create(no: i64, upsert: &ContestUpsert) -> Self {
        let fields = &upsert.fields;
        Self {
            no,
            domain: upsert.key.domain,
            contest_id: upsert.key.contest_id.clone(),
            title: fields.title.clone(),
            start_time_seconds: fields.start_time_seconds,
            duration_seconds: fields.duration_seconds,
            rated: fields.rated.clone(),
            problem_no_list: fields.problem_no_list.clone(),
            first_seen_at: upsert.seen_at,
            last_seen_at: upsert.seen_at,
        }
    }

    pub fn merge(&mut self, upsert: &ContestUpsert) {
        let fields = &upsert.fields;
        self.title = fields.title.clone();
        self.start_time_seconds = fields.start_time_seconds;
        self.duration_seconds = fields.duration_seconds;
        assign_if_present(&mut self.rated, &fields.rated);
        self.problem_no_list = fields.problem_no_list.clone();
        self.last_seen_at = upsert.seen_at;
    }

    pub fn key(&self) -> ContestKey {
        ContestKey::new(self.domain, self.contest_id.clone())
    }
}

fn assign_if_present<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}
