//! LeetCode. Each problem category is treated as one pseudo-contest listing
//! its problems in the order the API returns them.

use async_trait::async_trait;
use judgesync_core::{ContestFields, Domain, ProblemFields};
use judgesync_storage::{Fetch, ReconciliationStore};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::association::{Lookup, MemberOrder};
use crate::{decode, AdapterContext, AdapterError, AdapterReport, SourceAdapter, SourceRun};

pub const CATEGORIES: [&str; 4] = ["algorithms", "database", "shell", "concurrency"];

pub fn category_url(category: &str) -> String {
    format!("https://leetcode.com/api/problems/{category}/")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawStat {
    pub question_id: i64,
    #[serde(default, rename = "question__title")]
    pub title: String,
    #[serde(default, rename = "question__title_slug")]
    pub title_slug: Option<String>,
    /// A number for most problems, a string for some (e.g. "LCP 01").
    #[serde(default)]
    pub frontend_question_id: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RawDifficulty {
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawStatStatusPair {
    pub stat: RawStat,
    #[serde(default)]
    pub difficulty: Option<RawDifficulty>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawCategory {
    #[serde(default)]
    pub category_slug: Option<String>,
    #[serde(default)]
    pub stat_status_pairs: Vec<RawStatStatusPair>,
}

pub fn parse_category(bytes: &[u8]) -> Result<RawCategory, AdapterError> {
    decode("leetcode problems", bytes)
}

fn frontend_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub fn normalize_problem(pair: &RawStatStatusPair, category: &str) -> ProblemFields {
    ProblemFields {
        contest_id: Some(category.to_string()),
        title: pair.stat.title.clone(),
        slug: pair.stat.title_slug.clone(),
        frontend_id: frontend_id(&pair.stat.frontend_question_id),
        difficulty: pair.difficulty.map(|d| d.level as f64),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeetCodeAdapter;

#[async_trait]
impl SourceAdapter for LeetCodeAdapter {
    fn domain(&self) -> Domain {
        Domain::LeetCode
    }

    async fn run(
        &self,
        fetch: &dyn Fetch,
        store: &dyn ReconciliationStore,
        ctx: &AdapterContext,
    ) -> Result<AdapterReport, AdapterError> {
        let mut run = SourceRun::new(Domain::LeetCode, store, ctx);

        for category in CATEGORIES {
            info!(category, "updating LeetCode problems");
            let listing = parse_category(&fetch.fetch(&category_url(category)).await?)?;

            let mut members = Vec::with_capacity(listing.stat_status_pairs.len());
            for pair in &listing.stat_status_pairs {
                let problem_id = pair.stat.question_id.to_string();
                run.upsert_problem(problem_id.clone(), normalize_problem(pair, category))
                    .await?;
                members.push(problem_id);
            }

            let problem_nos = run
                .resolve(category, &members, MemberOrder::Source, Lookup::IndexOnly)
                .await?;
            let fields = ContestFields {
                title: category.to_string(),
                problem_no_list: problem_nos,
                ..Default::default()
            };
            run.upsert_contest(category, fields).await?;
        }

        Ok(run.finish())
    }
}
