//! yukicoder, via the v1 API.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use judgesync_core::{ContestFields, Domain, ProblemFields};
use judgesync_storage::{Fetch, ReconciliationStore};
use serde::Deserialize;
use tracing::info;

use crate::association::{Lookup, MemberOrder};
use crate::{decode, AdapterContext, AdapterError, AdapterReport, SourceAdapter, SourceRun};

pub const PROBLEMS_URL: &str = "https://yukicoder.me/api/v1/problems";
pub const PAST_CONTESTS_URL: &str = "https://yukicoder.me/api/v1/contest/past";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawProblem {
    #[serde(default)]
    pub no: Option<i64>,
    pub problem_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawContest {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub end_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub problem_id_list: Vec<i64>,
}

pub fn parse_problems(bytes: &[u8]) -> Result<Vec<RawProblem>, AdapterError> {
    decode("yukicoder problems", bytes)
}

pub fn parse_contests(bytes: &[u8]) -> Result<Vec<RawContest>, AdapterError> {
    decode("yukicoder contests", bytes)
}

pub fn normalize_problem(raw: &RawProblem) -> ProblemFields {
    ProblemFields {
        title: raw.title.clone(),
        frontend_id: raw.no.map(|no| no.to_string()),
        difficulty: raw.level,
        ..Default::default()
    }
}

pub fn normalize_contest(raw: &RawContest, problem_no_list: Vec<i64>) -> ContestFields {
    let start = raw.date.map(|d| d.timestamp()).unwrap_or_default();
    let duration = match (raw.date, raw.end_date) {
        (Some(start), Some(end)) => (end - start).num_seconds(),
        _ => 0,
    };
    ContestFields {
        title: raw.name.clone(),
        start_time_seconds: start,
        duration_seconds: duration,
        rated: None,
        problem_no_list,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YukicoderAdapter;

#[async_trait]
impl SourceAdapter for YukicoderAdapter {
    fn domain(&self) -> Domain {
        Domain::Yukicoder
    }

    async fn run(
        &self,
        fetch: &dyn Fetch,
        store: &dyn ReconciliationStore,
        ctx: &AdapterContext,
    ) -> Result<AdapterReport, AdapterError> {
        let mut run = SourceRun::new(Domain::Yukicoder, store, ctx);

        info!("updating yukicoder problems");
        let problems = parse_problems(&fetch.fetch(PROBLEMS_URL).await?)?;
        for raw in &problems {
            run.upsert_problem(raw.problem_id.to_string(), normalize_problem(raw))
                .await?;
        }

        // Contests only reference problems seen in this run's problem list.
        info!("updating yukicoder contests");
        let contests = parse_contests(&fetch.fetch(PAST_CONTESTS_URL).await?)?;
        for raw in &contests {
            let contest_id = raw.id.to_string();
            let members: Vec<String> = raw.problem_id_list.iter().map(i64::to_string).collect();
            let problem_nos = run
                .resolve(&contest_id, &members, MemberOrder::Source, Lookup::IndexOnly)
                .await?;
            run.upsert_contest(contest_id, normalize_contest(raw, problem_nos))
                .await?;
        }

        Ok(run.finish())
    }
}
