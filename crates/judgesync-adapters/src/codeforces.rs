//! Codeforces, via the public JSON API.
//!
//! The problem set and contest list are fetched once per run. Every finished
//! contest is then verified against its live standings by the
//! [`MismatchResolver`], which is where the per-contest requests (and the rate
//! limit between them) come from.

use std::time::Duration;

use async_trait::async_trait;
use judgesync_core::{ContestFields, Domain, ProblemFields};
use judgesync_storage::{Fetch, ReconciliationStore, RetryPolicy};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::association::{Lookup, MemberOrder};
use crate::mismatch::{MismatchResolver, ResolutionState};
use crate::{decode, AdapterContext, AdapterError, AdapterReport, SourceAdapter, SourceRun};

pub const PROBLEMSET_URL: &str = "https://codeforces.com/api/problemset.problems";
pub const CONTEST_LIST_URL: &str = "https://codeforces.com/api/contest.list?gym=false";

pub fn standings_url(contest_id: i64) -> String {
    format!("https://codeforces.com/api/contest.standings?contestId={contest_id}&from=1&count=1")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    pub comment: Option<String>,
    pub result: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProblem {
    #[serde(default)]
    pub contest_id: Option<i64>,
    pub index: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl RawProblem {
    /// `{contestId}{index}`, e.g. `1234B`. Problems without a contest have no id.
    pub fn problem_id(&self) -> Option<String> {
        self.contest_id.map(|contest_id| format!("{contest_id}{}", self.index))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawProblemSet {
    pub problems: Vec<RawProblem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContest {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub duration_seconds: i64,
    #[serde(default)]
    pub start_time_seconds: Option<i64>,
}

impl RawContest {
    pub fn is_finished(&self) -> bool {
        self.phase == "FINISHED"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawStandings {
    pub problems: Vec<RawProblem>,
}

fn unwrap_envelope<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, AdapterError> {
    let envelope: Envelope<T> = decode(what, bytes)?;
    match envelope.result {
        Some(result) if envelope.status == "OK" => Ok(result),
        _ => Err(AdapterError::Api {
            what,
            status: envelope.status,
            comment: envelope.comment.unwrap_or_default(),
        }),
    }
}

pub fn parse_problemset(bytes: &[u8]) -> Result<RawProblemSet, AdapterError> {
    unwrap_envelope("codeforces problemset", bytes)
}

pub fn parse_contests(bytes: &[u8]) -> Result<Vec<RawContest>, AdapterError> {
    unwrap_envelope("codeforces contest list", bytes)
}

pub fn parse_standings(bytes: &[u8]) -> Result<RawStandings, AdapterError> {
    unwrap_envelope("codeforces standings", bytes)
}

/// Division class from a contest title: `"12"` for combined rounds, `"1"`,
/// `"2"` or `"3"` for a single division, `"-"` otherwise.
pub fn rated_class(title: &str) -> &'static str {
    lazy_static! {
        static ref DIV1: Regex = Regex::new(r"Div\. ?1").expect("valid regex");
        static ref DIV2: Regex = Regex::new(r"Div\. ?2").expect("valid regex");
        static ref DIV3: Regex = Regex::new(r"Div\. ?3").expect("valid regex");
    }
    let div1 = DIV1.is_match(title);
    let div2 = DIV2.is_match(title);
    match (div1, div2) {
        (true, true) => "12",
        (true, false) => "1",
        (false, true) => "2",
        _ if DIV3.is_match(title) => "3",
        _ => "-",
    }
}

pub fn normalize_problem(raw: &RawProblem) -> ProblemFields {
    ProblemFields {
        contest_id: raw.contest_id.map(|id| id.to_string()),
        title: raw.name.clone(),
        difficulty: raw.rating,
        ..Default::default()
    }
}

pub fn normalize_contest(raw: &RawContest, problem_no_list: Vec<i64>) -> ContestFields {
    ContestFields {
        title: raw.name.clone(),
        start_time_seconds: raw.start_time_seconds.unwrap_or_default(),
        duration_seconds: raw.duration_seconds,
        rated: Some(rated_class(&raw.name).to_string()),
        problem_no_list,
    }
}

/// Pause for `pause` after every `every` contests processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub every: usize,
    pub pause: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            every: 5,
            pause: Duration::from_secs(1),
        }
    }
}

impl RateLimit {
    async fn after(&self, processed: usize) {
        if self.every > 0 && processed % self.every == 0 {
            tokio::time::sleep(self.pause).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodeforcesAdapter {
    pub rate_limit: RateLimit,
    pub standings_policy: RetryPolicy,
}

impl Default for CodeforcesAdapter {
    fn default() -> Self {
        Self {
            rate_limit: RateLimit::default(),
            standings_policy: RetryPolicy::standings(),
        }
    }
}

#[async_trait]
impl SourceAdapter for CodeforcesAdapter {
    fn domain(&self) -> Domain {
        Domain::Codeforces
    }

    async fn run(
        &self,
        fetch: &dyn Fetch,
        store: &dyn ReconciliationStore,
        ctx: &AdapterContext,
    ) -> Result<AdapterReport, AdapterError> {
        let mut run = SourceRun::new(Domain::Codeforces, store, ctx);

        info!("updating Codeforces problems");
        let problemset = parse_problemset(&fetch.fetch(PROBLEMSET_URL).await?)?;
        for raw in &problemset.problems {
            let Some(problem_id) = raw.problem_id() else {
                continue;
            };
            run.upsert_problem(problem_id, normalize_problem(raw)).await?;
        }

        info!("updating Codeforces contests");
        let contests = parse_contests(&fetch.fetch(CONTEST_LIST_URL).await?)?;
        let resolver = MismatchResolver::new(&problemset.problems, &contests);
        let finished = contests.iter().filter(|c| c.is_finished());
        for (i, raw) in finished.enumerate() {
            let resolution = resolver.resolve(fetch, self.standings_policy, raw).await;
            match resolution.state {
                ResolutionState::Fallback => {
                    run.report_mut().fallback_contests += 1;
                    if !resolution.unmatched.is_empty() {
                        warn!(contest_id = raw.id, unmatched = ?resolution.unmatched, "live problems without a bulk match");
                    }
                }
                ResolutionState::FailOpen => run.report_mut().fail_open_contests += 1,
                _ => {}
            }

            let contest_id = raw.id.to_string();
            let problem_nos = run
                .resolve(
                    &contest_id,
                    &resolution.problem_ids,
                    MemberOrder::ByProblemId,
                    Lookup::IndexThenStore,
                )
                .await?;
            run.upsert_contest(contest_id, normalize_contest(raw, problem_nos))
                .await?;

            self.rate_limit.after(i + 1).await;
        }

        Ok(run.finish())
    }
}
