//! AtCoder, via the AtCoder Problems resource dumps.
//!
//! Membership is built in two passes: each problem's primary contest from the
//! merged problem list, then extra memberships from the contest-problem pair
//! list (a problem shared by a rated and an unrated round, for example).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use judgesync_core::{ContestFields, Domain, ProblemFields};
use judgesync_storage::{Fetch, ReconciliationStore};
use serde::Deserialize;
use tracing::{debug, info};

use crate::association::{Lookup, MemberOrder};
use crate::{decode, AdapterContext, AdapterError, AdapterReport, SourceAdapter, SourceRun};

pub const PROBLEMS_URL: &str = "https://kenkoooo.com/atcoder/resources/merged-problems.json";
pub const MODELS_URL: &str = "https://kenkoooo.com/atcoder/resources/problem-models.json";
pub const CONTEST_PROBLEM_URL: &str = "https://kenkoooo.com/atcoder/resources/contest-problem.json";
pub const CONTESTS_URL: &str = "https://kenkoooo.com/atcoder/resources/contests.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawProblem {
    pub id: String,
    #[serde(default)]
    pub contest_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawModel {
    #[serde(default)]
    pub difficulty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawContestProblem {
    pub contest_id: String,
    pub problem_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawContest {
    pub id: String,
    #[serde(default)]
    pub start_epoch_second: i64,
    #[serde(default)]
    pub duration_second: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rate_change: Option<String>,
}

pub fn parse_problems(bytes: &[u8]) -> Result<Vec<RawProblem>, AdapterError> {
    decode("atcoder problems", bytes)
}

pub fn parse_models(bytes: &[u8]) -> Result<HashMap<String, RawModel>, AdapterError> {
    decode("atcoder problem models", bytes)
}

pub fn parse_contest_problems(bytes: &[u8]) -> Result<Vec<RawContestProblem>, AdapterError> {
    decode("atcoder contest-problem pairs", bytes)
}

pub fn parse_contests(bytes: &[u8]) -> Result<Vec<RawContest>, AdapterError> {
    decode("atcoder contests", bytes)
}

pub fn normalize_problem(raw: &RawProblem, models: &HashMap<String, RawModel>) -> ProblemFields {
    ProblemFields {
        contest_id: Some(raw.contest_id.clone()).filter(|c| !c.is_empty()),
        title: raw.title.clone(),
        difficulty: models.get(&raw.id).and_then(|m| m.difficulty),
        ..Default::default()
    }
}

pub fn normalize_contest(raw: &RawContest, problem_no_list: Vec<i64>) -> ContestFields {
    ContestFields {
        title: raw.title.clone(),
        start_time_seconds: raw.start_epoch_second,
        duration_seconds: raw.duration_second,
        rated: raw.rate_change.clone(),
        problem_no_list,
    }
}

/// Contest id to the set of member problem ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContestMembership {
    members: BTreeMap<String, BTreeSet<String>>,
}

impl ContestMembership {
    pub fn from_primary(problems: &[RawProblem]) -> Self {
        let mut membership = Self::default();
        for problem in problems {
            membership
                .members
                .entry(problem.contest_id.clone())
                .or_default()
                .insert(problem.id.clone());
        }
        membership
    }

    /// Record an extra membership from the pair list. Pairs naming the
    /// problem's primary contest are already covered and are ignored.
    /// Returns whether a membership was added.
    pub fn add_pair(&mut self, pair: &RawContestProblem, primary_contest: &str) -> bool {
        if pair.contest_id == primary_contest {
            return false;
        }
        self.members
            .entry(pair.contest_id.clone())
            .or_default()
            .insert(pair.problem_id.clone())
    }

    /// Members of `contest_id`, ascending by problem id.
    pub fn problems_of(&self, contest_id: &str) -> Vec<String> {
        self.members
            .get(contest_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AtCoderAdapter;

#[async_trait]
impl SourceAdapter for AtCoderAdapter {
    fn domain(&self) -> Domain {
        Domain::AtCoder
    }

    async fn run(
        &self,
        fetch: &dyn Fetch,
        store: &dyn ReconciliationStore,
        ctx: &AdapterContext,
    ) -> Result<AdapterReport, AdapterError> {
        let mut run = SourceRun::new(Domain::AtCoder, store, ctx);

        info!("updating AtCoder problems");
        let problems = parse_problems(&fetch.fetch(PROBLEMS_URL).await?)?;
        let models = parse_models(&fetch.fetch(MODELS_URL).await?)?;
        for raw in &problems {
            run.upsert_problem(raw.id.clone(), normalize_problem(raw, &models))
                .await?;
        }

        info!("merging AtCoder contest-problem pairs");
        let mut membership = ContestMembership::from_primary(&problems);
        let primary: HashMap<&str, &str> = problems
            .iter()
            .map(|p| (p.id.as_str(), p.contest_id.as_str()))
            .collect();
        let pairs = parse_contest_problems(&fetch.fetch(CONTEST_PROBLEM_URL).await?)?;
        for pair in &pairs {
            let primary_contest = match primary.get(pair.problem_id.as_str()) {
                Some(contest_id) => Some(contest_id.to_string()),
                None => run
                    .lookup_problem(&pair.problem_id)
                    .await?
                    .map(|p| p.contest_id.unwrap_or_default()),
            };
            match primary_contest {
                Some(primary_contest) => {
                    membership.add_pair(pair, &primary_contest);
                }
                None => {
                    debug!(problem_id = %pair.problem_id, contest_id = %pair.contest_id, "pair references unknown problem");
                    run.report_mut().unresolved_references += 1;
                }
            }
        }

        info!("updating AtCoder contests");
        let contests = parse_contests(&fetch.fetch(CONTESTS_URL).await?)?;
        for raw in &contests {
            let members = membership.problems_of(&raw.id);
            if members.is_empty() {
                run.skip_contest();
                continue;
            }
            let problem_nos = run
                .resolve(&raw.id, &members, MemberOrder::ByProblemId, Lookup::IndexThenStore)
                .await?;
            if problem_nos.is_empty() {
                run.skip_contest();
                continue;
            }
            run.upsert_contest(raw.id.clone(), normalize_contest(raw, problem_nos))
                .await?;
        }

        Ok(run.finish())
    }
}
