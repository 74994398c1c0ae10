//! Codeforces contest membership verification.
//!
//! The bulk problem set sometimes files a problem under a different contest
//! than the one it was used in (shared problems across divisions, mirrors,
//! renumbered rounds). For every finished contest the declared members are
//! checked against the live standings:
//!
//! ```text
//! Declared -> Verify -> Reconciled   counts agree, keep the declared set
//!                    -> Fallback     counts differ, match live problems by
//!                                    title and contest start time
//!                    -> FailOpen     standings unavailable, keep declared set
//! ```

use std::collections::HashMap;

use judgesync_storage::{Fetch, RetryPolicy};
use serde::Serialize;
use tracing::{debug, warn};

use crate::codeforces::{parse_standings, standings_url, RawContest, RawProblem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Reconciled,
    Fallback,
    FailOpen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: ResolutionState,
    /// Bulk problem ids that belong to the contest.
    pub problem_ids: Vec<String>,
    /// Live problem titles with no bulk counterpart (fallback only).
    pub unmatched: Vec<String>,
}

pub struct MismatchResolver<'a> {
    bulk: &'a [RawProblem],
    declared: HashMap<i64, Vec<String>>,
    start_times: HashMap<i64, i64>,
}

impl<'a> MismatchResolver<'a> {
    pub fn new(bulk: &'a [RawProblem], contests: &[RawContest]) -> Self {
        let mut declared: HashMap<i64, Vec<String>> = HashMap::new();
        for problem in bulk {
            if let (Some(contest_id), Some(problem_id)) = (problem.contest_id, problem.problem_id()) {
                declared.entry(contest_id).or_default().push(problem_id);
            }
        }
        let start_times = contests
            .iter()
            .filter_map(|c| c.start_time_seconds.map(|start| (c.id, start)))
            .collect();
        Self {
            bulk,
            declared,
            start_times,
        }
    }

    /// Problem ids the bulk problem set files under `contest_id`.
    pub fn declared(&self, contest_id: i64) -> &[String] {
        self.declared
            .get(&contest_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Verify one contest against its live standings. Never fails: any fetch
    /// or decode problem degrades to the declared set.
    pub async fn resolve(&self, fetch: &dyn Fetch, policy: RetryPolicy, contest: &RawContest) -> Resolution {
        let body = match fetch.fetch_with(&standings_url(contest.id), policy).await {
            Ok(body) => body,
            Err(err) => {
                warn!(contest_id = contest.id, error = %err, "standings unavailable, keeping declared problems");
                return self.fail_open(contest.id);
            }
        };
        match parse_standings(&body) {
            Ok(standings) => self.reconcile_live(contest, &standings.problems),
            Err(err) => {
                warn!(contest_id = contest.id, error = %err, "standings unreadable, keeping declared problems");
                self.fail_open(contest.id)
            }
        }
    }

    /// Compare the declared set with the live problem list.
    pub fn reconcile_live(&self, contest: &RawContest, live: &[RawProblem]) -> Resolution {
        let declared = self.declared(contest.id);
        if declared.len() == live.len() {
            return Resolution {
                state: ResolutionState::Reconciled,
                problem_ids: declared.to_vec(),
                unmatched: Vec::new(),
            };
        }

        debug!(
            contest_id = contest.id,
            declared = declared.len(),
            live = live.len(),
            "problem count mismatch, matching by title"
        );
        let start = contest.start_time_seconds;
        let mut problem_ids = Vec::new();
        let mut unmatched = Vec::new();
        for live_problem in live {
            match self.find_match(&live_problem.name, start) {
                Some(problem_id) => problem_ids.push(problem_id),
                None => unmatched.push(live_problem.name.clone()),
            }
        }
        Resolution {
            state: ResolutionState::Fallback,
            problem_ids,
            unmatched,
        }
    }

    /// First bulk problem (in bulk order) with the same title whose own
    /// contest started at `start`.
    fn find_match(&self, title: &str, start: Option<i64>) -> Option<String> {
        let start = start?;
        self.bulk
            .iter()
            .filter(|p| p.name == title)
            .find(|p| {
                p.contest_id
                    .and_then(|id| self.start_times.get(&id))
                    .is_some_and(|&s| s == start)
            })
            .and_then(RawProblem::problem_id)
    }

    fn fail_open(&self, contest_id: i64) -> Resolution {
        Resolution {
            state: ResolutionState::FailOpen,
            problem_ids: self.declared(contest_id).to_vec(),
            unmatched: Vec::new(),
        }
    }
}
