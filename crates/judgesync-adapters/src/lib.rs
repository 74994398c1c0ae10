//! Source adapter contracts and the five judge adapters.
//!
//! Every adapter follows the same shape: fetch raw payloads through [`Fetch`],
//! decode them into source-specific `Raw*` structs, normalize those into
//! [`ProblemFields`]/[`ContestFields`] and reconcile them through a
//! [`SourceRun`], which owns all state scoped to one adapter run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use judgesync_core::{
    Contest, ContestFields, ContestKey, ContestUpsert, Domain, Problem, ProblemFields, ProblemKey,
    ProblemUpsert,
};
use judgesync_storage::{Fetch, FetchError, ReconciliationStore, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub mod aoj;
pub mod association;
pub mod atcoder;
pub mod codeforces;
pub mod leetcode;
pub mod mismatch;
pub mod yukicoder;

use association::{resolve_contest_problems, Lookup, MemberOrder, ProblemIndex};

pub const CRATE_NAME: &str = "judgesync-adapters";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

impl AdapterContext {
    pub fn new(fetched_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            fetched_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{what} returned status {status}: {comment}")]
    Api {
        what: &'static str,
        status: String,
        comment: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one adapter run did. Returned to the orchestrator for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdapterReport {
    pub problems_upserted: usize,
    pub contests_upserted: usize,
    pub contests_skipped: usize,
    pub unresolved_references: usize,
    pub fallback_contests: usize,
    pub fail_open_contests: usize,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn domain(&self) -> Domain;

    /// Fetch, normalize and reconcile everything this source publishes.
    ///
    /// Any error aborts this source only; records already upserted stay.
    async fn run(
        &self,
        fetch: &dyn Fetch,
        store: &dyn ReconciliationStore,
        ctx: &AdapterContext,
    ) -> Result<AdapterReport, AdapterError>;
}

pub fn adapter_for_domain(domain: Domain) -> Box<dyn SourceAdapter> {
    match domain {
        Domain::AtCoder => Box::new(atcoder::AtCoderAdapter),
        Domain::Codeforces => Box::<codeforces::CodeforcesAdapter>::default(),
        Domain::Yukicoder => Box::new(yukicoder::YukicoderAdapter),
        Domain::Aoj => Box::new(aoj::AojAdapter),
        Domain::LeetCode => Box::new(leetcode::LeetCodeAdapter),
    }
}

pub fn adapter_for_source(source_id: &str) -> Option<Box<dyn SourceAdapter>> {
    source_id.parse().ok().map(adapter_for_domain)
}

pub(crate) fn decode<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, AdapterError> {
    serde_json::from_slice(bytes).map_err(|source| AdapterError::Decode { what, source })
}

/// State scoped to a single adapter run: the problem-id to internal-number
/// index built while upserting problems, and the running report.
pub struct SourceRun<'a> {
    domain: Domain,
    store: &'a dyn ReconciliationStore,
    ctx: &'a AdapterContext,
    index: ProblemIndex,
    report: AdapterReport,
}

impl<'a> SourceRun<'a> {
    pub fn new(domain: Domain, store: &'a dyn ReconciliationStore, ctx: &'a AdapterContext) -> Self {
        Self {
            domain,
            store,
            ctx,
            index: ProblemIndex::default(),
            report: AdapterReport::default(),
        }
    }

    pub fn index(&self) -> &ProblemIndex {
        &self.index
    }

    pub async fn upsert_problem(
        &mut self,
        problem_id: impl Into<String>,
        fields: ProblemFields,
    ) -> Result<Problem, AdapterError> {
        let upsert = ProblemUpsert {
            key: ProblemKey::new(self.domain, problem_id),
            fields,
            seen_at: self.ctx.fetched_at,
        };
        let problem = self.store.upsert_problem(&upsert).await?;
        self.index.insert(problem.problem_id.clone(), problem.no);
        self.report.problems_upserted += 1;
        Ok(problem)
    }

    pub async fn lookup_problem(&self, problem_id: &str) -> Result<Option<Problem>, AdapterError> {
        let key = ProblemKey::new(self.domain, problem_id);
        Ok(self.store.lookup_problem(&key).await?)
    }

    /// Internal numbers for a contest's members; unresolvable ids are dropped.
    pub async fn resolve(
        &mut self,
        contest_id: &str,
        problem_ids: &[String],
        order: MemberOrder,
        lookup: Lookup,
    ) -> Result<Vec<i64>, AdapterError> {
        let association = resolve_contest_problems(
            self.store,
            &self.index,
            self.domain,
            problem_ids,
            order,
            lookup,
        )
        .await?;
        if !association.missing.is_empty() {
            debug!(
                domain = %self.domain,
                contest_id,
                missing = ?association.missing,
                "dropping unresolved contest members"
            );
            self.report.unresolved_references += association.missing.len();
        }
        Ok(association.problem_nos)
    }

    pub async fn upsert_contest(
        &mut self,
        contest_id: impl Into<String>,
        fields: ContestFields,
    ) -> Result<Contest, AdapterError> {
        let upsert = ContestUpsert {
            key: ContestKey::new(self.domain, contest_id),
            fields,
            seen_at: self.ctx.fetched_at,
        };
        let contest = self.store.upsert_contest(&upsert).await?;
        self.report.contests_upserted += 1;
        Ok(contest)
    }

    pub fn skip_contest(&mut self) {
        self.report.contests_skipped += 1;
    }

    pub(crate) fn report_mut(&mut self) -> &mut AdapterReport {
        &mut self.report
    }

    pub fn finish(self) -> AdapterReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_has_an_adapter() {
        for domain in Domain::ALL {
            assert_eq!(adapter_for_domain(domain).domain(), domain);
        }
        assert_eq!(adapter_for_source("aoj").map(|a| a.domain()), Some(Domain::Aoj));
        assert!(adapter_for_source("topcoder").is_none());
    }

    #[test]
    fn decode_errors_name_the_payload() {
        let err = decode::<Vec<u32>>("yukicoder problems", b"{").unwrap_err();
        assert!(err.to_string().starts_with("failed to decode yukicoder problems"));
    }
}
