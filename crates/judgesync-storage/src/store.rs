use std::collections::BTreeMap;

use async_trait::async_trait;
use judgesync_core::{Contest, ContestKey, ContestUpsert, Problem, ProblemKey, ProblemUpsert};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Message(String),
}

/// Idempotent create-or-update keyed by natural key.
///
/// Implementations must resolve create-vs-update atomically per key: concurrent
/// callers never observe a half-merged record and never produce two records
/// for one key. A missing record is `Ok(None)`, not an error.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    async fn upsert_problem(&self, upsert: &ProblemUpsert) -> Result<Problem, StoreError>;

    async fn upsert_contest(&self, upsert: &ContestUpsert) -> Result<Contest, StoreError>;

    async fn lookup_problem(&self, key: &ProblemKey) -> Result<Option<Problem>, StoreError>;

    async fn lookup_contest(&self, key: &ContestKey) -> Result<Option<Contest>, StoreError>;
}

/// In-process store with the same merge semantics as the Postgres store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    problems: BTreeMap<ProblemKey, Problem>,
    contests: BTreeMap<ContestKey, Contest>,
    last_problem_no: i64,
    last_contest_no: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn problems(&self) -> Vec<Problem> {
        self.state.lock().await.problems.values().cloned().collect()
    }

    pub async fn contests(&self) -> Vec<Contest> {
        self.state.lock().await.contests.values().cloned().collect()
    }
}

#[async_trait]
impl ReconciliationStore for MemoryStore {
    async fn upsert_problem(&self, upsert: &ProblemUpsert) -> Result<Problem, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.problems.get_mut(&upsert.key) {
            existing.merge(upsert);
            return Ok(existing.clone());
        }
        state.last_problem_no += 1;
        let problem = Problem::create(state.last_problem_no, upsert);
        state.problems.insert(upsert.key.clone(), problem.clone());
        Ok(problem)
    }

    async fn upsert_contest(&self, upsert: &ContestUpsert) -> Result<Contest, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.contests.get_mut(&upsert.key) {
            existing.merge(upsert);
            return Ok(existing.clone());
        }
        state.last_contest_no += 1;
        let contest = Contest::create(state.last_contest_no, upsert);
        state.contests.insert(upsert.key.clone(), contest.clone());
        Ok(contest)
    }

    async fn lookup_problem(&self, key: &ProblemKey) -> Result<Option<Problem>, StoreError> {
        Ok(self.state.lock().await.problems.get(key).cloned())
    }

    async fn lookup_contest(&self, key: &ContestKey) -> Result<Option<Contest>, StoreError> {
        Ok(self.state.lock().await.contests.get(key).cloned())
    }
}
