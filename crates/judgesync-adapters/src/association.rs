//! Contest membership: turns external problem ids into the ordered list of
//! internal numbers stored on a contest.

use std::collections::{HashMap, HashSet};

use judgesync_core::{Domain, ProblemKey};
use judgesync_storage::{ReconciliationStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOrder {
    /// Ascending byte-wise compare on the external problem id.
    ByProblemId,
    /// Keep the order the source listed the problems in.
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Run-local index first, then the store.
    IndexThenStore,
    /// Only problems upserted during this run resolve.
    IndexOnly,
}

/// External problem id to internal number, filled as problems are upserted.
#[derive(Debug, Clone, Default)]
pub struct ProblemIndex {
    numbers: HashMap<String, i64>,
}

impl ProblemIndex {
    pub fn insert(&mut self, problem_id: impl Into<String>, no: i64) {
        self.numbers.insert(problem_id.into(), no);
    }

    pub fn get(&self, problem_id: &str) -> Option<i64> {
        self.numbers.get(problem_id).copied()
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Association {
    pub problem_nos: Vec<i64>,
    pub missing: Vec<String>,
}

/// Apply `order` and drop repeated ids (first occurrence wins).
pub fn order_members(problem_ids: &[String], order: MemberOrder) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<String> = problem_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();
    if order == MemberOrder::ByProblemId {
        ordered.sort();
    }
    ordered
}

/// Resolve contest members to internal numbers.
///
/// Members that cannot be found are reported in [`Association::missing`] and
/// left out; only store failures are errors.
pub async fn resolve_contest_problems(
    store: &dyn ReconciliationStore,
    index: &ProblemIndex,
    domain: Domain,
    problem_ids: &[String],
    order: MemberOrder,
    lookup: Lookup,
) -> Result<Association, StoreError> {
    let mut association = Association::default();
    for problem_id in order_members(problem_ids, order) {
        let no = match index.get(&problem_id) {
            Some(no) => Some(no),
            None if lookup == Lookup::IndexThenStore => store
                .lookup_problem(&ProblemKey::new(domain, problem_id.clone()))
                .await?
                .map(|p| p.no),
            None => None,
        };
        match no {
            Some(no) => association.problem_nos.push(no),
            None => association.missing.push(problem_id),
        }
    }
    Ok(association)
}
