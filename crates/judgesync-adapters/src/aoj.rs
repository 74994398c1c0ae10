//! Aizu Online Judge. AOJ has no contests in the usual sense; each problem
//! category ("large class") and each course is stored as a contest whose id
//! and title are the group name.

use async_trait::async_trait;
use judgesync_core::{ContestFields, Domain, ProblemFields};
use judgesync_storage::{Fetch, ReconciliationStore};
use serde::Deserialize;
use tracing::info;

use crate::association::{Lookup, MemberOrder};
use crate::{decode, AdapterContext, AdapterError, AdapterReport, SourceAdapter, SourceRun};

pub const API_BASE: &str = "https://judgeapi.u-aizu.ac.jp";
pub const PROBLEMS_URL: &str = "https://judgeapi.u-aizu.ac.jp/problems?page=0&size=20000";
pub const FILTERS_URL: &str = "https://judgeapi.u-aizu.ac.jp/problems/filters";
pub const COURSES_URL: &str = "https://judgeapi.u-aizu.ac.jp/courses";

pub fn category_problems_url(large_cls: &str) -> String {
    format!("{API_BASE}/problems/cl/{large_cls}")
}

pub fn course_problems_url(short_name: &str) -> String {
    format!("{API_BASE}/problems/courses/{short_name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawProblem {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFilters {
    #[serde(default)]
    pub large_cls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCourse {
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawCourses {
    #[serde(default)]
    pub courses: Vec<RawCourse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawGroupProblems {
    #[serde(default)]
    pub problems: Vec<RawProblem>,
}

pub fn parse_problems(bytes: &[u8]) -> Result<Vec<RawProblem>, AdapterError> {
    decode("aoj problems", bytes)
}

pub fn parse_filters(bytes: &[u8]) -> Result<RawFilters, AdapterError> {
    decode("aoj problem filters", bytes)
}

pub fn parse_courses(bytes: &[u8]) -> Result<RawCourses, AdapterError> {
    decode("aoj courses", bytes)
}

pub fn parse_group_problems(bytes: &[u8]) -> Result<RawGroupProblems, AdapterError> {
    decode("aoj group problems", bytes)
}

pub fn normalize_problem(raw: &RawProblem) -> ProblemFields {
    ProblemFields {
        title: raw.name.clone(),
        ..Default::default()
    }
}

pub fn normalize_group(name: &str, problem_no_list: Vec<i64>) -> ContestFields {
    ContestFields {
        title: name.to_string(),
        problem_no_list,
        ..Default::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AojAdapter;

impl AojAdapter {
    async fn sync_group(
        &self,
        run: &mut SourceRun<'_>,
        fetch: &dyn Fetch,
        name: &str,
        url: &str,
    ) -> Result<(), AdapterError> {
        let listed = parse_group_problems(&fetch.fetch(url).await?)?;
        let members: Vec<String> = listed.problems.into_iter().map(|p| p.id).collect();
        let problem_nos = run
            .resolve(name, &members, MemberOrder::ByProblemId, Lookup::IndexThenStore)
            .await?;
        run.upsert_contest(name, normalize_group(name, problem_nos)).await?;
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for AojAdapter {
    fn domain(&self) -> Domain {
        Domain::Aoj
    }

    async fn run(
        &self,
        fetch: &dyn Fetch,
        store: &dyn ReconciliationStore,
        ctx: &AdapterContext,
    ) -> Result<AdapterReport, AdapterError> {
        let mut run = SourceRun::new(Domain::Aoj, store, ctx);

        info!("updating AOJ problems");
        let problems = parse_problems(&fetch.fetch(PROBLEMS_URL).await?)?;
        for raw in &problems {
            run.upsert_problem(raw.id.clone(), normalize_problem(raw)).await?;
        }

        info!("updating AOJ categories");
        let filters = parse_filters(&fetch.fetch(FILTERS_URL).await?)?;
        for large_cls in &filters.large_cls {
            self.sync_group(&mut run, fetch, large_cls, &category_problems_url(large_cls))
                .await?;
        }

        info!("updating AOJ courses");
        let courses = parse_courses(&fetch.fetch(COURSES_URL).await?)?;
        for course in &courses.courses {
            self.sync_group(&mut run, fetch, &course.short_name, &course_problems_url(&course.short_name))
                .await?;
        }

        Ok(run.finish())
    }
}
