use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use judgesync_adapters::{
    aoj, atcoder, codeforces, leetcode, yukicoder, AdapterContext, AdapterError, AdapterReport,
    SourceAdapter,
};
use judgesync_core::{Domain, ProblemFields, ProblemKey, ProblemUpsert};
use judgesync_crawl::{Orchestrator, SourceStatus};
use judgesync_storage::{Fetch, FetchError, MemoryStore, ReconciliationStore};

/// Upserts one problem, or fails with a 503 when `broken`.
struct StubAdapter {
    domain: Domain,
    broken: bool,
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn domain(&self) -> Domain {
        self.domain
    }

    async fn run(
        &self,
        _fetch: &dyn Fetch,
        store: &dyn ReconciliationStore,
        ctx: &AdapterContext,
    ) -> Result<AdapterReport, AdapterError> {
        if self.broken {
            return Err(FetchError::HttpStatus {
                status: 503,
                url: format!("https://{}.example/api", self.domain),
            }
            .into());
        }
        store
            .upsert_problem(&ProblemUpsert {
                key: ProblemKey::new(self.domain, "p1"),
                fields: ProblemFields {
                    title: "stub".into(),
                    ..Default::default()
                },
                seen_at: ctx.fetched_at,
            })
            .await?;
        Ok(AdapterReport {
            problems_upserted: 1,
            ..Default::default()
        })
    }
}

fn stub(domain: Domain, broken: bool) -> Arc<dyn SourceAdapter> {
    Arc::new(StubAdapter { domain, broken })
}

#[derive(Default)]
struct RouteFetch {
    routes: HashMap<String, Vec<u8>>,
}

impl RouteFetch {
    fn fixture(mut self, url: impl Into<String>, domain: &str, file: &str) -> Self {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures")
            .join(domain)
            .join("sample")
            .join(file);
        let body = std::fs::read(&path).unwrap_or_else(|err| panic!("reading {}: {err}", path.display()));
        self.routes.insert(url.into(), body);
        self
    }
}

#[async_trait]
impl Fetch for RouteFetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.routes.get(url).cloned().ok_or_else(|| FetchError::HttpStatus {
            status: 404,
            url: url.to_string(),
        })
    }
}

fn stub_orchestrator(store: Arc<MemoryStore>) -> Orchestrator {
    Orchestrator::new(Arc::new(RouteFetch::default()), store).with_adapters(vec![
        stub(Domain::AtCoder, false),
        stub(Domain::Codeforces, true),
        stub(Domain::Yukicoder, false),
    ])
}

#[tokio::test]
async fn one_failing_source_does_not_stop_the_others() {
    let store = Arc::new(MemoryStore::new());
    let summary = stub_orchestrator(store.clone()).run_all().await;

    let domains: Vec<Domain> = summary.outcomes.iter().map(|o| o.domain).collect();
    assert_eq!(domains, vec![Domain::AtCoder, Domain::Codeforces, Domain::Yukicoder]);
    assert_eq!(summary.failed_sources(), vec![Domain::Codeforces]);
    match &summary.outcomes[1].status {
        SourceStatus::Failed { error } => assert!(error.contains("503")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(store.problems().await.len(), 2);
    assert!(summary.finished_at >= summary.started_at);
}

#[tokio::test]
async fn concurrent_mode_reports_in_crawl_order() {
    let store = Arc::new(MemoryStore::new());
    let summary = stub_orchestrator(store.clone()).run_all_concurrent().await;

    let domains: Vec<Domain> = summary.outcomes.iter().map(|o| o.domain).collect();
    assert_eq!(domains, vec![Domain::AtCoder, Domain::Codeforces, Domain::Yukicoder]);
    assert_eq!(summary.failed_sources(), vec![Domain::Codeforces]);
    assert_eq!(store.problems().await.len(), 2);
}

#[tokio::test]
async fn single_source_runs_only_that_source() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = stub_orchestrator(store.clone());

    let summary = orchestrator.run_source(Domain::Yukicoder).await.unwrap();
    assert_eq!(summary.outcomes.len(), 1);
    assert!(summary.outcomes[0].is_success());
    assert_eq!(store.problems().await.len(), 1);

    assert!(orchestrator.run_source(Domain::LeetCode).await.is_err());
}

#[tokio::test]
async fn restricting_drops_disabled_sources() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(Arc::new(RouteFetch::default()), store)
        .restrict_to(&[Domain::Aoj, Domain::AtCoder]);
    assert_eq!(orchestrator.domains(), vec![Domain::AtCoder, Domain::Aoj]);
}

#[tokio::test(start_paused = true)]
async fn full_crawl_over_fixtures_succeeds_for_every_judge() {
    let mut fetch = RouteFetch::default()
        .fixture(atcoder::PROBLEMS_URL, "atcoder", "merged-problems.json")
        .fixture(atcoder::MODELS_URL, "atcoder", "problem-models.json")
        .fixture(atcoder::CONTEST_PROBLEM_URL, "atcoder", "contest-problem.json")
        .fixture(atcoder::CONTESTS_URL, "atcoder", "contests.json")
        .fixture(codeforces::PROBLEMSET_URL, "codeforces", "problemset.problems.json")
        .fixture(codeforces::CONTEST_LIST_URL, "codeforces", "contest.list.json")
        .fixture(codeforces::standings_url(1000), "codeforces", "standings-1000.json")
        .fixture(codeforces::standings_url(1001), "codeforces", "standings-1001.json")
        .fixture(yukicoder::PROBLEMS_URL, "yukicoder", "problems.json")
        .fixture(yukicoder::PAST_CONTESTS_URL, "yukicoder", "contest-past.json")
        .fixture(aoj::PROBLEMS_URL, "aoj", "problems.json")
        .fixture(aoj::FILTERS_URL, "aoj", "filters.json")
        .fixture(aoj::COURSES_URL, "aoj", "courses.json")
        .fixture(aoj::category_problems_url("JOI"), "aoj", "cl-JOI.json")
        .fixture(aoj::course_problems_url("ALDS1"), "aoj", "courses-ALDS1.json");
    for category in leetcode::CATEGORIES {
        fetch = fetch.fixture(leetcode::category_url(category), "leetcode", &format!("{category}.json"));
    }

    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(Arc::new(fetch), store.clone());
    let first = orchestrator.run_all().await;
    let problems = store.problems().await;
    let second = orchestrator.run_all().await;

    assert!(first.failed_sources().is_empty(), "{first:?}");
    assert!(second.failed_sources().is_empty(), "{second:?}");
    assert_eq!(first.outcomes.len(), 5);
    // Same payloads again: no new records, numbers unchanged.
    let again = store.problems().await;
    assert_eq!(again.len(), problems.len());
    for (before, after) in problems.iter().zip(&again) {
        assert_eq!(before.no, after.no);
        assert_eq!(before.first_seen_at, after.first_seen_at);
    }
    assert!(Utc::now() >= second.started_at);
}
