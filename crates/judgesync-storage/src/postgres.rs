use async_trait::async_trait;
use judgesync_core::{Contest, ContestKey, ContestUpsert, Domain, Problem, ProblemKey, ProblemUpsert};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

use crate::store::{ReconciliationStore, StoreError};

const PROBLEM_COLUMNS: &str = "no, domain, problem_id, contest_id, title, slug, frontend_id, \
                               difficulty, first_seen_at, last_seen_at";

const CONTEST_COLUMNS: &str = "no, domain, contest_id, title, start_time_seconds, duration_seconds, \
                               rated, problem_no_list, first_seen_at, last_seen_at";

/// Postgres-backed store. Each upsert is one `INSERT .. ON CONFLICT .. RETURNING`
/// statement on the natural-key unique constraint, so create-vs-update is
/// resolved by the database. The assigned columns mirror `Problem::merge` and
/// `Contest::merge`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("migrations applied");
        Ok(())
    }
}

fn parse_domain(raw: &str) -> Result<Domain, StoreError> {
    raw.parse()
        .map_err(|err| StoreError::Message(format!("stored row has {err}")))
}

fn problem_from_row(row: &PgRow) -> Result<Problem, StoreError> {
    let domain: String = row.try_get("domain")?;
    Ok(Problem {
        no: row.try_get("no")?,
        domain: parse_domain(&domain)?,
        problem_id: row.try_get("problem_id")?,
        contest_id: row.try_get("contest_id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        frontend_id: row.try_get("frontend_id")?,
        difficulty: row.try_get("difficulty")?,
        first_seen_at: row.try_get("first_seen_at")?,
        last_seen_at: row.try_get("last_seen_at")?,
    })
}

fn contest_from_row(row: &PgRow) -> Result<Contest, StoreError> {
    let domain: String = row.try_get("domain")?;
    Ok(Contest {
        no: row.try_get("no")?,
        domain: parse_domain(&domain)?,
        contest_id: row.try_get("contest_id")?,
        title: row.try_get("title")?,
        start_time_seconds: row.try_get("start_time_seconds")?,
        duration_seconds: row.try_get("duration_seconds")?,
        rated: row.try_get("rated")?,
        problem_no_list: row.try_get("problem_no_list")?,
        first_seen_at: row.try_get("first_seen_at")?,
        last_seen_at: row.try_get("last_seen_at")?,
    })
}

#[async_trait]
impl ReconciliationStore for PgStore {
    async fn upsert_problem(&self, upsert: &ProblemUpsert) -> Result<Problem, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO problems (
                domain, problem_id, contest_id, title, slug, frontend_id, difficulty,
                first_seen_at, last_seen_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (domain, problem_id) DO UPDATE SET
                title        = EXCLUDED.title,
                contest_id   = EXCLUDED.contest_id,
                slug         = COALESCE(EXCLUDED.slug, problems.slug),
                frontend_id  = COALESCE(EXCLUDED.frontend_id, problems.frontend_id),
                difficulty   = EXCLUDED.difficulty,
                last_seen_at = EXCLUDED.last_seen_at
            RETURNING {PROBLEM_COLUMNS}
            "#
        );
        let fields = &upsert.fields;
        let row = sqlx::query(&sql)
            .bind(upsert.key.domain.as_str())
            .bind(&upsert.key.problem_id)
            .bind(&fields.contest_id)
            .bind(&fields.title)
            .bind(&fields.slug)
            .bind(&fields.frontend_id)
            .bind(fields.difficulty)
            .bind(upsert.seen_at)
            .fetch_one(&self.pool)
            .await?;
        problem_from_row(&row)
    }

    async fn upsert_contest(&self, upsert: &ContestUpsert) -> Result<Contest, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO contests (
                domain, contest_id, title, start_time_seconds, duration_seconds, rated,
                problem_no_list, first_seen_at, last_seen_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (domain, contest_id) DO UPDATE SET
                title              = EXCLUDED.title,
                start_time_seconds = EXCLUDED.start_time_seconds,
                duration_seconds   = EXCLUDED.duration_seconds,
                rated              = COALESCE(EXCLUDED.rated, contests.rated),
                problem_no_list    = EXCLUDED.problem_no_list,
                last_seen_at       = EXCLUDED.last_seen_at
            RETURNING {CONTEST_COLUMNS}
            "#
        );
        let fields = &upsert.fields;
        let row = sqlx::query(&sql)
            .bind(upsert.key.domain.as_str())
            .bind(&upsert.key.contest_id)
            .bind(&fields.title)
            .bind(fields.start_time_seconds)
            .bind(fields.duration_seconds)
            .bind(&fields.rated)
            .bind(&fields.problem_no_list)
            .bind(upsert.seen_at)
            .fetch_one(&self.pool)
            .await?;
        contest_from_row(&row)
    }

    async fn lookup_problem(&self, key: &ProblemKey) -> Result<Option<Problem>, StoreError> {
        let sql = format!(
            "SELECT {PROBLEM_COLUMNS} FROM problems WHERE domain = $1 AND problem_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(key.domain.as_str())
            .bind(&key.problem_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(problem_from_row).transpose()
    }

    async fn lookup_contest(&self, key: &ContestKey) -> Result<Option<Contest>, StoreError> {
        let sql = format!(
            "SELECT {CONTEST_COLUMNS} FROM contests WHERE domain = $1 AND contest_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(key.domain.as_str())
            .bind(&key.contest_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(contest_from_row).transpose()
    }
}
