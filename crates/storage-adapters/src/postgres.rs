//! # Postgres store
//!
//! Maps the relational model onto the `domains` ports. Every multi-statement
//! write runs in a single transaction; uniqueness and foreign-key violations
//! are translated into domain conflicts rather than surfaced as raw errors.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::error::{AuthFailure, DomainError, Result};
use domains::models::{
    AdmissionWindow, BoardStats, Journalist, NewJournalist, Story, StoryDraft, WriteAction,
};
use domains::ports::{JournalistRepository, RateLimitRepository, StoryRepository};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

const JOURNALIST_COLUMNS: &str = "id, name, api_key_hash, created_at, active, post_count, \
     verification_code, verified, twitter_handle, claimed_at";

const STORY_SELECT: &str = "SELECT s.id, s.title, s.url, s.content, s.journalist_id, \
     j.name AS journalist_name, s.points, s.created_at \
     FROM stories s JOIN journalists j ON j.id = s.journalist_id";

/// Pool sizing handed over from configuration.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 50,
            min_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// One pool, three repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, options: &PoolOptions) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(url)
            .await?;
        tracing::info!(
            max_connections = options.max_connections,
            min_connections = options.min_connections,
            "postgres pool ready"
        );
        Ok(Self { pool })
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translates driver errors that carry no domain meaning.
fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            tracing::error!(error = %e, context, "database unavailable");
            DomainError::Unavailable(format!("{context}: {e}"))
        }
        other => {
            tracing::error!(error = %other, context, "database error");
            DomainError::Internal(format!("{context}: {other}"))
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn journalist_from_row(row: &PgRow) -> std::result::Result<Journalist, sqlx::Error> {
    Ok(Journalist {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        api_key_hash: row.try_get("api_key_hash")?,
        created_at: row.try_get("created_at")?,
        active: row.try_get("active")?,
        post_count: row.try_get("post_count")?,
        verification_code: row.try_get("verification_code")?,
        verified: row.try_get("verified")?,
        twitter_handle: row.try_get("twitter_handle")?,
        claimed_at: row.try_get("claimed_at")?,
    })
}

fn story_from_row(row: &PgRow) -> std::result::Result<Story, sqlx::Error> {
    Ok(Story {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        content: row.try_get("content")?,
        journalist_id: row.try_get("journalist_id")?,
        journalist_name: row.try_get("journalist_name")?,
        points: row.try_get("points")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl JournalistRepository for PgStore {
    async fn insert(&self, new: NewJournalist) -> Result<Journalist> {
        let sql = format!(
            "INSERT INTO journalists (id, name, api_key_hash, verification_code) \
             VALUES ($1, $2, $3, $4) RETURNING {JOURNALIST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.id)
            .bind(&new.name)
            .bind(&new.api_key_hash)
            .bind(&new.verification_code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::DuplicateName(new.name.clone())
                } else {
                    db_error("insert journalist")(e)
                }
            })?;
        journalist_from_row(&row).map_err(db_error("decode journalist"))
    }

    async fn find_by_api_key_hash(&self, hash: &str) -> Result<Option<Journalist>> {
        let sql = format!("SELECT {JOURNALIST_COLUMNS} FROM journalists WHERE api_key_hash = $1");
        let row = sqlx::query(&sql)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find journalist by key"))?;
        row.as_ref()
            .map(journalist_from_row)
            .transpose()
            .map_err(db_error("decode journalist"))
    }

    async fn find_for_verification(&self, name: &str, code: &str) -> Result<Option<Journalist>> {
        let sql = format!(
            "SELECT {JOURNALIST_COLUMNS} FROM journalists \
             WHERE name = $1 AND verification_code = $2 AND active = TRUE"
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find journalist for verification"))?;
        row.as_ref()
            .map(journalist_from_row)
            .transpose()
            .map_err(db_error("decode journalist"))
    }

    async fn mark_verified(&self, id: Uuid, handle: &str) -> Result<Journalist> {
        let sql = format!(
            "UPDATE journalists SET verified = TRUE, twitter_handle = $2, claimed_at = now() \
             WHERE id = $1 AND verified = FALSE RETURNING {JOURNALIST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("mark journalist verified"))?;
        match row {
            Some(row) => journalist_from_row(&row).map_err(db_error("decode journalist")),
            None => Err(DomainError::AlreadyVerified(id.to_string())),
        }
    }

    async fn list(&self, limit: i64) -> Result<Vec<Journalist>> {
        let sql = format!(
            "SELECT {JOURNALIST_COLUMNS} FROM journalists ORDER BY created_at DESC LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list journalists"))?;
        rows.iter()
            .map(journalist_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_error("decode journalist"))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let done = sqlx::query("UPDATE journalists SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(db_error("set journalist active"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn force_verify(&self, id: Uuid, handle: Option<String>) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE journalists SET verified = TRUE, \
             twitter_handle = COALESCE($2, twitter_handle), \
             claimed_at = COALESCE(claimed_at, now()) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(handle)
        .execute(&self.pool)
        .await
        .map_err(db_error("force verify journalist"))?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl StoryRepository for PgStore {
    /// Story insert, post counter and write-log entry commit together.
    ///
    /// The journalist row is locked first so two submissions from the same
    /// journalist serialize on the in-transaction window count.
    async fn create(
        &self,
        author: &Journalist,
        draft: StoryDraft,
        window: AdmissionWindow,
    ) -> Result<Story> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin story tx"))?;

        let locked = sqlx::query("SELECT active, verified FROM journalists WHERE id = $1 FOR UPDATE")
            .bind(author.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock journalist"))?
            .ok_or_else(|| DomainError::NotFound("journalist".into(), author.id.to_string()))?;
        let active: bool = locked.try_get("active").map_err(db_error("decode journalist"))?;
        let verified: bool = locked.try_get("verified").map_err(db_error("decode journalist"))?;
        if !active {
            return Err(DomainError::Unauthorized(AuthFailure::Deactivated));
        }
        if !verified {
            return Err(DomainError::Unauthorized(AuthFailure::NotVerified));
        }

        let now = Utc::now();
        let recent: i64 = sqlx::query(
            "SELECT COUNT(*) FROM rate_limit_events \
             WHERE journalist_id = $1 AND action = $2 AND created_at > $3",
        )
        .bind(author.id)
        .bind(window.action.as_str())
        .bind(window.since(now))
        .fetch_one(&mut *tx)
        .await
        .and_then(|row| row.try_get(0))
        .map_err(|e| {
            tracing::error!(journalist_id = %author.id, error = %e, "in-transaction rate check failed");
            DomainError::RateCheckFailed(e.to_string())
        })?;
        if recent >= window.max_actions {
            return Err(DomainError::PostRateLimitExceeded {
                max_actions: window.max_actions,
                window_secs: window.window.num_seconds(),
            });
        }

        sqlx::query(
            "INSERT INTO stories (id, title, url, content, journalist_id, points, created_at) \
             VALUES ($1, $2, $3, $4, $5, 1, $6)",
        )
        .bind(draft.id)
        .bind(&draft.title)
        .bind(&draft.url)
        .bind(&draft.content)
        .bind(author.id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error("insert story"))?;

        sqlx::query("UPDATE journalists SET post_count = post_count + 1 WHERE id = $1")
            .bind(author.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("bump post count"))?;

        sqlx::query(
            "INSERT INTO rate_limit_events (id, journalist_id, action, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(author.id)
        .bind(window.action.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error("append rate-limit event"))?;

        tx.commit().await.map_err(db_error("commit story tx"))?;

        Ok(Story {
            id: draft.id,
            title: draft.title,
            url: draft.url,
            content: draft.content,
            journalist_id: author.id,
            journalist_name: author.name.clone(),
            points: 1,
            created_at: now,
        })
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Story>> {
        let sql = format!("{STORY_SELECT} ORDER BY s.created_at DESC, s.id DESC LIMIT $1 OFFSET $2");
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list stories"))?;
        rows.iter()
            .map(story_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_error("decode story"))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>> {
        let sql = format!("{STORY_SELECT} WHERE s.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get story"))?;
        row.as_ref()
            .map(story_from_row)
            .transpose()
            .map_err(db_error("decode story"))
    }

    async fn has_upvote(&self, story_id: Uuid, ip_hash: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM upvotes WHERE story_id = $1 AND ip_hash = $2")
            .bind(story_id)
            .bind(ip_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("check upvote"))?;
        Ok(row.is_some())
    }

    async fn record_upvote(&self, story_id: Uuid, ip_hash: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin upvote tx"))?;

        sqlx::query("INSERT INTO upvotes (id, story_id, ip_hash) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(story_id)
            .bind(ip_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::AlreadyUpvoted(story_id.to_string())
                } else if is_foreign_key_violation(&e) {
                    DomainError::NotFound("story".into(), story_id.to_string())
                } else {
                    db_error("insert upvote")(e)
                }
            })?;

        let bumped = sqlx::query("UPDATE stories SET points = points + 1 WHERE id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("bump story points"))?;
        if bumped.rows_affected() == 0 {
            // dropping tx rolls back the vote
            return Err(DomainError::NotFound("story".into(), story_id.to_string()));
        }

        tx.commit().await.map_err(db_error("commit upvote tx"))?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete story"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<BoardStats> {
        let row = sqlx::query(
            "SELECT \
               (SELECT COUNT(*) FROM stories) AS total_stories, \
               (SELECT COUNT(*) FROM journalists) AS total_journalists, \
               (SELECT COUNT(*) FROM stories WHERE created_at > $1) AS stories_last_24h",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("board stats"))?;

        let decode = db_error("decode stats");
        Ok(BoardStats {
            total_stories: row.try_get("total_stories").map_err(&decode)?,
            total_journalists: row.try_get("total_journalists").map_err(&decode)?,
            stories_last_24h: row.try_get("stories_last_24h").map_err(&decode)?,
        })
    }
}

#[async_trait]
impl RateLimitRepository for PgStore {
    async fn count_since(
        &self,
        journalist_id: Uuid,
        action: WriteAction,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        sqlx::query(
            "SELECT COUNT(*) FROM rate_limit_events \
             WHERE journalist_id = $1 AND action = $2 AND created_at > $3",
        )
        .bind(journalist_id)
        .bind(action.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .and_then(|row| row.try_get(0))
        .map_err(db_error("count rate-limit events"))
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let done = sqlx::query("DELETE FROM rate_limit_events WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(db_error("purge rate-limit events"))?;
        Ok(done.rows_affected())
    }
}
