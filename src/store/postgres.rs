//! Postgres-backed [`CredentialStore`].

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{AccessRequest, CredentialStore, Role, SignupOutcome, Site, SiteState, User};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `sql/schema.sql`, one statement at a time.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            let span = db_span("DDL", statement);
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(span)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

fn db_span(operation: &str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: role.parse().map_err(|err: String| anyhow!(err))?,
    })
}

fn parse_state(raw: &str) -> Result<SiteState> {
    raw.parse()
        .map_err(|err: String| anyhow!("corrupt user_sites row: {err}"))
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = "SELECT id, email, password_hash, role FROM users WHERE email = $1";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<SignupOutcome> {
        let query = r"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, role
        ";
        let row = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(SignupOutcome::Created(user_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let query = "SELECT id, url FROM sites WHERE url = $1";
        let row = sqlx::query(query)
            .bind(url)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup site")?;

        Ok(row.map(|row| Site {
            id: row.get("id"),
            url: row.get("url"),
        }))
    }

    async fn ensure_site(&self, url: &str) -> Result<Site> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let query = r"
            INSERT INTO sites (url)
            VALUES ($1)
            ON CONFLICT (url) DO UPDATE SET url = EXCLUDED.url
            RETURNING id, url
        ";
        let row = sqlx::query(query)
            .bind(url)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to ensure site")?;

        Ok(Site {
            id: row.get("id"),
            url: row.get("url"),
        })
    }

    async fn user_site_state(&self, user_id: Uuid, site_id: Uuid) -> Result<Option<SiteState>> {
        let query = "SELECT state FROM user_sites WHERE user_id = $1 AND site_id = $2";
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(site_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user site")?;

        row.map(|row| {
            let state: String = row.get("state");
            parse_state(&state)
        })
        .transpose()
    }

    async fn insert_user_site(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        state: SiteState,
    ) -> Result<bool> {
        let query = r"
            INSERT INTO user_sites (user_id, site_id, state)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, site_id) DO NOTHING
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(site_id)
            .bind(state.as_str())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert user site")?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_user_site(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        state: SiteState,
    ) -> Result<bool> {
        let query = r"
            UPDATE user_sites
            SET state = $3, updated_at = NOW()
            WHERE user_id = $1 AND site_id = $2
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(site_id)
            .bind(state.as_str())
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update user site")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_user_sites(&self) -> Result<Vec<AccessRequest>> {
        let query = r"
            SELECT users.email AS user_email, sites.url AS site_url, user_sites.state AS state
            FROM user_sites
            JOIN users ON users.id = user_sites.user_id
            JOIN sites ON sites.id = user_sites.site_id
            ORDER BY users.email, sites.url
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to list user sites")?;

        rows.iter()
            .map(|row| {
                let state: String = row.get("state");
                Ok(AccessRequest {
                    user: row.get("user_email"),
                    site: row.get("site_url"),
                    state: parse_state(&state)?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_create_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 3);
        assert!(statements.iter().all(|s| s.starts_with("CREATE TABLE IF NOT EXISTS")));
        assert!(statements[2].contains("PRIMARY KEY (user_id, site_id)"));
    }

    #[test]
    fn split_keeps_trailing_statement_without_semicolon() {
        let statements = split_sql_statements("SELECT 1;\n-- note\nSELECT 2");
        assert_eq!(statements, vec!["SELECT 1;".to_string(), "SELECT 2".to_string()]);
    }

    #[test]
    fn parse_state_rejects_unknown_values() {
        assert!(parse_state("authorized").is_ok());
        assert!(parse_state("AUTHORIZED").is_err());
    }
}
