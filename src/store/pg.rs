//! PostgreSQL-backed row store for the `authtoken` table.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;

use super::rows::{Predicate, TokenFilter, TokenPatch, TokenRows};
use crate::error::TokenError;
use crate::token::{NewToken, TokenRow};

const COLUMNS: &str = "id, uid, login_name, name, token, type, remember, last_activity, \
                       last_check, version, public_key, private_key, password";

/// Row store backed by PostgreSQL.
pub struct PgTokenRows {
    pool: PgPool,
}

impl PgTokenRows {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, TokenError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(db_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and its indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), TokenError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS authtoken (
                id             BIGSERIAL PRIMARY KEY,
                uid            TEXT NOT NULL,
                login_name     TEXT NOT NULL DEFAULT '',
                name           TEXT NOT NULL DEFAULT '',
                token          TEXT NOT NULL,
                type           SMALLINT NOT NULL DEFAULT 0,
                remember       SMALLINT NOT NULL DEFAULT 0,
                last_activity  BIGINT NOT NULL DEFAULT 0,
                last_check     BIGINT NOT NULL DEFAULT 0,
                version        SMALLINT NOT NULL DEFAULT 1,
                public_key     TEXT,
                private_key    TEXT,
                password       TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS authtoken_token_index ON authtoken(token)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS authtoken_uid_index ON authtoken(uid)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS authtoken_name_index ON authtoken(name)")
            .execute(&self.pool)
            .await?;

        // expiry sweep
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS authtoken_last_activity_index \
             ON authtoken(type, remember, last_activity)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Append ` WHERE a AND b ...` with every value bound as a parameter.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TokenFilter) {
    for (i, predicate) in filter.predicates().iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::IdEq(id) => {
                qb.push("id = ").push_bind(*id);
            }
            Predicate::TokenEq(token) => {
                qb.push("token = ").push_bind(token.clone());
            }
            Predicate::UidEq(uid) => {
                qb.push("uid = ").push_bind(uid.clone());
            }
            Predicate::NameEq(name) => {
                qb.push("name = ").push_bind(name.clone());
            }
            Predicate::TypeEq(token_type) => {
                qb.push("type = ").push_bind(token_type.as_i16());
            }
            Predicate::RememberEq(remember) => {
                qb.push("remember = ").push_bind(remember.as_i16());
            }
            Predicate::LastActivityBefore(ts) => {
                qb.push("last_activity < ").push_bind(*ts);
            }
        }
    }
}

/// `UPDATE authtoken SET ... WHERE ...` for a non-empty patch.
fn update_query(filter: &TokenFilter, patch: &TokenPatch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE authtoken SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(ts) = patch.last_activity {
            set.push("last_activity = ").push_bind_unseparated(ts);
        }
        if let Some(ts) = patch.last_check {
            set.push("last_check = ").push_bind_unseparated(ts);
        }
    }
    push_filter(&mut qb, filter);
    qb
}

/// `SELECT ... WHERE ... ORDER BY id [LIMIT n]`. The id order is what makes
/// a limited select return the oldest rows.
fn select_query(filter: &TokenFilter, limit: Option<usize>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM authtoken"));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY id");
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }
    qb
}

fn decode_row(row: &PgRow) -> Result<TokenRow, sqlx::Error> {
    Ok(TokenRow {
        id: row.try_get("id")?,
        uid: row.try_get("uid")?,
        login_name: row.try_get("login_name")?,
        name: row.try_get("name")?,
        token: row.try_get("token")?,
        token_type: row.try_get("type")?,
        remember: row.try_get("remember")?,
        last_activity: row.try_get("last_activity")?,
        last_check: row.try_get("last_check")?,
        version: row.try_get("version")?,
        public_key: row.try_get("public_key")?,
        private_key: row.try_get("private_key")?,
        password: row.try_get("password")?,
    })
}

#[async_trait]
impl TokenRows for PgTokenRows {
    async fn insert(&self, token: &NewToken) -> Result<i64, TokenError> {
        let recovery = token.recovery.as_ref();

        let row = sqlx::query(
            r#"
            INSERT INTO authtoken
                (uid, login_name, name, token, type, remember, last_activity,
                 last_check, version, public_key, private_key, password)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&token.uid)
        .bind(&token.login_name)
        .bind(&token.name)
        .bind(&token.token)
        .bind(token.token_type.as_i16())
        .bind(token.remember.as_i16())
        .bind(token.last_activity)
        .bind(token.last_check)
        .bind(token.version())
        .bind(recovery.map(|r| r.public_key.as_str()))
        .bind(recovery.map(|r| r.private_key.as_str()))
        .bind(recovery.and_then(|r| r.password.as_deref()))
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get(0)?;
        Ok(id)
    }

    async fn update(&self, filter: &TokenFilter, patch: &TokenPatch) -> Result<u64, TokenError> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut qb = update_query(filter, patch);
        let affected = qb.build().execute(&self.pool).await?.rows_affected();
        Ok(affected)
    }

    async fn delete(&self, filter: &TokenFilter) -> Result<u64, TokenError> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM authtoken");
        push_filter(&mut qb, filter);

        let affected = qb.build().execute(&self.pool).await?.rows_affected();
        Ok(affected)
    }

    async fn select(
        &self,
        filter: &TokenFilter,
        limit: Option<usize>,
    ) -> Result<Vec<TokenRow>, TokenError> {
        let mut qb = select_query(filter, limit);
        let rows = qb.build().fetch_all(&self.pool).await?;
        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MAX_TOKENS_PER_USER;
    use crate::token::{RememberFlag, TokenType};

    #[test]
    fn test_filter_renders_bound_conjunction() {
        let filter = TokenFilter::new()
            .and(Predicate::LastActivityBefore(200))
            .and(Predicate::TypeEq(TokenType::Temporary))
            .and(Predicate::RememberEq(RememberFlag::DoNotRemember));

        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM authtoken");
        push_filter(&mut qb, &filter);
        assert_eq!(
            qb.sql(),
            "DELETE FROM authtoken WHERE last_activity < $1 AND type = $2 AND remember = $3"
        );
    }

    #[test]
    fn test_compound_delete_by_id_scopes_to_user() {
        let filter = TokenFilter::new()
            .and(Predicate::IdEq(42))
            .and(Predicate::UidEq("alice".into()));

        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM authtoken");
        push_filter(&mut qb, &filter);
        assert_eq!(qb.sql(), "DELETE FROM authtoken WHERE id = $1 AND uid = $2");
    }

    #[test]
    fn test_empty_filter_renders_no_where_clause() {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM authtoken");
        push_filter(&mut qb, &TokenFilter::new());
        assert_eq!(qb.sql(), "DELETE FROM authtoken");
    }

    #[test]
    fn test_user_listing_is_ordered_and_limited() {
        let filter = TokenFilter::new().and(Predicate::UidEq("alice".into()));
        let qb = select_query(&filter, Some(MAX_TOKENS_PER_USER));
        assert_eq!(
            qb.sql(),
            "SELECT id, uid, login_name, name, token, type, remember, last_activity, \
             last_check, version, public_key, private_key, password \
             FROM authtoken WHERE uid = $1 ORDER BY id LIMIT $2"
        );
    }

    #[test]
    fn test_unlimited_select_has_no_limit_clause() {
        let filter = TokenFilter::new().and(Predicate::IdEq(7));
        let qb = select_query(&filter, None);
        assert!(qb.sql().ends_with(" FROM authtoken WHERE id = $1 ORDER BY id"));
    }

    #[test]
    fn test_update_sets_only_patched_columns() {
        let by_id = TokenFilter::new().and(Predicate::IdEq(7));

        let activity = TokenPatch { last_activity: Some(500), last_check: None };
        assert_eq!(
            update_query(&by_id, &activity).sql(),
            "UPDATE authtoken SET last_activity = $1 WHERE id = $2"
        );

        let both = TokenPatch { last_activity: Some(500), last_check: Some(600) };
        assert_eq!(
            update_query(&by_id, &both).sql(),
            "UPDATE authtoken SET last_activity = $1, last_check = $2 WHERE id = $3"
        );
    }
}
