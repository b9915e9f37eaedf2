//! Token repository: entity-level intents mapped onto predicate-scoped rows.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use super::rows::{Predicate, TokenFilter, TokenPatch, TokenRows};
use crate::error::TokenError;
use crate::token::{AuthToken, NewToken, RememberFlag, TokenRow, TokenType};

/// Upper bound on tokens returned for one user. Guards against users (or
/// attackers) that mint sessions in a loop.
pub const MAX_TOKENS_PER_USER: usize = 1000;

/// Stateless façade over a [`TokenRows`] backend. Holds no locks or caches;
/// every method is one statement.
#[derive(Clone)]
pub struct TokenMapper {
    rows: Arc<dyn TokenRows>,
}

impl TokenMapper {
    pub fn new(rows: Arc<dyn TokenRows>) -> Self {
        Self { rows }
    }

    /// Persist a freshly issued token.
    pub async fn insert(&self, token: NewToken) -> Result<AuthToken, TokenError> {
        let id = self.rows.insert(&token).await?;
        debug!("Inserted token {id} for {}", token.uid);
        AuthToken::from_row(TokenRow::from_new(id, &token))
    }

    /// Delete the token with this secret value. Missing tokens are a no-op.
    pub async fn invalidate(&self, token: &str) -> Result<(), TokenError> {
        let filter = TokenFilter::new().and(Predicate::TokenEq(token.to_string()));
        let deleted = self.rows.delete(&filter).await?;
        debug!("Invalidated {deleted} token(s) by value");
        Ok(())
    }

    /// Delete temporary tokens idle since before `older_than` whose remember
    /// flag equals `remember`. Persistent tokens are never touched.
    pub async fn invalidate_old(
        &self,
        older_than: DateTime<Utc>,
        remember: RememberFlag,
    ) -> Result<(), TokenError> {
        let filter = TokenFilter::new()
            .and(Predicate::LastActivityBefore(older_than.timestamp()))
            .and(Predicate::TypeEq(TokenType::Temporary))
            .and(Predicate::RememberEq(remember));
        let deleted = self.rows.delete(&filter).await?;
        debug!("Expired {deleted} {remember:?} token(s) idle since before {older_than}");
        Ok(())
    }

    /// Look up a token by its secret value.
    pub async fn get_token(&self, token: &str) -> Result<AuthToken, TokenError> {
        let filter = TokenFilter::new().and(Predicate::TokenEq(token.to_string()));
        self.find_one(&filter).await
    }

    /// Look up a token by its id.
    pub async fn get_token_by_id(&self, id: i64) -> Result<AuthToken, TokenError> {
        let filter = TokenFilter::new().and(Predicate::IdEq(id));
        self.find_one(&filter).await
    }

    /// All tokens of `uid`, truncated to [`MAX_TOKENS_PER_USER`].
    pub async fn get_token_by_user(&self, uid: &str) -> Result<Vec<AuthToken>, TokenError> {
        let filter = TokenFilter::new().and(Predicate::UidEq(uid.to_string()));
        self.rows
            .select(&filter, Some(MAX_TOKENS_PER_USER))
            .await?
            .into_iter()
            .map(AuthToken::from_row)
            .collect()
    }

    /// Delete token `id` only if it belongs to `uid`.
    pub async fn delete_by_id(&self, uid: &str, id: i64) -> Result<(), TokenError> {
        let filter = TokenFilter::new()
            .and(Predicate::IdEq(id))
            .and(Predicate::UidEq(uid.to_string()));
        let deleted = self.rows.delete(&filter).await?;
        debug!("Deleted {deleted} token(s) with id {id} for {uid}");
        Ok(())
    }

    /// Delete every token issued to client `name`, for all users.
    pub async fn delete_by_name(&self, name: &str) -> Result<(), TokenError> {
        let filter = TokenFilter::new().and(Predicate::NameEq(name.to_string()));
        let deleted = self.rows.delete(&filter).await?;
        debug!("Deleted {deleted} token(s) for client {name}");
        Ok(())
    }

    /// Record use of token `id`. A concurrently revoked token is a no-op.
    pub async fn update_activity(&self, id: i64, at: DateTime<Utc>) -> Result<(), TokenError> {
        let patch = TokenPatch {
            last_activity: Some(at.timestamp()),
            last_check: None,
        };
        self.rows
            .update(&TokenFilter::new().and(Predicate::IdEq(id)), &patch)
            .await?;
        Ok(())
    }

    /// Record that the credential behind token `id` was re-checked.
    pub async fn mark_checked(&self, id: i64, at: DateTime<Utc>) -> Result<(), TokenError> {
        let patch = TokenPatch {
            last_activity: None,
            last_check: Some(at.timestamp()),
        };
        self.rows
            .update(&TokenFilter::new().and(Predicate::IdEq(id)), &patch)
            .await?;
        Ok(())
    }

    async fn find_one(&self, filter: &TokenFilter) -> Result<AuthToken, TokenError> {
        let row = self
            .rows
            .select(filter, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TokenError::NotFound("token".into()))?;
        AuthToken::from_row(row)
    }
}
