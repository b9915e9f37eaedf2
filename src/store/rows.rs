//! Backing row-store contract.
//!
//! The repository expresses every intent as one predicate-scoped statement
//! against this trait; isolation and atomicity are the backend's job.

use async_trait::async_trait;
use std::fmt;

use crate::error::TokenError;
use crate::token::{NewToken, RememberFlag, TokenRow, TokenType};

/// A single equality or range condition on one column.
#[derive(Clone, PartialEq, Eq)]
pub enum Predicate {
    IdEq(i64),
    TokenEq(String),
    UidEq(String),
    NameEq(String),
    TypeEq(TokenType),
    RememberEq(RememberFlag),
    /// `last_activity < value`
    LastActivityBefore(i64),
}

impl Predicate {
    pub fn matches(&self, row: &TokenRow) -> bool {
        match self {
            Predicate::IdEq(id) => row.id == *id,
            Predicate::TokenEq(token) => row.token == *token,
            Predicate::UidEq(uid) => row.uid == *uid,
            Predicate::NameEq(name) => row.name == *name,
            Predicate::TypeEq(t) => row.token_type == t.as_i16(),
            Predicate::RememberEq(r) => row.remember == r.as_i16(),
            Predicate::LastActivityBefore(ts) => row.last_activity < *ts,
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::IdEq(id) => f.debug_tuple("IdEq").field(id).finish(),
            // secret value
            Predicate::TokenEq(_) => f.write_str("TokenEq(..)"),
            Predicate::UidEq(uid) => f.debug_tuple("UidEq").field(uid).finish(),
            Predicate::NameEq(name) => f.debug_tuple("NameEq").field(name).finish(),
            Predicate::TypeEq(t) => f.debug_tuple("TypeEq").field(t).finish(),
            Predicate::RememberEq(r) => f.debug_tuple("RememberEq").field(r).finish(),
            Predicate::LastActivityBefore(ts) => {
                f.debug_tuple("LastActivityBefore").field(ts).finish()
            }
        }
    }
}

/// Conjunction of predicates. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenFilter {
    predicates: Vec<Predicate>,
}

impl TokenFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn matches(&self, row: &TokenRow) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}

/// Column assignments for an update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPatch {
    pub last_activity: Option<i64>,
    pub last_check: Option<i64>,
}

impl TokenPatch {
    pub fn is_empty(&self) -> bool {
        self.last_activity.is_none() && self.last_check.is_none()
    }

    pub fn apply(&self, row: &mut TokenRow) {
        if let Some(ts) = self.last_activity {
            row.last_activity = ts;
        }
        if let Some(ts) = self.last_check {
            row.last_check = ts;
        }
    }
}

/// Predicate-scoped CRUD over the `authtoken` table.
///
/// Each call is one statement. Implementations must evaluate the whole
/// filter atomically and must not retry on failure.
#[async_trait]
pub trait TokenRows: Send + Sync {
    /// Insert a row and return the generated id.
    async fn insert(&self, token: &NewToken) -> Result<i64, TokenError>;

    /// Apply `patch` to every matching row. Returns affected rows.
    async fn update(&self, filter: &TokenFilter, patch: &TokenPatch) -> Result<u64, TokenError>;

    /// Delete every matching row. Returns affected rows.
    async fn delete(&self, filter: &TokenFilter) -> Result<u64, TokenError>;

    /// Matching rows in id order, at most `limit` of them.
    async fn select(
        &self,
        filter: &TokenFilter,
        limit: Option<usize>,
    ) -> Result<Vec<TokenRow>, TokenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, token_type: TokenType, remember: RememberFlag, last_activity: i64) -> TokenRow {
        TokenRow {
            id,
            uid: "alice".into(),
            login_name: "alice".into(),
            name: "Browser".into(),
            token: format!("secret-{id}"),
            token_type: token_type.as_i16(),
            remember: remember.as_i16(),
            last_activity,
            last_check: last_activity,
            version: 1,
            public_key: None,
            private_key: None,
            password: None,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let r = row(1, TokenType::Persistent, RememberFlag::Remember, 5);
        assert!(TokenFilter::new().matches(&r));
    }

    #[test]
    fn test_filter_is_a_conjunction() {
        let filter = TokenFilter::new()
            .and(Predicate::LastActivityBefore(200))
            .and(Predicate::TypeEq(TokenType::Temporary))
            .and(Predicate::RememberEq(RememberFlag::DoNotRemember));

        assert!(filter.matches(&row(1, TokenType::Temporary, RememberFlag::DoNotRemember, 100)));
        assert!(!filter.matches(&row(2, TokenType::Temporary, RememberFlag::Remember, 100)));
        assert!(!filter.matches(&row(3, TokenType::Persistent, RememberFlag::DoNotRemember, 100)));
        // strictly older
        assert!(!filter.matches(&row(4, TokenType::Temporary, RememberFlag::DoNotRemember, 200)));
    }

    #[test]
    fn test_patch_only_touches_set_columns() {
        let mut r = row(1, TokenType::Temporary, RememberFlag::DoNotRemember, 100);
        assert!(TokenPatch::default().is_empty());

        TokenPatch { last_activity: Some(150), last_check: None }.apply(&mut r);
        assert_eq!(r.last_activity, 150);
        assert_eq!(r.last_check, 100);
    }

    #[test]
    fn test_filter_debug_hides_token_value() {
        let filter = TokenFilter::new()
            .and(Predicate::TokenEq("cleartext-secret".into()))
            .and(Predicate::UidEq("alice".into()));
        let debug = format!("{filter:?}");
        assert!(!debug.contains("cleartext-secret"));
        assert!(debug.contains("TokenEq(..)"));
        assert!(debug.contains("UidEq(\"alice\")"));
    }
}
