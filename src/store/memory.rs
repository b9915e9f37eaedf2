//! In-process row table, used by tests and local development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::rows::{TokenFilter, TokenPatch, TokenRows};
use crate::error::TokenError;
use crate::token::{NewToken, TokenRow};

#[derive(Default)]
struct Table {
    rows: BTreeMap<i64, TokenRow>,
    last_id: i64,
}

/// `authtoken` table kept in memory. Each call holds the lock for one
/// statement only, like a row-locking engine would.
#[derive(Default)]
pub struct MemoryTokenRows {
    table: RwLock<Table>,
}

impl MemoryTokenRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TokenRows for MemoryTokenRows {
    async fn insert(&self, token: &NewToken) -> Result<i64, TokenError> {
        let mut table = self.table.write().await;

        if table.rows.values().any(|r| r.token == token.token) {
            return Err(TokenError::Conflict("duplicate token value".into()));
        }

        table.last_id += 1;
        let id = table.last_id;
        table.rows.insert(id, TokenRow::from_new(id, token));
        Ok(id)
    }

    async fn update(&self, filter: &TokenFilter, patch: &TokenPatch) -> Result<u64, TokenError> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut table = self.table.write().await;
        let mut affected = 0;
        for row in table.rows.values_mut().filter(|r| filter.matches(r)) {
            patch.apply(row);
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, filter: &TokenFilter) -> Result<u64, TokenError> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, r| !filter.matches(r));
        Ok((before - table.rows.len()) as u64)
    }

    async fn select(
        &self,
        filter: &TokenFilter,
        limit: Option<usize>,
    ) -> Result<Vec<TokenRow>, TokenError> {
        let table = self.table.read().await;
        let rows = table
            .rows
            .values()
            .filter(|r| filter.matches(r))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::rows::Predicate;
    use crate::token::{RememberFlag, TokenType};

    fn new_token(uid: &str, token: &str) -> NewToken {
        NewToken {
            uid: uid.into(),
            login_name: uid.into(),
            name: "Browser".into(),
            token: token.into(),
            token_type: TokenType::Temporary,
            remember: RememberFlag::DoNotRemember,
            last_activity: 100,
            last_check: 100,
            recovery: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let rows = MemoryTokenRows::new();
        let a = rows.insert(&new_token("alice", "a")).await.unwrap();
        let b = rows.insert(&new_token("alice", "b")).await.unwrap();
        assert!(b > a);
        assert_eq!(rows.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_token_value_conflicts() {
        let rows = MemoryTokenRows::new();
        rows.insert(&new_token("alice", "same")).await.unwrap();
        let err = rows.insert(&new_token("bob", "same")).await.unwrap_err();
        assert!(matches!(err, TokenError::Conflict(_)));
        assert_eq!(rows.len().await, 1);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let rows = MemoryTokenRows::new();
        let first = rows.insert(&new_token("alice", "a")).await.unwrap();
        rows.delete(&TokenFilter::new().and(Predicate::IdEq(first)))
            .await
            .unwrap();
        let second = rows.insert(&new_token("alice", "a")).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_select_respects_limit_and_order() {
        let rows = MemoryTokenRows::new();
        for i in 0..10 {
            rows.insert(&new_token("alice", &format!("t{i}"))).await.unwrap();
        }
        let selected = rows.select(&TokenFilter::new(), Some(3)).await.unwrap();
        let ids: Vec<i64> = selected.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_and_delete_report_affected_rows() {
        let rows = MemoryTokenRows::new();
        rows.insert(&new_token("alice", "a")).await.unwrap();
        rows.insert(&new_token("alice", "b")).await.unwrap();
        rows.insert(&new_token("bob", "c")).await.unwrap();

        let alice = TokenFilter::new().and(Predicate::UidEq("alice".into()));
        let patch = TokenPatch { last_activity: Some(500), last_check: None };
        assert_eq!(rows.update(&alice, &patch).await.unwrap(), 2);
        assert_eq!(rows.update(&alice, &TokenPatch::default()).await.unwrap(), 0);

        assert_eq!(rows.delete(&alice).await.unwrap(), 2);
        assert_eq!(rows.delete(&alice).await.unwrap(), 0);
        assert!(!rows.is_empty().await);
    }
}
