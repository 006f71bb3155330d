use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use common::{Result, UserDirectory};

/// Reads notification addresses from the `users` table.
#[derive(Clone)]
pub struct SqliteUserDirectory {
    db: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert or replace a user's address.
    pub async fn upsert(&self, user_id: &str, email: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET email = excluded.email",
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn email_for(&self, user_id: &str) -> Result<Option<String>> {
        let email = sqlx::query_scalar("SELECT email FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(email)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    emails: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: impl Into<String>, email: impl Into<String>) {
        self.emails.write().await.insert(user_id.into(), email.into());
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn email_for(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.emails.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_directory_upserts() {
        let users = SqliteUserDirectory::new(common::db::connect_in_memory().await.unwrap());
        assert_eq!(users.email_for("u1").await.unwrap(), None);

        users.upsert("u1", "old@example.com").await.unwrap();
        users.upsert("u1", "new@example.com").await.unwrap();
        assert_eq!(
            users.email_for("u1").await.unwrap().as_deref(),
            Some("new@example.com")
        );
    }

    #[tokio::test]
    async fn in_memory_directory() {
        let users = InMemoryUserDirectory::new();
        users.insert("u1", "a@example.com").await;
        assert_eq!(users.email_for("u1").await.unwrap().as_deref(), Some("a@example.com"));
        assert!(users.email_for("u2").await.unwrap().is_none());
    }
}
