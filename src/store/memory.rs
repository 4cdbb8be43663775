//! In-memory credential store.
//!
//! Backs local development and the test suites. Mutations hold the map lock
//! for the whole read-modify-write, so each update is atomic with respect to
//! other callers, matching the single-document update semantics of the
//! production store.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::CredentialStore;
use crate::otp::models::CredentialRecord;

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing `create` checks. Test helper.
    pub async fn insert(&self, record: CredentialRecord) {
        let mut records = self.records.lock().await;
        records.insert(record.user_id.clone(), record);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(user_id).cloned())
    }

    async fn create(&self, record: &CredentialRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.user_id) {
            return Err(anyhow!("credential record already exists: {}", record.user_id));
        }
        records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn set_otp(&self, user_id: &str, code: &str, expires: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| anyhow!("credential record not found: {user_id}"))?;
        record.otp = Some(code.to_string());
        record.otp_expires = Some(expires);
        Ok(())
    }

    async fn mark_verified(&self, user_id: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| anyhow!("credential record not found: {user_id}"))?;
        record.email_verified = true;
        record.otp = None;
        record.otp_expires = None;
        Ok(())
    }

    async fn clear_otp(&self, user_id: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| anyhow!("credential record not found: {user_id}"))?;
        record.otp = None;
        record.otp_expires = None;
        Ok(())
    }

    async fn touch_last_login(&self, user_id: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| anyhow!("credential record not found: {user_id}"))?;
        record.last_login = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user_id: &str) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord::new_unverified(
            user_id.to_string(),
            format!("{user_id}@example.com"),
            "Alice".to_string(),
            "NL".to_string(),
            "482913".to_string(),
            now + Duration::minutes(10),
            now,
        )
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips() -> Result<()> {
        let store = MemoryCredentialStore::new();
        store.create(&record("uid-1")).await?;
        let fetched = store.fetch("uid-1").await?.expect("record");
        assert_eq!(fetched.email, "uid-1@example.com");
        assert!(store.fetch("uid-2").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_duplicates() -> Result<()> {
        let store = MemoryCredentialStore::new();
        store.create(&record("uid-1")).await?;
        assert!(store.create(&record("uid-1")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn mark_verified_clears_the_pair_together() -> Result<()> {
        let store = MemoryCredentialStore::new();
        store.create(&record("uid-1")).await?;
        store.mark_verified("uid-1").await?;
        let fetched = store.fetch("uid-1").await?.expect("record");
        assert!(fetched.email_verified);
        assert!(fetched.otp.is_none());
        assert!(fetched.otp_expires.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn set_otp_overwrites_both_fields() -> Result<()> {
        let store = MemoryCredentialStore::new();
        store.create(&record("uid-1")).await?;
        let expires = Utc::now() + Duration::minutes(10);
        store.set_otp("uid-1", "111111", expires).await?;
        let fetched = store.fetch("uid-1").await?.expect("record");
        assert_eq!(fetched.otp.as_deref(), Some("111111"));
        assert_eq!(fetched.otp_expires, Some(expires));
        Ok(())
    }

    #[tokio::test]
    async fn updates_on_missing_records_fail() {
        let store = MemoryCredentialStore::new();
        assert!(store.clear_otp("ghost").await.is_err());
        assert!(store.mark_verified("ghost").await.is_err());
        assert!(store
            .set_otp("ghost", "111111", Utc::now())
            .await
            .is_err());
    }
}
