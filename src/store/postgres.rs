//! PostgreSQL credential store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE user_credentials (
//!     user_id TEXT PRIMARY KEY,
//!     email TEXT NOT NULL UNIQUE,
//!     display_name TEXT NOT NULL DEFAULT '',
//!     country TEXT NOT NULL DEFAULT '',
//!     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
//!     otp TEXT,
//!     otp_expires TIMESTAMPTZ,
//!     plan TEXT NOT NULL DEFAULT 'Free',
//!     preparation_credits_used INTEGER NOT NULL DEFAULT 0,
//!     saved_remedies_credits_used INTEGER NOT NULL DEFAULT 0,
//!     social_post_download_credits_used INTEGER NOT NULL DEFAULT 0,
//!     sign_up_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     last_login TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! Every OTP mutation is a single `UPDATE` touching both pair columns, so the
//! pair invariant holds without explicit locking.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};

use super::CredentialStore;
use crate::otp::models::{CredentialRecord, Plan};

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> CredentialRecord {
    let plan: String = row.get("plan");
    CredentialRecord {
        user_id: row.get("user_id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        country: row.get("country"),
        email_verified: row.get("email_verified"),
        otp: row.get("otp"),
        otp_expires: row.get("otp_expires"),
        plan: Plan::from_str_or_free(&plan),
        preparation_credits_used: row.get("preparation_credits_used"),
        saved_remedies_credits_used: row.get("saved_remedies_credits_used"),
        social_post_download_credits_used: row.get("social_post_download_credits_used"),
        sign_up_date: row.get("sign_up_date"),
        last_login: row.get("last_login"),
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        let query = r"
            SELECT user_id, email, display_name, country, email_verified,
                   otp, otp_expires, plan,
                   preparation_credits_used, saved_remedies_credits_used,
                   social_post_download_credits_used,
                   sign_up_date, last_login
            FROM user_credentials
            WHERE user_id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch credential record")?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn create(&self, record: &CredentialRecord) -> Result<()> {
        let query = r"
            INSERT INTO user_credentials
                (user_id, email, display_name, country, email_verified,
                 otp, otp_expires, plan,
                 preparation_credits_used, saved_remedies_credits_used,
                 social_post_download_credits_used,
                 sign_up_date, last_login)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&record.user_id)
            .bind(&record.email)
            .bind(&record.display_name)
            .bind(&record.country)
            .bind(record.email_verified)
            .bind(&record.otp)
            .bind(record.otp_expires)
            .bind(record.plan.as_str())
            .bind(record.preparation_credits_used)
            .bind(record.saved_remedies_credits_used)
            .bind(record.social_post_download_credits_used)
            .bind(record.sign_up_date)
            .bind(record.last_login)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert credential record")?;
        Ok(())
    }

    async fn set_otp(&self, user_id: &str, code: &str, expires: DateTime<Utc>) -> Result<()> {
        let query = r"
            UPDATE user_credentials
            SET otp = $2, otp_expires = $3
            WHERE user_id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(code)
            .bind(expires)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set OTP pair")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("credential record not found: {user_id}"));
        }
        Ok(())
    }

    async fn mark_verified(&self, user_id: &str) -> Result<()> {
        // Only ever sets the flag to TRUE; nothing in this store unsets it.
        let query = r"
            UPDATE user_credentials
            SET email_verified = TRUE, otp = NULL, otp_expires = NULL
            WHERE user_id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark record verified")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("credential record not found: {user_id}"));
        }
        Ok(())
    }

    async fn clear_otp(&self, user_id: &str) -> Result<()> {
        let query = r"
            UPDATE user_credentials
            SET otp = NULL, otp_expires = NULL
            WHERE user_id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to clear OTP pair")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("credential record not found: {user_id}"));
        }
        Ok(())
    }

    async fn touch_last_login(&self, user_id: &str) -> Result<()> {
        let query = r"
            UPDATE user_credentials
            SET last_login = NOW()
            WHERE user_id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to touch last_login")?;
        Ok(())
    }
}
