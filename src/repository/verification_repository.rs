use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};

use crate::{
    domain::VerificationCode,
    error::Result,
    repository::VerificationCodeRepository,
};

#[derive(FromRow)]
struct VerificationCodeRow {
    phone: String,
    code_hash: String,
    expires_at: NaiveDateTime,
    attempts: i64,
    created_at: NaiveDateTime,
}

/// Verification codes kept in the shared database so that every server
/// instance sees the same codes.
pub struct SqliteVerificationCodeRepository {
    pool: SqlitePool,
}

impl SqliteVerificationCodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationCodeRepository for SqliteVerificationCodeRepository {
    async fn upsert(&self, phone: &str, code_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO verification_codes (phone, code_hash, expires_at, attempts, created_at)
            VALUES (?, ?, ?, 0, ?)
            ON CONFLICT(phone) DO UPDATE SET
                code_hash = excluded.code_hash,
                expires_at = excluded.expires_at,
                attempts = 0,
                created_at = excluded.created_at
            "#
        )
        .bind(phone)
        .bind(code_hash)
        .bind(expires_at.naive_utc())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, phone: &str) -> Result<Option<VerificationCode>> {
        let row = sqlx::query_as::<_, VerificationCodeRow>(
            r#"
            SELECT phone, code_hash, expires_at, attempts, created_at
            FROM verification_codes
            WHERE phone = ?
            "#
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| VerificationCode {
            phone: r.phone,
            code_hash: r.code_hash,
            expires_at: DateTime::from_naive_utc_and_offset(r.expires_at, Utc),
            attempts: r.attempts,
            created_at: DateTime::from_naive_utc_and_offset(r.created_at, Utc),
        }))
    }

    async fn record_failed_attempt(&self, phone: &str) -> Result<i64> {
        let attempts = sqlx::query_scalar::<_, i64>(
            "UPDATE verification_codes SET attempts = attempts + 1 WHERE phone = ? RETURNING attempts"
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempts.unwrap_or(0))
    }

    async fn delete(&self, phone: &str) -> Result<()> {
        sqlx::query("DELETE FROM verification_codes WHERE phone = ?")
            .bind(phone)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM verification_codes WHERE expires_at <= ?")
            .bind(now.naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
