use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentMethod, PaymentStatus, Settlement},
    error::{AppError, Result},
    repository::{PaymentRepository, SqliteEnrollmentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    user_id: String,
    bill_id: String,
    transaction_id: Option<String>,
    amount_cents: i64,
    currency: String,
    status: String,
    method: String,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PAYMENT_COLUMNS: &str = "id, user_id, bill_id, transaction_id, amount_cents, currency, \
                               status, method, paid_at, created_at, updated_at";

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            bill_id: row.bill_id,
            transaction_id: row.transaction_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: Self::parse_status(&row.status)?,
            method: Self::parse_method(&row.method)?,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Confirmed" => Ok(PaymentStatus::Confirmed),
            "Completed" => Ok(PaymentStatus::Completed),
            "Failed" => Ok(PaymentStatus::Failed),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    pub(crate) fn status_to_str(status: &PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Confirmed => "Confirmed",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
        }
    }

    fn parse_method(s: &str) -> Result<PaymentMethod> {
        match s {
            "Card" => Ok(PaymentMethod::Card),
            "Transfer" => Ok(PaymentMethod::Transfer),
            "Manual" => Ok(PaymentMethod::Manual),
            _ => Err(AppError::Database(format!("Invalid payment method: {}", s))),
        }
    }

    pub(crate) fn method_to_str(method: &PaymentMethod) -> &'static str {
        match method {
            PaymentMethod::Card => "Card",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::Manual => "Manual",
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_bill_id(&self, bill_id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE bill_id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(bill_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE user_id = ? ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn count_by_status(&self) -> Result<Vec<(PaymentStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM payments GROUP BY status ORDER BY status"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((Self::parse_status(&status)?, count)))
            .collect()
    }

    async fn settle(
        &self,
        id: Uuid,
        settlement: Settlement,
        require_unsettled: bool,
    ) -> Result<(Payment, u64)> {
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, String>("SELECT status FROM payments WHERE id = ?")
            .bind(&id_str)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if require_unsettled && Self::parse_status(&current)?.is_settled() {
            return Err(AppError::Conflict("Payment is already confirmed".to_string()));
        }

        // paid_at and transaction_id are only filled in, never overwritten.
        sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                paid_at = COALESCE(paid_at, ?),
                transaction_id = COALESCE(transaction_id, ?),
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(Self::status_to_str(&settlement.payment_status))
        .bind(settlement.paid_at.map(|dt| dt.naive_utc()))
        .bind(&settlement.transaction_id)
        .bind(now)
        .bind(&id_str)
        .execute(&mut *tx)
        .await?;

        let enrollments = sqlx::query(
            "UPDATE enrollments SET status = ?, updated_at = ? WHERE payment_id = ?"
        )
        .bind(SqliteEnrollmentRepository::status_to_str(&settlement.enrollment_status))
        .bind(now)
        .bind(&id_str)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        let payment = self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve settled payment".to_string())
        })?;

        Ok((payment, enrollments))
    }
}
