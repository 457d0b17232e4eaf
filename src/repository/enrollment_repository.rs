use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Enrollment, EnrollmentStatus, NewPayment, Payment, PaymentStatus},
    error::{AppError, Result},
    repository::{EnrollmentRepository, PaymentRepository, SqlitePaymentRepository},
};

#[derive(FromRow)]
struct EnrollmentRow {
    id: String,
    user_id: String,
    schedule_id: String,
    payment_id: Option<String>,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const ALREADY_ENROLLED: &str = "Already enrolled in this schedule";
const SCHEDULE_FULL: &str = "Schedule is full";
const PAYMENT_NOT_CONFIRMED: &str = "Payment for this enrollment is not confirmed";

const ENROLLMENT_COLUMNS: &str =
    "id, user_id, schedule_id, payment_id, status, created_at, updated_at";

pub struct SqliteEnrollmentRepository {
    pool: SqlitePool,
}

impl SqliteEnrollmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_enrollment(row: EnrollmentRow) -> Result<Enrollment> {
        let payment_id = row.payment_id
            .as_ref()
            .map(|id| Uuid::parse_str(id))
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Enrollment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            schedule_id: Uuid::parse_str(&row.schedule_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            payment_id,
            status: Self::parse_status(&row.status)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<EnrollmentStatus> {
        match s {
            "Pending" => Ok(EnrollmentStatus::Pending),
            "Confirmed" => Ok(EnrollmentStatus::Confirmed),
            "Active" => Ok(EnrollmentStatus::Active),
            "Completed" => Ok(EnrollmentStatus::Completed),
            "Cancelled" => Ok(EnrollmentStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid enrollment status: {}", s))),
        }
    }

    pub(crate) fn status_to_str(status: &EnrollmentStatus) -> &'static str {
        match status {
            EnrollmentStatus::Pending => "Pending",
            EnrollmentStatus::Confirmed => "Confirmed",
            EnrollmentStatus::Active => "Active",
            EnrollmentStatus::Completed => "Completed",
            EnrollmentStatus::Cancelled => "Cancelled",
        }
    }

    async fn fetch_where(&self, clause: &str, binds: &[String]) -> Result<Vec<Enrollment>> {
        let sql = format!("SELECT {} FROM enrollments WHERE {}", ENROLLMENT_COLUMNS, clause);
        let mut query = sqlx::query_as::<_, EnrollmentRow>(&sql);
        for value in binds {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_enrollment).collect()
    }
}

#[async_trait]
impl EnrollmentRepository for SqliteEnrollmentRepository {
    async fn create(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        status: EnrollmentStatus,
        payment: Option<NewPayment>,
    ) -> Result<(Enrollment, Option<Payment>)> {
        let id = Uuid::new_v4();
        let payment_id = payment.as_ref().map(|_| Uuid::new_v4());
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        if let (Some(new_payment), Some(payment_id)) = (&payment, payment_id) {
            sqlx::query(
                r#"
                INSERT INTO payments (
                    id, user_id, bill_id, transaction_id, amount_cents, currency,
                    status, method, paid_at, created_at, updated_at
                ) VALUES (?, ?, ?, NULL, ?, ?, ?, ?, NULL, ?, ?)
                "#
            )
            .bind(payment_id.to_string())
            .bind(new_payment.user_id.to_string())
            .bind(&new_payment.bill_id)
            .bind(new_payment.amount_cents)
            .bind(&new_payment.currency)
            .bind(SqlitePaymentRepository::status_to_str(&PaymentStatus::Pending))
            .bind(SqlitePaymentRepository::method_to_str(&new_payment.method))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // Duplicate and capacity guards are part of the insert so that two
        // registrations cannot both pass them.
        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (
                id, user_id, schedule_id, payment_id, status, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM enrollments
                WHERE user_id = ? AND schedule_id = ? AND status != 'Cancelled'
            )
            AND (
                SELECT s.capacity IS NULL OR s.capacity > (
                    SELECT COUNT(*) FROM enrollments e
                    WHERE e.schedule_id = s.id AND e.status != 'Cancelled'
                )
                FROM course_schedules s
                WHERE s.id = ?
            )
            "#
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(schedule_id.to_string())
        .bind(payment_id.map(|p| p.to_string()))
        .bind(Self::status_to_str(&status))
        .bind(now)
        .bind(now)
        .bind(user_id.to_string())
        .bind(schedule_id.to_string())
        .bind(schedule_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(ALREADY_ENROLLED.to_string())
            }
            other => AppError::from(other),
        })?
        .rows_affected();

        if inserted == 0 {
            let duplicate = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM enrollments \
                 WHERE user_id = ? AND schedule_id = ? AND status != 'Cancelled'"
            )
            .bind(user_id.to_string())
            .bind(schedule_id.to_string())
            .fetch_one(&mut *tx)
            .await?;

            // Dropping the transaction rolls back the payment insert.
            return Err(AppError::Conflict(
                if duplicate > 0 { ALREADY_ENROLLED } else { SCHEDULE_FULL }.to_string(),
            ));
        }

        tx.commit().await?;

        let enrollment = self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created enrollment".to_string())
        })?;

        let payment = match payment_id {
            Some(payment_id) => Some(
                SqlitePaymentRepository::new(self.pool.clone())
                    .find_by_id(payment_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Database("Failed to retrieve created payment".to_string())
                    })?,
            ),
            None => None,
        };

        Ok((enrollment, payment))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Enrollment>> {
        Ok(self.fetch_where("id = ?", &[id.to_string()]).await?.into_iter().next())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments ORDER BY created_at DESC LIMIT ? OFFSET ?",
            ENROLLMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_enrollment).collect()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        self.fetch_where("user_id = ? ORDER BY created_at DESC", &[user_id.to_string()])
            .await
    }

    async fn list_by_payment(&self, payment_id: Uuid) -> Result<Vec<Enrollment>> {
        self.fetch_where("payment_id = ?", &[payment_id.to_string()]).await
    }

    async fn count_by_status(&self) -> Result<Vec<(EnrollmentStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM enrollments GROUP BY status ORDER BY status"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((Self::parse_status(&status)?, count)))
            .collect()
    }

    async fn update_status(&self, id: Uuid, status: EnrollmentStatus) -> Result<Enrollment> {
        let now = Utc::now().naive_utc();

        // The payment check and the write are one statement, so a payment
        // failing concurrently cannot leave a paid-only status behind.
        let sql = if status.requires_settled_payment() {
            r#"
            UPDATE enrollments SET status = ?, updated_at = ?
            WHERE id = ?
              AND (payment_id IS NULL OR EXISTS (
                  SELECT 1 FROM payments p
                  WHERE p.id = enrollments.payment_id
                    AND p.status IN ('Confirmed', 'Completed')
              ))
            "#
        } else {
            "UPDATE enrollments SET status = ?, updated_at = ? WHERE id = ?"
        };

        let result = sqlx::query(sql)
            .bind(Self::status_to_str(&status))
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(id).await? {
                Some(_) => Err(AppError::Conflict(PAYMENT_NOT_CONFIRMED.to_string())),
                None => Err(AppError::NotFound("Enrollment not found".to_string())),
            };
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated enrollment".to_string())
        })
    }
}
