use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Course, CourseDeletion, CourseSchedule, CreateCourseRequest, CreateScheduleRequest},
    error::{AppError, Result},
    repository::CourseRepository,
};

#[derive(FromRow)]
struct CourseRow {
    id: String,
    title: String,
    slug: String,
    description: String,
    price_cents: i64,
    currency: String,
    instructor_id: String,
    published: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ScheduleRow {
    id: String,
    course_id: String,
    starts_at: NaiveDateTime,
    ends_at: Option<NaiveDateTime>,
    capacity: Option<i64>,
    created_at: NaiveDateTime,
}

const COURSE_COLUMNS: &str = "id, title, slug, description, price_cents, currency, \
                              instructor_id, published, created_at, updated_at";

pub struct SqliteCourseRepository {
    pool: SqlitePool,
}

impl SqliteCourseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_course(row: CourseRow) -> Result<Course> {
        Ok(Course {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            slug: row.slug,
            description: row.description,
            price_cents: row.price_cents,
            currency: row.currency,
            instructor_id: Uuid::parse_str(&row.instructor_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            published: row.published != 0,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_schedule(row: ScheduleRow) -> Result<CourseSchedule> {
        Ok(CourseSchedule {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            course_id: Uuid::parse_str(&row.course_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            starts_at: DateTime::from_naive_utc_and_offset(row.starts_at, Utc),
            ends_at: row.ends_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            capacity: row.capacity,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl CourseRepository for SqliteCourseRepository {
    async fn create(&self, course: CreateCourseRequest) -> Result<Course> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO courses (
                id, title, slug, description, price_cents, currency,
                instructor_id, published, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&course.title)
        .bind(&course.slug)
        .bind(&course.description)
        .bind(course.price_cents)
        .bind(&course.currency)
        .bind(course.instructor_id.to_string())
        .bind(if course.published { 1i32 } else { 0i32 })
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Course slug '{}' already exists", course.slug))
            }
            other => AppError::from(other),
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created course".to_string())
        })
    }

    async fn create_schedule(&self, schedule: CreateScheduleRequest) -> Result<CourseSchedule> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO course_schedules (id, course_id, starts_at, ends_at, capacity, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(schedule.course_id.to_string())
        .bind(schedule.starts_at.naive_utc())
        .bind(schedule.ends_at.map(|dt| dt.naive_utc()))
        .bind(schedule.capacity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_schedule(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created schedule".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_course).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE slug = ?", COURSE_COLUMNS);
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_course).transpose()
    }

    async fn find_schedule(&self, id: Uuid) -> Result<Option<CourseSchedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, course_id, starts_at, ends_at, capacity, created_at
            FROM course_schedules
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_schedule).transpose()
    }

    async fn list_published(&self, limit: i64, offset: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses WHERE published = 1 ORDER BY created_at DESC LIMIT ? OFFSET ?",
            COURSE_COLUMNS
        );
        let rows = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_course).collect()
    }

    async fn list_schedules(&self, course_id: Uuid) -> Result<Vec<CourseSchedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, course_id, starts_at, ends_at, capacity, created_at
            FROM course_schedules
            WHERE course_id = ?
            ORDER BY starts_at ASC
            "#
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_schedule).collect()
    }

    async fn delete_cascade(&self, ids: &[Uuid]) -> Result<CourseDeletion> {
        let mut deleted = CourseDeletion::default();
        let mut tx = self.pool.begin().await?;

        for id in ids {
            let course_id = id.to_string();

            let payment_ids = sqlx::query_scalar::<_, String>(
                r#"
                SELECT DISTINCT e.payment_id
                FROM enrollments e
                JOIN course_schedules s ON s.id = e.schedule_id
                WHERE s.course_id = ? AND e.payment_id IS NOT NULL
                "#
            )
            .bind(&course_id)
            .fetch_all(&mut *tx)
            .await?;

            deleted.enrollments += sqlx::query(
                r#"
                DELETE FROM enrollments
                WHERE schedule_id IN (SELECT id FROM course_schedules WHERE course_id = ?)
                "#
            )
            .bind(&course_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            // A payment may still back an enrollment of another course.
            for payment_id in payment_ids {
                deleted.payments += sqlx::query(
                    r#"
                    DELETE FROM payments
                    WHERE id = ?
                      AND NOT EXISTS (SELECT 1 FROM enrollments WHERE payment_id = payments.id)
                    "#
                )
                .bind(&payment_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            }

            deleted.schedules += sqlx::query("DELETE FROM course_schedules WHERE course_id = ?")
                .bind(&course_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            deleted.courses += sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(&course_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;

        tracing::info!(
            "Deleted {} courses ({} schedules, {} enrollments, {} payments)",
            deleted.courses,
            deleted.schedules,
            deleted.enrollments,
            deleted.payments
        );

        Ok(deleted)
    }
}
