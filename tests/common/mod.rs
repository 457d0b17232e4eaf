#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use coursehub::{
    config::Settings,
    domain::*,
    error::Result,
    service::{verification_service::CodeSender, ServiceContext},
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Remembers every code it is asked to send.
#[derive(Default)]
pub struct CapturingSender {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl CapturingSender {
    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl CodeSender for CapturingSender {
    async fn send(&self, phone: &str, code: &str) -> Result<()> {
        self.sent.lock().unwrap().push((phone.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub settings: Settings,
    pub sender: Arc<CapturingSender>,
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.payments.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    settings
}

pub async fn setup() -> TestApp {
    setup_with(test_settings()).await
}

pub async fn setup_with(settings: Settings) -> TestApp {
    // A single connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let sender = Arc::new(CapturingSender::default());
    let ctx = Arc::new(ServiceContext::new(pool.clone(), &settings, sender.clone()));

    TestApp { pool, ctx, settings, sender }
}

pub async fn create_user(app: &TestApp, email: &str, role: UserRole) -> User {
    app.ctx.user_repo
        .create(CreateUserRequest {
            email: email.to_string(),
            full_name: "Test User".to_string(),
            phone: None,
            role,
            password: "password123".to_string(),
        })
        .await
        .expect("create user")
}

pub async fn create_course(
    app: &TestApp,
    slug: &str,
    price_cents: i64,
    capacity: Option<i64>,
) -> (Course, CourseSchedule) {
    let instructor = create_user(app, &format!("{}-instructor@example.com", slug), UserRole::Instructor).await;

    let course = app.ctx.course_repo
        .create(CreateCourseRequest {
            title: format!("Course {}", slug),
            slug: slug.to_string(),
            description: String::new(),
            price_cents,
            currency: "KRW".to_string(),
            instructor_id: instructor.id,
            published: true,
        })
        .await
        .expect("create course");

    let schedule = app.ctx.course_repo
        .create_schedule(CreateScheduleRequest {
            course_id: course.id,
            starts_at: Utc::now() + Duration::days(14),
            ends_at: None,
            capacity,
        })
        .await
        .expect("create schedule");

    (course, schedule)
}

/// A pending payment with a fixed bill id and `count` pending enrollments
/// linked to it, each on its own schedule of one course.
pub async fn pending_payment(app: &TestApp, bill_id: &str, count: usize) -> (Payment, Vec<Enrollment>) {
    let user = create_user(app, &format!("{}@example.com", bill_id.to_lowercase()), UserRole::Student).await;
    let (course, schedule) = create_course(app, &format!("course-{}", bill_id.to_lowercase()), 10_000, None).await;

    let (first, payment) = app.ctx.enrollment_repo
        .create(
            user.id,
            schedule.id,
            EnrollmentStatus::Pending,
            Some(NewPayment {
                user_id: user.id,
                bill_id: bill_id.to_string(),
                amount_cents: 10_000,
                currency: "KRW".to_string(),
                method: PaymentMethod::Card,
            }),
        )
        .await
        .expect("create enrollment");
    let payment = payment.expect("payment created");

    let mut enrollments = vec![first];
    for week in 1..count {
        let extra = app.ctx.course_repo
            .create_schedule(CreateScheduleRequest {
                course_id: course.id,
                starts_at: Utc::now() + Duration::weeks(week as i64 + 2),
                ends_at: None,
                capacity: None,
            })
            .await
            .expect("create schedule");

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO enrollments (id, user_id, schedule_id, payment_id, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 'Pending', ?, ?)",
        )
        .bind(&id)
        .bind(user.id.to_string())
        .bind(extra.id.to_string())
        .bind(payment.id.to_string())
        .bind(now)
        .bind(now)
        .execute(&app.pool)
        .await
        .expect("extra enrollment");

        let enrollment = app.ctx.enrollment_repo
            .find_by_id(uuid::Uuid::parse_str(&id).unwrap())
            .await
            .unwrap()
            .unwrap();
        enrollments.push(enrollment);
    }

    (payment, enrollments)
}

pub async fn enrollment_statuses(app: &TestApp, payment_id: uuid::Uuid) -> Vec<EnrollmentStatus> {
    app.ctx.enrollment_repo
        .list_by_payment(payment_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.status)
        .collect()
}
