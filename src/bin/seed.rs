use std::{str::FromStr, sync::Arc};

use chrono::{Duration, Utc};
use clap::Parser;
use fake::{
    faker::{internet::en::SafeEmail, name::en::Name},
    Fake,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use coursehub::{
    config::Settings,
    domain::{
        CreateCourseRequest, CreateScheduleRequest, CreateUserRequest, PaymentMethod,
        PaymentSignal, UserRole,
    },
    service::{verification_service::LogCodeSender, ServiceContext},
};

#[derive(Parser, Debug)]
#[command(about = "Populate a Coursehub database with demo data")]
struct Args {
    #[arg(long, default_value = "sqlite://coursehub.db?mode=rwc")]
    database_url: String,

    /// Number of student accounts to create
    #[arg(long, default_value_t = 8)]
    students: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    println!("🌱 Seeding {}", args.database_url);

    let options = SqliteConnectOptions::from_str(&args.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let ctx = ServiceContext::new(db_pool, &Settings::default(), Arc::new(LogCodeSender));

    let admin = ctx.user_repo.create(CreateUserRequest {
        email: "admin@coursehub.local".to_string(),
        full_name: "Admin User".to_string(),
        phone: None,
        role: UserRole::Admin,
        password: "admin123".to_string(),
    }).await?;

    let instructor = ctx.user_repo.create(CreateUserRequest {
        email: "instructor@coursehub.local".to_string(),
        full_name: Name().fake(),
        phone: None,
        role: UserRole::Instructor,
        password: "password123".to_string(),
    }).await?;

    let mut students = Vec::with_capacity(args.students);
    for _ in 0..args.students {
        let email: String = SafeEmail().fake();
        students.push(ctx.user_repo.create(CreateUserRequest {
            email,
            full_name: Name().fake(),
            phone: None,
            role: UserRole::Student,
            password: "password123".to_string(),
        }).await?);
    }
    println!("  ✅ Created admin, instructor and {} students", students.len());

    let catalog = [
        ("Rust for Backend Engineers", "rust-backend", 350_000),
        ("Async Rust in Depth", "async-rust", 420_000),
        ("Open Source Orientation", "oss-orientation", 0),
    ];

    let mut schedules = Vec::new();
    for (title, slug, price_cents) in catalog {
        let course = ctx.course_repo.create(CreateCourseRequest {
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("{}, a cohort-based course", title),
            price_cents,
            currency: "KRW".to_string(),
            instructor_id: instructor.id,
            published: true,
        }).await?;

        for week in [2, 6] {
            let starts_at = Utc::now() + Duration::weeks(week);
            schedules.push(ctx.course_repo.create_schedule(CreateScheduleRequest {
                course_id: course.id,
                starts_at,
                ends_at: Some(starts_at + Duration::weeks(4)),
                capacity: Some(20),
            }).await?);
        }
    }
    println!("  ✅ Created {} courses with {} schedules", catalog.len(), schedules.len());

    let mut paid = 0;
    for (i, student) in students.iter().enumerate() {
        let schedule = &schedules[i % schedules.len()];
        let registration = ctx.enrollment_service
            .register(student.id, schedule.id, PaymentMethod::Card)
            .await?;

        // Half paid, a quarter failed, the rest left pending.
        if let Some(payment) = registration.payment {
            let signal = match i % 4 {
                0 | 1 => Some(PaymentSignal::Paid),
                2 => Some(PaymentSignal::Failed),
                _ => None,
            };
            if let Some(signal) = signal {
                ctx.reconciliation
                    .apply_gateway_signal(&payment.bill_id, signal, Some(format!("TX-{}", i)), None)
                    .await?;
                paid += usize::from(signal == PaymentSignal::Paid);
            }
        }
    }
    println!("  ✅ Registered {} students, {} paid", students.len(), paid);

    println!("\n✨ Seeding complete");
    println!("  Admin: {} / admin123", admin.email);
    println!("  Other accounts use password123");

    Ok(())
}
