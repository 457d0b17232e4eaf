use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::state::AppState,
    domain::{Course, CourseSchedule},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct CourseList {
    courses: Vec<Course>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    course: Course,
    schedules: Vec<CourseSchedule>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<CourseList>> {
    let courses = state.service_context.course_repo
        .list_published(params.limit.clamp(1, 200), params.offset.max(0))
        .await?;

    let total = courses.len();
    Ok(Json(CourseList { courses, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CourseDetail>> {
    let ctx = &state.service_context;

    let course = ctx.course_repo
        .find_by_slug(&slug)
        .await?
        .filter(|c| c.published)
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let schedules = ctx.course_repo.list_schedules(course.id).await?;

    Ok(Json(CourseDetail { course, schedules }))
}
