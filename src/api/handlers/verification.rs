use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    api::{extract::JsonBody, middleware::auth::CurrentUser, state::AppState},
    error::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SendCodeRequest {
    #[validate(length(min = 8, max = 24))]
    phone: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(length(min = 8, max = 24))]
    phone: String,
    #[validate(length(equal = 6))]
    code: String,
}

pub async fn send(
    State(state): State<AppState>,
    Extension(_current): Extension<CurrentUser>,
    JsonBody(req): JsonBody<SendCodeRequest>,
) -> Result<Json<Value>> {
    req.validate()?;

    state.service_context.verification_service.issue(&req.phone).await?;

    Ok(Json(json!({
        "success": true,
        "expiresIn": state.settings.verification.code_ttl_seconds,
    })))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(req): JsonBody<VerifyCodeRequest>,
) -> Result<Json<Value>> {
    req.validate()?;

    let user = state.service_context.verification_service
        .verify(current.user.id, &req.phone, &req.code)
        .await?;

    Ok(Json(json!({
        "success": true,
        "phone": user.phone,
        "phoneVerified": user.phone_verified,
    })))
}
