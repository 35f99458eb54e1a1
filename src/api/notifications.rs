//! Notification ingress and integration cache control.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::notification::{
    AckNotification, DataUpPayload, ErrorNotification, JoinNotification, Notification,
};
use crate::server::AppState;

/// Response for notification send operations
#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl SendNotificationResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub application_id: Option<i64>,
    /// Whether a cached entry was dropped
    pub invalidated: bool,
}

fn validate<N: Notification>(notification: &N) -> Result<()> {
    if notification.application_id() <= 0 {
        return Err(AppError::Validation(
            "applicationID must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/notifications/rx
pub async fn send_data_up(
    State(state): State<AppState>,
    Json(payload): Json<DataUpPayload>,
) -> Result<Json<SendNotificationResponse>> {
    validate(&payload)?;
    state.dispatcher.send_data_up(&payload).await?;
    Ok(SendNotificationResponse::ok())
}

/// POST /api/v1/notifications/join
pub async fn send_join_notification(
    State(state): State<AppState>,
    Json(payload): Json<JoinNotification>,
) -> Result<Json<SendNotificationResponse>> {
    validate(&payload)?;
    state.dispatcher.send_join_notification(&payload).await?;
    Ok(SendNotificationResponse::ok())
}

/// POST /api/v1/notifications/ack
pub async fn send_ack_notification(
    State(state): State<AppState>,
    Json(payload): Json<AckNotification>,
) -> Result<Json<SendNotificationResponse>> {
    validate(&payload)?;
    state.dispatcher.send_ack_notification(&payload).await?;
    Ok(SendNotificationResponse::ok())
}

/// POST /api/v1/notifications/error
pub async fn send_error_notification(
    State(state): State<AppState>,
    Json(payload): Json<ErrorNotification>,
) -> Result<Json<SendNotificationResponse>> {
    validate(&payload)?;
    state.dispatcher.send_error_notification(&payload).await?;
    Ok(SendNotificationResponse::ok())
}

/// POST /api/v1/applications/{id}/integrations/reload
pub async fn reload_application_integrations(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Json<ReloadResponse> {
    let invalidated = state.dispatcher.registry().invalidate(application_id);
    Json(ReloadResponse {
        success: true,
        application_id: Some(application_id),
        invalidated,
    })
}

/// POST /api/v1/integrations/reload
pub async fn reload_all_integrations(State(state): State<AppState>) -> Json<ReloadResponse> {
    let invalidated = state.dispatcher.registry().cached_applications() > 0;
    state.dispatcher.registry().invalidate_all();
    Json(ReloadResponse {
        success: true,
        application_id: None,
        invalidated,
    })
}
