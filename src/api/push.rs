use crate::api::AppState;
use crate::api::pretty::PrettyJson;
use crate::api::schemas::push::{GetReceiptsRequest, SendPushRequest};
use crate::domain::push::NotificationRequest;
use crate::error::{AppError, Result};
use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};

/// Sends the notifications whose tokens are valid and returns the provider's tickets.
///
/// Responds 200 with `{ tickets, failures }` even when some chunks failed.
///
/// # Errors
/// Returns `AppError::BadRequest` if the body is malformed.
/// Returns `AppError::Upstream` if every chunk failed to send.
pub async fn send_notifications(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendPushRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    payload.validate().map_err(AppError::BadRequest)?;

    let requests: Vec<NotificationRequest> = payload.notifications.into_iter().map(Into::into).collect();
    let outcome = state.push_service.send_notifications(requests).await;

    if outcome.is_total_failure() {
        return Err(AppError::Upstream { message: "No tickets could be sent".into(), failures: outcome.failures });
    }
    Ok(PrettyJson(outcome))
}

/// Looks up delivery receipts for previously issued tickets.
///
/// Responds 200 with `{ receipts, failures }` even when some chunks failed.
///
/// # Errors
/// Returns `AppError::BadRequest` if the body is malformed.
/// Returns `AppError::Upstream` if every receipt lookup failed.
pub async fn get_receipts(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GetReceiptsRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    payload.validate().map_err(AppError::BadRequest)?;

    let outcome = state.push_service.collect_receipts(&payload.tickets).await;

    if outcome.is_total_failure() {
        return Err(AppError::Upstream { message: "No receipts could be queried".into(), failures: outcome.failures });
    }
    Ok(PrettyJson(outcome))
}
