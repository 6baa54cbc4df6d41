use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use marquee_core::error::BookingError;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/payments/callback", post(payment_callback))
}

/// Callback body forwarded by the payment collaborator after it has verified
/// the gateway signature. Raw gateway payloads never reach this service.
#[derive(Debug, Deserialize)]
struct PaymentCallback {
    booking_id: Uuid,
    transaction_id: String,
    status: CallbackStatus,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum CallbackStatus {
    Succeeded,
    Failed,
}

/// POST /v1/payments/callback
///
/// A successful callback confirms the booking; a failed one is acknowledged
/// and logged, leaving the booking PENDING for a retried payment or the
/// expiry sweeper. Replayed callbacks are no-op successes.
async fn payment_callback(
    State(state): State<AppState>,
    Json(payload): Json<PaymentCallback>,
) -> Result<StatusCode, ApiError> {
    info!(
        "Payment callback for booking {}: {:?} (txn {})",
        payload.booking_id, payload.status, payload.transaction_id
    );

    if payload.status == CallbackStatus::Failed {
        warn!(
            "Payment failed for booking {}, leaving it pending",
            payload.booking_id
        );
        return Ok(StatusCode::OK);
    }

    match state
        .checkout
        .confirm_payment(payload.booking_id, &payload.transaction_id)
        .await
    {
        Ok(_) => Ok(StatusCode::OK),
        // The gateway retries on non-2xx. A booking the sweeper already
        // reclaimed can never confirm, so acknowledge instead of looping.
        Err(BookingError::BookingExpired) | Err(BookingError::BookingNotPending) => {
            warn!(
                "Dropping callback for booking {}: already resolved",
                payload.booking_id
            );
            Ok(StatusCode::OK)
        }
        Err(err) => Err(err.into()),
    }
}
