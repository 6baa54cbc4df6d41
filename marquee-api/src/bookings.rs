use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use marquee_core::booking::Booking;
use marquee_core::error::BookingError;
use marquee_core::payment::PaymentMethod;
use marquee_shared::events::SeatsLockedEvent;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/lock", post(lock_seats))
        .route("/v1/bookings/{id}/checkout", post(checkout))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings", get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/code/{code}", get(get_booking_by_code))
}

#[derive(Debug, Deserialize)]
struct LockSeatsRequest {
    showing_id: Uuid,
    seat_instance_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct BookingSeatResponse {
    seat_instance_id: Uuid,
    price: i64,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking_id: Uuid,
    code: String,
    showing_id: Uuid,
    status: String,
    seats: Vec<BookingSeatResponse>,
    total_amount: i64,
    discount_amount: i64,
    final_amount: i64,
    points_used: i32,
    points_earned: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.id,
            code: booking.code,
            showing_id: booking.showing_id,
            status: booking.status.as_str().to_string(),
            seats: booking
                .seats
                .into_iter()
                .map(|s| BookingSeatResponse {
                    seat_instance_id: s.seat_instance_id,
                    price: s.price,
                })
                .collect(),
            total_amount: booking.total_amount,
            discount_amount: booking.discount_amount,
            final_amount: booking.final_amount,
            points_used: booking.points_used,
            points_earned: booking.points_earned,
            created_at: booking.created_at,
            expires_at: booking.expires_at,
        }
    }
}

async fn lock_seats(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<LockSeatsRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let user_id = authenticate(&state.auth, bearer.token())?;

    let booking = state
        .coordinator
        .lock_seats(user_id, req.showing_id, req.seat_instance_ids)
        .await?;

    // Live seat-map watchers learn about the lock immediately; a lagging
    // subscriber just misses the event and reloads.
    let _ = state.sse_tx.send(SeatsLockedEvent {
        showing_id: booking.showing_id,
        seat_instance_ids: booking.seat_ids(),
        locked_at: booking.created_at.timestamp(),
    });

    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    payment_method: String,
    #[serde(default)]
    points_to_use: i32,
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    booking_id: Uuid,
    amount: i64,
    payment_url: Option<String>,
}

async fn checkout(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let user_id = authenticate(&state.auth, bearer.token())?;
    let method = PaymentMethod::parse(&req.payment_method).ok_or_else(|| {
        BookingError::Validation(format!("unknown payment method {:?}", req.payment_method))
    })?;

    let payment = state
        .checkout
        .checkout(user_id, booking_id, method, req.points_to_use)
        .await?;

    Ok(Json(CheckoutResponse {
        booking_id,
        amount: payment.amount,
        payment_url: payment.payment_url,
    }))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<BookingResponse>, ApiError> {
    let user_id = authenticate(&state.auth, bearer.token())?;
    let booking = state.checkout.cancel_booking(user_id, booking_id).await?;
    info!("Booking {} cancelled by its owner", booking.code);
    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_bookings(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let user_id = authenticate(&state.auth, bearer.token())?;
    let bookings = state
        .reads
        .list_user_bookings(user_id, page.limit, page.offset)
        .await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<BookingResponse>, ApiError> {
    let user_id = authenticate(&state.auth, bearer.token())?;
    let booking = state.reads.get_booking(user_id, booking_id).await?;
    Ok(Json(booking.into()))
}

/// Ticket-scanner lookup by the code printed in the QR payload.
async fn get_booking_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<BookingResponse>, ApiError> {
    authenticate(&state.auth, bearer.token())?;
    let booking = state.reads.get_booking_by_code(&code).await?;
    Ok(Json(booking.into()))
}
