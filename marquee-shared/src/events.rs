use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle transitions a booking can announce to the outside world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventKind {
    Created,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingEventKind {
    /// Kafka topic this kind is published to.
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "booking.created",
            BookingEventKind::Confirmed => "booking.confirmed",
            BookingEventKind::Cancelled => "booking.cancelled",
            BookingEventKind::Expired => "booking.expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEventSeat {
    pub seat_instance_id: Uuid,
    pub price: i64,
}

/// Snapshot of a booking carried on every lifecycle event. Consumers
/// (notification service, analytics) must not need a DB lookup to act on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub event_id: Uuid,
    pub kind: BookingEventKind,
    pub timestamp: DateTime<Utc>,
    pub booking_id: Uuid,
    pub booking_code: String,
    pub user_id: Uuid,
    pub showing_id: Uuid,
    pub status: String,
    pub total_amount: i64,
    pub final_amount: i64,
    pub points_used: i32,
    pub points_earned: i32,
    pub expires_at: DateTime<Utc>,
    pub seats: Vec<BookingEventSeat>,
}

/// In-process broadcast for clients watching a showing's seat map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsLockedEvent {
    pub showing_id: Uuid,
    pub seat_instance_ids: Vec<Uuid>,
    pub locked_at: i64,
}
