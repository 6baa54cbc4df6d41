use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "EXPIRED" => Some(BookingStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != BookingStatus::Pending
    }
}

/// One covered seat with the price it was reserved at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSeat {
    pub seat_instance_id: Uuid,
    pub price: i64,
}

/// One reservation attempt by one user for one showing.
///
/// Created PENDING by the coordinator; reaches exactly one of CONFIRMED,
/// CANCELLED or EXPIRED and never leaves it. `confirmed_at` and
/// `cancelled_at` are mutually exclusive and stamped once, on the transition
/// out of PENDING (EXPIRED stamps `cancelled_at`, as the original system
/// does).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub showing_id: Uuid,
    pub seats: Vec<BookingSeat>,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
    pub points_used: i32,
    pub points_earned: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn seat_ids(&self) -> Vec<Uuid> {
        self.seats.iter().map(|s| s.seat_instance_id).collect()
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }
}
