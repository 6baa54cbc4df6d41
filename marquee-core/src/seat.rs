use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Locked,
    Sold,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Locked => "LOCKED",
            SeatStatus::Sold => "SOLD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(SeatStatus::Available),
            "LOCKED" => Some(SeatStatus::Locked),
            "SOLD" => Some(SeatStatus::Sold),
            _ => None,
        }
    }
}

/// One seat, for one showing, at one price. Created in bulk when a showing
/// is scheduled; only the reservation, confirmation, cancellation and expiry
/// paths ever mutate it.
///
/// Invariant: `locked_by` and `locked_at` are both set or both absent, and
/// both absent unless the status is LOCKED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatInstance {
    pub id: Uuid,
    pub showing_id: Uuid,
    pub row_name: String,
    pub seat_number: i32,
    pub seat_type: String,
    pub price: i64,
    pub status: SeatStatus,
    pub locked_by: Option<Uuid>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl SeatInstance {
    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }

    pub fn is_locked(&self) -> bool {
        self.status == SeatStatus::Locked
    }

    pub fn is_sold(&self) -> bool {
        self.status == SeatStatus::Sold
    }

    pub fn lock(&mut self, holder: Uuid, at: DateTime<Utc>) {
        self.status = SeatStatus::Locked;
        self.locked_by = Some(holder);
        self.locked_at = Some(at);
    }

    pub fn unlock(&mut self) {
        self.status = SeatStatus::Available;
        self.locked_by = None;
        self.locked_at = None;
    }

    pub fn sell(&mut self) {
        self.status = SeatStatus::Sold;
        self.locked_by = None;
        self.locked_at = None;
    }

    /// Seat label as shown on a ticket, e.g. "F7".
    pub fn label(&self) -> String {
        format!("{}{}", self.row_name, self.seat_number)
    }
}
