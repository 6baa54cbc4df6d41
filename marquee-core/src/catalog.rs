use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShowingStatus {
    Scheduled,
    Cancelled,
    Finished,
}

impl ShowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowingStatus::Scheduled => "SCHEDULED",
            ShowingStatus::Cancelled => "CANCELLED",
            ShowingStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(ShowingStatus::Scheduled),
            "CANCELLED" => Some(ShowingStatus::Cancelled),
            "FINISHED" => Some(ShowingStatus::Finished),
            _ => None,
        }
    }
}

/// The slice of a showing the booking engine needs: whether it can still be
/// booked and when it starts. Movie/hall/seat-map CRUD stays with the
/// catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showing {
    pub id: Uuid,
    pub status: ShowingStatus,
    pub starts_at: DateTime<Utc>,
}

impl Showing {
    pub fn is_bookable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ShowingStatus::Scheduled && self.starts_at > now
    }
}

/// Catalog collaborator contract.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn get_showing(&self, showing_id: Uuid) -> Result<Option<Showing>, BookingError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn only_scheduled_future_showings_are_bookable() {
        let now = Utc::now();
        let mut showing = Showing {
            id: Uuid::new_v4(),
            status: ShowingStatus::Scheduled,
            starts_at: now + Duration::hours(2),
        };
        assert!(showing.is_bookable_at(now));

        showing.starts_at = now - Duration::minutes(1);
        assert!(!showing.is_bookable_at(now));

        showing.starts_at = now + Duration::hours(2);
        showing.status = ShowingStatus::Cancelled;
        assert!(!showing.is_bookable_at(now));
    }
}
