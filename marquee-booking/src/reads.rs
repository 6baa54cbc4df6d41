use std::sync::Arc;

use uuid::Uuid;

use marquee_core::booking::Booking;
use marquee_core::error::BookingError;
use marquee_core::ledger::BookingLedger;

const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;

/// Read accessors exposed alongside the lifecycle operations.
pub struct BookingReads {
    bookings: Arc<dyn BookingLedger>,
}

impl BookingReads {
    pub fn new(bookings: Arc<dyn BookingLedger>) -> Self {
        Self { bookings }
    }

    /// Owner-checked lookup; somebody else's booking reads as not-found.
    pub async fn get_booking(&self, user_id: Uuid, booking_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .find_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound("booking"))?;
        if booking.user_id != user_id {
            return Err(BookingError::NotFound("booking"));
        }
        Ok(booking)
    }

    /// Lookup by the human-readable code printed on tickets and QR payloads.
    pub async fn get_booking_by_code(&self, code: &str) -> Result<Booking, BookingError> {
        self.bookings
            .find_by_code(code)
            .await?
            .ok_or(BookingError::NotFound("booking"))
    }

    /// Newest-first booking history page for a user.
    pub async fn list_user_bookings(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Booking>, BookingError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        self.bookings.list_for_user(user_id, limit, offset).await
    }
}
