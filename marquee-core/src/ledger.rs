use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::error::BookingError;
use crate::payment::Payment;
use crate::seat::SeatInstance;

/// Durable record of seat-instance disposition. Authoritative over leases.
///
/// Every method executes as a single transaction in the backing store.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    async fn get_seats(&self, seat_ids: &[Uuid]) -> Result<Vec<SeatInstance>, BookingError>;

    /// LOCKED -> AVAILABLE, clearing holder and lock timestamp. Rows not
    /// currently LOCKED are left untouched.
    async fn unlock_seats(&self, seat_ids: &[Uuid]) -> Result<(), BookingError>;

    /// LOCKED -> SOLD. Only legal from LOCKED; rows in any other state are
    /// left untouched.
    async fn sell_seats(&self, seat_ids: &[Uuid]) -> Result<(), BookingError>;
}

/// Inputs for the composite reserve operation.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: Uuid,
    pub showing_id: Uuid,
    pub seat_instance_ids: Vec<Uuid>,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Durable record of reservations, plus the composite operations that must
/// mutate bookings and seats under one transaction.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Lock every requested seat and create the PENDING booking, all in one
    /// transaction. All-or-nothing: if any seat is not AVAILABLE, or does
    /// not belong to the showing, nothing is written.
    ///
    /// Errors: `SeatAlreadyLocked` / `SeatAlreadySold` when a seat lost the
    /// race, `NotFound` when a requested seat does not exist,
    /// `DuplicatePendingBooking` when the owner already has an open
    /// reservation for the showing, `CodeCollision` when the booking code is
    /// taken (the caller retries with a fresh code).
    async fn reserve(&self, reservation: NewReservation) -> Result<Booking, BookingError>;

    /// Compare-and-set status transition, stamping the terminal timestamp
    /// that belongs to `to`. Returns `false` when the current status is not
    /// `from` — the caller lost a confirm/cancel/expire race.
    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, BookingError>;

    /// Attach checkout pricing to a still-PENDING booking: discount, points
    /// reserved for that discount, final amount, and the new payment record.
    /// One transaction; seat and booking status are unchanged.
    async fn apply_checkout(
        &self,
        booking_id: Uuid,
        discount_amount: i64,
        points_used: i32,
        final_amount: i64,
        payment: Payment,
    ) -> Result<(), BookingError>;

    /// The confirmation transaction: CAS PENDING -> CONFIRMED, complete the
    /// pending payment with the verified transaction id, sell every covered
    /// seat, and credit the owner's point balance by `earned - used`.
    /// Fails `BookingNotPending` when the CAS loses; nothing is written then.
    async fn confirm(
        &self,
        booking_id: Uuid,
        transaction_id: &str,
        points_earned: i32,
        at: DateTime<Utc>,
    ) -> Result<Booking, BookingError>;

    /// Whether the user already holds an open reservation for this showing.
    /// `reserve` enforces the same rule with a uniqueness constraint; this is
    /// the cheap early check before any lease is taken.
    async fn has_pending(&self, user_id: Uuid, showing_id: Uuid) -> Result<bool, BookingError>;

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Booking>, BookingError>;

    /// Newest-first page of a user's bookings.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, BookingError>;

    /// PENDING bookings whose deadline has passed.
    async fn find_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BookingError>;
}
