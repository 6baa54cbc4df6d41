use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use marquee_core::booking::Booking;
use marquee_core::catalog::{CatalogProvider, ShowingStatus};
use marquee_core::error::BookingError;
use marquee_core::ledger::{BookingLedger, NewReservation};
use marquee_core::lease::{seat_lease_key, LeaseStore};
use marquee_core::notify::{booking_event, NotificationPublisher};
use marquee_core::rules::ReservationRules;
use marquee_shared::events::BookingEventKind;

use crate::code::generate_booking_code;

/// Attempts per `lock_seats` call before a code collision is surfaced as an
/// infrastructure error.
const CODE_ATTEMPTS: u32 = 3;

/// Orchestrates the create-lock -> validate -> persist -> rollback sequence
/// that turns a seat selection into a pending booking.
///
/// The lease store's atomic create-if-absent is the sole arbiter of which of
/// two simultaneous requests for a seat got there first; the ledger's
/// all-or-nothing reserve is the authoritative second gate. Any failure after
/// leases were acquired releases every one of them before the error
/// propagates.
pub struct ReservationCoordinator {
    leases: Arc<dyn LeaseStore>,
    bookings: Arc<dyn BookingLedger>,
    catalog: Arc<dyn CatalogProvider>,
    notifier: Arc<dyn NotificationPublisher>,
    rules: ReservationRules,
}

impl ReservationCoordinator {
    pub fn new(
        leases: Arc<dyn LeaseStore>,
        bookings: Arc<dyn BookingLedger>,
        catalog: Arc<dyn CatalogProvider>,
        notifier: Arc<dyn NotificationPublisher>,
        rules: ReservationRules,
    ) -> Self {
        Self {
            leases,
            bookings,
            catalog,
            notifier,
            rules,
        }
    }

    /// Reserve a set of seat-instances for `user_id` and create the PENDING
    /// booking covering them.
    ///
    /// For any single seat-instance, at most one concurrent call can succeed;
    /// all others fail with `SeatAlreadyLocked` or `SeatAlreadySold` and
    /// leave no trace.
    pub async fn lock_seats(
        &self,
        user_id: Uuid,
        showing_id: Uuid,
        seat_instance_ids: Vec<Uuid>,
    ) -> Result<Booking, BookingError> {
        // 1. Bounds on the requested set
        if seat_instance_ids.is_empty() {
            return Err(BookingError::Validation("no seats selected".to_string()));
        }
        if seat_instance_ids.len() > self.rules.max_seats_per_booking {
            return Err(BookingError::Validation(format!(
                "at most {} seats per booking",
                self.rules.max_seats_per_booking
            )));
        }
        let distinct: HashSet<Uuid> = seat_instance_ids.iter().copied().collect();
        if distinct.len() != seat_instance_ids.len() {
            return Err(BookingError::Validation(
                "duplicate seats in request".to_string(),
            ));
        }

        // 2. Showing must still be bookable
        let now = Utc::now();
        let showing = self
            .catalog
            .get_showing(showing_id)
            .await?
            .ok_or(BookingError::NotFound("showing"))?;
        if showing.status != ShowingStatus::Scheduled {
            return Err(BookingError::Validation(
                "showing is not open for booking".to_string(),
            ));
        }
        if showing.starts_at <= now {
            return Err(BookingError::Validation(
                "showing has already started".to_string(),
            ));
        }

        // 3. One active reservation per user per showing
        if self.bookings.has_pending(user_id, showing_id).await? {
            return Err(BookingError::DuplicatePendingBooking);
        }

        // 4. Acquire leases for the whole set; any miss rolls back the rest
        let holder = user_id.to_string();
        let ttl = self.rules.lease_ttl();
        let mut acquired: Vec<String> = Vec::with_capacity(seat_instance_ids.len());
        for seat_id in &seat_instance_ids {
            let key = seat_lease_key(*seat_id);
            match self.acquire_with_retry(&key, &holder, ttl).await {
                Ok(true) => acquired.push(key),
                Ok(false) => {
                    self.release_leases(&acquired, &holder).await;
                    return Err(BookingError::SeatAlreadyLocked);
                }
                Err(err) => {
                    self.release_leases(&acquired, &holder).await;
                    return Err(err);
                }
            }
        }

        // 5-7. Authoritative gate: lock seats and create the booking in one
        // ledger transaction. Code collisions get a fresh code, everything
        // else releases the leases and propagates.
        let expires_at = now + self.rules.reservation_window();
        for _ in 0..CODE_ATTEMPTS {
            let reservation = NewReservation {
                user_id,
                showing_id,
                seat_instance_ids: seat_instance_ids.clone(),
                code: generate_booking_code(),
                expires_at,
                created_at: now,
            };
            match self.bookings.reserve(reservation).await {
                Ok(booking) => {
                    info!(
                        booking_code = %booking.code,
                        user_id = %user_id,
                        seats = booking.seat_count(),
                        total = booking.total_amount,
                        "created pending booking"
                    );
                    let event = booking_event(BookingEventKind::Created, &booking);
                    if let Err(err) = self.notifier.publish(event).await {
                        warn!("failed to publish booking.created for {}: {}", booking.code, err);
                    }
                    return Ok(booking);
                }
                Err(BookingError::CodeCollision) => continue,
                Err(err) => {
                    self.release_leases(&acquired, &holder).await;
                    return Err(err);
                }
            }
        }

        self.release_leases(&acquired, &holder).await;
        Err(BookingError::Infrastructure(format!(
            "booking code collided {} times",
            CODE_ATTEMPTS
        )))
    }

    /// Lease acquisition with bounded retries on infrastructure errors only.
    /// A held lease is a business outcome and is never retried.
    async fn acquire_with_retry(
        &self,
        key: &str,
        holder: &str,
        ttl: std::time::Duration,
    ) -> Result<bool, BookingError> {
        let mut last_err = None;
        for attempt in 0..=self.rules.lease_retry_attempts {
            match self.leases.acquire(key, holder, ttl).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_infrastructure() => {
                    warn!(
                        "lease acquire attempt {} for {} failed: {}",
                        attempt + 1,
                        key,
                        err
                    );
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            BookingError::Infrastructure("lease store unavailable".to_string())
        }))
    }

    /// Roll back every lease acquired so far in this call. Release failures
    /// are logged, not propagated: the TTL reclaims what we could not.
    async fn release_leases(&self, keys: &[String], holder: &str) {
        for key in keys {
            if let Err(err) = self.leases.release(key, holder).await {
                warn!("failed to release lease {}: {}", key, err);
            }
        }
    }
}
