use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use marquee_core::booking::{Booking, BookingStatus};
use marquee_core::error::BookingError;
use marquee_core::ledger::{BookingLedger, SeatLedger};
use marquee_core::lease::{seat_lease_key, LeaseStore};
use marquee_core::notify::{booking_event, NotificationPublisher};
use marquee_shared::events::BookingEventKind;

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Bookings transitioned to EXPIRED by this pass.
    pub expired: usize,
    /// Bookings another confirm/cancel/sweeper resolved first.
    pub skipped: usize,
    /// Bookings that errored; the next pass retries them.
    pub failed: usize,
}

/// Periodic reconciliation of pending bookings past their deadline.
///
/// Safe to run on every instance of a horizontally-scaled deployment: the
/// per-booking PENDING -> EXPIRED transition is a compare-and-set, so
/// concurrent sweepers cannot double-process a booking.
pub struct ExpirySweeper {
    bookings: Arc<dyn BookingLedger>,
    seats: Arc<dyn SeatLedger>,
    leases: Arc<dyn LeaseStore>,
    notifier: Arc<dyn NotificationPublisher>,
    interval: std::time::Duration,
}

impl ExpirySweeper {
    pub fn new(
        bookings: Arc<dyn BookingLedger>,
        seats: Arc<dyn SeatLedger>,
        leases: Arc<dyn LeaseStore>,
        notifier: Arc<dyn NotificationPublisher>,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            bookings,
            seats,
            leases,
            notifier,
            interval,
        }
    }

    /// Run sweeps forever on the configured interval. Spawned once from the
    /// service entrypoint.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("expiry sweeper started, interval {:?}", self.interval);
        loop {
            ticker.tick().await;
            match self.sweep(Utc::now()).await {
                Ok(stats) if stats.expired > 0 || stats.failed > 0 => {
                    info!(
                        expired = stats.expired,
                        skipped = stats.skipped,
                        failed = stats.failed,
                        "sweep finished"
                    );
                }
                Ok(_) => {}
                Err(err) => error!("sweep aborted: {}", err),
            }
        }
    }

    /// One reconciliation pass. A failure on an individual booking is logged
    /// and does not abort the remainder of the batch.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepStats, BookingError> {
        let overdue = self.bookings.find_expired_pending(now).await?;
        let mut stats = SweepStats::default();
        for booking in overdue {
            match self.expire_one(&booking, now).await {
                Ok(true) => stats.expired += 1,
                Ok(false) => stats.skipped += 1,
                Err(err) => {
                    error!("failed to expire booking {}: {}", booking.code, err);
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn expire_one(&self, booking: &Booking, now: DateTime<Utc>) -> Result<bool, BookingError> {
        // Losing the CAS means a confirm, cancel or another sweeper resolved
        // this booking first.
        let won = self
            .bookings
            .transition(booking.id, BookingStatus::Pending, BookingStatus::Expired, now)
            .await?;
        if !won {
            return Ok(false);
        }

        let seats = self.seats.get_seats(&booking.seat_ids()).await?;
        let still_locked: Vec<Uuid> = seats.iter().filter(|s| s.is_locked()).map(|s| s.id).collect();

        // System cleanup, not an owner-verified release: the holder's lease
        // may have lapsed already, or a fresh one may exist. The ledger
        // status is authoritative either way.
        for seat_id in &still_locked {
            if let Err(err) = self.leases.force_release(&seat_lease_key(*seat_id)).await {
                warn!("failed to force-release lease for seat {}: {}", seat_id, err);
            }
        }
        if !still_locked.is_empty() {
            self.seats.unlock_seats(&still_locked).await?;
        }

        let mut expired = booking.clone();
        expired.status = BookingStatus::Expired;
        expired.cancelled_at = Some(now);
        info!(booking_code = %expired.code, "booking expired");
        let event = booking_event(BookingEventKind::Expired, &expired);
        if let Err(err) = self.notifier.publish(event).await {
            warn!("failed to publish booking.expired for {}: {}", expired.code, err);
        }
        Ok(true)
    }
}
