use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use marquee_core::booking::Booking;
use marquee_core::booking::BookingStatus;
use marquee_core::error::BookingError;
use marquee_core::identity::IdentityProvider;
use marquee_core::ledger::{BookingLedger, SeatLedger};
use marquee_core::lease::{seat_lease_key, LeaseStore};
use marquee_core::notify::{booking_event, NotificationPublisher};
use marquee_core::payment::{Payment, PaymentGateway, PaymentIntent, PaymentMethod};
use marquee_core::rules::ReservationRules;
use marquee_shared::events::BookingEventKind;

/// Drives a pending booking through pricing, confirmation and cancellation.
///
/// `checkout` only attaches pricing and a payment intent; seat and booking
/// status move on `confirm_payment` (driven by the verified gateway
/// callback) or `cancel_booking`.
pub struct CheckoutHandler {
    bookings: Arc<dyn BookingLedger>,
    seats: Arc<dyn SeatLedger>,
    leases: Arc<dyn LeaseStore>,
    identity: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationPublisher>,
    rules: ReservationRules,
}

impl CheckoutHandler {
    pub fn new(
        bookings: Arc<dyn BookingLedger>,
        seats: Arc<dyn SeatLedger>,
        leases: Arc<dyn LeaseStore>,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationPublisher>,
        rules: ReservationRules,
    ) -> Self {
        Self {
            bookings,
            seats,
            leases,
            identity,
            gateway,
            notifier,
            rules,
        }
    }

    /// Apply a points discount and create the payment intent for a pending
    /// booking. Points beyond the discount cap are simply not spent.
    pub async fn checkout(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        method: PaymentMethod,
        points_to_use: i32,
    ) -> Result<Payment, BookingError> {
        if points_to_use < 0 {
            return Err(BookingError::Validation(
                "points_to_use must not be negative".to_string(),
            ));
        }

        let booking = self.load_owned(user_id, booking_id).await?;
        if !booking.is_pending() {
            return Err(BookingError::BookingNotPending);
        }
        if booking.is_expired_at(Utc::now()) {
            return Err(BookingError::BookingExpired);
        }

        let mut discount = 0i64;
        let mut points_used = 0i32;
        if points_to_use > 0 {
            let balance = self.identity.points_balance(user_id).await?;
            if balance < points_to_use as i64 {
                return Err(BookingError::InsufficientPoints);
            }
            let requested = points_to_use as i64 * self.rules.point_value;
            discount = requested.min(self.rules.discount_cap(booking.total_amount));
            // Only the points behind the capped discount are consumed.
            points_used = (discount / self.rules.point_value) as i32;
        }
        let final_amount = booking.total_amount - discount;

        let mut payment = Payment::new(booking_id, method, final_amount);
        let PaymentIntent { redirect_url, reference } = self
            .gateway
            .create_intent(&booking, method, final_amount)
            .await?;
        payment.payment_url = Some(redirect_url);

        self.bookings
            .apply_checkout(booking_id, discount, points_used, final_amount, payment.clone())
            .await?;

        info!(
            booking_code = %booking.code,
            method = method.as_str(),
            amount = final_amount,
            reference = %reference,
            "checkout prepared"
        );
        Ok(payment)
    }

    /// Confirm a booking after the payment collaborator verified the gateway
    /// callback. A replayed callback for an already-confirmed booking is a
    /// no-op success so the gateway's retry policy stays simple.
    pub async fn confirm_payment(
        &self,
        booking_id: Uuid,
        transaction_id: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .find_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound("booking"))?;

        if booking.is_confirmed() {
            debug!("replayed confirmation for {}", booking.code);
            return Ok(booking);
        }
        if !booking.is_pending() {
            return Err(BookingError::BookingNotPending);
        }
        let now = Utc::now();
        if booking.is_expired_at(now) && !self.rules.allow_confirm_past_deadline {
            return Err(BookingError::BookingExpired);
        }

        let points_earned = (booking.final_amount / self.rules.point_value) as i32;
        match self
            .bookings
            .confirm(booking_id, transaction_id, points_earned, now)
            .await
        {
            Ok(confirmed) => {
                info!(
                    booking_code = %confirmed.code,
                    transaction_id,
                    points_earned,
                    "booking confirmed"
                );
                let event = booking_event(BookingEventKind::Confirmed, &confirmed);
                if let Err(err) = self.notifier.publish(event).await {
                    warn!(
                        "failed to publish booking.confirmed for {}: {}",
                        confirmed.code, err
                    );
                }
                Ok(confirmed)
            }
            // Lost a confirm/cancel/expire race. If a confirmation won, this
            // is the replay case again.
            Err(BookingError::BookingNotPending) => {
                let current = self
                    .bookings
                    .find_booking(booking_id)
                    .await?
                    .ok_or(BookingError::NotFound("booking"))?;
                if current.is_confirmed() {
                    Ok(current)
                } else {
                    Err(BookingError::BookingNotPending)
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Cancel a pending booking: CAS to CANCELLED, revert its seats, release
    /// their leases. Whole-booking only.
    pub async fn cancel_booking(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, BookingError> {
        let mut booking = self.load_owned(user_id, booking_id).await?;
        if !booking.is_pending() {
            return Err(BookingError::BookingNotPending);
        }

        let now = Utc::now();
        let won = self
            .bookings
            .transition(booking_id, BookingStatus::Pending, BookingStatus::Cancelled, now)
            .await?;
        if !won {
            return Err(BookingError::BookingNotPending);
        }

        let seat_ids = booking.seat_ids();
        self.seats.unlock_seats(&seat_ids).await?;

        let holder = user_id.to_string();
        for seat_id in &seat_ids {
            if let Err(err) = self.leases.release(&seat_lease_key(*seat_id), &holder).await {
                warn!("failed to release lease for seat {}: {}", seat_id, err);
            }
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        info!(booking_code = %booking.code, "booking cancelled");
        let event = booking_event(BookingEventKind::Cancelled, &booking);
        if let Err(err) = self.notifier.publish(event).await {
            warn!("failed to publish booking.cancelled for {}: {}", booking.code, err);
        }
        Ok(booking)
    }

    /// Wrong-owner lookups read as not-found so booking ids stay unguessable.
    async fn load_owned(&self, user_id: Uuid, booking_id: Uuid) -> Result<Booking, BookingError> {
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
}

/// Stand-in gateway used by local wiring and tests. Real deployments plug in
/// the payment collaborator, which owns URL signing and callback
/// verification.
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_intent(
        &self,
        booking: &Booking,
        method: PaymentMethod,
        amount: i64,
    ) -> Result<PaymentIntent, BookingError> {
        let reference = format!("mock_pi_{}", booking.id.simple());
        Ok(PaymentIntent {
            redirect_url: format!(
                "/payment/mock?reference={}&amount={}&method={}",
                reference,
                amount,
                method.as_str()
            ),
            reference,
        })
    }
}
