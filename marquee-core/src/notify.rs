use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use marquee_shared::events::{BookingEvent, BookingEventKind, BookingEventSeat};

use crate::booking::Booking;
use crate::error::BookingError;

/// Fire-and-forget event boundary. Callers log a failed publish and move on;
/// a notification must never fail the operation that triggered it.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, event: BookingEvent) -> Result<(), BookingError>;
}

/// Build the event snapshot for a booking lifecycle transition.
pub fn booking_event(kind: BookingEventKind, booking: &Booking) -> BookingEvent {
    BookingEvent {
        event_id: Uuid::new_v4(),
        kind,
        timestamp: Utc::now(),
        booking_id: booking.id,
        booking_code: booking.code.clone(),
        user_id: booking.user_id,
        showing_id: booking.showing_id,
        status: booking.status.as_str().to_string(),
        total_amount: booking.total_amount,
        final_amount: booking.final_amount,
        points_used: booking.points_used,
        points_earned: booking.points_earned,
        expires_at: booking.expires_at,
        seats: booking
            .seats
            .iter()
            .map(|s| BookingEventSeat {
                seat_instance_id: s.seat_instance_id,
                price: s.price,
            })
            .collect(),
    }
}
