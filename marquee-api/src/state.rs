use std::sync::Arc;

use tokio::sync::broadcast;

use marquee_booking::{BookingReads, CheckoutHandler, ReservationCoordinator};
use marquee_shared::events::SeatsLockedEvent;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Shared handles for every request handler. The engine components are
/// wired once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ReservationCoordinator>,
    pub checkout: Arc<CheckoutHandler>,
    pub reads: Arc<BookingReads>,
    pub sse_tx: broadcast::Sender<SeatsLockedEvent>,
    pub auth: AuthConfig,
}
