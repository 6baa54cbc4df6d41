use serde::Deserialize;

/// Business knobs for the reservation lifecycle. Deserialized from the
/// `reservation` section of the application config; every field has a
/// default so a bare config still boots.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRules {
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: usize,
    #[serde(default = "default_window_minutes")]
    pub reservation_window_minutes: i64,
    /// Minor currency units one loyalty point is worth.
    #[serde(default = "default_point_value")]
    pub point_value: i64,
    /// Hard cap on the share of a booking a points discount may cover.
    #[serde(default = "default_max_discount")]
    pub max_points_discount_percent: f64,
    /// Whether a payment callback may still confirm a booking whose deadline
    /// passed but which the sweeper has not reclaimed yet.
    #[serde(default)]
    pub allow_confirm_past_deadline: bool,
    /// Extra attempts when the lease store errors during acquisition.
    #[serde(default = "default_lease_retries")]
    pub lease_retry_attempts: u32,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_max_seats() -> usize {
    10
}

fn default_window_minutes() -> i64 {
    15
}

fn default_point_value() -> i64 {
    1000
}

fn default_max_discount() -> f64 {
    0.5
}

fn default_lease_retries() -> u32 {
    2
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            max_seats_per_booking: default_max_seats(),
            reservation_window_minutes: default_window_minutes(),
            point_value: default_point_value(),
            max_points_discount_percent: default_max_discount(),
            allow_confirm_past_deadline: false,
            lease_retry_attempts: default_lease_retries(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl ReservationRules {
    pub fn reservation_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reservation_window_minutes)
    }

    /// Lease TTL mirrors the reservation window so an abandoned lease dies
    /// with its booking's deadline.
    pub fn lease_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs((self.reservation_window_minutes as u64) * 60)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Discount cap in minor units for a booking total.
    pub fn discount_cap(&self, total_amount: i64) -> i64 {
        (total_amount as f64 * self.max_points_discount_percent) as i64
    }
}
