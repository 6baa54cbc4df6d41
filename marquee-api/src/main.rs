use std::net::SocketAddr;
use std::sync::Arc;

use marquee_api::{
    app,
    state::{AppState, AuthConfig},
};
use marquee_booking::checkout::MockPaymentGateway;
use marquee_booking::{BookingReads, CheckoutHandler, ExpirySweeper, ReservationCoordinator};
use marquee_store::ledger::PgIdentity;
use marquee_store::{DbClient, KafkaNotifier, PgCatalog, PgLedger, RedisLeaseStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_api=debug,marquee_booking=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = marquee_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let leases = Arc::new(
        RedisLeaseStore::new(&config.redis.url).expect("Failed to create Redis client"),
    );
    let notifier = Arc::new(
        KafkaNotifier::new(&config.kafka.brokers).expect("Failed to create Kafka producer"),
    );

    let ledger = Arc::new(PgLedger::new(db.pool.clone()));
    let catalog = Arc::new(PgCatalog::new(db.pool.clone()));
    let identity = Arc::new(PgIdentity::new(db.pool.clone()));
    let rules = config.reservation.clone();

    let coordinator = Arc::new(ReservationCoordinator::new(
        leases.clone(),
        ledger.clone(),
        catalog,
        notifier.clone(),
        rules.clone(),
    ));
    let checkout = Arc::new(CheckoutHandler::new(
        ledger.clone(),
        ledger.clone(),
        leases.clone(),
        identity,
        Arc::new(MockPaymentGateway),
        notifier.clone(),
        rules.clone(),
    ));
    let reads = Arc::new(BookingReads::new(ledger.clone()));

    // Reconciles overdue pending bookings for the life of the process.
    let sweeper = Arc::new(ExpirySweeper::new(
        ledger.clone(),
        ledger,
        leases,
        notifier,
        rules.sweep_interval(),
    ));
    tokio::spawn(sweeper.run());

    let (sse_tx, _) = tokio::sync::broadcast::channel(100);

    let app_state = AppState {
        coordinator,
        checkout,
        reads,
        sse_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
