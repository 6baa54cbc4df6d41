use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

use marquee_core::error::BookingError;
use marquee_core::notify::NotificationPublisher;
use marquee_shared::events::BookingEvent;

/// Kafka publisher for booking lifecycle events. Call sites treat a failed
/// publish as a logged warning, never as a failed booking operation.
#[derive(Clone)]
pub struct KafkaNotifier {
    producer: FutureProducer,
}

impl KafkaNotifier {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }
}

#[async_trait]
impl NotificationPublisher for KafkaNotifier {
    async fn publish(&self, event: BookingEvent) -> Result<(), BookingError> {
        let topic = event.kind.topic();
        let payload = serde_json::to_string(&event).map_err(BookingError::infrastructure)?;
        let record = FutureRecord::to(topic)
            .key(&event.booking_code)
            .payload(&payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok((partition, offset)) => {
                info!(
                    "Sent {} for {}: partition {} offset {}",
                    topic, event.booking_code, partition, offset
                );
                Ok(())
            }
            Err((err, _msg)) => {
                error!("Failed to send {} for {}: {}", topic, event.booking_code, err);
                Err(BookingError::infrastructure(err))
            }
        }
    }
}
