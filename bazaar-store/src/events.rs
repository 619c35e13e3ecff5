use async_trait::async_trait;
use bazaar_core::EventSink;
use bazaar_shared::models::events::OrderEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

/// Ships order events to Kafka, one topic per event kind, keyed by order id.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(topic = %topic, key = %key, partition = delivery.partition, offset = delivery.offset, "Event delivered");
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic = %topic, error = %e, "Failed to deliver event");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventSink for EventProducer {
    async fn publish(&self, event: OrderEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to encode order event");
                return;
            }
        };
        // Delivery failures are already logged; the pipeline never waits on them.
        let _ = EventProducer::publish(self, event.topic(), &event.order_id().to_string(), &payload).await;
    }
}
