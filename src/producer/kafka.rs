/*!
Kafka-backed [`ProducerTransport`], grounded in the `kafka` crate usage the teacher's own
`real_time_routeviews_kafka_to_mrt` example shows for the consumer side.
*/
use super::transport::{MembersHeartbeat, ProducerTransport};
use crate::error::CoreError;
use kafka::producer::{Producer as KafkaProducer, Record, RequiredAcks};
use log::{info, warn};
use std::time::Duration;

/// Publishes frames to `<namespace>.<identity>.<kind>` topics and heartbeats to
/// `<namespace>.members`, classifying `kafka`'s errors into `CoreError::Transient` /
/// `CoreError::Fatal` per spec.md §4.5, §7.
pub struct KafkaProducerTransport {
    namespace: String,
    brokers: Vec<String>,
    client: Option<KafkaProducer>,
}

impl KafkaProducerTransport {
    pub fn new(namespace: impl Into<String>, brokers: Vec<String>) -> Result<Self, CoreError> {
        let mut transport = KafkaProducerTransport {
            namespace: namespace.into(),
            brokers,
            client: None,
        };
        transport.reconnect()?;
        Ok(transport)
    }

    fn topic(&self, identity: &str, kind: &str) -> String {
        format!("{}.{identity}.{kind}", self.namespace)
    }

    fn members_topic(&self) -> String {
        format!("{}.members", self.namespace)
    }

    fn client_mut(&mut self) -> Result<&mut KafkaProducer, CoreError> {
        self.client
            .as_mut()
            .ok_or_else(|| CoreError::Transient("kafka producer not connected".into()))
    }

    fn send(&mut self, topic: &str, payload: &[u8]) -> Result<(), CoreError> {
        let record = Record::from_value(topic, payload);
        let client = self.client_mut()?;
        client.send(&record).map_err(classify_kafka_error)
    }
}

fn classify_kafka_error(error: kafka::Error) -> CoreError {
    use kafka::Error as KErr;
    match &error {
        KErr::Io(_) | KErr::Kafka(kafka::error::KafkaCode::BrokerNotAvailable) => {
            CoreError::Transient(error.to_string())
        }
        _ => CoreError::Fatal(error.to_string()),
    }
}

impl ProducerTransport for KafkaProducerTransport {
    fn publish_peers(&mut self, identity: &str, frame: &[u8]) -> Result<(), CoreError> {
        let topic = self.topic(identity, "peers");
        self.send(&topic, frame)
    }

    fn publish_pfxs(&mut self, identity: &str, frame: &[u8]) -> Result<(), CoreError> {
        let topic = self.topic(identity, "pfxs");
        self.send(&topic, frame)
    }

    fn publish_meta(&mut self, identity: &str, meta: &[u8]) -> Result<(), CoreError> {
        let topic = self.topic(identity, "meta");
        self.send(&topic, meta)
    }

    fn publish_members(&mut self, heartbeat: &MembersHeartbeat) -> Result<(), CoreError> {
        let payload = format!(
            "identity={} channel={} first_seen={} last_seen={}",
            heartbeat.identity,
            heartbeat.channel,
            heartbeat.first_seen_time,
            heartbeat.last_seen_time
        );
        let topic = self.members_topic();
        self.send(&topic, payload.as_bytes())
    }

    fn reconnect(&mut self) -> Result<(), CoreError> {
        info!("connecting kafka producer to {:?}", self.brokers);
        match KafkaProducer::from_hosts(self.brokers.clone())
            .with_ack_timeout(Duration::from_secs(10))
            .with_required_acks(RequiredAcks::One)
            .create()
        {
            Ok(client) => {
                self.client = Some(client);
                Ok(())
            }
            Err(e) => {
                warn!("kafka producer connect failed: {e}");
                Err(classify_kafka_error(e))
            }
        }
    }
}
