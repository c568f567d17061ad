/*!
Kafka-backed [`ConsumerTransport`] / [`MembersTransport`], grounded in the teacher's own
`real_time_routeviews_kafka_to_mrt` example's `kafka::consumer::Consumer` usage.
*/
use super::transport::{ConsumerTransport, MemberEvent, MembersTransport, PolledFrame};
use crate::error::CoreError;
use kafka::consumer::{Consumer, FetchOffset, GroupOffsetStorage};
use log::warn;

fn classify_kafka_error(error: kafka::Error) -> CoreError {
    use kafka::Error as KErr;
    match &error {
        KErr::Io(_) | KErr::Kafka(kafka::error::KafkaCode::BrokerNotAvailable) => {
            CoreError::Transient(error.to_string())
        }
        _ => CoreError::Fatal(error.to_string()),
    }
}

/// Polls a single `<namespace>.<identity>.pfxs` topic (the `peers` topic carries the same
/// bytes, see `DESIGN.md`, so direct mode only needs to subscribe to one of the two).
/// `is_diff` is decided by the accompanying `meta` topic; since `kafka::consumer::Consumer`
/// only exposes one subscription per instance here, a second internal consumer tracks
/// `meta` and the two are paired by arrival order.
pub struct KafkaConsumerTransport {
    frames: Consumer,
    meta: Consumer,
}

impl KafkaConsumerTransport {
    pub fn new(
        brokers: Vec<String>,
        group: impl Into<String>,
        namespace: &str,
        identity: &str,
    ) -> Result<Self, CoreError> {
        let group = group.into();
        let frames = Consumer::from_hosts(brokers.clone())
            .with_topic(format!("{namespace}.{identity}.pfxs"))
            .with_group(group.clone())
            .with_fallback_offset(FetchOffset::Latest)
            .with_offset_storage(Some(GroupOffsetStorage::Kafka))
            .create()
            .map_err(classify_kafka_error)?;
        let meta = Consumer::from_hosts(brokers)
            .with_topic(format!("{namespace}.{identity}.meta"))
            .with_group(group)
            .with_fallback_offset(FetchOffset::Latest)
            .with_offset_storage(Some(GroupOffsetStorage::Kafka))
            .create()
            .map_err(classify_kafka_error)?;
        Ok(KafkaConsumerTransport { frames, meta })
    }

    fn is_diff_from_meta(&mut self) -> Result<bool, CoreError> {
        let sets = self.meta.poll().map_err(classify_kafka_error)?;
        for set in sets.iter() {
            for message in set.messages() {
                let line = String::from_utf8_lossy(message.value);
                let is_diff = is_diff_meta_line(&line);
                let _ = self.meta.consume_messageset(set);
                self.meta.commit_consumed().map_err(classify_kafka_error)?;
                return Ok(is_diff);
            }
            let _ = self.meta.consume_messageset(set);
        }
        warn!("no meta message paired with frame, assuming sync");
        Ok(false)
    }
}

impl ConsumerTransport for KafkaConsumerTransport {
    fn poll_frame(&mut self) -> Result<Option<PolledFrame>, CoreError> {
        let sets = self.frames.poll().map_err(classify_kafka_error)?;
        for set in sets.iter() {
            for message in set.messages() {
                let bytes = message.value.to_vec();
                let is_diff = self.is_diff_from_meta()?;
                let _ = self.frames.consume_messageset(set);
                self.frames.commit_consumed().map_err(classify_kafka_error)?;
                return Ok(Some(PolledFrame { is_diff, bytes }));
            }
            let _ = self.frames.consume_messageset(set);
        }
        Ok(None)
    }
}

/// Polls the `<namespace>.members` topic for heartbeats, used by the global consumer's
/// coordinator to discover producer identities.
pub struct KafkaMembersTransport {
    consumer: Consumer,
}

impl KafkaMembersTransport {
    pub fn new(
        brokers: Vec<String>,
        group: impl Into<String>,
        namespace: &str,
    ) -> Result<Self, CoreError> {
        let consumer = Consumer::from_hosts(brokers)
            .with_topic(format!("{namespace}.members"))
            .with_group(group.into())
            .with_fallback_offset(FetchOffset::Latest)
            .with_offset_storage(Some(GroupOffsetStorage::Kafka))
            .create()
            .map_err(classify_kafka_error)?;
        Ok(KafkaMembersTransport { consumer })
    }
}

impl MembersTransport for KafkaMembersTransport {
    fn poll_members(&mut self) -> Result<Vec<MemberEvent>, CoreError> {
        let sets = self.consumer.poll().map_err(classify_kafka_error)?;
        let mut events = Vec::new();
        for set in sets.iter() {
            for message in set.messages() {
                let line = String::from_utf8_lossy(message.value);
                if let Some(event) = parse_heartbeat_line(&line) {
                    events.push(event);
                }
            }
            let _ = self.consumer.consume_messageset(set);
        }
        self.consumer.commit_consumed().map_err(classify_kafka_error)?;
        Ok(events)
    }
}

/// `Producer`'s `meta_bytes` line is `"time={t} sync={bool} ..."`; a diff frame is the
/// only case where `sync=false` appears.
fn is_diff_meta_line(line: &str) -> bool {
    line.contains("sync=false")
}

fn parse_heartbeat_line(line: &str) -> Option<MemberEvent> {
    let mut identity = None;
    let mut channel = None;
    let mut first_seen_time = None;
    let mut last_seen_time = None;
    for field in line.split_whitespace() {
        let (key, value) = field.split_once('=')?;
        match key {
            "identity" => identity = Some(value.to_string()),
            "channel" => channel = Some(value.to_string()),
            "first_seen" => first_seen_time = value.parse().ok(),
            "last_seen" => last_seen_time = value.parse().ok(),
            _ => {}
        }
    }
    Some(MemberEvent {
        identity: identity?,
        channel: channel?,
        first_seen_time: first_seen_time?,
        last_seen_time: last_seen_time?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_heartbeat_line() {
        let event =
            parse_heartbeat_line("identity=rrc00 channel=ris first_seen=100 last_seen=200")
                .unwrap();
        assert_eq!(event.identity, "rrc00");
        assert_eq!(event.channel, "ris");
        assert_eq!(event.first_seen_time, 100);
        assert_eq!(event.last_seen_time, 200);
    }

    #[test]
    fn rejects_incomplete_heartbeat_line() {
        assert!(parse_heartbeat_line("identity=rrc00").is_none());
    }

    #[test]
    fn meta_line_classifies_sync_and_diff() {
        assert!(!is_diff_meta_line("time=3600 sync=true common_pfx=0"));
        assert!(is_diff_meta_line("time=3601 sync=false common_pfx=1"));
    }
}
