/*!
Parses the `key=value,key=value` option string spec.md §6 enumerates, mirroring
`bgpview_io_kafka.c::parse_args` and `bvc_viewsender.c::parse_args`'s getopt-based option
set but expressed over `str::split(',')`, since there is no idiomatic getopt crate in the
teacher's dependency stack. The `cli` feature binary instead parses its arguments with
`clap`, the way `bgpkit-parser`'s own binary does, and builds a `Config` from them.
*/
use crate::error::CoreError;

const DEFAULT_SYNC_INTERVAL: u32 = 3600;

/// Runtime configuration shared by the producer, consumer, and archiver paths. Every
/// field beyond `brokers` is optional because not every binary that links this crate needs
/// every option — a direct consumer, for instance, never reads `rotate_interval`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub brokers: Vec<String>,
    pub identity: Option<String>,
    pub namespace: String,
    pub channel: Option<String>,
    pub sync_interval: u32,
    pub filter_ff_v4cnt: u32,
    pub filter_ff_v6cnt: u32,
    pub compress_level: Option<u32>,
    pub rotate_interval: u32,
    pub rotate_align: bool,
}

impl Config {
    /// Parses `brokers=a:9092;b:9092,identity=rrc00,namespace=bgpview,sync_interval=3600`.
    /// `brokers` values are additionally `;`-separated since a single option cannot
    /// otherwise carry a list within the flat `key=value,...` grammar.
    pub fn parse(options: &str) -> Result<Self, CoreError> {
        let mut config = Config {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            rotate_align: true,
            ..Config::default()
        };

        for field in options.split(',') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let (key, value) = field.split_once('=').ok_or_else(|| {
                CoreError::Fatal(format!("malformed config field {field:?}: expected key=value"))
            })?;
            match key.trim() {
                "brokers" => {
                    config.brokers = value.split(';').map(|s| s.trim().to_string()).collect()
                }
                "identity" => config.identity = Some(value.trim().to_string()),
                "namespace" => config.namespace = value.trim().to_string(),
                "channel" => config.channel = Some(value.trim().to_string()),
                "sync_interval" => config.sync_interval = parse_u32(key, value)?.max(1),
                "filter_ff_v4cnt" => config.filter_ff_v4cnt = parse_u32(key, value)?,
                "filter_ff_v6cnt" => config.filter_ff_v6cnt = parse_u32(key, value)?,
                "compress_level" => config.compress_level = Some(parse_u32(key, value)?),
                "rotate_interval" => config.rotate_interval = parse_u32(key, value)?,
                "rotate_align" => config.rotate_align = parse_bool(key, value)?,
                other => {
                    return Err(CoreError::Fatal(format!("unrecognized config key {other:?}")))
                }
            }
        }
        Ok(config)
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, CoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Fatal(format!("config key {key:?} expects an integer, got {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CoreError> {
    match value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(CoreError::Fatal(format!(
            "config key {key:?} expects a boolean, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_option_set() {
        let config = Config::parse(
            "brokers=a:9092;b:9092,identity=rrc00,namespace=bgpview,channel=ris,\
             sync_interval=60,filter_ff_v4cnt=100000,filter_ff_v6cnt=1000,\
             compress_level=6,rotate_interval=3600,rotate_align=false",
        )
        .unwrap();
        assert_eq!(config.brokers, vec!["a:9092", "b:9092"]);
        assert_eq!(config.identity.as_deref(), Some("rrc00"));
        assert_eq!(config.namespace, "bgpview");
        assert_eq!(config.channel.as_deref(), Some("ris"));
        assert_eq!(config.sync_interval, 60);
        assert_eq!(config.filter_ff_v4cnt, 100_000);
        assert_eq!(config.filter_ff_v6cnt, 1_000);
        assert_eq!(config.compress_level, Some(6));
        assert_eq!(config.rotate_interval, 3600);
        assert!(!config.rotate_align);
    }

    #[test]
    fn defaults_sync_interval_and_rotate_align() {
        let config = Config::parse("identity=rrc00,namespace=bgpview").unwrap();
        assert_eq!(config.sync_interval, DEFAULT_SYNC_INTERVAL);
        assert!(config.rotate_align);
    }

    #[test]
    fn rejects_unknown_key() {
        let err = Config::parse("bogus=1");
        assert!(matches!(err, Err(CoreError::Fatal(_))));
    }

    #[test]
    fn rejects_malformed_field() {
        let err = Config::parse("brokers");
        assert!(matches!(err, Err(CoreError::Fatal(_))));
    }
}
