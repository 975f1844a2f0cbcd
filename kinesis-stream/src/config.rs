//! Settings for a stream session, read from the environment.
//!
//! Every setting has a default, so an empty environment yields a working configuration for a
//! one-shard `testKinesisStream` in `us-west-2`.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_STREAM_NAME: &str = "testKinesisStream";
const DEFAULT_SHARD_COUNT: i32 = 1;
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 5;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// PutRecords accepts at most 500 entries per request.
const DEFAULT_MAX_BATCH_RECORDS: usize = 500;
/// PutRecords accepts at most 5 MiB per request, keys included.
const DEFAULT_MAX_BATCH_BYTES: usize = 5 * 1024 * 1024;
/// A single PutRecords entry may carry at most 1 MiB, key included.
const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_PUBLISH_RETRIES: u32 = 5;
const DEFAULT_NO_PROGRESS_LIMIT: u32 = 2;
const DEFAULT_RETRY_INITIAL_INTERVAL_MS: u64 = 100;
const DEFAULT_RETRY_MAX_INTERVAL_MS: u64 = 5_000;
const DEFAULT_RETRY_FACTOR: f64 = 2.0;
const DEFAULT_RETRY_JITTER: f64 = 0.2;
const MAX_STREAM_NAME_LEN: usize = 128;

const ENV_REGION: &str = "KINESIS_REGION";
const ENV_ENDPOINT_URL: &str = "KINESIS_ENDPOINT_URL";
const ENV_STREAM_NAME: &str = "KINESIS_STREAM_NAME";
const ENV_SHARD_COUNT: &str = "KINESIS_SHARD_COUNT";
const ENV_MAX_POLL_ATTEMPTS: &str = "KINESIS_MAX_POLL_ATTEMPTS";
const ENV_POLL_INTERVAL_MS: &str = "KINESIS_POLL_INTERVAL_MS";
const ENV_MAX_BATCH_RECORDS: &str = "KINESIS_MAX_BATCH_RECORDS";
const ENV_MAX_BATCH_BYTES: &str = "KINESIS_MAX_BATCH_BYTES";
const ENV_MAX_RECORD_BYTES: &str = "KINESIS_MAX_RECORD_BYTES";
const ENV_MAX_PUBLISH_RETRIES: &str = "KINESIS_MAX_PUBLISH_RETRIES";
const ENV_NO_PROGRESS_LIMIT: &str = "KINESIS_NO_PROGRESS_LIMIT";
const ENV_RETRY_INITIAL_INTERVAL_MS: &str = "KINESIS_RETRY_INITIAL_INTERVAL_MS";
const ENV_RETRY_MAX_INTERVAL_MS: &str = "KINESIS_RETRY_MAX_INTERVAL_MS";
const ENV_RETRY_FACTOR: &str = "KINESIS_RETRY_FACTOR";
const ENV_RETRY_JITTER: &str = "KINESIS_RETRY_JITTER";

/// Where the service lives and which stream to work on.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub region: String,
    /// Overrides the regional endpoint, e.g. a localstack URL.
    pub endpoint_url: Option<String>,
    pub stream_name: String,
    pub shard_count: i32,
    pub activation: ActivationConfig,
    pub publish: PublishConfig,
}

/// How long to wait for a freshly created stream to turn active.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationConfig {
    pub max_poll_attempts: u32,
    pub poll_interval: Duration,
}

/// Request limits and retry budget for publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishConfig {
    pub max_batch_records: usize,
    pub max_batch_bytes: usize,
    /// Records above this size are reported undeliverable without being sent.
    pub max_record_bytes: usize,
    /// Total submissions allowed per batch, the first one included.
    pub max_retries: u32,
    /// Consecutive attempts with an unchanged rejected set before giving up.
    pub no_progress_limit: u32,
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub factor: f64,
    pub jitter: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            stream_name: DEFAULT_STREAM_NAME.to_string(),
            shard_count: DEFAULT_SHARD_COUNT,
            activation: ActivationConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            max_retries: DEFAULT_MAX_PUBLISH_RETRIES,
            no_progress_limit: DEFAULT_NO_PROGRESS_LIMIT,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: DEFAULT_RETRY_INITIAL_INTERVAL_MS,
            max_interval_ms: DEFAULT_RETRY_MAX_INTERVAL_MS,
            factor: DEFAULT_RETRY_FACTOR,
            jitter: DEFAULT_RETRY_JITTER,
        }
    }
}

impl StreamConfig {
    /// Builds the configuration from environment-style key/value pairs. Unknown keys are ignored,
    /// absent keys fall back to defaults, malformed values are a [`Error::Config`].
    pub fn load(
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let env_vars: HashMap<String, String> = env_vars
            .into_iter()
            .map(|(key, val)| (key.into(), val.into()))
            .filter(|(key, _)| key.starts_with("KINESIS_"))
            .collect();

        let mut config = StreamConfig::default();

        if let Some(region) = env_vars.get(ENV_REGION) {
            config.region = region.clone();
        }
        config.endpoint_url = env_vars.get(ENV_ENDPOINT_URL).cloned();
        if let Some(name) = env_vars.get(ENV_STREAM_NAME) {
            config.stream_name = name.clone();
        }
        if let Some(shards) = parse_var(&env_vars, ENV_SHARD_COUNT)? {
            config.shard_count = shards;
        }

        if let Some(attempts) = parse_var(&env_vars, ENV_MAX_POLL_ATTEMPTS)? {
            config.activation.max_poll_attempts = attempts;
        }
        if let Some(interval) = parse_var(&env_vars, ENV_POLL_INTERVAL_MS)? {
            config.activation.poll_interval = Duration::from_millis(interval);
        }

        let publish = &mut config.publish;
        if let Some(records) = parse_var(&env_vars, ENV_MAX_BATCH_RECORDS)? {
            publish.max_batch_records = records;
        }
        if let Some(bytes) = parse_var(&env_vars, ENV_MAX_BATCH_BYTES)? {
            publish.max_batch_bytes = bytes;
        }
        if let Some(bytes) = parse_var(&env_vars, ENV_MAX_RECORD_BYTES)? {
            publish.max_record_bytes = bytes;
        }
        if let Some(retries) = parse_var(&env_vars, ENV_MAX_PUBLISH_RETRIES)? {
            publish.max_retries = retries;
        }
        if let Some(limit) = parse_var(&env_vars, ENV_NO_PROGRESS_LIMIT)? {
            publish.no_progress_limit = limit;
        }
        if let Some(interval) = parse_var(&env_vars, ENV_RETRY_INITIAL_INTERVAL_MS)? {
            publish.backoff.initial_interval_ms = interval;
        }
        if let Some(interval) = parse_var(&env_vars, ENV_RETRY_MAX_INTERVAL_MS)? {
            publish.backoff.max_interval_ms = interval;
        }
        if let Some(factor) = parse_var(&env_vars, ENV_RETRY_FACTOR)? {
            publish.backoff.factor = factor;
        }
        if let Some(jitter) = parse_var(&env_vars, ENV_RETRY_JITTER)? {
            publish.backoff.jitter = jitter;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(Error::Config("region must not be empty".to_string()));
        }
        validate_stream_name(&self.stream_name).map_err(|e| Error::Config(e.to_string()))?;
        if self.shard_count <= 0 {
            return Err(Error::Config(format!(
                "shard count must be positive, got {}",
                self.shard_count
            )));
        }
        self.publish.validate()
    }
}

impl PublishConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_records == 0 {
            return Err(Error::Config("max batch records must be positive".to_string()));
        }
        if self.max_batch_bytes == 0 {
            return Err(Error::Config("max batch bytes must be positive".to_string()));
        }
        if self.max_record_bytes == 0 || self.max_record_bytes > self.max_batch_bytes {
            return Err(Error::Config(format!(
                "max record bytes must be within 1..={}, got {}",
                self.max_batch_bytes, self.max_record_bytes
            )));
        }
        if self.no_progress_limit == 0 {
            return Err(Error::Config("no-progress limit must be positive".to_string()));
        }
        let backoff = &self.backoff;
        if backoff.factor < 1.0 {
            return Err(Error::Config(format!(
                "retry factor must be at least 1.0, got {}",
                backoff.factor
            )));
        }
        if !(0.0..=1.0).contains(&backoff.jitter) {
            return Err(Error::Config(format!(
                "retry jitter must be within [0, 1], got {}",
                backoff.jitter
            )));
        }
        if backoff.initial_interval_ms > backoff.max_interval_ms {
            return Err(Error::Config(format!(
                "initial retry interval {}ms exceeds max retry interval {}ms",
                backoff.initial_interval_ms, backoff.max_interval_ms
            )));
        }
        Ok(())
    }
}

/// Stream names are 1 to 128 characters of `[a-zA-Z0-9_.-]`.
pub fn validate_stream_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_STREAM_NAME_LEN {
        return Err(Error::InvalidConfig(format!(
            "stream name must be 1 to {MAX_STREAM_NAME_LEN} characters, got {}",
            name.len()
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(Error::InvalidConfig(format!(
            "stream name {name:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

fn parse_var<T>(env_vars: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_vars
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid value {raw:?} for {key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_env() {
        let config = StreamConfig::load(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.stream_name, "testKinesisStream");
        assert_eq!(config.shard_count, 1);
        assert_eq!(config.activation.max_poll_attempts, 5);
        assert_eq!(config.activation.poll_interval, Duration::from_millis(100));
        assert_eq!(config.publish.max_batch_records, 500);
        assert_eq!(config.publish.max_batch_bytes, 5 * 1024 * 1024);
        assert_eq!(config.publish.max_record_bytes, 1024 * 1024);
    }

    #[test]
    fn overrides_from_env() {
        let env = [
            ("KINESIS_REGION", "eu-west-1"),
            ("KINESIS_ENDPOINT_URL", "http://localhost:4566"),
            ("KINESIS_STREAM_NAME", "orders.v2"),
            ("KINESIS_SHARD_COUNT", "4"),
            ("KINESIS_POLL_INTERVAL_MS", "250"),
            ("KINESIS_MAX_BATCH_RECORDS", "100"),
            ("KINESIS_MAX_RECORD_BYTES", "4096"),
            ("KINESIS_MAX_PUBLISH_RETRIES", "8"),
            ("KINESIS_RETRY_JITTER", "0.5"),
            ("HOME", "/root"),
        ];
        let config = StreamConfig::load(env).unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(
            config.endpoint_url.as_deref(),
            Some("http://localhost:4566")
        );
        assert_eq!(config.stream_name, "orders.v2");
        assert_eq!(config.shard_count, 4);
        assert_eq!(config.activation.poll_interval, Duration::from_millis(250));
        assert_eq!(config.publish.max_batch_records, 100);
        assert_eq!(config.publish.max_record_bytes, 4096);
        assert_eq!(config.publish.max_retries, 8);
        assert_eq!(config.publish.backoff.jitter, 0.5);
    }

    #[test]
    fn malformed_number_is_config_error() {
        let result = StreamConfig::load([("KINESIS_SHARD_COUNT", "two")]);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("KINESIS_SHARD_COUNT")));
    }

    #[test]
    fn non_positive_shard_count_rejected() {
        let result = StreamConfig::load([("KINESIS_SHARD_COUNT", "0")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn record_limit_must_fit_in_a_batch() {
        assert!(StreamConfig::load([("KINESIS_MAX_RECORD_BYTES", "0")]).is_err());
        let result = StreamConfig::load([
            ("KINESIS_MAX_BATCH_BYTES", "1000"),
            ("KINESIS_MAX_RECORD_BYTES", "1001"),
        ]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn invalid_backoff_rejected() {
        assert!(StreamConfig::load([("KINESIS_RETRY_FACTOR", "0.5")]).is_err());
        assert!(StreamConfig::load([("KINESIS_RETRY_JITTER", "1.5")]).is_err());
        assert!(
            StreamConfig::load([
                ("KINESIS_RETRY_INITIAL_INTERVAL_MS", "10000"),
                ("KINESIS_RETRY_MAX_INTERVAL_MS", "10"),
            ])
            .is_err()
        );
    }

    #[test]
    fn stream_name_rules() {
        assert!(validate_stream_name("testKinesisStream").is_ok());
        assert!(validate_stream_name("a.b-c_d").is_ok());
        assert!(matches!(
            validate_stream_name(""),
            Err(Error::InvalidConfig(_))
        ));
        assert!(validate_stream_name("has space").is_err());
        assert!(validate_stream_name(&"x".repeat(129)).is_err());
    }
}
