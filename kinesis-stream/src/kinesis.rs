//! [`StreamService`] backed by AWS Kinesis Data Streams.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, meta::region::RegionProviderChain};
use aws_sdk_kinesis::Client;
use aws_sdk_kinesis::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::{PutRecordsRequestEntry, StreamStatus as KinesisStatus};
use aws_smithy_types::error::display::DisplayErrorContext;
use tracing::info;

use crate::config::{DEFAULT_REGION, StreamConfig};
use crate::error::{Error, Result};
use crate::record::{PutRecordsResponse, Record, StreamStatus, SubmissionOutcome};
use crate::service::StreamService;

/// Builds a Kinesis client for the configured region and, if set, endpoint.
///
/// SDK-level retries are turned off: throttling is handled by the publish loop, and describe
/// throttling is reported to the caller.
pub async fn create_kinesis_client(config: &StreamConfig) -> Result<Client> {
    config.validate()?;

    info!(
        region = %config.region,
        endpoint = ?config.endpoint_url,
        "Creating Kinesis client"
    );

    let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()))
        .or_default_provider()
        .or_else(Region::new(DEFAULT_REGION));

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .retry_config(RetryConfig::disabled());

    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }

    let shared_config = loader.load().await;
    Ok(Client::new(&shared_config))
}

/// Kinesis client adapted to [`StreamService`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct KinesisService {
    client: Client,
}

impl KinesisService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn connect(config: &StreamConfig) -> Result<Self> {
        Ok(Self::new(create_kinesis_client(config).await?))
    }
}

impl StreamService for KinesisService {
    async fn create_stream(&self, name: &str, shard_count: i32) -> Result<()> {
        self.client
            .create_stream()
            .stream_name(name)
            .shard_count(shard_count)
            .send()
            .await
            .map_err(|e| map_sdk_error(&e, Error::InvalidConfig))?;
        Ok(())
    }

    async fn describe_stream(&self, name: &str) -> Result<StreamStatus> {
        let output = self
            .client
            .describe_stream_summary()
            .stream_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(&e, Error::InvalidConfig))?;

        let summary = output.stream_description_summary.ok_or_else(|| {
            Error::ServiceUnavailable(format!("No stream description returned for {name}"))
        })?;
        map_status(&summary.stream_status)
    }

    async fn put_records(
        &self,
        stream_name: &str,
        records: &[Record],
    ) -> Result<PutRecordsResponse> {
        let entries = records
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.payload.to_vec()))
                    .partition_key(record.routing_key())
                    .build()
                    .map_err(|e| Error::InvalidArgument(format!("Failed to build entry: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .put_records()
            .stream_name(stream_name)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|e| map_sdk_error(&e, Error::InvalidArgument))?;

        let results = output
            .records
            .into_iter()
            .map(|entry| {
                SubmissionOutcome::from_entry(
                    entry.sequence_number,
                    entry.shard_id,
                    entry.error_code,
                    entry.error_message,
                )
            })
            .collect();

        Ok(PutRecordsResponse {
            failed_count: output.failed_record_count.unwrap_or_default().max(0) as usize,
            results,
        })
    }
}

fn map_status(status: &KinesisStatus) -> Result<StreamStatus> {
    match status {
        KinesisStatus::Creating => Ok(StreamStatus::Creating),
        KinesisStatus::Active => Ok(StreamStatus::Active),
        KinesisStatus::Updating => Ok(StreamStatus::Updating),
        KinesisStatus::Deleting => Ok(StreamStatus::Deleting),
        other => Err(Error::ServiceUnavailable(format!(
            "Unrecognized stream status {}",
            other.as_str()
        ))),
    }
}

/// Maps an SDK failure onto [`Error`] by its service error code. `invalid` picks the variant for
/// argument/validation failures, which mean bad stream config on create and describe and a bad
/// request on put. Failures without a code (timeouts, connection errors) are unavailability.
fn map_sdk_error<E, R>(err: &SdkError<E, R>, invalid: fn(String) -> Error) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();
    match err.code() {
        Some("ResourceInUseException") => Error::AlreadyExists(message),
        Some("InvalidArgumentException" | "ValidationException") => invalid(message),
        Some(
            "LimitExceededException"
            | "ProvisionedThroughputExceededException"
            | "KMSThrottlingException",
        ) => Error::ThrottledByService(message),
        Some("ResourceNotFoundException") => Error::ResourceNotFound(message),
        _ => Error::ServiceUnavailable(message),
    }
}
