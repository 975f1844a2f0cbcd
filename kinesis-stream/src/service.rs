use std::sync::Arc;

use crate::Result;
use crate::record::{PutRecordsResponse, Record, StreamStatus};

/// The managed stream service, reduced to the three calls this crate needs.
///
/// Errors are already mapped onto [`crate::Error`]; implementations decide which service faults
/// are throttling, which are missing resources and so on.
#[trait_variant::make(StreamService: Send)]
#[allow(dead_code)]
pub trait LocalStreamService {
    /// Request creation of a stream. Returns once the request is accepted, not once the stream is
    /// usable.
    async fn create_stream(&self, name: &str, shard_count: i32) -> Result<()>;

    /// Current status of the stream.
    async fn describe_stream(&self, name: &str) -> Result<StreamStatus>;

    /// Append `records` in one request. On success `results[i]` describes `records[i]`.
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[Record],
    ) -> Result<PutRecordsResponse>;
}

/// Lets one service instance back both the admin and the publisher.
impl<T> StreamService for Arc<T>
where
    T: StreamService + Send + Sync,
{
    async fn create_stream(&self, name: &str, shard_count: i32) -> Result<()> {
        StreamService::create_stream(&**self, name, shard_count).await
    }

    async fn describe_stream(&self, name: &str) -> Result<StreamStatus> {
        StreamService::describe_stream(&**self, name).await
    }

    async fn put_records(
        &self,
        stream_name: &str,
        records: &[Record],
    ) -> Result<PutRecordsResponse> {
        StreamService::put_records(&**self, stream_name, records).await
    }
}
