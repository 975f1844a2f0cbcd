//! Client for a sharded, append-only record stream.
//!
//! Two roles share one [`StreamService`]:
//! - [`StreamAdmin`] creates a stream and waits, within a probe budget, until it is writable.
//! - [`BatchPublisher`] appends records in batches, resubmitting only the records the service
//!   rejected until everything lands, the retry budget runs out, or retrying stops making
//!   progress.
//!
//! [`KinesisService`] is the AWS Kinesis Data Streams implementation of the service.

mod error;
pub use crate::error::{Error, Result};

pub mod admin;
pub use crate::admin::{Activation, ActivationState, StreamAdmin};

pub mod config;
pub use crate::config::StreamConfig;

pub mod kinesis;
pub use crate::kinesis::{KinesisService, create_kinesis_client};

pub mod publisher;
pub use crate::publisher::{BatchPublisher, PublishReport, PublishVerdict};

pub mod record;
pub use crate::record::{
    PutRecordsResponse, Record, StreamDescriptor, StreamStatus, SubmissionOutcome,
};

pub mod service;
pub use crate::service::StreamService;

mod batch;

#[cfg(test)]
mod test_utils;
