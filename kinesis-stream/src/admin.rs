//! Stream provisioning: create a stream, then wait for the service to report it active.
//!
//! Activation is only observable by polling, and the status the service reports is eventually
//! consistent. [`StreamAdmin::await_active`] therefore probes a bounded number of times and ends
//! in exactly one of the [`ActivationState`]s:
//!
//! ```text
//!            status == ACTIVE
//!   POLLING -------------------------> ACTIVE
//!      |  \   status DELETING/DELETED
//!      |   `-------------------------> ABORTED
//!      |      budget spent
//!      +-----------------------------> EXHAUSTED
//!      |      cancel token fired
//!      +-----------------------------> CANCELLED
//!      |
//!      `-- otherwise: sleep poll_interval, probe again
//! ```
//!
//! Errors from a probe (missing stream, throttling, transport) are returned to the caller right
//! away. Retrying a throttled describe needs its own backoff, which is the caller's decision.

use std::time::Duration;

use backoff::strategy::fixed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::validate_stream_name;
use crate::error::{Error, Result};
use crate::record::{StreamDescriptor, StreamStatus};
use crate::service::StreamService;

/// How an activation wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Active,
    /// Every probe saw a non-terminal, non-active status.
    Exhausted,
    /// The stream is being deleted or is gone.
    Aborted,
    Cancelled,
}

/// Verdict of [`StreamAdmin::await_active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub state: ActivationState,
    /// Status seen by the most recent probe, `None` if no probe completed.
    pub last_status: Option<StreamStatus>,
    /// Describe calls that returned a status.
    pub attempts: u32,
}

impl Activation {
    pub fn is_ready(&self) -> bool {
        self.state == ActivationState::Active
    }
}

/// Creates streams and reports when they become usable.
#[derive(Debug, Clone)]
pub struct StreamAdmin<S> {
    service: S,
}

impl<S> StreamAdmin<S>
where
    S: StreamService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Asks the service to create `name` with `shard_count` shards. Creation is asynchronous on
    /// the service side, use [`StreamAdmin::await_active`] to wait for it.
    pub async fn create(&self, name: &str, shard_count: i32) -> Result<StreamDescriptor> {
        validate_stream_name(name)?;
        if shard_count <= 0 {
            return Err(Error::InvalidConfig(format!(
                "shard count must be positive, got {shard_count}"
            )));
        }

        self.service.create_stream(name, shard_count).await?;
        info!(stream = name, shard_count, "Stream creation requested");

        Ok(StreamDescriptor {
            name: name.to_string(),
            shard_count,
            status: StreamStatus::Creating,
        })
    }

    /// Single probe of the stream status.
    pub async fn describe(&self, name: &str) -> Result<StreamStatus> {
        self.service.describe_stream(name).await
    }

    /// Probes the stream status up to `max_attempts` times, `poll_interval` apart, until it is
    /// active, turns terminal, the budget runs out, or `cancel` fires.
    pub async fn await_active(
        &self,
        name: &str,
        max_attempts: u32,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Activation> {
        let mut verdict = Activation {
            state: ActivationState::Exhausted,
            last_status: None,
            attempts: 0,
        };

        if max_attempts == 0 {
            warn!(stream = name, "No activation probes allowed");
            return Ok(verdict);
        }

        // n probes need n - 1 pauses between them
        let mut pauses = fixed::Interval::new(poll_interval).take(max_attempts as usize - 1);

        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(cancelled(name, verdict));
                }
                status = self.service.describe_stream(name) => status?,
            };
            verdict.attempts += 1;
            verdict.last_status = Some(status);

            if status == StreamStatus::Active {
                info!(stream = name, attempts = verdict.attempts, "Stream is active");
                verdict.state = ActivationState::Active;
                return Ok(verdict);
            }

            if status.is_terminal() {
                warn!(stream = name, %status, "Stream will never become active, aborting wait");
                verdict.state = ActivationState::Aborted;
                return Ok(verdict);
            }

            let Some(pause) = pauses.next() else {
                warn!(
                    stream = name,
                    %status,
                    attempts = verdict.attempts,
                    "Stream not active after all probes"
                );
                return Ok(verdict);
            };

            debug!(
                stream = name,
                %status,
                attempt = verdict.attempts,
                ?pause,
                "Stream not active yet"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(cancelled(name, verdict));
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

fn cancelled(name: &str, mut verdict: Activation) -> Activation {
    info!(
        stream = name,
        last_status = ?verdict.last_status,
        "Activation wait cancelled"
    );
    verdict.state = ActivationState::Cancelled;
    verdict
}
