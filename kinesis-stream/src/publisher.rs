//! Batched publishing with partial-failure retries.
//!
//! A put request succeeds or fails per entry, and the service reports entry outcomes by
//! position: result `i` belongs to record `i` of the request. The publisher uses that to carve the
//! rejected records out of every attempt and resubmits only those, after a growing backoff,
//! until the batch drains or one of the stop conditions below holds.
//!
//! - the attempt budget (`max_retries`, first submission included) is spent:
//!   [`PublishVerdict::RetriesExhausted`]
//! - the rejected set came back identical `no_progress_limit` times in a row, which is what a
//!   permanently malformed record looks like: [`PublishVerdict::PermanentRejection`]
//! - the service refused the request as a whole for a reason retrying cannot fix:
//!   [`PublishVerdict::RequestFailed`]
//! - the cancel token fired: [`PublishVerdict::Cancelled`]
//!
//! Records larger than [`PublishConfig::max_record_bytes`] are never sent; they are reported as
//! rejected with the `InvalidArgument` code. Throttling or an unavailable service failing the
//! whole request retries the whole current batch from the same budget.
//!
//! Publishing never fails with an error. Whatever stops it, the caller gets a [`PublishReport`]
//! naming every record that was not accepted.

use std::collections::HashMap;

use backoff::strategy::exponential::Exponential;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::partition;
use crate::config::PublishConfig;
use crate::error::Error;
use crate::record::{Record, SubmissionOutcome};
use crate::service::StreamService;

/// How a publish ended. Ordered by severity; a multi-batch publish reports the most severe
/// verdict of its batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PublishVerdict {
    #[default]
    Delivered,
    RetriesExhausted,
    PermanentRejection,
    /// A put request was refused outright (missing stream, malformed request, a response that
    /// does not line up with the request). Batches after it are not sent.
    RequestFailed,
    Cancelled,
}

/// Result of [`BatchPublisher::publish`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    pub verdict: PublishVerdict,
    /// Records never accepted, in input order. Empty when delivered.
    pub rejected: Vec<Record>,
    /// Put requests issued across all batches.
    pub attempts: u32,
    /// Error code (per-record) or error kind (whole request) -> number of records affected, from
    /// the last attempt of every batch that did not drain.
    pub errors: HashMap<String, usize>,
    /// The request error behind [`PublishVerdict::RequestFailed`].
    pub failure: Option<Error>,
}

impl PublishReport {
    pub fn is_delivered(&self) -> bool {
        self.verdict == PublishVerdict::Delivered
    }

    fn count_errors(&mut self, errors: HashMap<String, usize>) {
        for (code, count) in errors {
            *self.errors.entry(code).or_insert(0) += count;
        }
    }
}

/// Records tagged with their position in the caller's input.
type Positioned = (usize, Record);

/// How one batch ended.
struct BatchOutcome {
    verdict: PublishVerdict,
    undelivered: Vec<Positioned>,
    attempts: u32,
    errors: HashMap<String, usize>,
    failure: Option<Error>,
}

impl BatchOutcome {
    fn new(
        verdict: PublishVerdict,
        positions: Vec<usize>,
        pending: Vec<Record>,
        attempts: u32,
        errors: HashMap<String, usize>,
    ) -> Self {
        Self {
            verdict,
            undelivered: positions.into_iter().zip(pending).collect(),
            attempts,
            errors,
            failure: None,
        }
    }

    fn request_failed(
        err: Error,
        positions: Vec<usize>,
        pending: Vec<Record>,
        attempts: u32,
    ) -> Self {
        let errors = HashMap::from([(err.kind().to_string(), pending.len())]);
        Self {
            failure: Some(err),
            ..Self::new(
                PublishVerdict::RequestFailed,
                positions,
                pending,
                attempts,
                errors,
            )
        }
    }
}

/// Publishes records to one stream.
#[derive(Debug, Clone)]
pub struct BatchPublisher<S> {
    service: S,
    stream_name: String,
    config: PublishConfig,
}

impl<S> BatchPublisher<S>
where
    S: StreamService,
{
    pub fn new(service: S, stream_name: impl Into<String>, config: PublishConfig) -> Self {
        Self {
            service,
            stream_name: stream_name.into(),
            config,
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Publishes `records`, split into request-sized batches, giving each batch at most
    /// `max_retries` put requests.
    pub async fn publish(
        &self,
        records: Vec<Record>,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> PublishReport {
        let mut report = PublishReport::default();
        if records.is_empty() {
            return report;
        }

        let total = records.len();
        let max_record_bytes = self.config.max_record_bytes;
        let (sendable, mut undelivered): (Vec<Positioned>, Vec<Positioned>) = records
            .into_iter()
            .enumerate()
            .partition(|(_, record)| record.encoded_len() <= max_record_bytes);

        if !undelivered.is_empty() {
            warn!(
                stream = %self.stream_name,
                oversized = undelivered.len(),
                max_record_bytes,
                "Records exceed the per-record size limit and will not be sent"
            );
            report.verdict = PublishVerdict::PermanentRejection;
            let kind = Error::InvalidArgument(String::new()).kind();
            report.errors.insert(kind.to_string(), undelivered.len());
        }

        let mut batches = partition(
            sendable,
            self.config.max_batch_records,
            self.config.max_batch_bytes,
            |(_, record)| record.encoded_len(),
        )
        .into_iter();
        debug!(
            stream = %self.stream_name,
            records = total,
            batches = batches.len(),
            "Publishing records"
        );

        let backoff = &self.config.backoff;
        let mut delays = Exponential::from_millis(
            backoff.initial_interval_ms,
            backoff.max_interval_ms,
            backoff.factor,
            backoff.jitter,
        );

        for batch in batches.by_ref() {
            let outcome = self
                .publish_batch(batch, max_retries, &mut delays, cancel)
                .await;
            let stop = matches!(
                outcome.verdict,
                PublishVerdict::RequestFailed | PublishVerdict::Cancelled
            );

            report.verdict = report.verdict.max(outcome.verdict);
            report.attempts += outcome.attempts;
            report.count_errors(outcome.errors);
            if outcome.failure.is_some() {
                report.failure = outcome.failure;
            }
            undelivered.extend(outcome.undelivered);

            if stop {
                break;
            }
        }
        // batches never sent are just as undelivered
        undelivered.extend(batches.flatten());

        undelivered.sort_by_key(|(position, _)| *position);
        report.rejected = undelivered.into_iter().map(|(_, record)| record).collect();

        if report.is_delivered() {
            info!(
                stream = %self.stream_name,
                records = total,
                attempts = report.attempts,
                "All records delivered"
            );
        } else {
            warn!(
                stream = %self.stream_name,
                verdict = ?report.verdict,
                undelivered = report.rejected.len(),
                errors = ?report.errors,
                failure = ?report.failure,
                "Records left undelivered"
            );
        }
        report
    }

    /// The retry loop for one request-sized batch.
    async fn publish_batch(
        &self,
        batch: Vec<Positioned>,
        max_retries: u32,
        delays: &mut Exponential,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        delays.reset();

        let (mut positions, mut pending): (Vec<usize>, Vec<Record>) = batch.into_iter().unzip();
        let mut attempts = 0u32;
        let mut errors: HashMap<String, usize> = HashMap::new();
        let mut previous_rejected: Option<Vec<Record>> = None;
        let mut unchanged = 0u32;

        loop {
            if attempts >= max_retries {
                warn!(
                    stream = %self.stream_name,
                    attempts,
                    remaining = pending.len(),
                    ?errors,
                    "Retries exhausted"
                );
                return BatchOutcome::new(
                    PublishVerdict::RetriesExhausted,
                    positions,
                    pending,
                    attempts,
                    errors,
                );
            }

            if attempts > 0 {
                let delay = delays.next().unwrap_or_default();
                debug!(
                    stream = %self.stream_name,
                    attempt = attempts + 1,
                    ?delay,
                    "Backing off"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(
                            stream = %self.stream_name,
                            "Cancellation received, stopping retry loop"
                        );
                        return BatchOutcome::new(
                            PublishVerdict::Cancelled,
                            positions,
                            pending,
                            attempts,
                            errors,
                        );
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            } else if cancel.is_cancelled() {
                return BatchOutcome::new(
                    PublishVerdict::Cancelled,
                    positions,
                    pending,
                    attempts,
                    errors,
                );
            }

            attempts += 1;
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // the in-flight request may or may not have landed, nothing is confirmed
                    warn!(stream = %self.stream_name, "Cancellation received during put");
                    return BatchOutcome::new(
                        PublishVerdict::Cancelled,
                        positions,
                        pending,
                        attempts,
                        errors,
                    );
                }
                response = self.service.put_records(&self.stream_name, &pending) => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(err) if err.is_transient() => {
                    warn!(
                        stream = %self.stream_name,
                        attempt = attempts,
                        records = pending.len(),
                        error = %err,
                        "Put request failed as a whole, retrying batch"
                    );
                    errors.clear();
                    errors.insert(err.kind().to_string(), pending.len());
                    continue;
                }
                Err(err) => {
                    warn!(
                        stream = %self.stream_name,
                        attempt = attempts,
                        records = pending.len(),
                        error = %err,
                        "Put request refused, not retrying"
                    );
                    return BatchOutcome::request_failed(err, positions, pending, attempts);
                }
            };

            if response.results.len() != pending.len() {
                let err = Error::Correlation(format!(
                    "sent {} records but got {} results",
                    pending.len(),
                    response.results.len()
                ));
                warn!(stream = %self.stream_name, error = %err, "Cannot match results to records");
                return BatchOutcome::request_failed(err, positions, pending, attempts);
            }

            errors.clear();
            let mut rejected_positions = Vec::new();
            let mut rejected = Vec::new();
            for ((position, record), outcome) in positions
                .iter()
                .zip(&pending)
                .zip(&response.results)
            {
                if let SubmissionOutcome::Rejected { error_code, .. } = outcome {
                    *errors.entry(error_code.clone()).or_insert(0) += 1;
                    rejected_positions.push(*position);
                    rejected.push(record.clone());
                }
            }

            if rejected.is_empty() {
                debug!(stream = %self.stream_name, attempts, "Batch delivered");
                return BatchOutcome::new(
                    PublishVerdict::Delivered,
                    Vec::new(),
                    Vec::new(),
                    attempts,
                    HashMap::new(),
                );
            }

            if previous_rejected.as_ref() == Some(&rejected) {
                unchanged += 1;
            } else {
                unchanged = 0;
            }

            if unchanged >= self.config.no_progress_limit {
                warn!(
                    stream = %self.stream_name,
                    attempts,
                    rejected = rejected.len(),
                    ?errors,
                    "Rejected records are not changing, giving up"
                );
                return BatchOutcome::new(
                    PublishVerdict::PermanentRejection,
                    rejected_positions,
                    rejected,
                    attempts,
                    errors,
                );
            }

            warn!(
                stream = %self.stream_name,
                attempt = attempts,
                accepted = pending.len() - rejected.len(),
                rejected = rejected.len(),
                ?errors,
                "Retrying rejected records"
            );
            previous_rejected = Some(rejected.clone());
            positions = rejected_positions;
            pending = rejected;
        }
    }
}
