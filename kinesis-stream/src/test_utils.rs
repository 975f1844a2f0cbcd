//! In-memory stand-in for the stream service, scripted per test.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::record::{PutRecordsResponse, Record, StreamStatus, SubmissionOutcome};
use crate::service::StreamService;

type RejectFn = Box<dyn Fn(usize, &Record) -> Option<String> + Send + Sync>;

/// Scripted [`StreamService`].
///
/// `describe_stream` replays `statuses` front to back and keeps answering with the last entry
/// once the script runs dry. `put_records` first replays queued wholesale errors, then fails the
/// calls marked as failing, then asks the rejection rule about every record; the rule receives the
/// 1-based put call number.
pub(crate) struct SimulatedService {
    create_result: Mutex<Option<Error>>,
    statuses: Mutex<VecDeque<Result<StreamStatus>>>,
    last_status: Mutex<Option<Result<StreamStatus>>>,
    put_errors: Mutex<VecDeque<Error>>,
    failing_calls: HashMap<usize, Error>,
    reject: RejectFn,
    put_delay: Option<Duration>,
    drop_last_result: bool,
    pub(crate) describe_calls: Mutex<usize>,
    pub(crate) put_calls: Mutex<Vec<Vec<Record>>>,
    pub(crate) created: Mutex<Vec<(String, i32)>>,
}

impl Default for SimulatedService {
    fn default() -> Self {
        Self {
            create_result: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(None),
            put_errors: Mutex::new(VecDeque::new()),
            failing_calls: HashMap::new(),
            reject: Box::new(|_, _| None),
            put_delay: None,
            drop_last_result: false,
            describe_calls: Mutex::new(0),
            put_calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        }
    }
}

impl SimulatedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_create_error(self, err: Error) -> Self {
        *self.create_result.lock().unwrap() = Some(err);
        self
    }

    pub(crate) fn with_statuses(self, statuses: Vec<Result<StreamStatus>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub(crate) fn with_put_errors(self, errors: Vec<Error>) -> Self {
        *self.put_errors.lock().unwrap() = errors.into();
        self
    }

    /// Fail the `call`-th put (1-based) as a whole with `err`.
    pub(crate) fn with_put_error_on_call(mut self, call: usize, err: Error) -> Self {
        self.failing_calls.insert(call, err);
        self
    }

    pub(crate) fn with_rejections(
        mut self,
        reject: impl Fn(usize, &Record) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.reject = Box::new(reject);
        self
    }

    pub(crate) fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// Answer every put with one result too few.
    pub(crate) fn with_short_responses(mut self) -> Self {
        self.drop_last_result = true;
        self
    }

    pub(crate) fn put_call_count(&self) -> usize {
        self.put_calls.lock().unwrap().len()
    }

    pub(crate) fn describe_call_count(&self) -> usize {
        *self.describe_calls.lock().unwrap()
    }
}

impl StreamService for SimulatedService {
    async fn create_stream(&self, name: &str, shard_count: i32) -> Result<()> {
        if let Some(err) = self.create_result.lock().unwrap().clone() {
            return Err(err);
        }
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), shard_count));
        Ok(())
    }

    async fn describe_stream(&self, _name: &str) -> Result<StreamStatus> {
        *self.describe_calls.lock().unwrap() += 1;
        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last_status.lock().unwrap();
        match next {
            Some(status) => {
                *last = Some(status.clone());
                status
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(Error::ResourceNotFound("no status scripted".into()))),
        }
    }

    async fn put_records(
        &self,
        _stream_name: &str,
        records: &[Record],
    ) -> Result<PutRecordsResponse> {
        let call = {
            let mut calls = self.put_calls.lock().unwrap();
            calls.push(records.to_vec());
            calls.len()
        };

        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.put_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        if let Some(err) = self.failing_calls.get(&call) {
            return Err(err.clone());
        }

        let mut results: Vec<SubmissionOutcome> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| match (self.reject)(call, record) {
                Some(code) => SubmissionOutcome::Rejected {
                    error_message: format!("simulated rejection of {code}"),
                    error_code: code,
                },
                None => SubmissionOutcome::Accepted {
                    sequence_number: format!("{call:04}{idx:06}"),
                    shard_id: "shardId-000000000000".to_string(),
                },
            })
            .collect();

        if self.drop_last_result {
            results.pop();
        }

        Ok(PutRecordsResponse {
            failed_count: results.iter().filter(|r| r.is_rejected()).count(),
            results,
        })
    }
}

/// Records `0..n` with payloads `"{i * 4}"`, the demo workload.
pub(crate) fn numbered_records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::new((i * 4).to_string()).with_partition_key(format!("key-{i}")))
        .collect()
}
