use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;

/// Lifecycle of a stream as reported by the service. This crate only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Deleted,
}

impl StreamStatus {
    /// The stream is going away, polling longer cannot make it active.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamStatus::Deleting | StreamStatus::Deleted)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            StreamStatus::Creating => "CREATING",
            StreamStatus::Active => "ACTIVE",
            StreamStatus::Updating => "UPDATING",
            StreamStatus::Deleting => "DELETING",
            StreamStatus::Deleted => "DELETED",
        };
        f.write_str(status)
    }
}

/// A stream as this client knows it. Shard count is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub name: String,
    pub shard_count: i32,
    pub status: StreamStatus,
}

/// A single entry to be appended to the stream. The caller owns the encoding of `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub payload: Bytes,
    pub partition_key: Option<String>,
}

impl Record {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            partition_key: None,
        }
    }

    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Partition key sent on the wire. Records without one get a key derived from the payload, so
    /// a record routes to the same shard on every retry.
    pub fn routing_key(&self) -> String {
        match &self.partition_key {
            Some(key) => key.clone(),
            None => {
                let mut hasher = DefaultHasher::new();
                self.payload.hash(&mut hasher);
                format!("{:016x}", hasher.finish())
            }
        }
    }

    /// Bytes this record counts against the per-request size limit (payload + partition key).
    pub fn encoded_len(&self) -> usize {
        let key_len = match &self.partition_key {
            Some(key) => key.len(),
            None => 16,
        };
        self.payload.len() + key_len
    }
}

/// Per-entry result of a put. Position `i` in a response describes position `i` of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted {
        sequence_number: String,
        shard_id: String,
    },
    Rejected {
        error_code: String,
        error_message: String,
    },
}

impl SubmissionOutcome {
    /// Builds an outcome from the raw result entry fields. An entry is a rejection exactly when
    /// its error code is present and non-empty.
    pub fn from_entry(
        sequence_number: Option<String>,
        shard_id: Option<String>,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        match error_code.filter(|code| !code.is_empty()) {
            Some(error_code) => SubmissionOutcome::Rejected {
                error_code,
                error_message: error_message.unwrap_or_default(),
            },
            None => SubmissionOutcome::Accepted {
                sequence_number: sequence_number.unwrap_or_default(),
                shard_id: shard_id.unwrap_or_default(),
            },
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SubmissionOutcome::Rejected { .. })
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Rejected { error_code, .. } => Some(error_code),
            SubmissionOutcome::Accepted { .. } => None,
        }
    }
}

/// Response to one put request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PutRecordsResponse {
    /// Service-reported number of rejected entries, informational only.
    pub failed_count: usize,
    pub results: Vec<SubmissionOutcome>,
}
