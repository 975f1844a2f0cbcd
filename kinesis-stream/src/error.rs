use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the stream client can surface. Callers branch on the variant, the message is for
/// humans only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Local configuration is unusable (missing or malformed setting).
    #[error("Config Error - {0}")]
    Config(String),

    /// A stream with this name already exists in a state incompatible with creation.
    #[error("Stream Already Exists - {0}")]
    AlreadyExists(String),

    /// The service refused the stream parameters (shard count, name).
    #[error("Invalid Stream Config - {0}")]
    InvalidConfig(String),

    #[error("Throttled By Service - {0}")]
    ThrottledByService(String),

    /// Transport failure, timeout, or a service-side fault.
    #[error("Service Unavailable - {0}")]
    ServiceUnavailable(String),

    #[error("Resource Not Found - {0}")]
    ResourceNotFound(String),

    /// The whole request was rejected as malformed.
    #[error("Invalid Argument - {0}")]
    InvalidArgument(String),

    /// The response cannot be lined up with the request entry by entry.
    #[error("Correlation Error - {0}")]
    Correlation(String),
}

impl Error {
    /// Throttling and unavailability may clear up on their own, everything else will not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ThrottledByService(_) | Error::ServiceUnavailable(_)
        )
    }

    /// Stable name of the variant, used to group failures in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "Config",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::ThrottledByService(_) => "ThrottledByService",
            Error::ServiceUnavailable(_) => "ServiceUnavailable",
            Error::ResourceNotFound(_) => "ResourceNotFound",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::Correlation(_) => "Correlation",
        }
    }
}
