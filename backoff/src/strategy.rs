/// Constant delay between attempts, used for status polling.
pub mod fixed;

/// Exponentially growing delay with jitter, used between publish retries.
pub mod exponential;
