//! Backoff schedules and a retrying future for calls against the stream service.
//!
//! A schedule is an [`Iterator`] of [`std::time::Duration`]s (see [`strategy`]); running out of
//! items means running out of retries. [`retry::Retry`] drives an [`Operation`] against such a
//! schedule and consults a [`Condition`] to decide whether a given error is worth another go.
//!
//! ```rust
//! use backoff::retry::Retry;
//! use backoff::strategy::fixed;
//!
//! async fn create() -> Result<&'static str, &'static str> {
//!     Ok("created")
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let schedule = fixed::Interval::from_millis(10).take(3);
//!     let outcome = Retry::new(schedule, create, |_: &&str| true).await;
//!     assert_eq!(outcome, Ok("created"));
//! }
//! ```

use std::future::Future;

/// Backoff strategies. Each one is an iterator of delays, bound it with
/// [`take`](Iterator::take) to cap the number of retries.
pub mod strategy;

/// Retry an [`Operation`] until it succeeds, the [`Condition`] says stop, or the schedule ends.
pub mod retry;

/// Decides whether an error is retryable. Returning `false` ends the retry loop with that error.
pub trait Condition<E> {
    fn can_retry(&self, error: &E) -> bool;
}

impl<E, F> Condition<E> for F
where
    F: Fn(&E) -> bool,
{
    fn can_retry(&self, error: &E) -> bool {
        self(error)
    }
}

/// Something that produces a fresh [`Future`] every time it is run, so it can be attempted again
/// after a failure.
pub trait Operation {
    type Item;
    type Error;
    type Future: Future<Output = Result<Self::Item, Self::Error>>;

    #[must_use = "futures do nothing unless you `.await` or poll them"]
    fn run(&mut self) -> Self::Future;
}

/// Any `FnMut` returning a fallible future is an [`Operation`].
impl<T, E, R, F> Operation for F
where
    R: Future<Output = Result<T, E>>,
    F: FnMut() -> R,
{
    type Item = T;
    type Error = E;
    type Future = R;

    fn run(&mut self) -> Self::Future {
        self()
    }
}
