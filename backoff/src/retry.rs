use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;
use tokio::time::{Instant, Sleep, sleep_until};

use crate::{Condition, Operation};

/// Either the operation is in flight or we are waiting out the next delay of the schedule.
///
/// ```no_rust
///  Attempting --Ok--------------------------> Ready(Ok)
///      |
///      +--Err, condition says stop----------> Ready(Err)
///      |
///      +--Err, retryable, schedule empty----> Ready(Err)
///      |
///      +--Err, retryable, next delay d------> Waiting(d) --elapsed--> Attempting
/// ```
#[pin_project(project = PhaseProj)]
enum Phase<O>
where
    O: Operation,
{
    Attempting(#[pin] O::Future),
    Waiting(#[pin] Sleep),
}

/// Future that re-runs `operation` on retryable failures, sleeping according to `schedule`.
#[pin_project]
pub struct Retry<S, O, C>
where
    O: Operation,
{
    #[pin]
    phase: Phase<O>,
    schedule: S,
    operation: O,
    condition: C,
}

impl<S, O, C> Retry<S, O, C>
where
    S: Iterator<Item = Duration>,
    O: Operation,
    C: Condition<O::Error>,
{
    /// Starts the first attempt immediately; `schedule` only governs the gaps between attempts.
    pub fn new<IS>(schedule: IS, mut operation: O, condition: C) -> Self
    where
        IS: IntoIterator<IntoIter = S, Item = Duration>,
    {
        Self {
            phase: Phase::Attempting(operation.run()),
            schedule: schedule.into_iter(),
            operation,
            condition,
        }
    }
}

impl<S, O, C> Future for Retry<S, O, C>
where
    S: Iterator<Item = Duration>,
    O: Operation,
    C: Condition<O::Error>,
{
    type Output = Result<O::Item, O::Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            let this = self.as_mut().project();
            let next_phase = match this.phase.project() {
                PhaseProj::Attempting(attempt) => match attempt.poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(item)) => return Poll::Ready(Ok(item)),
                    Poll::Ready(Err(err)) => {
                        if !this.condition.can_retry(&err) {
                            return Poll::Ready(Err(err));
                        }
                        match this.schedule.next() {
                            None => return Poll::Ready(Err(err)),
                            Some(delay) => Phase::Waiting(sleep_until(Instant::now() + delay)),
                        }
                    }
                },
                PhaseProj::Waiting(sleep) => match sleep.poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(()) => Phase::Attempting(this.operation.run()),
                },
            };
            self.as_mut().project().phase.set(next_phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::strategy::fixed;

    #[derive(Debug, PartialEq)]
    enum CallError {
        Throttled,
        Fatal,
    }

    fn counting_failure(
        calls: Arc<AtomicUsize>,
        error_after: usize,
    ) -> impl FnMut() -> future::Ready<Result<(), CallError>> {
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= error_after {
                future::ready(Err(CallError::Fatal))
            } else {
                future::ready(Err(CallError::Throttled))
            }
        }
    }

    #[tokio::test]
    async fn first_attempt_succeeds() {
        let outcome = Retry::new(
            fixed::Interval::from_millis(1),
            || future::ready(Ok::<_, CallError>(7)),
            |_: &CallError| true,
        )
        .await;
        assert_eq!(outcome, Ok(7));
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = Retry::new(
            fixed::Interval::from_millis(1).take(10),
            counting_failure(Arc::clone(&calls), 3),
            |e: &CallError| *e == CallError::Throttled,
        )
        .await;

        assert_eq!(outcome, Err(CallError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_schedule_ends() {
        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = Retry::new(
            fixed::Interval::from_millis(100).take(4),
            counting_failure(Arc::clone(&calls), usize::MAX),
            |_: &CallError| true,
        )
        .await;

        assert_eq!(outcome, Err(CallError::Throttled));
        // one initial attempt plus one per scheduled delay
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let started = Instant::now();

        let outcome = Retry::new(
            fixed::Interval::from_millis(250).take(5),
            move || {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                future::ready(if call < 3 {
                    Err(CallError::Throttled)
                } else {
                    Ok(call)
                })
            },
            |_: &CallError| true,
        )
        .await;

        assert_eq!(outcome, Ok(3));
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
