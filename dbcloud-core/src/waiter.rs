//! Waiter - Poll a remote resource until its status settles
//!
//! The service exposes no completion notification for long-running
//! operations (cluster creation, backups, exports, ...). Handlers issue the
//! request and then block on a [`StateWaiter`], which repeatedly calls an
//! accessor and classifies the returned status:
//!
//! - a `target` status ends the wait successfully with the fetched snapshot
//! - a `pending` status sleeps for the poll interval and tries again
//! - anything else fails immediately with [`WaitError::UnexpectedState`]
//!
//! Accessor errors abort the wait and are returned as-is. The whole loop
//! runs under a single deadline; the returned future can also be dropped
//! to cancel it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

/// Default overall timeout for a wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Default lower bound between two status checks
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Default delay between two status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Errors returned by [`StateWaiter::wait`]
#[derive(Debug, Error)]
pub enum WaitError<E> {
    /// The accessor failed; polling stopped at the first failure
    #[error(transparent)]
    Fetch(E),

    /// The resource reported a status outside both the pending and target sets
    #[error("unexpected state '{status}' for {id}, wanted one of: {expected}")]
    UnexpectedState {
        id: String,
        status: String,
        expected: String,
    },

    /// The resource stayed pending past the deadline
    #[error(
        "timeout after {timeout:?} waiting for {id} to become {expected} (last state: {})",
        .last_status.as_deref().unwrap_or("none")
    )]
    Timeout {
        id: String,
        last_status: Option<String>,
        expected: String,
        timeout: Duration,
    },
}

impl<E> WaitError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    /// Last status observed before the wait failed, if any
    pub fn last_status(&self) -> Option<&str> {
        match self {
            WaitError::Fetch(_) => None,
            WaitError::UnexpectedState { status, .. } => Some(status),
            WaitError::Timeout { last_status, .. } => last_status.as_deref(),
        }
    }
}

/// How a single observed status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Target,
    Unexpected,
}

/// Polling configuration for one kind of state transition
#[derive(Debug, Clone)]
pub struct StateWaiter<S> {
    pending: Vec<S>,
    target: Vec<S>,
    timeout: Duration,
    min_interval: Duration,
    poll_interval: Duration,
}

impl<S> StateWaiter<S>
where
    S: PartialEq + fmt::Display,
{
    /// Create a waiter for the transition `pending -> target`.
    ///
    /// If a status appears in both sets, the target classification wins.
    pub fn new(
        pending: impl IntoIterator<Item = S>,
        target: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            pending: pending.into_iter().collect(),
            target: target.into_iter().collect(),
            timeout: DEFAULT_TIMEOUT,
            min_interval: DEFAULT_MIN_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Effective delay between checks (`poll_interval`, floored at `min_interval`)
    pub fn interval(&self) -> Duration {
        self.poll_interval.max(self.min_interval)
    }

    pub fn classify(&self, status: &S) -> Phase {
        if self.target.contains(status) {
            Phase::Target
        } else if self.pending.contains(status) {
            Phase::Pending
        } else {
            Phase::Unexpected
        }
    }

    fn expected(&self) -> String {
        self.target
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Poll `fetch` until the resource identified by `id` reaches a target status.
    ///
    /// `fetch` receives the id on every call and returns the current snapshot
    /// together with its status. On success the snapshot from the final call
    /// is returned.
    pub async fn wait<R, E, F, Fut>(&self, id: &str, mut fetch: F) -> Result<R, WaitError<E>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<(R, S), E>>,
    {
        let interval = self.interval();
        let mut last_status: Option<String> = None;

        let polling = async {
            let mut attempt: u32 = 0;
            loop {
                attempt += 1;
                let (resource, status) = match fetch(id.to_string()).await {
                    Ok(snapshot) => snapshot,
                    Err(err) => return Err(WaitError::Fetch(err)),
                };
                let status_str = status.to_string();
                if last_status.as_deref() != Some(status_str.as_str()) {
                    info!("{} is now {}", id, status_str);
                }
                last_status = Some(status_str);

                match self.classify(&status) {
                    Phase::Target => return Ok(resource),
                    Phase::Pending => {
                        debug!(
                            "{} still {} after {} check(s), next check in {:?}",
                            id, status, attempt, interval
                        );
                        tokio::time::sleep(interval).await;
                    }
                    Phase::Unexpected => {
                        return Err(WaitError::UnexpectedState {
                            id: id.to_string(),
                            status: status.to_string(),
                            expected: self.expected(),
                        });
                    }
                }
            }
        };

        let outcome = tokio::time::timeout(self.timeout, polling).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(WaitError::Timeout {
                id: id.to_string(),
                last_status,
                expected: self.expected(),
                timeout: self.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Error, PartialEq)]
    #[error("connection reset by peer")]
    struct FetchFailed;

    fn creating_to_active() -> StateWaiter<&'static str> {
        StateWaiter::new(["CREATING"], ["ACTIVE"])
            .with_timeout(Duration::from_secs(600))
            .with_min_interval(Duration::from_secs(1))
            .with_poll_interval(Duration::from_secs(5))
    }

    #[test]
    fn classify_statuses() {
        let waiter = creating_to_active();
        assert_eq!(waiter.classify(&"CREATING"), Phase::Pending);
        assert_eq!(waiter.classify(&"ACTIVE"), Phase::Target);
        assert_eq!(waiter.classify(&"DELETING"), Phase::Unexpected);
    }

    #[test]
    fn target_wins_when_sets_overlap() {
        let waiter = StateWaiter::new(["ACTIVE", "MODIFYING"], ["ACTIVE"]);
        assert_eq!(waiter.classify(&"ACTIVE"), Phase::Target);
    }

    #[test]
    fn interval_is_floored_by_min_interval() {
        let waiter = StateWaiter::new(["CREATING"], ["ACTIVE"])
            .with_min_interval(Duration::from_secs(10))
            .with_poll_interval(Duration::from_secs(2));
        assert_eq!(waiter.interval(), Duration::from_secs(10));

        let waiter = waiter.with_poll_interval(Duration::from_secs(30));
        assert_eq!(waiter.interval(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target_after_pending_polls() {
        let waiter = creating_to_active();
        let statuses = ["CREATING", "CREATING", "ACTIVE"];
        let mut calls = 0;
        let started = tokio::time::Instant::now();

        let result = waiter
            .wait("cluster-1", |id| {
                let status = statuses[calls];
                calls += 1;
                async move { Ok::<_, FetchFailed>((format!("{}@{}", id, status), status)) }
            })
            .await;

        assert_eq!(result.unwrap(), "cluster-1@ACTIVE");
        assert_eq!(calls, 3);
        // two sleeps of the poll interval between the three checks
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_pending_outlasts_deadline() {
        let waiter = StateWaiter::new(["CREATING"], ["ACTIVE"])
            .with_timeout(Duration::from_secs(1))
            .with_min_interval(Duration::from_millis(100))
            .with_poll_interval(Duration::from_secs(2));
        let mut calls = 0;

        let result = waiter
            .wait("cluster-1", |_| {
                calls += 1;
                async { Ok::<_, FetchFailed>(((), "CREATING")) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.last_status(), Some("CREATING"));
        assert_eq!(calls, 1);
        assert!(err.to_string().contains("last state: CREATING"));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_many_pending_polls() {
        let waiter = creating_to_active().with_timeout(Duration::from_secs(58));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = waiter
            .wait("cluster-1", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, FetchFailed>(((), "CREATING")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Timeout { ref id, .. } if id == "cluster-1"));
        // checks at 0s, 5s, ..., 55s
        assert_eq!(calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_stops_polling_immediately() {
        let waiter = creating_to_active();
        let mut calls = 0;

        let err = waiter
            .wait("cluster-1", |_| {
                calls += 1;
                let result = if calls == 1 {
                    Ok(((), "CREATING"))
                } else {
                    Err(FetchFailed)
                };
                async move { result }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Fetch(FetchFailed)));
        assert_eq!(err.to_string(), "connection reset by peer");
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_error_makes_no_further_calls() {
        let waiter = creating_to_active();
        let mut calls = 0;

        let err = waiter
            .wait("cluster-1", |_| {
                calls += 1;
                async { Err::<((), &str), _>(FetchFailed) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Fetch(_)));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_is_rejected_on_first_call() {
        let waiter = creating_to_active();
        let mut calls = 0;

        let err = waiter
            .wait("cluster-1", |_| {
                calls += 1;
                async { Ok::<_, FetchFailed>(((), "UNKNOWN_STATE")) }
            })
            .await
            .unwrap_err();

        match &err {
            WaitError::UnexpectedState { id, status, .. } => {
                assert_eq!(id, "cluster-1");
                assert_eq!(status, "UNKNOWN_STATE");
            }
            other => panic!("Expected UnexpectedState, got {:?}", other),
        }
        assert_eq!(calls, 1);
        assert_eq!(
            err.to_string(),
            "unexpected state 'UNKNOWN_STATE' for cluster-1, wanted one of: ACTIVE"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_status_after_pending_fails_fast() {
        let waiter = creating_to_active();
        let statuses = ["CREATING", "DELETING", "ACTIVE"];
        let mut calls = 0;

        let err = waiter
            .wait("cluster-1", |_| {
                let status = statuses[calls];
                calls += 1;
                async move { Ok::<_, FetchFailed>(((), status)) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.last_status(), Some("DELETING"));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_waits_on_settled_resource_are_identical() {
        let waiter = creating_to_active();

        for _ in 0..2 {
            let mut calls = 0;
            let result = waiter
                .wait("cluster-1", |id| {
                    calls += 1;
                    async move { Ok::<_, FetchFailed>((id, "ACTIVE")) }
                })
                .await;
            assert_eq!(result.unwrap(), "cluster-1");
            assert_eq!(calls, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn independent_waits_run_concurrently() {
        let waiter = creating_to_active();

        let first = waiter.wait("a", |id| async move { Ok::<_, FetchFailed>((id, "ACTIVE")) });
        let second = waiter.wait("b", |id| async move { Ok::<_, FetchFailed>((id, "ACTIVE")) });
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a.unwrap(), "a");
        assert_eq!(b.unwrap(), "b");
    }
}
