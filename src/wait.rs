//! Polling until a remote object reaches an expected state.
//!
//! The Identity Toolkit is eventually consistent: a freshly created user can be
//! missing from lookups for a short while, and a deleted one can linger.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::debug;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum WaitError<S: Debug, E> {
    #[error("timeout while waiting for state to become {expected:?} (last state: {last_state:?}, timeout: {timeout:?})")]
    Timeout {
        last_state: Option<S>,
        expected: Vec<S>,
        timeout: Duration,
    },
    #[error("unexpected state {state:?}, wanted target {expected:?}")]
    UnexpectedState { state: S, expected: Vec<S> },
    #[error(transparent)]
    Refresh(E),
}

#[derive(Debug, Clone)]
pub struct StateChangeConf<S> {
    pub pending: Vec<S>,
    pub target: Vec<S>,
    /// Wait before the first refresh.
    pub delay: Duration,
    /// Smallest wait between refreshes.
    pub min_timeout: Duration,
    pub timeout: Duration,
}

impl<S: PartialEq + Debug + Clone> StateChangeConf<S> {
    /// Calls `refresh` until it reports a target state.
    ///
    /// `refresh` returns the observed object (if any) and its state. A refresh
    /// error stops the wait immediately, and a refresh still running at the
    /// deadline is abandoned.
    pub async fn wait_for_state<T, E, F, Fut>(
        &self,
        mut refresh: F,
    ) -> Result<Option<T>, WaitError<S, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(Option<T>, S), E>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_state = None;
        let mut backoff = INITIAL_BACKOFF;

        let mut wait = self.delay;
        loop {
            if Instant::now() + wait > deadline {
                return Err(self.timed_out(last_state));
            }
            sleep(wait).await;

            let (value, state) = match timeout_at(deadline, refresh()).await {
                Ok(refreshed) => refreshed.map_err(WaitError::Refresh)?,
                Err(_) => return Err(self.timed_out(last_state)),
            };
            debug!(?state, "refreshed state");

            if self.target.contains(&state) {
                return Ok(value);
            }
            if !self.pending.contains(&state) {
                return Err(WaitError::UnexpectedState {
                    state,
                    expected: self.target.clone(),
                });
            }

            last_state = Some(state);
            wait = backoff.max(self.min_timeout);
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    fn timed_out<E>(&self, last_state: Option<S>) -> WaitError<S, E> {
        WaitError::Timeout {
            last_state,
            expected: self.target.clone(),
            timeout: self.timeout,
        }
    }
}
