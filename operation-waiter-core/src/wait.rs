//! The poll loop: completion check, refresh step and the bounded wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::WaitOptions;
use crate::error::{RefreshError, TransportError, WaitError};
use crate::retry::RetryPolicy;
use crate::waiter::{QueryFailure, Waiter};

/// Used when `start + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Result of one successful refresh step.
#[derive(Debug, Clone)]
pub struct Refreshed<P> {
    pub payload: P,
    pub state: String,
    /// Retryable query failure that still came back with a payload.
    pub transient_error: Option<TransportError>,
}

/// Whether the waiter's current state is one of its target states.
///
/// No I/O; calling it repeatedly on an unchanged waiter gives the same answer.
pub fn is_done<W: Waiter + ?Sized>(waiter: &W) -> bool {
    let state = waiter.state();
    waiter.target_states().contains(&state.as_str())
}

/// One query, classify and update cycle.
///
/// Retryable failures that come back with a payload are absorbed and the
/// (possibly stale) payload is applied. Everything else that can go wrong is
/// returned as a [`RefreshError`] and ends the wait.
pub async fn refresh<W: Waiter>(
    waiter: &mut W,
    retry_policy: &dyn RetryPolicy,
) -> Result<Refreshed<W::Payload>, RefreshError> {
    let (payload, transient_error) = match waiter.query_op().await {
        Ok(payload) => (payload, None),
        Err(QueryFailure { error, payload }) => {
            if !retry_policy.is_retryable(&error) {
                return Err(RefreshError::NotRetriable(error));
            }
            log::debug!(
                "Saw error polling for operation {}, but dismissed as retriable: {error}",
                waiter.op_name()
            );
            match payload {
                Some(payload) => (payload, Some(error)),
                None => return Err(RefreshError::NilOperation(error)),
            }
        }
    };

    waiter.set_op(&payload)?;

    if let Some(err) = waiter.error() {
        return Err(err.into());
    }

    let state = waiter.state();
    log::debug!(
        "Got {state} while polling for operation {}'s status",
        waiter.op_name()
    );

    Ok(Refreshed {
        payload,
        state,
        transient_error,
    })
}

/// Block until the operation held by `waiter` reaches a target state.
///
/// Convenience for [`operation_wait_with`] using default options and a
/// timeout in minutes.
pub async fn operation_wait<W: Waiter>(
    waiter: &mut W,
    activity: &str,
    timeout_minutes: u64,
) -> Result<(), WaitError> {
    operation_wait_with(waiter, activity, &WaitOptions::from_minutes(timeout_minutes)).await
}

/// Block until the operation held by `waiter` reaches a target state, fails,
/// or `options.timeout` elapses.
///
/// If the waiter is already done no query is made and the embedded error, if
/// any, is returned directly. Otherwise the waiter is refreshed with growing
/// pauses in between. On success the last payload is applied once more so the
/// waiter holds the final snapshot.
pub async fn operation_wait_with<W: Waiter>(
    waiter: &mut W,
    activity: &str,
    options: &WaitOptions,
) -> Result<(), WaitError> {
    if is_done(waiter) {
        return match waiter.error() {
            Some(source) => Err(WaitError::Operation {
                activity: activity.to_string(),
                source,
            }),
            None => Ok(()),
        };
    }

    let payload = wait_for_target(waiter, activity, options).await?;

    waiter
        .set_op(&payload)
        .map_err(|source| WaitError::Conversion {
            activity: activity.to_string(),
            source,
        })?;

    if let Some(source) = waiter.error() {
        return Err(WaitError::Operation {
            activity: activity.to_string(),
            source,
        });
    }

    Ok(())
}

async fn wait_for_target<W: Waiter>(
    waiter: &mut W,
    activity: &str,
    options: &WaitOptions,
) -> Result<W::Payload, WaitError> {
    let targets = owned(waiter.target_states());
    let pending = owned(waiter.pending_states());
    let token = options.cancellation.as_ref();

    let started = Instant::now();
    let deadline = started
        .checked_add(options.timeout)
        .unwrap_or(started + FAR_FUTURE);

    let mut last_state = waiter.state();
    let mut last_error: Option<TransportError> = None;
    let timed_out = |last_state: String, last_error: Option<TransportError>| {
        log::debug!("Timed out waiting for {activity} after {:?}", started.elapsed());
        WaitError::Timeout {
            activity: activity.to_string(),
            last_state,
            targets: targets.clone(),
            timeout: options.timeout,
            last_error,
        }
    };
    let cancelled = || WaitError::Cancelled {
        activity: activity.to_string(),
    };

    log::debug!(
        "Waiting for {activity} (operation {}) to become: {targets:?}",
        waiter.op_name()
    );

    if !options.initial_delay.is_zero() {
        let wake = wake_at(started, options.initial_delay, deadline);
        cancellable(token, time::sleep_until(wake))
            .await
            .ok_or_else(cancelled)?;
    }

    let mut delays = options.backoff.delays();
    loop {
        if token.is_some_and(CancellationToken::is_cancelled) {
            return Err(cancelled());
        }
        if Instant::now() >= deadline {
            return Err(timed_out(last_state, last_error));
        }

        let attempt = time::timeout_at(deadline, refresh(&mut *waiter, options.retry_policy()));
        let refreshed = match cancellable(token, attempt).await {
            None => return Err(cancelled()),
            Some(Err(_elapsed)) => return Err(timed_out(last_state, last_error)),
            Some(Ok(result)) => result.map_err(|e| e.into_wait_error(activity))?,
        };

        if refreshed.transient_error.is_some() {
            last_error = refreshed.transient_error;
        }

        if targets.contains(&refreshed.state) {
            return Ok(refreshed.payload);
        }
        if !pending.contains(&refreshed.state) {
            return Err(WaitError::UnexpectedState {
                activity: activity.to_string(),
                operation: waiter.op_name(),
                state: refreshed.state,
                targets: targets.clone(),
            });
        }
        last_state = refreshed.state;

        let delay = delays.next().unwrap_or(options.backoff.max_interval());
        let wake = wake_at(Instant::now(), delay, deadline);
        cancellable(token, time::sleep_until(wake))
            .await
            .ok_or_else(cancelled)?;
    }
}

/// `from + delay`, never past `deadline`.
fn wake_at(from: Instant, delay: Duration, deadline: Instant) -> Instant {
    from.checked_add(delay)
        .map_or(deadline, |wake| wake.min(deadline))
}

/// Run `fut` to completion unless `token` is cancelled first.
async fn cancellable<F: Future>(token: Option<&CancellationToken>, fut: F) -> Option<F::Output> {
    match token {
        Some(token) => tokio::select! {
            () = token.cancelled() => None,
            out = fut => Some(out),
        },
        None => Some(fut.await),
    }
}

fn owned(states: &[&str]) -> Vec<String> {
    states.iter().map(|s| (*s).to_string()).collect()
}
