//! Polling retry loop behind every async query form.
//!
//! [`wait_for`] evaluates a synchronous expectation immediately, then again
//! after every poll interval until it succeeds, the deadline passes, or the
//! tree is unmounted.  Time comes from an injectable [`Clock`]:
//!
//! - [`RealClock`] sleeps on the tokio timer.
//! - [`SimulatedClock`] never moves on its own; the test drives it with
//!   [`SimulatedClock::advance`].
//!
//! Deadlines are fixed when the session starts and measured on the session's
//! clock.  Several sessions may poll the same tree concurrently; they share
//! nothing but the tree.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config;
use crate::errors::{QueryError, Result};
use crate::tree::Tree;

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

/// Floor for the polling interval; every retry must suspend on the clock.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

static REAL_CLOCK_WARNED: AtomicBool = AtomicBool::new(false);

/// Maps the timeout error to the error actually returned.
pub type OnTimeout = Arc<dyn Fn(QueryError) -> QueryError + Send + Sync>;

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Resolve once `delay` has passed on this clock.
    async fn schedule(&self, delay: Duration);

    fn is_simulated(&self) -> bool;
}

/// Wall clock backed by `tokio::time` (honours a paused test runtime).
#[derive(Debug)]
pub struct RealClock {
    origin: Instant,
}

impl RealClock {
    pub fn new() -> Self {
        RealClock {
            origin: Instant::now(),
        }
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for RealClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn schedule(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Manually advanced clock.  Pending `schedule` futures wake once the
/// simulated time reaches their target.
#[derive(Debug)]
pub struct SimulatedClock {
    now: watch::Sender<Duration>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        let (now, _) = watch::channel(Duration::ZERO);
        SimulatedClock { now }
    }

    /// Move simulated time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.send_modify(|now| *now += by);
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> Duration {
        *self.now.borrow()
    }

    async fn schedule(&self, delay: Duration) {
        let mut rx = self.now.subscribe();
        let started = *rx.borrow_and_update();
        let target = started + delay;
        loop {
            let current = *rx.borrow_and_update();
            if current >= target || rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct WaitForOptions {
    /// Defaults to the configured `async_util_timeout`.
    pub timeout: Option<Duration>,
    pub interval: Duration,
    pub on_timeout: Option<OnTimeout>,
}

impl Default for WaitForOptions {
    fn default() -> Self {
        WaitForOptions {
            timeout: None,
            interval: DEFAULT_INTERVAL,
            on_timeout: None,
        }
    }
}

impl WaitForOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        WaitForOptions {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

impl fmt::Debug for WaitForOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitForOptions")
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Retry loop
// ---------------------------------------------------------------------------

fn warn_real_clock_once() {
    if !REAL_CLOCK_WARNED.swap(true, Ordering::Relaxed) {
        log::warn!(
            "wait_for is polling on a real clock; interaction helpers with duration-based \
             delays run faster and more predictably under a SimulatedClock"
        );
    }
}

/// Poll `expectation` until it succeeds, the deadline passes, or `tree` is
/// unmounted.
///
/// Configuration errors are returned at once and never retried.  On timeout
/// the last failure is wrapped in [`QueryError::Timeout`], then handed to
/// `on_timeout` when one is set.
pub async fn wait_for<T, F>(
    tree: &Tree,
    clock: &dyn Clock,
    options: &WaitForOptions,
    mut expectation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let timeout = options
        .timeout
        .unwrap_or_else(|| config::get_config().async_util_timeout);
    if !clock.is_simulated() {
        warn_real_clock_once();
    }

    let mut detached = tree.subscribe_detached();
    let start = clock.now();
    let interval = options.interval.max(MIN_INTERVAL);
    let mut attempts = 0usize;

    let last_error = loop {
        if tree.is_detached() {
            return Err(QueryError::DetachedTree);
        }

        attempts += 1;
        let err = match expectation() {
            Ok(value) => {
                log::debug!("wait_for resolved after {attempts} attempt(s)");
                return Ok(value);
            }
            Err(err @ QueryError::Configuration(_)) => return Err(err),
            Err(err) => err,
        };

        let elapsed = clock.now().saturating_sub(start);
        if elapsed >= timeout {
            break err;
        }
        let delay = interval.min(timeout - elapsed);

        tokio::select! {
            _ = clock.schedule(delay) => {}
            changed = detached.changed() => {
                if changed.is_ok() && *detached.borrow() {
                    return Err(QueryError::DetachedTree);
                }
            }
        }
    };

    log::debug!("wait_for timed out after {attempts} attempt(s) ({timeout:?})");
    let err = QueryError::Timeout {
        last: Some(Box::new(last_error)),
    };
    Err(match &options.on_timeout {
        Some(on_timeout) => on_timeout(err),
        None => err,
    })
}

/// Wait until `expectation` stops yielding a present result.
///
/// The first evaluation must find something; an absent or empty first result
/// is an immediate error.  Errors from later evaluations count as "removed".
pub async fn wait_for_element_to_be_removed<T, F>(
    tree: &Tree,
    clock: &dyn Clock,
    options: &WaitForOptions,
    mut expectation: F,
) -> Result<()>
where
    T: Presence,
    F: FnMut() -> Result<T>,
{
    let initially_present = expectation().map(|v| v.is_present()).unwrap_or(false);
    if !initially_present {
        return Err(QueryError::Expectation(
            "The element(s) given to waitForElementToBeRemoved are already removed. \
             waitForElementToBeRemoved requires that the element(s) exist(s) before waiting \
             for removal."
                .to_owned(),
        ));
    }

    wait_for(tree, clock, options, || match expectation() {
        Ok(value) if value.is_present() => Err(QueryError::Expectation(
            "Timed out in waitForElementToBeRemoved.".to_owned(),
        )),
        _ => Ok(()),
    })
    .await
}

/// Whether a query result counts as "something found".
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl<T> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Presence for Arc<T> {
    fn is_present(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
