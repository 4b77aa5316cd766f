//! Per-node retry with exponential backoff and jitter.
//!
//! The engine never retries on its own: a failing node fails the run. Wrap
//! an action in [`RetryAction`] when transient failures (rate limits, flaky
//! model endpoints) should be absorbed inside the node instead. Loops that
//! *inspect* a failure and route back are better modeled as graph cycles.

use crate::error::{GraphError, Result};
use crate::exec_ctx::ExecCtx;
use crate::node::{BoxFut, NodeAction};
use crate::state::GraphState;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Decides whether an error is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&GraphError) -> bool + Send + Sync>;

/// Backoff schedule for [`RetryAction`].
///
/// # Example
///
/// ```
/// use llm_graph::retry::BackoffConfig;
///
/// let none = BackoffConfig::none();
/// assert_eq!(none.max_retries, 0);
///
/// let standard = BackoffConfig::standard();
/// assert_eq!(standard.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Retries after the first attempt. Default: 0.
    pub max_retries: u32,

    /// Delay before the first retry. Default: 1 second.
    pub initial_delay: Duration,

    /// Growth factor per retry. Default: 2.0.
    pub multiplier: f64,

    /// Upper bound on any single delay. Default: 60 seconds.
    pub max_delay: Duration,

    /// Default: Full.
    pub jitter: JitterStrategy,
}

/// Randomization applied to each computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Exactly the computed delay.
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// `delay/2` plus uniform in `[0, delay/2]`.
    Equal,
}

impl BackoffConfig {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// 3 retries, 1s initial, 2x growth, 60s cap, full jitter.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::Full,
        }
    }

    /// 2 retries, 500ms initial, 10s cap. For a user waiting on the run.
    pub fn interactive() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
            jitter: JitterStrategy::Full,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `initial_delay * multiplier^attempt`, capped, then jittered.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };
        Duration::from_secs_f64(jittered)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Wraps a [`NodeAction`], re-invoking it from the same input state when
/// it fails.
///
/// Cancellation is never retried, and a cancel during a backoff sleep
/// ends the wait immediately.
///
/// # Example
///
/// ```
/// use llm_graph::retry::{BackoffConfig, RetryAction};
/// use llm_graph::node::sync_fn;
///
/// let flaky = RetryAction::new(sync_fn(Ok), BackoffConfig::standard())
///     .retry_if(|e| e.to_string().contains("rate limit"));
/// ```
pub struct RetryAction {
    inner: Arc<dyn NodeAction>,
    backoff: BackoffConfig,
    retry_if: Option<RetryPredicate>,
}

impl RetryAction {
    pub fn new(inner: impl NodeAction + 'static, backoff: BackoffConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            backoff,
            retry_if: None,
        }
    }

    /// Only retry errors matching `predicate`. Default: every error
    /// except cancellation.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&GraphError) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    fn should_retry(&self, err: &GraphError) -> bool {
        !err.is_cancelled() && self.retry_if.as_ref().map_or(true, |p| p(err))
    }
}

impl NodeAction for RetryAction {
    fn kind(&self) -> &'static str {
        "retry"
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, state: GraphState) -> BoxFut<'a, Result<GraphState>> {
        Box::pin(async move {
            let mut attempt = 0u32;
            loop {
                let err = match self.inner.invoke(ctx, state.clone()).await {
                    Ok(next) => return Ok(next),
                    Err(e) => e,
                };
                if attempt >= self.backoff.max_retries || !self.should_retry(&err) {
                    return Err(err);
                }

                let delay = self.backoff.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    node = %state.current_node,
                    attempt,
                    max_retries = self.backoff.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying node"
                );
                tokio::select! {
                    _ = ctx.cancellation.cancelled() => return Err(GraphError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        })
    }
}
