//! Execution context shared across node invocations.
//!
//! [`ExecCtx`] carries the run id, cancellation token, and event bus. It is
//! constructed once per top-level execution and handed to every node
//! action and every forked branch.

use crate::events::{Event, EventBus, EventHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared execution context for node actions.
///
/// Cloning is cheap: the token and handlers are reference counted, and a
/// clone observes the same cancellation as the original.
///
/// # Example
///
/// ```
/// use llm_graph::ExecCtx;
///
/// let ctx = ExecCtx::builder()
///     .run_id("ticket-42")
///     .build();
/// assert_eq!(ctx.run_id, "ticket-42");
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Identifier of this execution. Used as the checkpoint id when
    /// auto-checkpointing is enabled.
    pub run_id: String,
    /// Cancellation token; actions should honor it for long I/O.
    pub cancellation: CancellationToken,
    /// Subscribed lifecycle observers.
    pub events: EventBus,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder() -> ExecCtxBuilder {
        ExecCtxBuilder {
            run_id: None,
            cancellation: None,
            events: EventBus::new(),
            deadline: None,
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            return Err(crate::GraphError::Cancelled);
        }
        Ok(())
    }

    /// Request cancellation of this execution and every branch sharing it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Emit a streaming chunk on behalf of `node`.
    pub fn stream(&self, node: &str, chunk: impl Into<String>) {
        self.events.emit(Event::Streaming {
            node: node.to_string(),
            chunk: chunk.into(),
        });
    }

    pub(crate) fn emit(&self, event: Event) {
        self.events.emit(event);
    }
}

impl Default for ExecCtx {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    run_id: Option<String>,
    cancellation: Option<CancellationToken>,
    events: EventBus,
    deadline: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the run id. Default: a random UUID v4.
    pub fn run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    /// Use an externally owned cancellation token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Subscribe an event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events.subscribe(handler);
        self
    }

    /// Subscribe a closure as an event handler.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.subscribe_fn(f);
        self
    }

    /// Cancel the context automatically after `after` elapses.
    ///
    /// The engine imposes no per-node timeout; this is the way to put a
    /// deadline on a whole execution. Requires a running Tokio runtime at
    /// [`build`](Self::build) time.
    pub fn deadline(mut self, after: Duration) -> Self {
        self.deadline = Some(after);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> ExecCtx {
        let cancellation = self.cancellation.unwrap_or_default();
        if let Some(after) = self.deadline {
            let token = cancellation.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(after) => token.cancel(),
                    _ = token.cancelled() => {}
                }
            });
        }
        ExecCtx {
            run_id: self
                .run_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            cancellation,
            events: self.events,
        }
    }
}
