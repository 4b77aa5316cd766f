//! Event system for graph lifecycle and streaming hooks.
//!
//! Provides an optional, non-intrusive way to observe graph execution.
//! The engine emits events when a node starts, finishes, or fails, and node
//! actions can push streaming chunks through [`ExecCtx::stream`](crate::ExecCtx::stream).
//! Implement [`EventHandler`] to receive them for logging, progress
//! tracking, or streaming UIs.

use std::sync::Arc;
use std::time::Duration;

/// Events emitted during graph execution.
///
/// Events are pure notifications: handlers receive a shared reference and
/// have no access to the [`GraphState`](crate::GraphState).
#[derive(Debug, Clone)]
pub enum Event {
    /// A node is about to run.
    NodeStart {
        /// Name of the node.
        node: String,
    },
    /// A node finished successfully.
    NodeEnd {
        /// Name of the node.
        node: String,
        /// Wall-clock time spent in the node.
        elapsed: Duration,
    },
    /// A node (or a forked branch) failed.
    Error {
        /// Name of the failing node.
        node: String,
        /// Error description.
        error: String,
    },
    /// A chunk of streaming output produced inside a node action.
    Streaming {
        /// Node producing the chunk.
        node: String,
        /// The chunk text.
        chunk: String,
    },
    /// A forked branch task started.
    BranchStart {
        /// Fork node that spawned the branch.
        fork: String,
        /// First node of the branch.
        branch: String,
    },
    /// A forked branch task finished.
    BranchEnd {
        fork: String,
        branch: String,
        /// Whether the branch completed without error.
        ok: bool,
    },
    /// A checkpoint was written.
    CheckpointSaved {
        /// Checkpoint id.
        id: String,
        /// Node the checkpoint will resume at.
        node: String,
    },
}

/// Handler for graph lifecycle events.
///
/// This is entirely optional -- graphs run without any handler.
///
/// # Example
///
/// ```
/// use llm_graph::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: &Event) {
///         match event {
///             Event::Streaming { chunk, .. } => print!("{}", chunk),
///             Event::NodeStart { node } => println!("[start] {}", node),
///             Event::NodeEnd { node, elapsed } => println!("[end] {} {:?}", node, elapsed),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called synchronously at each lifecycle point.
    fn on_event(&self, event: &Event);
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_graph::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: &Event| {
///     if let Event::Streaming { chunk, .. } = event {
///         print!("{}", chunk);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(&Event) + Send + Sync>(pub F);

impl<F: Fn(&Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: &Event) {
        (self.0)(event);
    }
}

/// Ordered list of subscribed handlers.
///
/// Cheap to clone (handlers are `Arc`s), so forked branches share the
/// parent's subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers are invoked in subscription order.
    pub fn subscribe(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Register a closure as a handler.
    pub fn subscribe_fn<F>(&mut self, f: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(FnEventHandler(f)));
    }

    /// Deliver an event to every handler. No-op without subscribers.
    pub fn emit(&self, event: Event) {
        for handler in &self.handlers {
            handler.on_event(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_all_handlers_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = seen.clone();
        bus.subscribe_fn(move |e| {
            if let Event::NodeStart { node } = e {
                first.lock().unwrap().push(format!("first:{}", node));
            }
        });
        let second = seen.clone();
        bus.subscribe_fn(move |e| {
            if let Event::NodeStart { node } = e {
                second.lock().unwrap().push(format!("second:{}", node));
            }
        });

        bus.emit(Event::NodeStart { node: "a".into() });
        assert_eq!(bus.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first:a", "second:a"]);
    }

    #[test]
    fn test_emit_without_handlers_is_noop() {
        let bus = EventBus::new();
        assert!(bus.is_empty());
        bus.emit(Event::Streaming {
            node: "a".into(),
            chunk: "tok".into(),
        });
    }

    #[test]
    fn test_cloned_bus_shares_handlers() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = count.clone();
        bus.subscribe(Arc::new(FnEventHandler(move |_: &Event| {
            *c.lock().unwrap() += 1;
        })));

        let branch_bus = bus.clone();
        bus.emit(Event::NodeStart { node: "a".into() });
        branch_bus.emit(Event::NodeStart { node: "b".into() });
        assert_eq!(*count.lock().unwrap(), 2);
    }
}
