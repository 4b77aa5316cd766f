//! # LLM Graph
//!
//! A graph orchestration engine for LLM workflows: a state-machine
//! interpreter that runs your node functions over a shared [`GraphState`],
//! following conditional edges, with support for cycles (self-correcting
//! retry loops), concurrent fork/join branches, and checkpoints so long
//! runs can be paused and resumed.
//!
//! What happens *inside* a node (LLM calls, prompt rendering, output
//! parsing) is up to you. This crate decides which node runs next.
//!
//! ## Core Concepts
//!
//! - **[`GraphState`]**: the value threaded through every node. Nodes read
//!   and write its `data` map, may set `next_node` to route explicitly, and
//!   set `should_end` to stop.
//! - **[`NodeAction`]**: object-safe trait for node work. Use
//!   [`from_fn`] for async closures and [`sync_fn`] for plain ones.
//! - **[`GraphBuilder`]** / **[`FluentGraph`]**: assemble and validate a
//!   [`GraphDefinition`].
//! - **[`ExecutionEngine`]**: runs a definition, optionally saving
//!   [`Checkpoint`]s to a [`CheckpointStore`].
//! - **[`ExecCtx`]**: run id, cancellation token, and event handlers.
//!
//! ## Quick Start
//!
//! ```
//! use llm_graph::{ExecCtx, ExecutionEngine, GraphBuilder, GraphState, sync_fn};
//!
//! # #[tokio::main]
//! # async fn main() -> llm_graph::Result<()> {
//! // Keep regenerating until the critic is satisfied.
//! let graph = GraphBuilder::new("self-correct")
//!     .node("generate", sync_fn(|mut s| {
//!         let n = s.increment("attempts");
//!         s.output = format!("draft #{}", n);
//!         s.set("acceptable", n >= 2);
//!         Ok(s)
//!     }))
//!     .node("finish", sync_fn(|mut s| { s.end(); Ok(s) }))
//!     .conditional_edge("generate", "generate", |s| s.get_bool("acceptable") != Some(true))
//!     .edge("generate", "finish")
//!     .build()?;
//!
//! let engine = ExecutionEngine::new(graph);
//! let state = engine.execute(GraphState::new(), &ExecCtx::default()).await?;
//! assert_eq!(state.output, "draft #2");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod edge;
pub mod engine;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod fluent;
pub mod fork_join;
pub mod graph;
pub mod node;
pub mod retry;
pub mod state;
mod visualize;

pub use builder::GraphBuilder;
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use config::EngineConfig;
pub use edge::{Edge, EdgeCondition};
pub use engine::{ExecutionEngine, ExecutionReport};
pub use error::{GraphError, Result};
pub use events::{Event, EventBus, EventHandler, FnEventHandler};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use fluent::{FluentGraph, END};
pub use fork_join::{merge, JoinStrategy, MergeFn};
pub use graph::{GraphDefinition, DEFAULT_MAX_ITERATIONS};
pub use node::{from_fn, sync_fn, BoxFut, Node, NodeAction, NodeKind};
pub use retry::{BackoffConfig, RetryAction};
pub use state::{GraphState, StateData};
