//! The graph interpreter.
//!
//! [`ExecutionEngine`] walks a [`GraphDefinition`] one node at a time:
//! run the node, stop if it set `should_end`, otherwise pick the next node
//! (explicit `next_node` first, then the first matching edge) and repeat,
//! up to the iteration cap. Fork nodes detour through
//! [`fork_join`](crate::fork_join) and come back positioned at their join.

use crate::checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::events::Event;
use crate::exec_ctx::ExecCtx;
use crate::fork_join::{run_fork, ForkPlan};
use crate::graph::GraphDefinition;
use crate::node::{BoxFut, NodeAction, NodeKind};
use crate::state::GraphState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Result of [`ExecutionEngine::execute_with_report`].
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Terminal state.
    pub state: GraphState,
    /// Nodes run, in order. Includes nodes restored from a checkpoint.
    pub history: Vec<String>,
    /// Wall-clock time for this call.
    pub elapsed: Duration,
}

/// Bookkeeping for one walk: where checkpoints go and what ran so far.
struct Trail {
    checkpoint_id: String,
    created_at: DateTime<Utc>,
    history: Vec<String>,
}

impl Trail {
    fn new(checkpoint_id: String) -> Self {
        Self {
            checkpoint_id,
            created_at: Utc::now(),
            history: Vec::new(),
        }
    }
}

/// Shared, cheaply cloned interpreter. Forked branches get their own copy.
#[derive(Clone)]
pub(crate) struct Runner {
    graph: Arc<GraphDefinition>,
    max_iterations: usize,
    store: Option<Arc<dyn CheckpointStore>>,
    auto_checkpoint: bool,
}

impl Runner {
    /// A runner for forked branches: same graph and cap, no checkpointing.
    pub(crate) fn for_branch(&self) -> Runner {
        Runner {
            graph: self.graph.clone(),
            max_iterations: self.max_iterations,
            store: None,
            auto_checkpoint: false,
        }
    }

    /// Walk one branch from `state.current_node` until it routes into
    /// `join`, ends, or fails.
    pub(crate) fn run_branch(
        self,
        ctx: ExecCtx,
        state: GraphState,
        join: String,
    ) -> BoxFut<'static, Result<GraphState>> {
        Box::pin(async move {
            let mut trail = Trail::new(ctx.run_id.clone());
            self.walk(&ctx, state, Some(&join), &mut trail).await
        })
    }

    fn walk<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        mut state: GraphState,
        stop_at: Option<&'a str>,
        trail: &'a mut Trail,
    ) -> BoxFut<'a, Result<GraphState>> {
        Box::pin(async move {
            let mut current = if state.current_node.is_empty() {
                self.graph.entry_node.clone()
            } else {
                state.current_node.clone()
            };

            for _ in 0..self.max_iterations {
                ctx.check_cancelled()?;
                state.current_node = current.clone();
                ctx.emit(Event::NodeStart {
                    node: current.clone(),
                });

                let Some(node) = self.graph.node(&current) else {
                    return Err(GraphError::UnknownNode {
                        node: current,
                        state: Box::new(state),
                    });
                };

                let started = Instant::now();
                debug!(node = %current, kind = node.kind.tag(), "Running node");

                match &node.kind {
                    NodeKind::Action(action) => {
                        state = self.invoke(ctx, action.as_ref(), &current, state).await?;
                        state.current_node = current.clone();
                    }
                    NodeKind::Join { merge, .. } => {
                        // Reached without a fork: nothing to wait for.
                        let mut merged = merge(vec![state]);
                        merged.current_node = current.clone();
                        merged.next_node = None;
                        state = merged;
                    }
                    NodeKind::Fork { branches } => {
                        let join = self.fork_join_target(&current)?;
                        let merged = match self.fork(ctx, &current, branches, &join, state).await {
                            Ok(merged) => merged,
                            Err(e) => {
                                if !e.is_cancelled() {
                                    error!(fork = %current, error = %e, "Fork failed");
                                    ctx.emit(Event::Error {
                                        node: current.clone(),
                                        error: e.to_string(),
                                    });
                                }
                                return Err(e);
                            }
                        };
                        ctx.emit(Event::NodeEnd {
                            node: current.clone(),
                            elapsed: started.elapsed(),
                        });
                        trail.history.push(current.clone());

                        // The join ran as part of the fork; route onward from it.
                        ctx.emit(Event::NodeStart { node: join.clone() });
                        current = join;
                        state = merged;
                    }
                }

                ctx.emit(Event::NodeEnd {
                    node: current.clone(),
                    elapsed: started.elapsed(),
                });
                trail.history.push(current.clone());

                if state.should_end {
                    debug!(node = %current, "Node requested end");
                    return Ok(state);
                }

                let next = match state.next_node.take() {
                    Some(explicit) => explicit,
                    None => match self.graph.route(&current, &state) {
                        Some(to) => to.to_string(),
                        None => {
                            return Err(GraphError::NoApplicableEdge {
                                node: current,
                                state: Box::new(state),
                            })
                        }
                    },
                };
                debug!(from = %current, to = %next, "Routing");

                if stop_at == Some(next.as_str()) {
                    return Ok(state);
                }
                if self.auto_checkpoint {
                    self.save_checkpoint(ctx, &next, &state, trail).await?;
                }
                current = next;
            }

            Err(GraphError::IterationLimitExceeded {
                max: self.max_iterations,
                state: Box::new(state),
            })
        })
    }

    async fn invoke(
        &self,
        ctx: &ExecCtx,
        action: &dyn NodeAction,
        node: &str,
        state: GraphState,
    ) -> Result<GraphState> {
        let result = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(GraphError::Cancelled),
            result = action.invoke(ctx, state.clone()) => result,
        };

        match result {
            Ok(next) => Ok(next),
            Err(GraphError::Cancelled) => Err(GraphError::Cancelled),
            Err(e) => {
                let message = e.to_string();
                error!(node, error = %message, "Node failed");
                ctx.emit(Event::Error {
                    node: node.to_string(),
                    error: message.clone(),
                });
                Err(GraphError::NodeExecution {
                    node: node.to_string(),
                    message,
                    state: Box::new(state),
                })
            }
        }
    }

    fn fork_join_target(&self, fork: &str) -> Result<String> {
        self.graph
            .join_for(fork)
            .map(str::to_string)
            .ok_or_else(|| GraphError::GraphValidation(format!("fork '{}' has no join", fork)))
    }

    async fn fork(
        &self,
        ctx: &ExecCtx,
        fork: &str,
        branches: &[String],
        join: &str,
        state: GraphState,
    ) -> Result<GraphState> {
        let Some(NodeKind::Join { strategy, merge }) = self.graph.node(join).map(|n| &n.kind) else {
            return Err(GraphError::GraphValidation(format!(
                "fork '{}' continues into '{}', which is not a join",
                fork, join
            )));
        };
        let plan = ForkPlan {
            fork,
            branches,
            join,
            strategy: *strategy,
            merge,
        };
        run_fork(self, ctx, plan, state).await
    }

    async fn save_checkpoint(
        &self,
        ctx: &ExecCtx,
        next: &str,
        state: &GraphState,
        trail: &Trail,
    ) -> Result<()> {
        let Some(store) = &self.store else {
            return Err(GraphError::InvalidConfig(
                "auto-checkpointing is on but no checkpoint store is set".into(),
            ));
        };
        let mut checkpoint = Checkpoint::new(&trail.checkpoint_id, &self.graph.name, next, state)
            .with_history(trail.history.clone());
        checkpoint.created_at = trail.created_at;
        store.save(&mut checkpoint).await?;

        debug!(id = %checkpoint.id, next, "Checkpoint saved");
        ctx.emit(Event::CheckpointSaved {
            id: checkpoint.id,
            node: next.to_string(),
        });
        Ok(())
    }
}

/// Executes a [`GraphDefinition`].
///
/// # Example
///
/// ```
/// use llm_graph::{ExecCtx, ExecutionEngine, GraphBuilder, GraphState, node::sync_fn};
///
/// # #[tokio::main]
/// # async fn main() -> llm_graph::Result<()> {
/// let graph = GraphBuilder::new("retry")
///     .node("attempt", sync_fn(|mut s| {
///         let n = s.increment("n");
///         s.set("error", n < 3);
///         Ok(s)
///     }))
///     .node("done", sync_fn(|mut s| { s.end(); Ok(s) }))
///     .conditional_edge("attempt", "attempt", |s| s.get_bool("error") == Some(true))
///     .edge("attempt", "done")
///     .build()?;
///
/// let engine = ExecutionEngine::new(graph);
/// let state = engine.execute(GraphState::new(), &ExecCtx::default()).await?;
/// assert_eq!(state.get_i64("n"), Some(3));
/// assert_eq!(state.current_node, "done");
/// # Ok(())
/// # }
/// ```
pub struct ExecutionEngine {
    runner: Runner,
}

impl ExecutionEngine {
    pub fn new(graph: GraphDefinition) -> Self {
        Self::from_arc(Arc::new(graph))
    }

    /// Share a graph between several engines.
    pub fn from_arc(graph: Arc<GraphDefinition>) -> Self {
        let max_iterations = graph.max_iterations;
        Self {
            runner: Runner {
                graph,
                max_iterations,
                store: None,
                auto_checkpoint: false,
            },
        }
    }

    /// Apply an [`EngineConfig`], opening a file store when it names a
    /// checkpoint directory.
    pub fn from_config(graph: GraphDefinition, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(graph).with_auto_checkpoint(config.auto_checkpoint);
        if let Some(max) = config.max_iterations {
            engine = engine.with_max_iterations(max);
        }
        if let Some(dir) = &config.checkpoint_dir {
            engine = engine.with_checkpoint_store(Arc::new(FileCheckpointStore::open(dir)?));
        }
        Ok(engine)
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.runner.store = Some(store);
        self
    }

    /// Save a checkpoint after every routed step. Needs a store.
    ///
    /// Nothing is saved when a node ends the run, so the last checkpoint
    /// of a finished run still points at its final node and resuming it
    /// runs that node again. Delete the checkpoint once a run is done if
    /// that matters. Forked branches never checkpoint.
    pub fn with_auto_checkpoint(mut self, enabled: bool) -> Self {
        self.runner.auto_checkpoint = enabled;
        self
    }

    /// Override the graph's iteration cap for this engine. Values below 1
    /// are raised to 1.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.runner.max_iterations = max.max(1);
        self
    }

    pub fn graph(&self) -> &GraphDefinition {
        &self.runner.graph
    }

    pub fn max_iterations(&self) -> usize {
        self.runner.max_iterations
    }

    pub fn checkpoint_store(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.runner.store.as_ref()
    }

    /// Run from `initial` to a terminal state.
    ///
    /// Starts at `initial.current_node` when set, otherwise at the entry
    /// node. Auto-checkpoints (when enabled) are saved under `ctx.run_id`.
    pub async fn execute(&self, initial: GraphState, ctx: &ExecCtx) -> Result<GraphState> {
        Ok(self.execute_with_report(initial, ctx).await?.state)
    }

    /// Like [`execute`](Self::execute), also returning history and timing.
    pub async fn execute_with_report(
        &self,
        initial: GraphState,
        ctx: &ExecCtx,
    ) -> Result<ExecutionReport> {
        let trail = Trail::new(ctx.run_id.clone());
        self.run(initial, ctx, trail).await
    }

    /// Resume the checkpoint stored under `id`.
    pub async fn resume(&self, id: &str, ctx: &ExecCtx) -> Result<GraphState> {
        let store = self.require_store()?;
        let checkpoint = store
            .load(id)
            .await?
            .ok_or_else(|| GraphError::CheckpointNotFound(id.to_string()))?;
        self.resume_from(checkpoint, ctx).await
    }

    /// Resume from a checkpoint already in hand.
    ///
    /// Continues at `checkpoint.current_node` without re-running the node
    /// that produced it. Further auto-checkpoints overwrite the same id.
    pub async fn resume_from(&self, checkpoint: Checkpoint, ctx: &ExecCtx) -> Result<GraphState> {
        if checkpoint.graph_name != self.runner.graph.name {
            return Err(GraphError::InvalidConfig(format!(
                "checkpoint '{}' belongs to graph '{}', not '{}'",
                checkpoint.id, checkpoint.graph_name, self.runner.graph.name
            )));
        }
        info!(id = %checkpoint.id, node = %checkpoint.current_node, "Resuming from checkpoint");

        let state = checkpoint.to_state();
        let trail = Trail {
            checkpoint_id: checkpoint.id,
            created_at: checkpoint.created_at,
            history: checkpoint.execution_history,
        };
        Ok(self.run(state, ctx, trail).await?.state)
    }

    /// Save an on-demand checkpoint of `state` under `id`.
    ///
    /// The checkpoint resumes at `state.next_node` if set, else at
    /// `state.current_node`, else at the entry node.
    pub async fn checkpoint(&self, id: &str, state: &GraphState) -> Result<Checkpoint> {
        let store = self.require_store()?;
        let resume_at = state
            .next_node
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| Some(state.current_node.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| self.runner.graph.entry_node.clone());

        let mut checkpoint = Checkpoint::new(id, &self.runner.graph.name, resume_at, state);
        store.save(&mut checkpoint).await?;
        Ok(checkpoint)
    }

    async fn run(
        &self,
        initial: GraphState,
        ctx: &ExecCtx,
        mut trail: Trail,
    ) -> Result<ExecutionReport> {
        if self.runner.auto_checkpoint && self.runner.store.is_none() {
            return Err(GraphError::InvalidConfig(
                "auto-checkpointing is on but no checkpoint store is set".into(),
            ));
        }

        let started = Instant::now();
        info!(
            graph = %self.runner.graph.name,
            run_id = %ctx.run_id,
            max_iterations = self.runner.max_iterations,
            "Executing graph"
        );

        match self.runner.walk(ctx, initial, None, &mut trail).await {
            Ok(state) => {
                info!(
                    graph = %self.runner.graph.name,
                    run_id = %ctx.run_id,
                    node = %state.current_node,
                    steps = trail.history.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Graph finished"
                );
                Ok(ExecutionReport {
                    state,
                    history: trail.history,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) => {
                info!(
                    graph = %self.runner.graph.name,
                    run_id = %ctx.run_id,
                    error = %e,
                    "Graph stopped"
                );
                Err(e)
            }
        }
    }

    fn require_store(&self) -> Result<&Arc<dyn CheckpointStore>> {
        self.runner
            .store
            .as_ref()
            .ok_or_else(|| GraphError::InvalidConfig("no checkpoint store configured".into()))
    }
}
