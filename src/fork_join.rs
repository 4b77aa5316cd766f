//! Fork/join coordination.
//!
//! A fork node clones the current [`GraphState`] once per branch and runs
//! every branch as its own Tokio task. Each branch follows normal routing
//! until it routes into the fork's join node, sets `should_end`, or fails.
//! The join waits per its [`JoinStrategy`] and folds the satisfied branch
//! states into one with a [`MergeFn`].
//!
//! Branches never share mutable state: each owns its clone, and only the
//! merge function sees more than one of them.

use crate::engine::Runner;
use crate::error::{GraphError, Result};
use crate::events::Event;
use crate::exec_ctx::ExecCtx;
use crate::state::GraphState;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// How many branch results a join needs before it proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Every branch must succeed.
    All,
    /// The first successful branch wins.
    Any,
    /// Proceed once `n` branches have succeeded.
    Count(usize),
}

impl JoinStrategy {
    /// Number of successful branches required out of `branches`.
    pub fn required(&self, branches: usize) -> usize {
        match self {
            JoinStrategy::All => branches,
            JoinStrategy::Any => 1,
            JoinStrategy::Count(n) => *n,
        }
    }
}

/// Combines the satisfied branch states into the state that continues.
///
/// Conflict resolution (which branch wins a duplicate key) is the merge
/// function's call; the coordinator imposes none.
pub type MergeFn = Arc<dyn Fn(Vec<GraphState>) -> GraphState + Send + Sync>;

/// Built-in merge functions.
pub mod merge {
    use super::MergeFn;
    use crate::state::GraphState;
    use serde_json::Value;
    use std::sync::Arc;

    /// Wrap a closure as a [`MergeFn`].
    pub fn from_fn<F>(f: F) -> MergeFn
    where
        F: Fn(Vec<GraphState>) -> GraphState + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    /// Union of every branch's `data`; later branches overwrite earlier
    /// ones on duplicate keys. Non-empty outputs are joined by newlines.
    /// `should_end` is reset: ending a branch does not end the graph.
    pub fn union() -> MergeFn {
        Arc::new(union_states)
    }

    /// Like [`union`], but `key` becomes an array holding each branch's
    /// value for it (branches without the key are skipped).
    pub fn collect(key: impl Into<String>) -> MergeFn {
        let key = key.into();
        Arc::new(move |states: Vec<GraphState>| {
            let gathered: Vec<Value> = states
                .iter()
                .filter_map(|s| s.get(&key).cloned())
                .collect();
            let mut merged = union_states(states);
            merged.set(key.clone(), Value::Array(gathered));
            merged
        })
    }

    fn union_states(states: Vec<GraphState>) -> GraphState {
        let mut iter = states.into_iter();
        let mut merged = iter.next().unwrap_or_default();
        for state in iter {
            merged.data.extend(state.data);
            if !state.output.is_empty() {
                if !merged.output.is_empty() {
                    merged.output.push('\n');
                }
                merged.output.push_str(&state.output);
            }
        }
        merged.should_end = false;
        merged.next_node = None;
        merged
    }
}

/// A fork node resolved against its join.
pub(crate) struct ForkPlan<'a> {
    pub fork: &'a str,
    pub branches: &'a [String],
    pub join: &'a str,
    pub strategy: JoinStrategy,
    pub merge: &'a MergeFn,
}

/// Run the plan's branches concurrently from `state` and merge them at
/// the join.
///
/// Returns the merged state positioned at the join node.
pub(crate) async fn run_fork(
    runner: &Runner,
    ctx: &ExecCtx,
    plan: ForkPlan<'_>,
    state: GraphState,
) -> Result<GraphState> {
    let ForkPlan {
        fork,
        branches,
        join,
        strategy,
        merge,
    } = plan;
    let required = strategy.required(branches.len());
    let branch_runner = runner.for_branch();

    debug!(fork, join, branches = branches.len(), required, "Forking");

    let mut aborts = Vec::with_capacity(branches.len());
    let mut pending = FuturesUnordered::new();
    for (idx, branch) in branches.iter().enumerate() {
        let mut branch_state = state.clone();
        branch_state.current_node = branch.clone();
        branch_state.next_node = None;

        ctx.emit(Event::BranchStart {
            fork: fork.to_string(),
            branch: branch.clone(),
        });
        let handle = tokio::spawn(branch_runner.clone().run_branch(
            ctx.clone(),
            branch_state,
            join.to_string(),
        ));
        aborts.push(handle.abort_handle());
        pending.push(async move { (idx, handle.await) });
    }

    let mut succeeded: Vec<(usize, GraphState)> = Vec::with_capacity(required);
    let mut failed = 0usize;
    while let Some((idx, joined)) = pending.next().await {
        let branch = &branches[idx];
        let outcome = joined.unwrap_or_else(|e| {
            Err(GraphError::Other(format!("branch task aborted: {}", e)))
        });

        match outcome {
            Ok(branch_state) => {
                ctx.emit(Event::BranchEnd {
                    fork: fork.to_string(),
                    branch: branch.clone(),
                    ok: true,
                });
                succeeded.push((idx, branch_state));
                if succeeded.len() >= required {
                    break;
                }
            }
            Err(GraphError::Cancelled) => {
                aborts.iter().for_each(|a| a.abort());
                return Err(GraphError::Cancelled);
            }
            Err(e) => {
                let message = e.to_string();
                warn!(fork, branch = %branch, error = %message, "Branch failed");
                ctx.emit(Event::BranchEnd {
                    fork: fork.to_string(),
                    branch: branch.clone(),
                    ok: false,
                });
                ctx.emit(Event::Error {
                    node: branch.clone(),
                    error: message.clone(),
                });

                if strategy == JoinStrategy::All {
                    aborts.iter().for_each(|a| a.abort());
                    return Err(GraphError::BranchExecution {
                        branch: branch.clone(),
                        message,
                    });
                }

                failed += 1;
                if branches.len() - failed < required {
                    aborts.iter().for_each(|a| a.abort());
                    return Err(GraphError::JoinFailed {
                        join: join.to_string(),
                        message: format!(
                            "{} of {} branches failed, {} required",
                            failed,
                            branches.len(),
                            required
                        ),
                    });
                }
            }
        }
    }

    if succeeded.len() < required {
        return Err(GraphError::JoinFailed {
            join: join.to_string(),
            message: format!(
                "only {} of {} required branches completed",
                succeeded.len(),
                required
            ),
        });
    }

    // Remaining branches (Any / Count) keep running detached; their
    // results are dropped with `pending`.
    if strategy == JoinStrategy::All {
        succeeded.sort_by_key(|(idx, _)| *idx);
    }
    let states: Vec<GraphState> = succeeded.into_iter().map(|(_, s)| s).collect();
    debug!(fork, join, merged = states.len(), "Joining");

    let mut merged = merge(states);
    merged.current_node = join.to_string();
    merged.next_node = None;
    Ok(merged)
}
