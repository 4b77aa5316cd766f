//! Example: fan out to three reviewers in parallel and gather their scores.
//!
//! Run with: `cargo run --example fork_join`

use llm_graph::{
    from_fn, merge, sync_fn, ExecCtx, ExecutionEngine, GraphBuilder, GraphState, JoinStrategy,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn reviewer(name: &'static str, score: i64, delay_ms: u64) -> impl llm_graph::NodeAction {
    from_fn(move |_ctx, state: GraphState| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(state.with("score", score).with(format!("{}_note", name), "looks fine"))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("llm_graph=debug")),
        )
        .with_target(false)
        .init();

    let graph = GraphBuilder::new("review-panel")
        .node(
            "draft",
            sync_fn(|state: GraphState| {
                Ok(state.with("draft", "Rust makes fearless concurrency practical."))
            }),
        )
        .fork("fan_out", ["style", "facts", "tone"])
        .node("style", reviewer("style", 7, 120))
        .node("facts", reviewer("facts", 9, 40))
        .node("tone", reviewer("tone", 8, 80))
        .join("gather", JoinStrategy::All, merge::collect("score"))
        .node(
            "decide",
            sync_fn(|mut state: GraphState| {
                let scores: Vec<i64> = state
                    .get("score")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_i64()).collect())
                    .unwrap_or_default();
                let mean = scores.iter().sum::<i64>() as f64 / scores.len().max(1) as f64;
                state.output = format!("scores {:?}, mean {:.1}", scores, mean);
                state.end();
                Ok(state)
            }),
        )
        .edge("draft", "fan_out")
        .edge("fan_out", "gather")
        .edge("style", "gather")
        .edge("facts", "gather")
        .edge("tone", "gather")
        .edge("gather", "decide")
        .build()?;

    println!("{}", graph.to_dot());

    let state = ExecutionEngine::new(graph)
        .execute(GraphState::new(), &ExecCtx::default())
        .await?;

    println!("{}", state.output);
    for key in ["style_note", "facts_note", "tone_note"] {
        println!("{}: {}", key, state.get_str(key).unwrap_or("-"));
    }
    Ok(())
}
