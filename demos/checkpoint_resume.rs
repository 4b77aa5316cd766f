//! Example: interrupt a run mid-way and resume it from its checkpoint.
//!
//! The first run is cancelled while `summarize` is working. Because every
//! routed step was auto-checkpointed to disk, the second run picks up at
//! `summarize` without repeating `fetch`.
//!
//! Run with: `cargo run --example checkpoint_resume`

use llm_graph::checkpoint::CheckpointStore;
use llm_graph::{
    from_fn, sync_fn, EngineConfig, ExecCtx, ExecutionEngine, GraphDefinition, GraphError,
    GraphState, FluentGraph,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn pipeline() -> llm_graph::Result<GraphDefinition> {
    FluentGraph::new("research")
        .start(
            "fetch",
            sync_fn(|mut state: GraphState| {
                println!("  fetch: downloading sources");
                state.set("sources", 3);
                Ok(state)
            }),
        )
        .next(
            "summarize",
            from_fn(|ctx, mut state: GraphState| async move {
                println!("  summarize: working...");
                let pause = if state.contains("resumed") { 10 } else { 5_000 };
                tokio::select! {
                    _ = ctx.cancellation.cancelled() => return Err(GraphError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(pause)) => {}
                }
                let sources = state.get_i64("sources").unwrap_or(0);
                state.output = format!("summary of {} sources", sources);
                Ok(state)
            }),
        )
        .end()
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("llm_graph=info")),
        )
        .with_target(false)
        .init();

    let dir = std::env::temp_dir().join("llm-graph-demo");
    let config = EngineConfig::new()
        .with_auto_checkpoint(true)
        .with_checkpoint_dir(&dir);
    let engine = ExecutionEngine::from_config(pipeline()?, &config)?;

    println!("First run (cancelled after 200ms):");
    let ctx = ExecCtx::builder()
        .run_id("research-1")
        .deadline(Duration::from_millis(200))
        .build();
    match engine.execute(GraphState::new(), &ctx).await {
        Err(GraphError::Cancelled) => println!("  -> cancelled"),
        other => println!("  -> unexpected: {:?}", other.map(|s| s.output)),
    }

    let store = engine.checkpoint_store().ok_or("no store configured")?;
    let mut checkpoint = store
        .load("research-1")
        .await?
        .ok_or("checkpoint missing")?;
    println!(
        "Checkpoint at '{}' after {:?}",
        checkpoint.current_node, checkpoint.execution_history
    );

    // Mark the resumed run so the demo finishes quickly.
    checkpoint.state_data.insert("resumed".into(), true.into());
    store.save(&mut checkpoint).await?;

    println!("Resumed run:");
    let state = engine.resume("research-1", &ExecCtx::default()).await?;
    println!("  -> {}", state.output);

    store.delete("research-1").await?;
    Ok(())
}
