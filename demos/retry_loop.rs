//! Example: a self-correcting loop with a simulated flaky model.
//!
//! The `generate` node fails validation twice, loops back on itself, and
//! succeeds on the third attempt. Streaming chunks and lifecycle events are
//! printed as they happen.
//!
//! Run with: `RUST_LOG=llm_graph=debug cargo run --example retry_loop`

use llm_graph::{
    edge::flag, from_fn, sync_fn, Event, ExecCtx, ExecutionEngine, GraphBuilder, GraphState,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("llm_graph=info")),
        )
        .with_target(false)
        .init();

    let graph = GraphBuilder::new("self-correct")
        .node_with_description(
            "generate",
            "Ask the model for JSON and validate it",
            from_fn(|ctx, mut state: GraphState| async move {
                let attempt = state.increment("attempt");
                for word in ["{\"answer\":", " 42", "}"] {
                    ctx.stream("generate", word);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                // Pretend the first two responses failed schema validation.
                state.set("invalid", attempt < 3);
                state.output = format!("{{\"answer\": 42, \"attempt\": {}}}", attempt);
                Ok(state)
            }),
        )
        .node(
            "done",
            sync_fn(|mut state: GraphState| {
                state.end();
                Ok(state)
            }),
        )
        .conditional_edge("generate", "generate", flag("invalid"))
        .edge("generate", "done")
        .max_iterations(10)
        .build()?;

    println!("{}\n", graph.to_mermaid());

    let ctx = ExecCtx::builder()
        .on_event(|event| match event {
            Event::Streaming { chunk, .. } => print!("{}", chunk),
            Event::NodeEnd { node, elapsed } => println!("\n[{}] {:?}", node, elapsed),
            _ => {}
        })
        .build();

    let report = ExecutionEngine::new(graph)
        .execute_with_report(GraphState::new(), &ctx)
        .await?;

    println!("Path: {}", report.history.join(" -> "));
    println!("Output: {}", report.state.output);
    println!("Elapsed: {:?}", report.elapsed);
    Ok(())
}
