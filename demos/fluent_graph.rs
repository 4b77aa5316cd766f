//! Example: an intent router built with the fluent API.
//!
//! Run with: `cargo run --example fluent_graph -- "search for rust books"`

use llm_graph::{edge::equals, sync_fn, ExecCtx, ExecutionEngine, FluentGraph, GraphState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("llm_graph=info")),
        )
        .with_target(false)
        .init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hello there".to_string());

    let graph = FluentGraph::new("router")
        .start(
            "classify",
            sync_fn(|mut state: GraphState| {
                let query = state.get_str("query").unwrap_or_default().to_lowercase();
                let intent = if query.contains("search") { "search" } else { "chat" };
                state.set("intent", intent);
                Ok(state)
            }),
        )
        .if_else(equals("intent", "search"), "search", Some("chat"))
        .add(
            "search",
            sync_fn(|mut state: GraphState| {
                let query = state.get_str("query").unwrap_or("").to_string();
                state.output = format!("Top results for '{}'", query);
                Ok(state)
            }),
        )
        .add(
            "chat",
            sync_fn(|mut state: GraphState| {
                state.output = "Happy to chat!".to_string();
                Ok(state)
            }),
        )
        .at("search")
        .end()
        .at("chat")
        .end()
        .build()?;

    println!("{}\n", graph.to_mermaid());

    let state = ExecutionEngine::new(graph)
        .execute(GraphState::new().with("query", query), &ExecCtx::default())
        .await?;
    println!("intent: {}", state.get_str("intent").unwrap_or("?"));
    println!("{}", state.output);
    Ok(())
}
