//! `localchat send` and the turn runner shared with the chat REPL.

use std::io::Write;

use tokio::sync::broadcast::error::TryRecvError;

use lc_domain::config::Config;
use lc_runtime::{TurnEvent, TurnOrchestrator, TurnOutcome};

use crate::bootstrap;

pub async fn send(config: &Config, message: &str, json: bool) -> anyhow::Result<()> {
    let app = bootstrap::build_app(config).await?;
    let result = if json {
        print_outcome_json(&app.orchestrator, message).await
    } else {
        run_turn(&app.orchestrator, message).await.map(|_| ())
    };
    app.shutdown().await;
    result
}

async fn print_outcome_json(orch: &TurnOrchestrator, message: &str) -> anyhow::Result<()> {
    let outcome = orch.send(message).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Run one turn, streaming its events to the terminal. Ctrl-C while the
/// reply streams cancels the turn; the partial reply is kept.
pub async fn run_turn(orch: &TurnOrchestrator, input: &str) -> anyhow::Result<TurnOutcome> {
    let mut events = orch.subscribe();
    let turn = orch.send(input);
    tokio::pin!(turn);

    let mut interrupted = false;
    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            Ok(event) = events.recv() => render_event(&event),
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                orch.cancel();
            }
        }
    };

    loop {
        match events.try_recv() {
            Ok(event) => render_event(&event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    Ok(result?)
}

/// Print one turn event. Assistant text goes to stdout, everything else
/// to stderr.
pub fn render_event(event: &TurnEvent) {
    match event {
        TurnEvent::AssistantDelta { text } => {
            print!("{text}");
            std::io::stdout().flush().ok();
        }
        TurnEvent::ToolCall { tool_name, .. } => {
            eprintln!("\x1B[2m[tool: {tool_name}]\x1B[0m");
        }
        TurnEvent::ToolResult {
            tool_name,
            is_error: true,
            content,
            ..
        } => {
            eprintln!("\x1B[33m[tool {tool_name} failed: {content}]\x1B[0m");
        }
        TurnEvent::ToolResult { .. } => {}
        TurnEvent::Final { .. } => {
            println!();
            println!();
        }
        TurnEvent::Stopped { .. } => {
            println!();
            eprintln!("(turn stopped)");
        }
        TurnEvent::Error { message } => {
            eprintln!("\x1B[31merror: {message}\x1B[0m");
        }
    }
}
