//! `localchat chat`: interactive REPL command.
//!
//! Each line is sent as a turn and the reply streams back. Ctrl-C during a
//! reply stops it; at the prompt it only reminds how to quit.

use lc_domain::config::Config;
use lc_domain::message::MessageRole;
use lc_runtime::TurnOrchestrator;

use crate::bootstrap;
use crate::cli::history::render_message;
use crate::cli::send::run_turn;

/// What the REPL should do after a slash command.
#[derive(Debug, PartialEq, Eq)]
enum SlashAction {
    Continue,
    Exit,
    Clear,
    History,
    Tools,
}

pub async fn chat(config: &Config) -> anyhow::Result<()> {
    let app = bootstrap::build_app(config).await?;
    let orch = &app.orchestrator;

    let mut rl = rustyline::DefaultEditor::new()?;

    eprintln!("localchat ({})", config.llm.model);
    let tool_count = orch.tool_definitions().len();
    if tool_count > 0 {
        eprintln!("{tool_count} tool(s) available");
    }
    eprintln!("Type /help for commands, Ctrl+D to exit");
    let history_len = orch.cache().len();
    if history_len > 0 {
        eprintln!("({history_len} earlier message(s), /history to show)");
    }
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    match handle_slash_command(trimmed) {
                        SlashAction::Exit => break,
                        SlashAction::Continue => {}
                        SlashAction::Clear => match orch.clear().await {
                            Ok(()) => eprintln!("Conversation cleared."),
                            Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
                        },
                        SlashAction::History => print_transcript(orch),
                        SlashAction::Tools => {
                            for tool in orch.tool_definitions() {
                                eprintln!("  {}  {}", tool.name, tool.description);
                            }
                        }
                    }
                    continue;
                }

                if let Err(e) = run_turn(orch, trimmed).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    app.shutdown().await;
    eprintln!("Goodbye!");
    Ok(())
}

fn handle_slash_command(input: &str) -> SlashAction {
    let cmd = input.split_whitespace().next().unwrap_or(input);
    match cmd {
        "/exit" | "/quit" => SlashAction::Exit,
        "/clear" => SlashAction::Clear,
        "/history" => SlashAction::History,
        "/tools" => SlashAction::Tools,
        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /history         Show the conversation so far");
            eprintln!("  /clear           Delete the whole conversation");
            eprintln!("  /tools           List available tools");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
            SlashAction::Continue
        }
        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
            SlashAction::Continue
        }
    }
}

fn print_transcript(orch: &TurnOrchestrator) {
    for msg in orch.cache().snapshot() {
        if msg.role == MessageRole::Tool {
            eprintln!("\x1B[2m{}\x1B[0m", render_message(&msg));
        } else {
            eprintln!("{}", render_message(&msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_commands_map_to_actions() {
        assert_eq!(handle_slash_command("/exit"), SlashAction::Exit);
        assert_eq!(handle_slash_command("/quit now"), SlashAction::Exit);
        assert_eq!(handle_slash_command("/clear"), SlashAction::Clear);
        assert_eq!(handle_slash_command("/history"), SlashAction::History);
        assert_eq!(handle_slash_command("/tools"), SlashAction::Tools);
        assert_eq!(handle_slash_command("/help"), SlashAction::Continue);
        assert_eq!(handle_slash_command("/bogus"), SlashAction::Continue);
    }
}
