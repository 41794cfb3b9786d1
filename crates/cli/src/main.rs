use clap::Parser;

use lc_cli::cli::{Cli, Command, ConfigCommand};
use lc_cli::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Chat is the default when no subcommand is given.
        None | Some(Command::Chat) => {
            let (config, _) = lc_cli::cli::load_config()?;
            init_tracing(&config.logging);
            lc_cli::cli::chat::chat(&config).await
        }
        Some(Command::Send { message, json }) => {
            let (config, _) = lc_cli::cli::load_config()?;
            init_tracing(&config.logging);
            lc_cli::cli::send::send(&config, &message, json).await
        }
        Some(Command::History { json }) => {
            let (config, _) = lc_cli::cli::load_config()?;
            init_tracing(&config.logging);
            lc_cli::cli::history::history(&config, json).await
        }
        Some(Command::Clear) => {
            let (config, _) = lc_cli::cli::load_config()?;
            init_tracing(&config.logging);
            lc_cli::cli::history::clear(&config).await
        }
        Some(Command::Tools) => {
            let (config, _) = lc_cli::cli::load_config()?;
            init_tracing(&config.logging);
            lc_cli::cli::tools::list(&config).await
        }
        Some(Command::Realtime) => {
            let (config, _) = lc_cli::cli::load_config()?;
            init_tracing(&config.logging);
            lc_cli::cli::realtime::session(&config).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = lc_cli::cli::load_config()?;
            if !lc_cli::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = lc_cli::cli::load_config()?;
            print!("{}", lc_cli::cli::config::render(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("localchat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
