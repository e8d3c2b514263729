use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lc_client::{HttpChatBackend, OllamaClient};
use lc_core::{ChatBackend, InferenceServer};

mod clipboard;
mod commands;
mod config;
mod events;
mod manager;
mod markdown;
mod prompt;
mod setup;
mod shell;
mod tui;
mod voice;

use config::{Config, Overrides};

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: every streamed fragment
    Trace,
    /// Verbose: requests, turn ids, dictation sessions
    Debug,
    /// Standard: turns, installs, deletes
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "localchat")]
#[command(author, version, about = "Chat with models on a local Ollama server", long_about = None)]
pub struct Cli {
    /// Inference server URL (overrides config)
    #[arg(long, env = "OLLAMA_HOST")]
    pub ollama_url: Option<String>,

    /// Chat backend URL (overrides config)
    #[arg(long)]
    pub chat_url: Option<String>,

    /// Model used when none is installed, and by `ask`
    #[arg(short, long)]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            ollama_url: self.ollama_url.clone(),
            chat_url: self.chat_url.clone(),
            model: self.model.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and stream the answer to stdout
    Ask {
        /// The prompt
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Manage installed models
    Models {
        #[command(subcommand)]
        action: ModelsCommand,
    },
    /// Show current configuration
    Config,
    /// Write a configuration template to ~/.config/localchat
    Setup,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List installed models
    List,
    /// Download a model
    Pull { name: String },
    /// Delete a model
    Rm {
        name: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The chat UI runs when no subcommand is given and stdout is a terminal.
    let will_use_tui = cli.command.is_none() && atty::is(atty::Stream::Stdout);

    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };

    let filter = EnvFilter::new(log_level.as_filter());

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else if will_use_tui {
        // Anything on stdout/stderr would corrupt the screen.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Handle setup before config is required
    if matches!(&cli.command, Some(Commands::Setup)) {
        return setup::run();
    }

    let config = Config::load(&cli.overrides())?;
    let inference: Arc<dyn InferenceServer> = Arc::new(
        OllamaClient::new(config.ollama.base_url.clone()).with_timeout(config.ollama_timeout()),
    );

    match &cli.command {
        Some(Commands::Ask { prompt }) => {
            let backend = HttpChatBackend::new(config.chat.base_url.clone());
            ask_mode(&backend, &config, &prompt.join(" ")).await
        }
        Some(Commands::Models { action }) => models_mode(inference.as_ref(), action).await,
        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Some(Commands::Setup) => unreachable!(),
        None => {
            if !will_use_tui {
                anyhow::bail!("The chat interface needs a terminal. Use `localchat ask` instead.");
            }
            let backend: Arc<dyn ChatBackend> =
                Arc::new(HttpChatBackend::new(config.chat.base_url.clone()));
            tui::run_tui(&config, inference, backend).await
        }
    }
}

async fn ask_mode(backend: &dyn ChatBackend, config: &Config, prompt: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    commands::ask(backend, &config.chat.default_model, prompt, &mut stdout, cancel).await
}

async fn models_mode(inference: &dyn InferenceServer, action: &ModelsCommand) -> Result<()> {
    let mut stdout = std::io::stdout();
    match action {
        ModelsCommand::List => commands::list_models(inference, &mut stdout).await,
        ModelsCommand::Pull { name } => commands::pull_model(inference, name, &mut stdout).await,
        ModelsCommand::Rm { name, yes } => {
            let question = format!("Are you sure you want to delete the model {}?", name);
            if !yes && !commands::confirm(&question)? {
                println!("Cancelled.");
                return Ok(());
            }
            commands::remove_model(inference, name, &mut stdout).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_models_rm() {
        let cli = Cli::parse_from(["localchat", "models", "rm", "llama3", "--yes"]);
        match cli.command {
            Some(Commands::Models {
                action: ModelsCommand::Rm { name, yes },
            }) => {
                assert_eq!(name, "llama3");
                assert!(yes);
            }
            _ => panic!("expected models rm"),
        }
    }

    #[test]
    fn test_overrides_from_flags() {
        let cli = Cli::parse_from([
            "localchat",
            "--ollama-url",
            "http://gpu:11434",
            "-m",
            "mistral",
            "ask",
            "hello",
            "world",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.ollama_url.as_deref(), Some("http://gpu:11434"));
        assert_eq!(overrides.model.as_deref(), Some("mistral"));
        assert!(overrides.chat_url.is_none());
        match cli.command {
            Some(Commands::Ask { prompt }) => assert_eq!(prompt.join(" "), "hello world"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_debug_flag() {
        let cli = Cli::parse_from(["localchat", "-d"]);
        assert!(cli.debug);
        assert_eq!(cli.log_level, LogLevel::Warn);
    }
}
