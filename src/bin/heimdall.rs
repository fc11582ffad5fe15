//! heimdall CLI
//!
//! Drives the serving core against the configured generator: one-shot
//! generation, an interactive chat session, and a stats dump.

use std::io::IsTerminal;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use heimdall::{
    ChatRequest, Config, Gateway, GenerateRequest, GenerationParams, Heimdall, Message,
};

/// Heimdall CLI
#[derive(Parser)]
#[command(name = "heimdall")]
#[command(version)]
#[command(about = "Cached, rate-limited LLM generation")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HEIMDALL_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Client key used for rate limiting.
    #[arg(long, default_value = "cli")]
    client: String,

    /// Maximum tokens to generate.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    temperature: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a completion for a prompt
    Generate {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
    },

    /// Chat interactively, one message per line
    Chat {
        /// Session id; history is kept across turns within the session
        #[arg(short, long, default_value = "cli")]
        session: String,
        /// System message sent with the first turn
        #[arg(long)]
        system: Option<String>,
    },

    /// Print cache and rate limiter statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let gateway = Heimdall::from_config(&config)?;
    let _maintenance = gateway.spawn_maintenance();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = gateway.model(),
        generator = %config.generator.base_url,
        "heimdall starting"
    );

    let mut params = GenerationParams::new();
    if let Some(n) = args.max_tokens {
        params = params.max_tokens(n);
    }
    if let Some(t) = args.temperature {
        params = params.temperature(t);
    }

    match args.command {
        Command::Generate { prompt } => {
            let prompt = match prompt {
                Some(p) => p,
                None => read_stdin().await?,
            };
            let request = GenerateRequest::new(prompt).params(params);
            let response = gateway.generate(&args.client, &request).await?;
            println!("{}", response.generated_text);
            if response.cached {
                eprintln!("(cached)");
            }
        }
        Command::Chat { session, system } => {
            chat_loop(&gateway, &args.client, &session, system, params).await?;
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&gateway.health())?);
        }
    }

    Ok(())
}

async fn read_stdin() -> std::io::Result<String> {
    if std::io::stdin().is_terminal() {
        eprintln!("Reading from stdin (Ctrl-D to finish)...");
    }
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf.trim().to_string())
}

async fn chat_loop(
    gateway: &Gateway,
    client: &str,
    session: &str,
    system: Option<String>,
    params: GenerationParams,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut system = system.map(Message::system);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut messages: Vec<Message> = system.take().into_iter().collect();
        messages.push(Message::user(line));
        let request = ChatRequest::new(messages)
            .session(session)
            .params(params.clone());

        match gateway.chat(client, &request).await {
            Ok(response) => println!("{}", response.message.content),
            Err(e) if e.retry_after().is_some() => eprintln!("error: {e}"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
