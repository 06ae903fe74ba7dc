use std::env;

use anyhow::Context;
use beatrock_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use beatrock_server::{GameRuntime, GameService, GameStart, shutdown_tracing};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From BEATROCK_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (beatrock.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (BEATROCK_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    beatrock_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );
    beatrock_server::observability::apply_logging_level(&cfg.logging.level);
    beatrock_server::metrics::init_metrics();

    let runtime = match GameRuntime::builder().with_config(cfg).build().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Startup failed: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(
        shared_cache = runtime.shared_cache().mode(),
        initial_word = %runtime.config().game.initial_word,
        "game runtime ready"
    );

    let persona = resolve_persona();
    tokio::select! {
        result = play(runtime.game(), persona.as_deref()) => {
            if let Err(err) = result {
                eprintln!("Error: {err:#}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }

    runtime.shutdown().await;
    if let Some(rendered) = beatrock_server::metrics::render_metrics() {
        tracing::debug!(metrics = %rendered, "final metrics");
    }
    shutdown_tracing();
}

/// Line-oriented game loop on stdin.
///
/// A line is a guess, except for `:new`, `:history`, `:stats` and `:quit`.
async fn play(game: &GameService, persona: Option<&str>) -> anyhow::Result<()> {
    let mut session = announce(game.start_game(persona).await);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match line.trim() {
            ":quit" => break,
            ":new" => session = announce(game.start_game(persona).await),
            ":history" => {
                let history = game.history(session).await?;
                println!("{} (score {})", history.history.join(" → "), history.score);
            }
            ":stats" => println!("active sessions: {}", game.active_sessions().await),
            guess => match game.guess(session, guess).await {
                Ok(outcome) => {
                    println!("{}", outcome.message);
                    if !outcome.feedback.is_empty() {
                        println!("  {}", outcome.feedback);
                    }
                    println!("  {} | score {}", outcome.word_count_message, outcome.score);
                    if outcome.game_over {
                        println!("Type :new to play again.");
                    }
                }
                Err(e) => println!("{e}"),
            },
        }
    }
    Ok(())
}

fn announce(start: GameStart) -> Uuid {
    println!("{} ({})", start.message, start.word_count_message);
    start.session_id
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: BEATROCK_CONFIG
/// 3. Default: beatrock.toml
fn resolve_config_path() -> (String, ConfigSource) {
    if let Some(path) = flag_value("--config") {
        return (path, ConfigSource::CliArgument);
    }

    if let Ok(path) = env::var("BEATROCK_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    (DEFAULT_CONFIG_FILE.to_string(), ConfigSource::Default)
}

fn resolve_persona() -> Option<String> {
    flag_value("--persona")
}

fn flag_value(flag: &str) -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}
