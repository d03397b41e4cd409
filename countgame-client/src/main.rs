//! Counting game client - Main entry point
//!
//! Headless client: connects to the game server, plays cues through the
//! headless output (logged) and reads user actions from stdin.
//!
//! Commands: `camera`, `select <index>`, `restart`, `mute`, `tap`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use countgame_client::app::{asset_loader, AudioStack};
use countgame_client::audio::{HeadlessOutput, HeadlessSpeech};
use countgame_client::game::TracingUi;
use countgame_client::session::{SessionConnector, SseConnector};
use countgame_client::{ClientConfig, UserAction};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for countgame-client
#[derive(Parser, Debug)]
#[command(name = "countgame-client")]
#[command(about = "Audio and session client for the camera counting game")]
#[command(version)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Game server origin (overrides config)
    #[arg(short, long, env = "COUNTGAME_SERVER_URL")]
    server_url: Option<String>,

    /// Start muted
    #[arg(long)]
    muted: bool,

    /// Log level or EnvFilter directive (overrides config)
    #[arg(long, env = "COUNTGAME_LOG")]
    log_level: Option<String>,

    /// Skip preloading audio at startup
    #[arg(long)]
    no_preload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ClientConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.server_url {
        config.server_url = url;
        config = config.validated()?;
    }

    // Initialize tracing: --log-level, then RUST_LOG, then config
    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.level)),
    };
    tracing_subscriber::registry()
        .with(filter.unwrap_or_else(|_| "countgame_client=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting counting game client for {}", config.server_url);

    let http = reqwest::Client::new();
    let audio = AudioStack::build(
        &config,
        asset_loader(&config, http.clone()),
        Arc::new(HeadlessOutput),
        Arc::new(HeadlessSpeech::default()),
    )
    .await
    .context("Failed to initialize audio")?;

    if args.muted {
        audio.controller.set_muted(true).await;
    }

    let mut audio_events = audio.controller.events().subscribe();
    tokio::spawn(async move {
        loop {
            match audio_events.recv().await {
                Ok(event) => debug!("Audio event: {:?}", event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Audio event log lagged by {} events", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if !args.no_preload {
        let cache = Arc::clone(&audio.cache);
        let ids = AudioStack::preload_ids(&config);
        tokio::spawn(async move {
            let report = cache.preload(&ids).await;
            for (id, e) in report.failed {
                warn!("Preload of {} failed: {}", id, e);
            }
        });
    }

    let connector = Arc::new(SseConnector::new(
        http,
        config.events_url(),
        config.connection.connect_timeout(),
    ));
    let (handle, inputs, session) = SessionConnector::start(connector, config.connection.backoff());

    let (action_tx, action_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(action_tx));

    let machine = audio.machine(&config, Arc::new(TracingUi), handle);
    let mut machine_task = tokio::spawn(machine.run(inputs, action_rx));

    tokio::select! {
        finished = &mut machine_task => {
            let snapshot = finished.context("Phase machine task failed")?;
            info!("Final state: {}", serde_json::to_string(&snapshot)?);
            let state = session.join().await;
            error!("Session ended ({:?})", state);
            anyhow::bail!("Lost connection to the game server");
        }
        _ = shutdown_signal() => {
            let state = session.shutdown().await;
            info!("Session closed ({:?})", state);
        }
    }

    if let Ok(snapshot) = machine_task.await {
        info!("Final state: {}", serde_json::to_string(&snapshot)?);
    }
    info!("Shutdown complete");
    Ok(())
}

/// Translate stdin lines into user actions
async fn read_commands(actions: mpsc::UnboundedSender<UserAction>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut words = line.split_whitespace();
        let action = match (words.next(), words.next()) {
            (Some("camera"), _) => UserAction::RequestCameraTest,
            (Some("select"), Some(index)) => match index.parse() {
                Ok(index) => UserAction::SelectCamera(index),
                Err(_) => {
                    warn!("Camera index must be a number: {}", index);
                    continue;
                }
            },
            (Some("restart"), _) => UserAction::Restart,
            (Some("mute"), _) => UserAction::ToggleMute,
            (Some("tap"), _) => UserAction::Gesture,
            (None, _) => continue,
            (Some(other), _) => {
                warn!("Unknown command '{}' (camera, select <n>, restart, mute, tap)", other);
                continue;
            }
        };
        if actions.send(action).is_err() {
            break;
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
