mod script;

use anyhow::{Context, Result};
use clap::Parser;
use script::Script;
use std::path::PathBuf;
use std::sync::Arc;
use stillcue_application::{Session, SessionConfig};
use stillcue_awareness::SimulatedProvider;
use stillcue_events::TracingEventBus;
use stillcue_player::{AudioBackend, CpalBackend, NullBackend, PlaybackConfig};
use stillcue_snapshot::{GrantResult, InMemoryCapabilityGate};
use tracing_subscriber::EnvFilter;

/// stillcue - plays a cue when you settle into an activity
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON activity script; a short demo runs without one
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Answer location prompts with a grant
    #[arg(long)]
    grant_location: bool,

    /// Log cues instead of playing them
    #[arg(long)]
    silent: bool,

    /// Output volume for the cue
    #[arg(long, default_value = "0.8")]
    volume: f32,

    /// Output device name
    #[arg(long)]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stillcue=debug")),
        )
        .init();

    let config = match &cli.config {
        Some(path) => SessionConfig::load(path),
        None => SessionConfig::load_or_default(),
    }
    .context("Failed to load config")?;

    let script = match &cli.script {
        Some(path) => Script::load(path)?,
        None => Script::demo(config.activity),
    };

    let provider = Arc::new(SimulatedProvider::new());
    if let Some(weather) = script.weather.clone() {
        provider.set_weather(weather);
    }

    let capabilities = Arc::new(InMemoryCapabilityGate::new());
    if cli.grant_location {
        capabilities.answer_requests_with(GrantResult::Granted);
    }

    let backend = audio_backend(&cli);
    tracing::info!(backend = backend.name(), activity = %config.activity, "starting stillcue");

    let session = Session::new(
        config,
        provider.clone(),
        capabilities,
        backend,
        Arc::new(TracingEventBus),
    );

    session.connect().await?;
    let outcome = script::run(&script, &session, &provider).await;

    session.pause().await.context("pause task failed")?;
    session.stop();
    session.disconnect().await?;

    let status = session.status();
    tracing::info!(
        received = status.deliveries_received,
        rejected = status.deliveries_rejected,
        notifications = status.notifications,
        "session finished"
    );
    outcome
}

fn audio_backend(cli: &Cli) -> Box<dyn AudioBackend> {
    if cli.silent {
        return Box::new(NullBackend::new());
    }
    let config = PlaybackConfig {
        volume: cli.volume.clamp(0.0, 1.0),
        device_name: cli.device.clone(),
    };
    match CpalBackend::new(config) {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            tracing::warn!(error = %e, "audio output unavailable, running silent");
            Box::new(NullBackend::new())
        }
    }
}
