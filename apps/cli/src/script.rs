//! JSON activity scripts for the simulated provider.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use stillcue_application::Session;
use stillcue_awareness::{ActivityKind, SimulatedProvider, Weather};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Report a detected activity, then wait.
    Activity {
        kind: ActivityKind,
        #[serde(default = "default_confidence")]
        confidence: u8,
        #[serde(default)]
        hold_ms: u64,
    },
    Snapshot,
    Pause,
    Resume,
    Stop,
    Connect,
    Wait {
        ms: u64,
    },
}

fn default_confidence() -> u8 {
    90
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Weather the provider reports to snapshot queries.
    #[serde(default)]
    pub weather: Option<Weather>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing script {}", path.display()))
    }

    /// Leave, enter and leave the steady activity once.
    pub fn demo(steady: ActivityKind) -> Self {
        let elsewhere = if steady == ActivityKind::Walking {
            ActivityKind::Running
        } else {
            ActivityKind::Walking
        };
        Self {
            weather: None,
            steps: vec![
                Step::Activity {
                    kind: elsewhere,
                    confidence: 80,
                    hold_ms: 500,
                },
                Step::Activity {
                    kind: steady,
                    confidence: 92,
                    hold_ms: 2500,
                },
                Step::Snapshot,
                Step::Activity {
                    kind: elsewhere,
                    confidence: 75,
                    hold_ms: 500,
                },
            ],
        }
    }
}

pub async fn run(script: &Script, session: &Session, provider: &SimulatedProvider) -> Result<()> {
    for (index, step) in script.steps.iter().enumerate() {
        tracing::debug!(index, ?step, "script step");
        match step {
            Step::Activity {
                kind,
                confidence,
                hold_ms,
            } => {
                let pushed = provider.report_activity(*kind, *confidence);
                tracing::info!(activity = %kind, confidence, pushed, "activity reported");
                sleep_ms(*hold_ms).await;
            }
            Step::Snapshot => {
                let report = session.snapshot().await;
                match report.activity {
                    Some(activity) => println!("{activity}"),
                    None => println!("activity unavailable"),
                }
                if let Some(weather) = report.weather {
                    println!(
                        "weather: {:?}, {:.1}°C",
                        weather.conditions, weather.temperature_c
                    );
                }
            }
            Step::Pause => {
                session.pause().await.context("pause task failed")?;
            }
            Step::Resume => {
                let granted = session.resume().await;
                tracing::info!(granted, "resumed");
            }
            Step::Stop => session.stop(),
            Step::Connect => session.connect().await?,
            Step::Wait { ms } => sleep_ms(*ms).await,
        }
    }
    Ok(())
}

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
