use anyhow::{Context, Result, bail};
use rune_config::RuneConfig;
use rune_flip::FlipEngine;
use rune_flip::headless::HeadlessHost;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod scenario;

use scenario::{Replay, Scenario};

fn main() -> Result<()> {
    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        eprintln!(
            "Usage: rune-flip-trace <scenario.json> [--config <rune.toml>] \
             [--frame-ms <ms>] [--out <report.json>]"
        );
        bail!("missing <scenario.json>");
    }

    let input = PathBuf::from(args.remove(0));
    let mut config_path: Option<PathBuf> = None;
    let mut frame_ms: Option<f64> = None;
    let mut out: Option<PathBuf> = None;
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 >= args.len() {
                    bail!("--config expects a path");
                }
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--frame-ms" => {
                if i + 1 >= args.len() {
                    bail!("--frame-ms expects a number");
                }
                let ms: f64 = args[i + 1]
                    .parse()
                    .with_context(|| format!("invalid --frame-ms value `{}`", args[i + 1]))?;
                if ms.is_nan() || ms <= 0.0 {
                    bail!("--frame-ms must be positive");
                }
                frame_ms = Some(ms);
                i += 2;
            }
            "--out" => {
                if i + 1 >= args.len() {
                    bail!("--out expects a path");
                }
                out = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            other => bail!("unknown argument `{other}`"),
        }
    }

    let config = match &config_path {
        Some(path) => {
            let mut config = RuneConfig::load_from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            config.merge_with_env();
            config
        }
        None => RuneConfig::load(),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| config.logging.filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let mut scenario = Scenario::load(&input)?;
    if let Some(ms) = frame_ms {
        scenario.frame_ms = ms;
    }
    let host = match scenario.viewport {
        Some(viewport) => HeadlessHost::new(viewport),
        None => HeadlessHost::default(),
    };
    let engine = FlipEngine::with_settings(host, &config.flip);

    tracing::info!(
        scenario = %input.display(),
        steps = scenario.steps.len(),
        enabled = config.flip.enabled,
        duration_ms = config.flip.duration_ms,
        "replaying scenario"
    );
    let mut replay = Replay::new(engine, &scenario)?;
    replay.run(&scenario.steps)?;
    let report = replay.finish();

    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    match out {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
