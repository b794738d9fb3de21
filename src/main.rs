use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser};
use humantime::parse_rfc3339;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use wallpaper_scheduler::collaborators::{FileAccess, MediaLibrary, PowerSource};
use wallpaper_scheduler::config::Configuration;
use wallpaper_scheduler::displays::DisplayRegistry;
use wallpaper_scheduler::dry_run;
use wallpaper_scheduler::engine::WallpaperEngine;
use wallpaper_scheduler::events::EngineCommand;
use wallpaper_scheduler::library::{LibraryDocument, YamlLibrary};
use wallpaper_scheduler::platform::command_wallpaper::CommandWallpaperSetter;
use wallpaper_scheduler::platform::file_access::PathAccess;
use wallpaper_scheduler::platform::power::ProfilePowerSource;
use wallpaper_scheduler::platform::process_video::ProcessVideoBackend;
use wallpaper_scheduler::platform::wlr_displays::WlrDisplays;
use wallpaper_scheduler::scheduler::{RuleScheduler, SchedulerDeps};
use wallpaper_scheduler::tasks;
use wallpaper_scheduler::video::VideoWallpaperManager;

#[derive(Debug, Parser)]
#[command(
    name = "wallpaper-scheduler",
    version,
    about = "Rule-driven image and video wallpapers for Wayland desktops"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Print the next N scheduler evaluations without touching the desktop
    #[arg(long = "dry-run", value_name = "ITERATIONS")]
    dry_run: Option<usize>,
    /// Start the dry run at this RFC 3339 instant instead of now
    #[arg(long = "now", value_name = "RFC3339")]
    now: Option<String>,
    /// Deterministic RNG seed for candidate selection
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,
    /// Increase log verbosity (repeatable); ignored when RUST_LOG is set
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let fallback = match verbosity {
        0 => "info",
        1 => "wallpaper_scheduler=debug,info",
        _ => "wallpaper_scheduler=trace,debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        dry_run,
        now,
        seed,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let now_override: Option<DateTime<Utc>> = match now {
        Some(ts) => Some(
            parse_rfc3339(&ts)
                .context("failed to parse --now")?
                .into(),
        ),
        None => None,
    };

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    if let Some(iterations) = dry_run {
        return run_dry_run(&cfg, iterations, now_override, seed);
    }

    let engine = build_engine(&cfg, seed)?;
    let (control_tx, control_rx) = mpsc::channel::<EngineCommand>(16);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        forward_signal(
            SignalKind::user_defined1(),
            EngineCommand::TogglePause,
            control_tx.clone(),
            cancel.clone(),
        );
        forward_signal(
            SignalKind::user_defined2(),
            EngineCommand::ApplyNow,
            control_tx.clone(),
            cancel.clone(),
        );
        forward_signal(
            SignalKind::hangup(),
            EngineCommand::DisplaysChanged,
            control_tx.clone(),
            cancel.clone(),
        );
    }

    let timing = tasks::engine::EngineTiming {
        tick_interval: cfg.scheduler.tick_interval,
        power_poll_interval: cfg.video.power_poll_interval,
        display_poll_interval: cfg.platform.display_poll_interval,
        autostart: cfg.scheduler.autostart,
    };

    let mut tasks = JoinSet::new();
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            tasks::engine::run(engine, control_rx, cancel, timing)
                .await
                .map(|_| ())
                .context("engine task failed")
        }
    });

    // Keep a sender alive so the engine never sees a closed channel while running.
    let _control = control_tx;

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
        cancel.cancel();
    }

    Ok(())
}

fn build_engine(cfg: &Configuration, seed: Option<u64>) -> Result<WallpaperEngine> {
    let displays = DisplayRegistry::new(Arc::new(WlrDisplays::new(
        cfg.platform.display_command.clone(),
    )));
    let library: Arc<dyn MediaLibrary> = Arc::new(
        YamlLibrary::open(&cfg.library_path, cfg.history_path.clone())
            .context("failed to open media library")?,
    );
    let access: Arc<dyn FileAccess> = Arc::new(PathAccess);
    let power: Arc<dyn PowerSource> =
        Arc::new(ProfilePowerSource::new(cfg.platform.power_command.clone()));

    let mut options = cfg.scheduler.clone();
    if seed.is_some() {
        options.random_seed = seed;
    }
    let scheduler = RuleScheduler::new(
        SchedulerDeps {
            library,
            setter: Arc::new(CommandWallpaperSetter::new(
                cfg.platform.image_command.clone(),
                displays.clone(),
            )),
            access: Arc::clone(&access),
            displays: displays.clone(),
        },
        options,
        cfg.timezone,
        cfg.fit_mode,
    );
    let video = VideoWallpaperManager::new(
        Box::new(ProcessVideoBackend::new(cfg.platform.video_command.clone())),
        access,
        displays.clone(),
        cfg.video.clone(),
    );
    Ok(WallpaperEngine::new(scheduler, video, displays, power))
}

#[cfg(unix)]
fn forward_signal(
    kind: SignalKind,
    command: EngineCommand,
    control: mpsc::Sender<EngineCommand>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        match signal(kind) {
            Ok(mut stream) => loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = stream.recv() => {
                        if received.is_none() {
                            break;
                        }
                        tracing::info!(?command, "signal received");
                        if let Err(err) = control.send(command.clone()).await {
                            tracing::warn!("failed to forward {command:?}: {err}");
                            break;
                        }
                    }
                }
            },
            Err(err) => tracing::warn!("failed to register signal handler: {err}"),
        }
    });
}

fn run_dry_run(
    cfg: &Configuration,
    iterations: usize,
    now_override: Option<DateTime<Utc>>,
    seed: Option<u64>,
) -> Result<()> {
    let start = now_override.unwrap_or_else(Utc::now);
    let document = LibraryDocument::from_yaml_file(&cfg.library_path)?;

    println!(
        "# schedule dry run\n# rules: {}\n# media: {}\n# start: {}\n# timezone: {}\n# iterations: {}\n# seed: {}\n",
        document.rules.len(),
        document.media.len(),
        start.to_rfc3339(),
        cfg.timezone,
        iterations,
        seed.or(cfg.scheduler.random_seed)
            .map_or_else(|| "0".to_string(), |s| s.to_string())
    );

    let plan = dry_run::simulate(cfg, document, start, iterations, seed);
    println!("# planned evaluations:");
    for (idx, step) in plan.iter().enumerate() {
        let local = step.at.with_timezone(&cfg.timezone);
        match (&step.media_id, step.outcome) {
            (Some(media), "applied") => println!(
                "  {:>4}: {}  {:<14} rule={} {}={} display={}",
                idx + 1,
                local.format("%a %Y-%m-%d %H:%M"),
                step.outcome,
                step.rule_id.as_deref().unwrap_or("-"),
                if step.video { "video" } else { "image" },
                media,
                step.target_display_id.as_deref().unwrap_or("all"),
            ),
            _ => println!(
                "  {:>4}: {}  {:<14} rule={}",
                idx + 1,
                local.format("%a %Y-%m-%d %H:%M"),
                step.outcome,
                step.rule_id.as_deref().unwrap_or("-"),
            ),
        }
    }
    Ok(())
}
