use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::WallpaperEngine;
use crate::events::EngineCommand;

#[derive(Debug, Clone, Copy)]
pub struct EngineTiming {
    pub tick_interval: Duration,
    pub power_poll_interval: Duration,
    pub display_poll_interval: Duration,
    pub autostart: bool,
}

/// Drives the engine until `cancel` fires.
///
/// Everything (control commands, scheduler ticks, power and display polls)
/// runs on this one task, so engine callbacks are strictly serialized.
/// Returns the engine after shutting it down.
pub async fn run(
    mut engine: WallpaperEngine,
    mut control: Receiver<EngineCommand>,
    cancel: CancellationToken,
    timing: EngineTiming,
) -> Result<WallpaperEngine> {
    let mut scheduler_ticks = interval(timing.tick_interval);
    scheduler_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut power_ticks = interval(timing.power_poll_interval);
    power_ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut display_ticks = interval(timing.display_poll_interval);
    display_ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut control_open = true;

    if timing.autostart {
        engine.handle(EngineCommand::Start, Utc::now());
        scheduler_ticks.reset();
    }

    loop {
        select! {
            _ = cancel.cancelled() => break,

            maybe_cmd = control.recv(), if control_open => {
                match maybe_cmd {
                    Some(command) => {
                        let restarts = command == EngineCommand::Start;
                        engine.handle(command, Utc::now());
                        if restarts {
                            // Next periodic evaluation is a full interval after the immediate one.
                            scheduler_ticks.reset();
                        }
                    }
                    None => {
                        debug!("control channel closed");
                        control_open = false;
                    }
                }
            }

            _ = scheduler_ticks.tick(), if engine.scheduler().is_running() => {
                let outcome = engine.scheduler_tick(Utc::now());
                debug!(outcome = outcome.label(), "scheduler tick");
            }

            _ = power_ticks.tick() => {
                engine.power_tick();
            }

            _ = display_ticks.tick() => {
                engine.display_tick();
            }
        }
    }

    info!("engine task stopping");
    engine.shutdown();
    Ok(engine)
}
