//! Session controller: owns the engine world, applies runtime commands at
//! tick boundaries, and emits one snapshot per iteration to a pluggable
//! sink.
//!
//! The controller is single-threaded and cooperative. A transport layer
//! feeds commands through a bounded channel from its own reader task; the
//! controller drains that channel between ticks, honors the tick delay by
//! waiting on the same channel, and treats any sink failure as an implicit
//! stop. A final snapshot (marked `final`) is always attempted, and the
//! post-run analytics bundle is handed back to the caller.

use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use bevy_ecs::prelude::World;
use bevy_ecs::schedule::Schedule;
use serde::Deserialize;

use crate::error::{SessionError, SinkError};
use crate::runner;
use crate::scenario::{build_scenario, SessionConfig};
use crate::snapshot::{capture_snapshot, TickSnapshot};
use crate::telemetry::{self, AnalyticsBundle};

/// Runtime commands, applied at tick boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Pause,
    Resume,
    /// Advance exactly one tick while paused, and emit it.
    Step,
    Stop,
    /// Replace the tick delay, in seconds.
    SetSpeed(f64),
}

/// Capacity of the command channel between the transport reader and the
/// controller.
pub const COMMAND_QUEUE_DEPTH: usize = 32;

/// The bounded single-producer/single-consumer command queue.
pub fn command_channel() -> (SyncSender<Command>, Receiver<Command>) {
    sync_channel(COMMAND_QUEUE_DEPTH)
}

#[derive(Debug, Deserialize)]
struct CommandMessage {
    cmd: String,
    value: Option<f64>,
}

/// Parse the wire form `{"cmd": "...", "value": ...}`. Unknown commands
/// and malformed payloads yield `None` and are ignored by transports.
pub fn parse_command(raw: &str) -> Option<Command> {
    let message: CommandMessage = serde_json::from_str(raw).ok()?;
    match message.cmd.as_str() {
        "pause" => Some(Command::Pause),
        "resume" => Some(Command::Resume),
        "step" => Some(Command::Step),
        "stop" => Some(Command::Stop),
        "set_speed" => message.value.map(Command::SetSpeed),
        _ => None,
    }
}

/// Where snapshots go. Implemented by the transport layer; failures stop
/// the session.
pub trait SnapshotSink {
    fn emit(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError>;
}

/// Sink that keeps every snapshot in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub snapshots: Vec<TickSnapshot>,
}

impl SnapshotSink for MemorySink {
    fn emit(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

/// A configured, runnable simulation session.
pub struct Session {
    world: World,
    schedule: Schedule,
    tick_delay: Duration,
    include_console: bool,
}

impl Session {
    /// Validate the configuration and build the engine. Nothing is
    /// constructed on error.
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let mut world = World::new();
        build_scenario(&mut world, config)?;
        Ok(Self {
            world,
            schedule: runner::tick_schedule(),
            tick_delay: Duration::from_secs_f64(config.tick_delay.max(0.0)),
            include_console: config.console_map,
        })
    }

    /// Engine access for tests and embedders.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Drive the session to termination: run ticks, emit snapshots, poll
    /// commands. Returns the post-run analytics bundle.
    pub fn run(
        &mut self,
        commands: &Receiver<Command>,
        sink: &mut dyn SnapshotSink,
    ) -> AnalyticsBundle {
        let mut paused = false;
        let mut stopped = false;

        // tick-0 snapshot so observers see the initial world
        if self.emit(sink).is_err() {
            stopped = true;
        }

        while !stopped && !runner::is_finished(&mut self.world) {
            while let Ok(command) = commands.try_recv() {
                self.apply(command, &mut paused, &mut stopped, sink);
            }
            if stopped {
                break;
            }

            if !paused {
                runner::run_next_tick(&mut self.world, &mut self.schedule);
            }
            // paused sessions keep emitting so observers see the paused tick
            if self.emit(sink).is_err() {
                break;
            }

            if !self.tick_delay.is_zero() {
                match commands.recv_timeout(self.tick_delay) {
                    Ok(command) => self.apply(command, &mut paused, &mut stopped, sink),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => std::thread::sleep(self.tick_delay),
                }
            }
        }

        // always attempt the final snapshot; it may be lost with the sink
        let mut final_snapshot = capture_snapshot(&mut self.world, self.include_console);
        final_snapshot.is_final = true;
        let _ = sink.emit(&final_snapshot);
        tracing::info!(tick = final_snapshot.stats.tick, "session finished");

        telemetry::collect_bundle(&mut self.world)
    }

    fn apply(
        &mut self,
        command: Command,
        paused: &mut bool,
        stopped: &mut bool,
        sink: &mut dyn SnapshotSink,
    ) {
        match command {
            Command::Pause => *paused = true,
            Command::Resume => *paused = false,
            Command::Stop => *stopped = true,
            Command::SetSpeed(seconds) => {
                self.tick_delay = Duration::from_secs_f64(seconds.max(0.0));
            }
            Command::Step => {
                *paused = true;
                runner::run_next_tick(&mut self.world, &mut self.schedule);
                if self.emit(sink).is_err() {
                    *stopped = true;
                }
            }
        }
    }

    fn emit(&mut self, sink: &mut dyn SnapshotSink) -> Result<(), SinkError> {
        let snapshot = capture_snapshot(&mut self.world, self.include_console);
        sink.emit(&snapshot)
    }
}
