//! Scenario setup: validate a session configuration, build the store,
//! sample the shopper roster, and schedule arrivals.
//!
//! The arrival schedule is owned by the session layer: shoppers are created
//! up front, entry ticks accumulate exponential inter-arrival gaps (the
//! first shopper enters at tick 0), and the engine then spawns them as
//! their ticks come due.

use std::path::PathBuf;

use bevy_ecs::prelude::World;
use serde::{Deserialize, Serialize};

use crate::clock::{ArrivalSchedule, TickClock};
use crate::distributions::{self, SimRng, Weekday, DEFAULT_ARRIVAL_RATE};
use crate::error::{ConfigError, SessionError};
use crate::map;
use crate::pathfind::Planner;
use crate::shopper::{ClientType, Shopper, ShopperId, SpeedClass};
use crate::telemetry::CheckoutTelemetry;

/// Explicit shopper traits supplied by the caller instead of sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSpec {
    pub patience: f64,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub speed: SpeedClass,
}

/// Session input. Every field has a default so partial JSON configs work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub day: Weekday,
    /// Hour of day, 0..=23.
    pub hour: u8,
    pub rows: usize,
    pub cols: usize,
    /// Roster size. Defaults to a draw from the arrival distribution for
    /// (day, hour).
    pub num_clients: Option<usize>,
    pub max_ticks: u64,
    /// Wall-clock seconds between emitted snapshots.
    pub tick_delay: f64,
    pub seed: Option<u64>,
    /// Explicit roster; overrides `num_clients` when non-empty.
    pub clients: Vec<ClientSpec>,
    /// Text map to load instead of the built-in layout.
    pub map_file: Option<PathBuf>,
    /// Symbol table for `map_file`; the built-in table applies otherwise.
    pub symbol_file: Option<PathBuf>,
    /// Attach the textual floor rendering to every snapshot.
    pub console_map: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            day: Weekday::Monday,
            hour: 10,
            rows: 10,
            cols: 12,
            num_clients: None,
            max_ticks: 100,
            tick_delay: 0.5,
            seed: None,
            clients: Vec::new(),
            map_file: None,
            symbol_file: None,
            console_map: false,
        }
    }
}

impl SessionConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_num_clients(mut self, num_clients: usize) -> Self {
        self.num_clients = Some(num_clients);
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_tick_delay(mut self, tick_delay: f64) -> Self {
        self.tick_delay = tick_delay;
        self
    }

    pub fn with_day_hour(mut self, day: Weekday, hour: u8) -> Self {
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hour > 23 {
            return Err(ConfigError::HourOutOfRange(self.hour));
        }
        if self.rows < 4 || self.cols < 4 {
            return Err(ConfigError::GridTooSmall {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::ZeroMaxTicks);
        }
        if self.tick_delay < 0.0 || !self.tick_delay.is_finite() {
            return Err(ConfigError::NegativeTickDelay(self.tick_delay));
        }
        for client in &self.clients {
            if !(0.0..=1.0).contains(&client.patience) {
                return Err(ConfigError::PatienceOutOfRange(client.patience));
            }
        }
        Ok(())
    }
}

/// Populate `world` with the grid, the roster, the arrival schedule, and
/// every engine resource. Fails without touching `world` state that the
/// engine would read.
pub fn build_scenario(world: &mut World, config: &SessionConfig) -> Result<(), SessionError> {
    config.validate()?;

    let grid = match &config.map_file {
        Some(map_path) => map::load_map(map_path, config.symbol_file.as_deref())?,
        None => map::build_store(config.rows, config.cols)?,
    };
    let products = grid.products();

    let mut rng = SimRng::seeded(config.seed.unwrap_or(0));

    // roster: explicit specs win, then the configured count, then a draw
    // from the arrival distribution
    let specs: Vec<ClientSpec> = if !config.clients.is_empty() {
        config.clients.clone()
    } else {
        let count = config.num_clients.unwrap_or_else(|| {
            distributions::arrivals_per_hour(&mut rng.0, config.day, config.hour) as usize
        });
        (0..count)
            .map(|_| {
                let client_type = distributions::client_type(&mut rng.0, config.day, config.hour);
                let speed =
                    distributions::speed_class(&mut rng.0, config.day, config.hour, client_type);
                let patience = distributions::patience(&mut rng.0);
                ClientSpec {
                    patience,
                    client_type,
                    speed,
                }
            })
            .collect()
    };

    let mut shoppers: Vec<Shopper> = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let mut shopper = Shopper::new(
                ShopperId(index as u32 + 1),
                spec.client_type,
                spec.speed,
                spec.patience,
            );
            shopper.assign_list(&products, &mut rng.0);
            shopper
        })
        .collect();

    // first arrival at tick 0, exponential gaps afterwards
    let mut schedule = ArrivalSchedule::default();
    let mut entry_tick = 0;
    let mut first = true;
    let mut spawned = Vec::with_capacity(shoppers.len());
    for shopper in &mut shoppers {
        if !first {
            entry_tick += distributions::interarrival_ticks(&mut rng.0, DEFAULT_ARRIVAL_RATE);
        }
        first = false;
        shopper.entry_tick = entry_tick;
        spawned.push(entry_tick);
    }
    tracing::info!(
        shoppers = shoppers.len(),
        last_arrival = spawned.last().copied().unwrap_or(0),
        "scenario built"
    );

    for shopper in shoppers {
        let entry_tick = shopper.entry_tick;
        let entity = world.spawn(shopper).id();
        schedule.push(entry_tick, entity);
    }

    world.insert_resource(grid);
    world.insert_resource(TickClock::new(config.max_ticks));
    world.insert_resource(schedule);
    world.insert_resource(Planner::new());
    world.insert_resource(CheckoutTelemetry::default());
    world.insert_resource(rng);
    Ok(())
}
