//! Tick loop: wires the per-tick systems into a strictly ordered schedule
//! and drives it until the run terminates.
//!
//! Order within a tick is fixed: arrivals, shopper decisions, checkout
//! service, telemetry sampling, tick advance. The session controller (or a
//! test) calls [run_next_tick] once per tick; the schedule never runs
//! partially.

use bevy_ecs::prelude::World;
use bevy_ecs::schedule::{IntoSystemConfigs, Schedule};

use crate::clock::{ArrivalSchedule, TickClock};
use crate::shopper::Shopper;
use crate::systems::{
    advance_tick_system, arrivals::arrival_spawn_system, checkout::checkout_service_system,
    decision::shopper_decision_system, telemetry_sample::telemetry_sample_system,
};

/// The per-tick schedule, in the documented order.
pub fn tick_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            arrival_spawn_system,
            shopper_decision_system,
            checkout_service_system,
            telemetry_sample_system,
            advance_tick_system,
        )
            .chain(),
    );
    schedule
}

/// Whether the run is over: the tick ceiling was reached, or at least one
/// tick has run with no arrivals pending and every shopper done.
pub fn is_finished(world: &mut World) -> bool {
    let clock = world.resource::<TickClock>();
    if clock.at_limit() {
        return true;
    }
    if clock.now() == 0 {
        return false;
    }
    if !world.resource::<ArrivalSchedule>().is_empty() {
        return false;
    }
    let mut shoppers = world.query::<&Shopper>();
    shoppers.iter(world).all(|s| s.shopping_done)
}

/// Run one tick unless the run is already over. Returns whether a tick
/// executed.
pub fn run_next_tick(world: &mut World, schedule: &mut Schedule) -> bool {
    if is_finished(world) {
        return false;
    }
    schedule.run(world);
    true
}

/// Run ticks until termination or `max_steps`, returning the number of
/// ticks executed.
pub fn run_until_done(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_tick(world, schedule) {
        steps += 1;
    }
    steps
}
