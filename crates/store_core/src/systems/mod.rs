//! Per-tick systems, executed in the fixed order wired by
//! [crate::runner::tick_schedule]: arrivals, shopper decisions, checkout
//! service, telemetry sampling, tick advance.

pub mod arrivals;
pub mod checkout;
pub mod decision;
pub mod telemetry_sample;

use bevy_ecs::prelude::ResMut;

use crate::clock::TickClock;

/// Last system of every tick: bump the clock.
pub fn advance_tick_system(mut clock: ResMut<TickClock>) {
    clock.advance();
}
