//! Telemetry sampling: one (tick, busy, queue_len) record per checkout per
//! tick, appended after servicing so the sample reflects the end-of-tick
//! queue state.

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::TickClock;
use crate::grid::Grid;
use crate::telemetry::{CheckoutSample, CheckoutTelemetry};

pub fn telemetry_sample_system(
    clock: Res<TickClock>,
    grid: Res<Grid>,
    mut telemetry: ResMut<CheckoutTelemetry>,
) {
    for checkout in grid.checkout_positions() {
        let queue_len = grid.queue_len(checkout);
        telemetry.record(
            checkout,
            CheckoutSample {
                tick: clock.now(),
                busy: queue_len > 0,
                queue_len,
            },
        );
    }
}
