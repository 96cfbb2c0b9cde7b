//! Arrival spawning: shoppers whose scheduled tick has come are placed on
//! the entrance cell.

use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::clock::{ArrivalSchedule, TickClock};
use crate::grid::Grid;
use crate::shopper::Shopper;

pub fn arrival_spawn_system(
    clock: Res<TickClock>,
    mut schedule: ResMut<ArrivalSchedule>,
    mut grid: ResMut<Grid>,
    mut shoppers: Query<&mut Shopper>,
) {
    let Some(entrance) = grid.entrance() else {
        return;
    };
    for entity in schedule.due(clock.now()) {
        let Ok(mut shopper) = shoppers.get_mut(entity) else {
            continue;
        };
        if shopper.entered {
            continue;
        }
        grid.place_agent(entity, entrance);
        shopper.pos = Some(entrance);
        shopper.entered = true;
        shopper.start_tick = Some(clock.now());
        tracing::debug!(shopper = %shopper.id, tick = clock.now(), "entered the store");
    }
}
