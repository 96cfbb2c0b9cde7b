//! Checkout service: one countdown per checkout, ticking for the queue
//! head. Checkouts are visited in row-major order every tick.
//!
//! A fresh head gets service_time = max(1, 1 + items_total + noise),
//! written to both the cell countdown and the shopper. The countdown
//! strictly decreases once per tick; the tick it reaches zero the head is
//! dequeued, marked done, and parked on the exit cell.

use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::clock::TickClock;
use crate::distributions::{self, SimRng};
use crate::grid::Grid;
use crate::shopper::Shopper;

pub fn checkout_service_system(
    clock: Res<TickClock>,
    mut grid: ResMut<Grid>,
    mut rng: ResMut<SimRng>,
    mut shoppers: Query<&mut Shopper>,
) {
    let exit = grid.exit_or_entrance();
    for checkout in grid.checkout_positions() {
        let Some(head) = grid.queue_head(checkout) else {
            continue;
        };

        if grid.service_remaining(checkout) == 0 {
            let items_total = shoppers
                .get(head)
                .map(|s| s.items_total)
                .unwrap_or_default();
            let noise = distributions::service_noise(&mut rng.0);
            let service_time = (1 + items_total as u32 + noise).max(1);
            grid.set_service_remaining(checkout, service_time);
            if let Ok(mut shopper) = shoppers.get_mut(head) {
                shopper.checkout_time = service_time;
            }
            tracing::debug!(
                checkout = ?checkout,
                service_time,
                items = items_total,
                "started serving queue head"
            );
        }

        let remaining = grid.service_remaining(checkout).saturating_sub(1);
        grid.set_service_remaining(checkout, remaining);
        if remaining > 0 {
            continue;
        }

        let Some(served) = grid.dequeue_head(checkout) else {
            continue;
        };
        if let Some(exit_pos) = exit {
            grid.place_agent(served, exit_pos);
        }
        if let Ok(mut shopper) = shoppers.get_mut(served) {
            shopper.in_queue = false;
            shopper.shopping_done = true;
            shopper.finish_tick = Some(clock.now());
            shopper.pos = exit.or(shopper.pos);
            tracing::debug!(
                shopper = %shopper.id,
                tick = clock.now(),
                waited = shopper.time_waited,
                "served and sent to the exit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy_ecs::prelude::World;
    use bevy_ecs::schedule::Schedule;

    use super::*;
    use crate::grid::Position;
    use crate::shopper::{ClientType, SpeedClass};
    use crate::test_helpers::{corridor_world, spawn_shopper};

    fn service_schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems(checkout_service_system);
        schedule
    }

    fn enqueue(world: &mut World, id: u32, items_total: usize) -> bevy_ecs::prelude::Entity {
        let checkout = Position::new(0, 5);
        let entity = spawn_shopper(world, id, ClientType::Solo, SpeedClass::Fast, 0.5);
        {
            let mut shopper = world.get_mut::<Shopper>(entity).unwrap();
            shopper.items_total = items_total;
            shopper.pos = Some(checkout);
            shopper.in_queue = true;
            shopper.entered = true;
            shopper.start_tick = Some(0);
        }
        world.resource_mut::<Grid>().place_agent(entity, checkout);
        entity
    }

    #[test]
    fn countdown_strictly_decreases_until_service_completes() {
        let mut world = corridor_world(6);
        let checkout = Position::new(0, 5);
        let entity = enqueue(&mut world, 1, 3);

        let mut schedule = service_schedule();
        schedule.run(&mut world);

        let assigned = world.get::<Shopper>(entity).unwrap().checkout_time;
        assert!(assigned >= 4, "1 + 3 items + noise must be at least 4");
        let mut last = world.resource::<Grid>().service_remaining(checkout);
        assert_eq!(last, assigned - 1);

        while world.resource::<Grid>().queue_len(checkout) > 0 {
            schedule.run(&mut world);
            let now = world.resource::<Grid>().service_remaining(checkout);
            assert!(now < last, "countdown must strictly decrease");
            last = now;
        }
        assert_eq!(last, 0);

        let shopper = world.get::<Shopper>(entity).unwrap();
        assert!(shopper.shopping_done);
        assert!(!shopper.in_queue);
        assert_eq!(shopper.finish_tick, Some(0));
        // parked on the exit (the entrance here, since the corridor has none)
        assert_eq!(shopper.pos, Some(Position::new(0, 0)));
    }

    #[test]
    fn next_head_gets_its_own_service_time() {
        let mut world = corridor_world(6);
        let checkout = Position::new(0, 5);
        let first = enqueue(&mut world, 1, 0);
        let second = enqueue(&mut world, 2, 5);

        let mut schedule = service_schedule();
        // serve the first head to completion
        for _ in 0..10 {
            if world.get::<Shopper>(first).unwrap().shopping_done {
                break;
            }
            schedule.run(&mut world);
        }
        assert!(world.get::<Shopper>(first).unwrap().shopping_done);
        assert!(!world.get::<Shopper>(second).unwrap().shopping_done);

        // the second shopper's timer starts fresh
        for _ in 0..12 {
            if world.get::<Shopper>(second).unwrap().shopping_done {
                break;
            }
            schedule.run(&mut world);
        }
        let shopper = world.get::<Shopper>(second).unwrap();
        assert!(shopper.shopping_done);
        assert!(shopper.checkout_time >= 6, "1 + 5 items + noise");
        assert_eq!(world.resource::<Grid>().queue_len(checkout), 0);
    }

    #[test]
    fn idle_checkouts_do_nothing() {
        let mut world = corridor_world(6);
        let mut schedule = service_schedule();
        schedule.run(&mut world);
        assert_eq!(
            world
                .resource::<Grid>()
                .service_remaining(Position::new(0, 5)),
            0
        );
    }
}
