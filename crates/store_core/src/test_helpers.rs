//! Shared test setup: small worlds, shopper spawning, and the invariant
//! walker used by the engine tests.

use bevy_ecs::prelude::{Entity, World};

use crate::clock::{ArrivalSchedule, TickClock};
use crate::distributions::SimRng;
use crate::grid::{CellKind, Grid, Position};
use crate::pathfind::Planner;
use crate::shopper::{ClientType, Shopper, ShopperId, SpeedClass};
use crate::telemetry::CheckoutTelemetry;

/// World with the given grid and every engine resource installed.
pub fn base_world(grid: Grid, max_ticks: u64, seed: u64) -> World {
    let mut world = World::new();
    world.insert_resource(grid);
    world.insert_resource(TickClock::new(max_ticks));
    world.insert_resource(ArrivalSchedule::default());
    world.insert_resource(SimRng::seeded(seed));
    world.insert_resource(Planner::new());
    world.insert_resource(CheckoutTelemetry::default());
    world
}

/// Single-row store: entrance on the left, checkout on the right, aisles
/// in between.
pub fn corridor_world(cols: usize) -> World {
    let mut grid = Grid::new(1, cols);
    grid.cell_mut(Position::new(0, 0)).unwrap().kind = CellKind::Entrance {
        occupants: Vec::new(),
    };
    grid.cell_mut(Position::new(0, cols - 1)).unwrap().kind = CellKind::Checkout {
        queue: Vec::new(),
        remaining_service: 0,
    };
    base_world(grid, 200, 1)
}

/// Spawn a shopper entity with the given traits.
pub fn spawn_shopper(
    world: &mut World,
    id: u32,
    client_type: ClientType,
    speed: SpeedClass,
    patience: f64,
) -> Entity {
    world
        .spawn(Shopper::new(
            ShopperId(id),
            client_type,
            speed,
            patience,
        ))
        .id()
}

/// Walk the whole world and assert the structural invariants that must
/// hold at every tick boundary: each shopper sits in exactly one occupant
/// list xor one queue (or nowhere before spawn), aisles never exceed
/// capacity, and finished shoppers have consistent timestamps.
pub fn assert_world_invariants(world: &mut World) {
    let now = world.resource::<TickClock>().now();
    let mut roster = world.query::<(Entity, &Shopper)>();
    let shoppers: Vec<(Entity, Shopper)> = roster
        .iter(world)
        .map(|(e, s)| (e, s.clone()))
        .collect();
    let grid = world.resource::<Grid>();

    for cell in grid.cells() {
        if let CellKind::Aisle {
            capacity,
            occupants,
        } = &cell.kind
        {
            assert!(
                occupants.len() <= *capacity,
                "aisle {:?} over capacity: {} > {}",
                cell.pos,
                occupants.len(),
                capacity
            );
        }
    }

    for (entity, shopper) in &shoppers {
        let in_occupants: usize = grid
            .cells()
            .map(|c| c.occupants().iter().filter(|e| *e == entity).count())
            .sum();
        let in_queues: usize = grid
            .cells()
            .map(|c| c.queue().iter().filter(|e| *e == entity).count())
            .sum();

        if shopper.in_queue {
            assert_eq!(in_queues, 1, "{} must sit in exactly one queue", shopper.id);
            assert_eq!(in_occupants, 0, "{} queued but also an occupant", shopper.id);
        } else if shopper.pos.is_some() {
            assert_eq!(
                in_occupants, 1,
                "{} must occupy exactly one cell",
                shopper.id
            );
            assert_eq!(in_queues, 0, "{} occupies a cell but is queued", shopper.id);
        } else {
            assert_eq!(in_occupants + in_queues, 0, "{} not yet placed", shopper.id);
        }

        if let Some(finish) = shopper.finish_tick {
            let start = shopper
                .start_tick
                .expect("finished shoppers must have started");
            assert!(start <= finish && finish <= now);
            assert_eq!(shopper.items_left(), 0);
            assert!(shopper.shopping_done);
        }
    }
}
