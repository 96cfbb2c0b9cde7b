//! Shopper decision step: target choice, checkout re-evaluation, movement,
//! and purchasing, in the fixed per-tick order.
//!
//! Runs as an exclusive system so each shopper can read the rest of the
//! roster (for checkout load estimates) while mutating itself and the
//! grid. Shoppers act in ascending id order, which keeps runs reproducible
//! for a fixed seed.

use bevy_ecs::prelude::{Entity, World};
use bevy_ecs::world::Mut;
use rand::rngs::StdRng;
use rand::Rng;

use crate::distributions::{self, SimRng};
use crate::grid::{CellKind, Grid, MoveOutcome, Position};
use crate::pathfind::{PlanGoal, Planner};
use crate::shopper::{Shopper, ShopperId};

/// Scale on (1 - patience) for the per-tick checkout reconsideration
/// probability.
const REEVALUATE_SCALE: f64 = 0.3;
/// Probability of re-planning the whole path after a blocked step.
const BLOCKED_REPLAN_PROB: f64 = 0.2;
/// A candidate checkout must be shorter by this many shoppers to win a
/// switch.
const SWITCH_MARGIN: usize = 2;

pub fn shopper_decision_system(world: &mut World) {
    let mut roster = world.query::<(Entity, &Shopper)>();
    let mut ordered: Vec<(ShopperId, Entity)> = roster
        .iter(world)
        .map(|(entity, shopper)| (shopper.id, entity))
        .collect();
    ordered.sort_by_key(|(id, _)| *id);

    world.resource_scope(|world, mut grid: Mut<Grid>| {
        world.resource_scope(|world, mut planner: Mut<Planner>| {
            world.resource_scope(|world, mut rng: Mut<SimRng>| {
                for (_, entity) in ordered {
                    step_shopper(world, entity, &mut grid, &mut planner, &mut rng.0);
                }
            })
        })
    });
}

/// Targets currently held by shoppers that are neither queued nor done.
/// Feeds the checkout load estimate.
fn heading_targets(world: &mut World) -> Vec<Position> {
    let mut roster = world.query::<&Shopper>();
    roster
        .iter(world)
        .filter(|s| !s.in_queue && !s.shopping_done)
        .filter_map(|s| s.target)
        .collect()
}

fn step_shopper(
    world: &mut World,
    entity: Entity,
    grid: &mut Grid,
    planner: &mut Planner,
    rng: &mut StdRng,
) {
    // cheap states first: done, queued, not yet placed
    {
        let Some(mut shopper) = world.get_mut::<Shopper>(entity) else {
            return;
        };
        if shopper.shopping_done {
            return;
        }
        if shopper.in_queue {
            shopper.time_waited += 1;
            return;
        }
        if shopper.pos.is_none() {
            return;
        }
    }

    let heading = heading_targets(world);
    let Some(mut shopper) = world.get_mut::<Shopper>(entity) else {
        return;
    };
    decide(entity, &mut *shopper, grid, planner, rng, &heading);
}

fn decide(
    entity: Entity,
    shopper: &mut Shopper,
    grid: &mut Grid,
    planner: &mut Planner,
    rng: &mut StdRng,
    heading: &[Position],
) {
    let Some(pos) = shopper.pos else {
        return;
    };

    if shopper.target.is_none() {
        if shopper.list.is_empty() {
            target_checkout(shopper, grid, planner, heading);
        } else {
            target_list_item(shopper, grid, planner);
        }
    }

    reconsider_checkout(shopper, grid, planner, rng, heading, pos);

    // already standing at the target: pick before trying to move
    if shopper.target == Some(pos) {
        if shopper.attempt_purchase(grid) {
            after_purchase(shopper, grid, planner, heading);
            return;
        }
        if shopper.path.is_empty() && !shopper.list.is_empty() {
            // parked at an access cell with nothing left to buy here;
            // re-choose a target on the next tick
            shopper.target = None;
            return;
        }
    }

    let moved = try_step(entity, shopper, grid, planner, rng);
    if moved && !shopper.in_queue && shopper.target == shopper.pos && shopper.attempt_purchase(grid)
    {
        after_purchase(shopper, grid, planner, heading);
    }
}

/// Impatient shoppers heading for a checkout occasionally look for a
/// visibly shorter queue.
fn reconsider_checkout(
    shopper: &mut Shopper,
    grid: &Grid,
    planner: &mut Planner,
    rng: &mut StdRng,
    heading: &[Position],
    pos: Position,
) {
    let Some(target) = shopper.target else {
        return;
    };
    if !grid.is_checkout(target) {
        return;
    }
    let reconsider = (1.0 - shopper.patience) * REEVALUATE_SCALE;
    if rng.gen::<f64>() >= reconsider {
        return;
    }
    let Some(candidate) = grid.find_best_checkout(pos, heading) else {
        return;
    };
    if candidate == target || grid.queue_len(candidate) + SWITCH_MARGIN > grid.queue_len(target) {
        return;
    }
    // switch only when the shorter queue is actually routable from here
    if let Some(full) = planner.plan(grid, pos, PlanGoal::Cell(candidate)) {
        tracing::debug!(
            shopper = %shopper.id,
            from = ?target,
            to = ?candidate,
            "switched to a shorter checkout queue"
        );
        shopper.target = Some(candidate);
        shopper.path = full.into_iter().skip(1).collect();
    }
}

fn after_purchase(
    shopper: &mut Shopper,
    grid: &Grid,
    planner: &mut Planner,
    heading: &[Position],
) {
    shopper.target = None;
    shopper.path.clear();
    if shopper.list.is_empty() {
        target_checkout(shopper, grid, planner, heading);
    }
}

/// Head for the nearest remaining list item the planner can route to.
/// Unreachable shelves are skipped, so one blocked item never wedges the
/// rest of the basket; with nothing routable the shopper idles and tries
/// again next tick.
fn target_list_item(shopper: &mut Shopper, grid: &Grid, planner: &mut Planner) {
    shopper.target = None;
    shopper.path.clear();
    let Some(pos) = shopper.pos else {
        return;
    };
    for item_pos in shopper.ranked_list_items() {
        let goal = match grid.cell(item_pos).map(|c| &c.kind) {
            Some(CellKind::Shelf { direction, .. }) => PlanGoal::Shelf {
                pos: item_pos,
                direction: *direction,
            },
            _ => PlanGoal::Cell(item_pos),
        };
        if let Some(full) = planner.plan(grid, pos, goal) {
            shopper.target = Some(full.last().copied().unwrap_or(pos));
            shopper.path = full.into_iter().skip(1).collect();
            return;
        }
    }
}

/// Head for a checkout: walk the (load, distance) ranking and take the
/// first one the planner can actually route to. Sealed-off checkouts are
/// skipped entirely, so their queues stay empty.
fn target_checkout(
    shopper: &mut Shopper,
    grid: &Grid,
    planner: &mut Planner,
    heading: &[Position],
) {
    shopper.target = None;
    shopper.path.clear();
    let Some(pos) = shopper.pos else {
        return;
    };
    for candidate in grid.ranked_checkouts(pos, heading) {
        if let Some(full) = planner.plan(grid, pos, PlanGoal::Cell(candidate)) {
            shopper.target = Some(candidate);
            shopper.path = full.into_iter().skip(1).collect();
            return;
        }
    }
}

/// Recompute the path to the current target. Shelf targets resolve to
/// their access cell, and the stored target is rewritten to that cell.
fn plan_current_target(shopper: &mut Shopper, grid: &Grid, planner: &mut Planner) {
    shopper.path.clear();
    let (Some(pos), Some(target)) = (shopper.pos, shopper.target) else {
        return;
    };
    let goal = match grid.cell(target).map(|c| &c.kind) {
        Some(CellKind::Shelf { direction, .. }) => PlanGoal::Shelf {
            pos: target,
            direction: *direction,
        },
        _ => PlanGoal::Cell(target),
    };
    match planner.plan(grid, pos, goal) {
        Some(full) => {
            if let Some(last) = full.last() {
                shopper.target = Some(*last);
            }
            shopper.path = full.into_iter().skip(1).collect();
        }
        // unreachable for now; retried via the blocked re-plan or the next
        // target choice
        None => {}
    }
}

/// One movement attempt, gated by the per-shopper delay. The delay is
/// re-sampled whenever a fresh step begins.
fn try_step(
    entity: Entity,
    shopper: &mut Shopper,
    grid: &mut Grid,
    planner: &mut Planner,
    rng: &mut StdRng,
) -> bool {
    if shopper.fresh_step {
        shopper.move_delay = distributions::move_delay(rng, shopper.client_type, shopper.speed);
        shopper.fresh_step = false;
    }
    if shopper.delay_counter + 1 < shopper.move_delay {
        shopper.delay_counter += 1;
        return false;
    }
    shopper.delay_counter = 0;

    let Some(pos) = shopper.pos else {
        return false;
    };
    let Some(next) = shopper.path.front().copied() else {
        return false;
    };
    match grid.move_agent(entity, pos, next) {
        MoveOutcome::Moved => {
            shopper.path.pop_front();
            shopper.pos = Some(next);
            shopper.fresh_step = true;
            true
        }
        MoveOutcome::Queued => {
            shopper.path.pop_front();
            shopper.pos = Some(next);
            shopper.in_queue = true;
            shopper.fresh_step = true;
            tracing::debug!(shopper = %shopper.id, checkout = ?next, "joined checkout queue");
            true
        }
        MoveOutcome::Blocked => {
            if rng.gen::<f64>() < BLOCKED_REPLAN_PROB {
                plan_current_target(shopper, grid, planner);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy_ecs::schedule::Schedule;

    use super::*;
    use crate::grid::{CellKind, Direction, Product};
    use crate::shopper::{ClientType, SpeedClass};
    use crate::test_helpers::{base_world, corridor_world, spawn_shopper};

    fn decision_schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems(shopper_decision_system);
        schedule
    }

    fn place(world: &mut World, entity: Entity, pos: Position) {
        world.resource_mut::<Grid>().place_agent(entity, pos);
        let mut shopper = world.get_mut::<Shopper>(entity).unwrap();
        shopper.pos = Some(pos);
        shopper.entered = true;
        shopper.start_tick = Some(0);
    }

    #[test]
    fn empty_list_walks_to_the_checkout_and_queues() {
        let mut world = corridor_world(6);
        let entity = spawn_shopper(&mut world, 1, ClientType::Solo, SpeedClass::Fast, 0.9);
        place(&mut world, entity, Position::new(0, 0));

        let mut schedule = decision_schedule();
        for _ in 0..60 {
            schedule.run(&mut world);
            if world.get::<Shopper>(entity).unwrap().in_queue {
                break;
            }
        }

        let shopper = world.get::<Shopper>(entity).unwrap();
        assert!(shopper.in_queue);
        assert_eq!(shopper.pos, Some(Position::new(0, 5)));
        assert_eq!(world.resource::<Grid>().queue_len(Position::new(0, 5)), 1);
        // queued shoppers accumulate wait and never move again on their own
        let waited_before = shopper.time_waited;
        schedule.run(&mut world);
        schedule.run(&mut world);
        let shopper = world.get::<Shopper>(entity).unwrap();
        assert_eq!(shopper.time_waited, waited_before + 2);
        assert!(shopper.in_queue);
    }

    #[test]
    fn shelf_item_is_bought_from_its_access_cell() {
        let mut grid = Grid::new(4, 6);
        grid.cell_mut(Position::new(0, 0)).unwrap().kind = CellKind::Entrance {
            occupants: Vec::new(),
        };
        let shelf = Position::new(2, 3);
        grid.cell_mut(shelf).unwrap().kind = CellKind::Shelf {
            category: "Dairy".into(),
            product_id: Some(101),
            direction: Direction::Up,
            occupants: Vec::new(),
        };
        grid.cell_mut(Position::new(3, 5)).unwrap().kind = CellKind::Checkout {
            queue: Vec::new(),
            remaining_service: 0,
        };
        let mut world = base_world(grid, 200, 1);
        let entity = spawn_shopper(&mut world, 1, ClientType::Solo, SpeedClass::Fast, 0.9);
        world.get_mut::<Shopper>(entity).unwrap().list = vec![Product {
            category: "Dairy".into(),
            product_id: 101,
            pos: shelf,
        }];
        world.get_mut::<Shopper>(entity).unwrap().items_total = 1;
        place(&mut world, entity, Position::new(0, 0));

        let mut schedule = decision_schedule();
        for _ in 0..80 {
            schedule.run(&mut world);
            if world.get::<Shopper>(entity).unwrap().list.is_empty() {
                break;
            }
        }

        let shopper = world.get::<Shopper>(entity).unwrap();
        assert!(shopper.list.is_empty(), "item should be bought");
        // purchased from the directional access cell, never the shelf body
        assert_eq!(
            world
                .resource::<Grid>()
                .cell(shelf)
                .unwrap()
                .occupants()
                .len(),
            0
        );
        // with the basket empty the checkout becomes the next target
        assert_eq!(shopper.target, Some(Position::new(3, 5)));
    }

    #[test]
    fn impatient_shopper_switches_to_the_short_queue() {
        // two checkouts: the target with five queued, the alternative with one
        let mut grid = Grid::new(4, 8);
        grid.cell_mut(Position::new(0, 0)).unwrap().kind = CellKind::Entrance {
            occupants: Vec::new(),
        };
        let crowded = Position::new(3, 6);
        let quiet = Position::new(3, 1);
        grid.cell_mut(crowded).unwrap().kind = CellKind::Checkout {
            queue: (10..15).map(Entity::from_raw).collect(),
            remaining_service: 0,
        };
        grid.cell_mut(quiet).unwrap().kind = CellKind::Checkout {
            queue: vec![Entity::from_raw(15)],
            remaining_service: 0,
        };
        let mut world = base_world(grid, 200, 1);
        let entity = spawn_shopper(&mut world, 1, ClientType::Solo, SpeedClass::Calm, 0.0);
        place(&mut world, entity, Position::new(0, 4));
        {
            let mut shopper = world.get_mut::<Shopper>(entity).unwrap();
            shopper.target = Some(crowded);
        }

        let mut schedule = decision_schedule();
        let mut switched_at = None;
        for tick in 0..20 {
            schedule.run(&mut world);
            let shopper = world.get::<Shopper>(entity).unwrap();
            if shopper.target == Some(quiet) {
                switched_at = Some(tick);
                break;
            }
        }
        assert!(
            switched_at.is_some(),
            "a zero-patience shopper must defect to the short queue within 20 ticks"
        );
    }

    #[test]
    fn blocked_shoppers_stay_put_until_space_frees() {
        // corridor with a single-capacity aisle cell in the middle
        let mut world = corridor_world(5);
        {
            let mut grid = world.resource_mut::<Grid>();
            grid.cell_mut(Position::new(0, 2)).unwrap().kind = CellKind::Aisle {
                capacity: 1,
                occupants: Vec::new(),
            };
        }
        let blocker = spawn_shopper(&mut world, 1, ClientType::Solo, SpeedClass::Calm, 0.9);
        place(&mut world, blocker, Position::new(0, 2));
        // park the blocker: no list, but freeze it by clearing its path and
        // giving it an unreachable state (no target, list empty means it
        // will head to checkout; give it max delay so it barely moves)
        {
            let mut shopper = world.get_mut::<Shopper>(blocker).unwrap();
            shopper.shopping_done = true; // inert wall for this test
        }
        let walker = spawn_shopper(&mut world, 2, ClientType::Solo, SpeedClass::Fast, 0.9);
        place(&mut world, walker, Position::new(0, 0));

        let mut schedule = decision_schedule();
        for _ in 0..6 {
            schedule.run(&mut world);
        }
        let shopper = world.get::<Shopper>(walker).unwrap();
        // the walker reached the cell before the blocker and no further
        assert_eq!(shopper.pos, Some(Position::new(0, 1)));
        crate::test_helpers::assert_world_invariants(&mut world);
    }

    #[test]
    fn blocked_item_does_not_wedge_the_rest_of_the_basket() {
        let mut grid = Grid::new(3, 6);
        grid.cell_mut(Position::new(0, 0)).unwrap().kind = CellKind::Entrance {
            occupants: Vec::new(),
        };
        // nearest item is sealed off; the farther one is reachable
        let sealed = Position::new(1, 1);
        let open = Position::new(1, 3);
        for (pos, id) in [(sealed, 101), (open, 102)] {
            grid.cell_mut(pos).unwrap().kind = CellKind::Shelf {
                category: "Dairy".into(),
                product_id: Some(id),
                direction: Direction::Up,
                occupants: Vec::new(),
            };
        }
        grid.cell_mut(Position::new(0, 1)).unwrap().kind = CellKind::Obstacle;

        let mut world = base_world(grid, 300, 1);
        let entity = spawn_shopper(&mut world, 1, ClientType::Solo, SpeedClass::Fast, 0.9);
        {
            let mut shopper = world.get_mut::<Shopper>(entity).unwrap();
            shopper.list = vec![
                Product {
                    category: "Dairy".into(),
                    product_id: 101,
                    pos: sealed,
                },
                Product {
                    category: "Dairy".into(),
                    product_id: 102,
                    pos: open,
                },
            ];
            shopper.items_total = 2;
        }
        place(&mut world, entity, Position::new(0, 0));

        let mut schedule = decision_schedule();
        for _ in 0..100 {
            schedule.run(&mut world);
        }
        let shopper = world.get::<Shopper>(entity).unwrap();
        assert_eq!(shopper.items_left(), 1, "the reachable item gets bought");
        assert_eq!(shopper.list[0].pos, sealed, "only the sealed item remains");
    }

    #[test]
    fn unreachable_target_leaves_an_empty_path() {
        let mut grid = Grid::new(3, 5);
        grid.cell_mut(Position::new(0, 0)).unwrap().kind = CellKind::Entrance {
            occupants: Vec::new(),
        };
        let shelf = Position::new(1, 3);
        grid.cell_mut(shelf).unwrap().kind = CellKind::Shelf {
            category: "Dairy".into(),
            product_id: Some(101),
            direction: Direction::Up,
            occupants: Vec::new(),
        };
        // wall off the access cell above the shelf
        grid.cell_mut(Position::new(0, 3)).unwrap().kind = CellKind::Obstacle;
        let mut world = base_world(grid, 200, 1);
        let entity = spawn_shopper(&mut world, 1, ClientType::Solo, SpeedClass::Fast, 0.9);
        world.get_mut::<Shopper>(entity).unwrap().list = vec![Product {
            category: "Dairy".into(),
            product_id: 101,
            pos: shelf,
        }];
        place(&mut world, entity, Position::new(0, 0));

        let mut schedule = decision_schedule();
        for _ in 0..10 {
            schedule.run(&mut world);
        }
        let shopper = world.get::<Shopper>(entity).unwrap();
        assert!(shopper.path.is_empty());
        assert_eq!(shopper.pos, Some(Position::new(0, 0)));
        assert_eq!(shopper.items_left(), 1);
    }
}
