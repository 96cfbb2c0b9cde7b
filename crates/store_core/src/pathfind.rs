//! Route planning: A* over the walkable grid with the directional shelf
//! access rule.
//!
//! Walkability depends only on topology (obstacles and shelf bodies), never
//! on occupancy, so plans are memoized in an LRU cache keyed by
//! (start, goal). Congestion is handled at move time by the agents, not
//! here.

use std::num::NonZeroUsize;

use bevy_ecs::prelude::Resource;
use lru::LruCache;
use pathfinding::prelude::astar;

use crate::grid::{Direction, Grid, Position, NEIGHBOR_ORDER};

/// What a plan must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanGoal {
    /// Terminate exactly on this cell.
    Cell(Position),
    /// Terminate on the access neighbor of this shelf. With
    /// `Direction::None` every non-obstacle neighbor is a candidate and the
    /// shortest plan wins.
    Shelf { pos: Position, direction: Direction },
}

const PLAN_CACHE_CAPACITY: usize = 4096;

/// Shared route planner resource. Owns the plan cache.
#[derive(Resource)]
pub struct Planner {
    cache: LruCache<(Position, PlanGoal), Option<Vec<Position>>>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(PLAN_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ),
        }
    }

    /// Shortest path from `start` to `goal`, start and terminus inclusive,
    /// or `None` when unreachable. Cached misses are remembered too.
    pub fn plan(&mut self, grid: &Grid, start: Position, goal: PlanGoal) -> Option<Vec<Position>> {
        let key = (start, goal);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let computed = compute_plan(grid, start, goal);
        self.cache.put(key, computed.clone());
        computed
    }
}

fn compute_plan(grid: &Grid, start: Position, goal: PlanGoal) -> Option<Vec<Position>> {
    match goal {
        PlanGoal::Cell(target) => route(grid, start, target),
        PlanGoal::Shelf { pos, direction } => match direction.offset() {
            Some(_) => {
                let access = pos.step(direction)?;
                if !grid.in_bounds(access) {
                    return None;
                }
                route(grid, start, access)
            }
            // unrestricted shelf: try every neighbor, keep the shortest
            None => {
                let mut best: Option<Vec<Position>> = None;
                for neighbor in NEIGHBOR_ORDER.iter().filter_map(|d| pos.step(*d)) {
                    if !grid.in_bounds(neighbor) {
                        continue;
                    }
                    if let Some(path) = route(grid, start, neighbor) {
                        if best.as_ref().map(|b| path.len() < b.len()).unwrap_or(true) {
                            best = Some(path);
                        }
                    }
                }
                best
            }
        },
    }
}

/// Plain A* to a walkable cell: 4-connected, unit edge cost, Manhattan
/// heuristic.
fn route(grid: &Grid, start: Position, target: Position) -> Option<Vec<Position>> {
    if !grid.in_bounds(start) || !grid.in_bounds(target) {
        return None;
    }
    if !grid.cell(target).map(|c| c.is_walkable()).unwrap_or(false) {
        return None;
    }
    let (path, _cost) = astar(
        &start,
        |p| {
            NEIGHBOR_ORDER
                .iter()
                .filter_map(|d| p.step(*d))
                .filter(|n| grid.cell(*n).map(|c| c.is_walkable()).unwrap_or(false))
                .map(|n| (n, 1u32))
                .collect::<Vec<_>>()
        },
        |p| p.manhattan(target) as u32,
        |p| *p == target,
    )?;
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellKind;

    fn wall(grid: &mut Grid, pos: Position) {
        grid.cell_mut(pos).unwrap().kind = CellKind::Obstacle;
    }

    fn shelf(grid: &mut Grid, pos: Position, direction: Direction) {
        grid.cell_mut(pos).unwrap().kind = CellKind::Shelf {
            category: "Dairy".into(),
            product_id: Some(100),
            direction,
            occupants: Vec::new(),
        };
    }

    #[test]
    fn free_goal_path_is_inclusive_and_shortest() {
        let grid = Grid::new(5, 5);
        let mut planner = Planner::new();
        let path = planner
            .plan(&grid, Position::new(0, 0), PlanGoal::Cell(Position::new(0, 3)))
            .expect("open grid is reachable");
        assert_eq!(path.first(), Some(&Position::new(0, 0)));
        assert_eq!(path.last(), Some(&Position::new(0, 3)));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn paths_route_around_obstacles_and_shelves() {
        let mut grid = Grid::new(3, 5);
        // vertical wall with one gap in the bottom row
        wall(&mut grid, Position::new(0, 2));
        shelf(&mut grid, Position::new(1, 2), Direction::None);
        let mut planner = Planner::new();
        let path = planner
            .plan(&grid, Position::new(0, 0), PlanGoal::Cell(Position::new(0, 4)))
            .expect("gap exists");
        assert!(!path.contains(&Position::new(0, 2)));
        assert!(!path.contains(&Position::new(1, 2)));
        assert!(path.contains(&Position::new(2, 2)));
    }

    #[test]
    fn directional_shelf_ends_at_its_access_cell() {
        let mut grid = Grid::new(4, 4);
        let shelf_pos = Position::new(2, 2);
        shelf(&mut grid, shelf_pos, Direction::Up);
        let mut planner = Planner::new();
        let path = planner
            .plan(
                &grid,
                Position::new(0, 0),
                PlanGoal::Shelf {
                    pos: shelf_pos,
                    direction: Direction::Up,
                },
            )
            .expect("access row is open");
        assert_eq!(path.last(), Some(&Position::new(1, 2)));
    }

    #[test]
    fn blocked_access_cell_is_unreachable() {
        let mut grid = Grid::new(4, 4);
        let shelf_pos = Position::new(2, 2);
        shelf(&mut grid, shelf_pos, Direction::Up);
        wall(&mut grid, Position::new(1, 2));
        let mut planner = Planner::new();
        assert!(planner
            .plan(
                &grid,
                Position::new(0, 0),
                PlanGoal::Shelf {
                    pos: shelf_pos,
                    direction: Direction::Up,
                },
            )
            .is_none());
    }

    #[test]
    fn unrestricted_shelf_takes_the_nearest_side() {
        let mut grid = Grid::new(4, 4);
        let shelf_pos = Position::new(2, 2);
        shelf(&mut grid, shelf_pos, Direction::None);
        let mut planner = Planner::new();
        let path = planner
            .plan(
                &grid,
                Position::new(1, 0),
                PlanGoal::Shelf {
                    pos: shelf_pos,
                    direction: Direction::None,
                },
            )
            .expect("several sides are open");
        // from (1,0) the cell above the shelf is the closest access point
        assert_eq!(path.last(), Some(&Position::new(1, 2)));
    }

    #[test]
    fn walled_in_target_reports_none() {
        let mut grid = Grid::new(5, 5);
        let target = Position::new(2, 2);
        for pos in [
            Position::new(1, 2),
            Position::new(3, 2),
            Position::new(2, 1),
            Position::new(2, 3),
        ] {
            wall(&mut grid, pos);
        }
        let mut planner = Planner::new();
        assert!(planner
            .plan(&grid, Position::new(0, 0), PlanGoal::Cell(target))
            .is_none());
        // the miss is cached and stays a miss
        assert!(planner
            .plan(&grid, Position::new(0, 0), PlanGoal::Cell(target))
            .is_none());
    }

    #[test]
    fn trivial_plan_is_just_the_start() {
        let grid = Grid::new(3, 3);
        let mut planner = Planner::new();
        let here = Position::new(1, 1);
        let path = planner.plan(&grid, here, PlanGoal::Cell(here)).unwrap();
        assert_eq!(path, vec![here]);
    }
}
