//! Store floor: a rectangular grid of typed cells with capacity-bounded
//! aisles, directional shelves, and checkout queues.
//!
//! Cells never own shoppers. They hold [Entity] ids; the [crate::shopper::Shopper]
//! component on those entities is the single source of truth for per-agent
//! state. A shopper appears in at most one occupant list xor one checkout
//! queue at any instant, and [Grid::move_agent] is the only transfer path
//! during a run (initial spawn and post-service exits go through
//! [Grid::place_agent], which bypasses capacity).

use bevy_ecs::prelude::{Entity, Resource};
use serde::{Deserialize, Serialize};

/// A grid coordinate. Row 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(&self, other: Position) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// The position one step in `direction`, or `None` at the grid edge.
    /// `Direction::None` has no offset and always returns `None`.
    pub fn step(&self, direction: Direction) -> Option<Position> {
        let (dr, dc) = direction.offset()?;
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        Some(Position { row, col })
    }
}

/// Side from which a shelf may be accessed. `None` means unrestricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    /// (row, col) delta of the access cell relative to the shelf.
    /// `Up` means the shopper stands in the row above the shelf.
    pub fn offset(&self) -> Option<(isize, isize)> {
        match self {
            Direction::Up => Some((-1, 0)),
            Direction::Down => Some((1, 0)),
            Direction::Left => Some((0, -1)),
            Direction::Right => Some((0, 1)),
            Direction::None => None,
        }
    }
}

/// Order in which neighbors are visited everywhere (movement, planning,
/// shelf access fallback). Fixed so runs are reproducible.
pub const NEIGHBOR_ORDER: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

/// A shelf product: what a shopping-list entry points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub category: String,
    pub product_id: u32,
    pub pos: Position,
}

/// Cell typology. Kind-specific payload lives on the variant; the movement
/// rule dispatches on the variant and reads only its own fields.
#[derive(Debug, Clone)]
pub enum CellKind {
    Aisle {
        capacity: usize,
        occupants: Vec<Entity>,
    },
    Shelf {
        category: String,
        product_id: Option<u32>,
        direction: Direction,
        /// Shoppers standing on the shelf at the pickup moment. No bound.
        occupants: Vec<Entity>,
    },
    Checkout {
        /// FIFO service queue. The head is the shopper being served.
        queue: Vec<Entity>,
        /// Ticks of service left for the current head; 0 means the next
        /// head gets a freshly computed service time.
        remaining_service: u32,
    },
    Entrance {
        occupants: Vec<Entity>,
    },
    Exit {
        occupants: Vec<Entity>,
    },
    Obstacle,
}

/// Default aisle capacity when a map does not specify one.
pub const DEFAULT_AISLE_CAPACITY: usize = 4;

#[derive(Debug, Clone)]
pub struct Cell {
    pub pos: Position,
    pub kind: CellKind,
}

impl Cell {
    pub fn aisle(pos: Position, capacity: usize) -> Self {
        Self {
            pos,
            kind: CellKind::Aisle {
                capacity: capacity.max(1),
                occupants: Vec::new(),
            },
        }
    }

    /// Lowercase kind label used by snapshots and map rendering.
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            CellKind::Aisle { .. } => "aisle",
            CellKind::Shelf { .. } => "shelf",
            CellKind::Checkout { .. } => "checkout",
            CellKind::Entrance { .. } => "entrance",
            CellKind::Exit { .. } => "exit",
            CellKind::Obstacle => "obstacle",
        }
    }

    pub fn is_walkable(&self) -> bool {
        !matches!(self.kind, CellKind::Obstacle | CellKind::Shelf { .. })
    }

    pub fn capacity(&self) -> usize {
        match self.kind {
            CellKind::Aisle { capacity, .. } => capacity,
            _ => 0,
        }
    }

    pub fn occupants(&self) -> &[Entity] {
        match &self.kind {
            CellKind::Aisle { occupants, .. }
            | CellKind::Shelf { occupants, .. }
            | CellKind::Entrance { occupants }
            | CellKind::Exit { occupants } => occupants,
            _ => &[],
        }
    }

    fn occupants_mut(&mut self) -> Option<&mut Vec<Entity>> {
        match &mut self.kind {
            CellKind::Aisle { occupants, .. }
            | CellKind::Shelf { occupants, .. }
            | CellKind::Entrance { occupants }
            | CellKind::Exit { occupants } => Some(occupants),
            _ => None,
        }
    }

    pub fn queue(&self) -> &[Entity] {
        match &self.kind {
            CellKind::Checkout { queue, .. } => queue,
            _ => &[],
        }
    }

    pub fn is_full(&self) -> bool {
        match &self.kind {
            CellKind::Aisle {
                capacity,
                occupants,
            } => occupants.len() >= *capacity,
            _ => false,
        }
    }

    /// Drop `entity` from this cell, wherever it sits (occupants or queue).
    fn forget(&mut self, entity: Entity) {
        if let Some(occupants) = self.occupants_mut() {
            occupants.retain(|e| *e != entity);
        } else if let CellKind::Checkout { queue, .. } = &mut self.kind {
            queue.retain(|e| *e != entity);
        }
    }
}

/// Result of a [Grid::move_agent] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The shopper now stands on the destination cell.
    Moved,
    /// The destination was a checkout; the shopper joined its queue.
    Queued,
    /// Destination full or not enterable. Nothing changed.
    Blocked,
}

/// The store floor. Topology (kinds, capacities, shelf metadata) is fixed
/// after construction; only occupancy and queues change during a run.
#[derive(Debug, Clone, Resource)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// All-aisle grid with the default capacity. Map builders carve shelves,
    /// checkouts, and doors out of this.
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(Cell::aisle(
                    Position::new(row, col),
                    DEFAULT_AISLE_CAPACITY,
                ));
            }
        }
        Self { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells.get(pos.row * self.cols + pos.col)
    }

    pub fn cell_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells.get_mut(pos.row * self.cols + pos.col)
    }

    /// Row-major iteration over every cell.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Up/down/left/right neighbors that are in bounds and not obstacles.
    /// Shelves are included: they are enterable for pickup even though the
    /// planner refuses to route through them.
    pub fn neighbors(&self, pos: Position) -> Vec<Position> {
        NEIGHBOR_ORDER
            .iter()
            .filter_map(|d| pos.step(*d))
            .filter(|p| {
                self.cell(*p)
                    .map(|c| !matches!(c.kind, CellKind::Obstacle))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Whether a shopper may enter `pos` right now. Aisles below capacity
    /// only; checkouts, shelves, and doors always; obstacles never.
    pub fn is_cell_free(&self, pos: Position) -> bool {
        match self.cell(pos) {
            None => false,
            Some(cell) => match &cell.kind {
                CellKind::Obstacle => false,
                CellKind::Aisle { .. } => !cell.is_full(),
                _ => true,
            },
        }
    }

    /// Atomic transfer of `entity` from `from` to `to`, subject to the
    /// destination rule. On a checkout destination the shopper is appended
    /// to the queue (the caller flips its `in_queue` flag); it is not an
    /// occupant there.
    pub fn move_agent(&mut self, entity: Entity, from: Position, to: Position) -> MoveOutcome {
        if !self.in_bounds(from) || !self.in_bounds(to) {
            return MoveOutcome::Blocked;
        }
        let enterable = match &self.cells[to.row * self.cols + to.col].kind {
            CellKind::Obstacle => None,
            CellKind::Aisle {
                capacity,
                occupants,
            } => (occupants.len() < *capacity).then_some(MoveOutcome::Moved),
            CellKind::Checkout { .. } => Some(MoveOutcome::Queued),
            CellKind::Shelf { .. } | CellKind::Entrance { .. } | CellKind::Exit { .. } => {
                Some(MoveOutcome::Moved)
            }
        };
        let Some(outcome) = enterable else {
            return MoveOutcome::Blocked;
        };

        if let Some(from_cell) = self.cell_mut(from) {
            from_cell.forget(entity);
        }
        let to_cell = &mut self.cells[to.row * self.cols + to.col];
        match &mut to_cell.kind {
            CellKind::Checkout { queue, .. } => queue.push(entity),
            _ => {
                if let Some(occupants) = to_cell.occupants_mut() {
                    occupants.push(entity);
                }
            }
        }
        outcome
    }

    /// Place `entity` on `pos` without a capacity check. Used for the
    /// initial spawn at the entrance and for dropping served shoppers on
    /// the exit. Obstacles still refuse.
    pub fn place_agent(&mut self, entity: Entity, pos: Position) -> bool {
        let Some(cell) = self.cell_mut(pos) else {
            return false;
        };
        match &mut cell.kind {
            CellKind::Obstacle => false,
            CellKind::Checkout { queue, .. } => {
                queue.push(entity);
                true
            }
            _ => {
                if let Some(occupants) = cell.occupants_mut() {
                    occupants.push(entity);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Every shelf product, row-major.
    pub fn products(&self) -> Vec<Product> {
        self.cells
            .iter()
            .filter_map(|cell| match &cell.kind {
                CellKind::Shelf {
                    category,
                    product_id: Some(id),
                    ..
                } => Some(Product {
                    category: category.clone(),
                    product_id: *id,
                    pos: cell.pos,
                }),
                _ => None,
            })
            .collect()
    }

    /// First entrance cell in row-major order.
    pub fn entrance(&self) -> Option<Position> {
        self.cells
            .iter()
            .find(|c| matches!(c.kind, CellKind::Entrance { .. }))
            .map(|c| c.pos)
    }

    /// Where served shoppers land: the first exit, falling back to the
    /// entrance when the map has no exit.
    pub fn exit_or_entrance(&self) -> Option<Position> {
        self.cells
            .iter()
            .find(|c| matches!(c.kind, CellKind::Exit { .. }))
            .map(|c| c.pos)
            .or_else(|| self.entrance())
    }

    /// Row-major positions of every checkout cell.
    pub fn checkout_positions(&self) -> Vec<Position> {
        self.cells
            .iter()
            .filter(|c| matches!(c.kind, CellKind::Checkout { .. }))
            .map(|c| c.pos)
            .collect()
    }

    pub fn is_checkout(&self, pos: Position) -> bool {
        matches!(
            self.cell(pos).map(|c| &c.kind),
            Some(CellKind::Checkout { .. })
        )
    }

    pub fn queue_len(&self, pos: Position) -> usize {
        self.cell(pos).map(|c| c.queue().len()).unwrap_or(0)
    }

    pub fn queue_head(&self, pos: Position) -> Option<Entity> {
        self.cell(pos).and_then(|c| c.queue().first().copied())
    }

    pub fn service_remaining(&self, pos: Position) -> u32 {
        match self.cell(pos).map(|c| &c.kind) {
            Some(CellKind::Checkout {
                remaining_service, ..
            }) => *remaining_service,
            _ => 0,
        }
    }

    pub fn set_service_remaining(&mut self, pos: Position, remaining: u32) {
        if let Some(CellKind::Checkout {
            remaining_service, ..
        }) = self.cell_mut(pos).map(|c| &mut c.kind)
        {
            *remaining_service = remaining;
        }
    }

    /// Pop the head of a checkout queue.
    pub fn dequeue_head(&mut self, pos: Position) -> Option<Entity> {
        match self.cell_mut(pos).map(|c| &mut c.kind) {
            Some(CellKind::Checkout { queue, .. }) if !queue.is_empty() => Some(queue.remove(0)),
            _ => None,
        }
    }

    /// Every checkout ranked by ascending (load, Manhattan distance from
    /// `from`), row-major on full ties. Load is the queue length plus the
    /// number of entries in `heading` that point at the checkout — the
    /// caller passes the current targets of every shopper that is not yet
    /// queued.
    pub fn ranked_checkouts(&self, from: Position, heading: &[Position]) -> Vec<Position> {
        let mut ranked: Vec<(usize, usize, Position)> = self
            .cells
            .iter()
            .filter_map(|cell| match &cell.kind {
                CellKind::Checkout { queue, .. } => {
                    let inbound = heading.iter().filter(|t| **t == cell.pos).count();
                    Some((queue.len() + inbound, cell.pos.manhattan(from), cell.pos))
                }
                _ => None,
            })
            .collect();
        ranked.sort_by_key(|(load, distance, _)| (*load, *distance));
        ranked.into_iter().map(|(_, _, pos)| pos).collect()
    }

    /// The best-ranked checkout, or `None` when the store has none.
    pub fn find_best_checkout(&self, from: Position, heading: &[Position]) -> Option<Position> {
        self.ranked_checkouts(from, heading).into_iter().next()
    }
}
