//! Per-tick snapshots: a complete, serializable description of the world
//! for external observers, plus the textual console rendering.
//!
//! The snapshot builder takes a read-only view of the world between ticks;
//! it is never called concurrently with a tick step. Everything in the
//! envelope is plain data keyed by shopper id, so any structurally
//! equivalent encoding of the JSON form satisfies the contract.

use std::collections::HashMap;

use bevy_ecs::prelude::{Entity, World};
use serde::{Deserialize, Serialize};

use crate::clock::TickClock;
use crate::grid::{CellKind, Grid, Position};
use crate::shopper::{ClientType, Shopper, ShopperId, SpeedClass};
use crate::telemetry::ShopperMetrics;

/// Abbreviated view of a shopper standing in a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupantView {
    pub id: ShopperId,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub speed: SpeedClass,
    pub patience: f64,
    pub items_left: usize,
    pub shopping_done: bool,
    /// Remaining planned steps, next step first.
    pub path: Vec<Position>,
}

/// Abbreviated view of a shopper waiting in a checkout queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueView {
    pub id: ShopperId,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub speed: SpeedClass,
    pub patience: f64,
    pub time_waited: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellView {
    pub kind: String,
    pub capacity: usize,
    pub occupancy: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u32>,
    pub occupants: Vec<OccupantView>,
    pub queue: Vec<QueueView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub tick: u64,
    pub total_agents: usize,
    pub active_agents: usize,
    pub shopping_now: usize,
    pub in_queue: usize,
    pub done: usize,
}

/// One tick's full world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<CellView>>,
    pub stats: SnapshotStats,
    pub client_metrics: Vec<ShopperMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_map: Option<String>,
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// Build the snapshot for the current tick boundary.
pub fn capture_snapshot(world: &mut World, include_console: bool) -> TickSnapshot {
    let mut roster = world.query::<(Entity, &Shopper)>();
    let shoppers: HashMap<Entity, Shopper> = roster
        .iter(world)
        .map(|(entity, shopper)| (entity, shopper.clone()))
        .collect();

    let mut client_metrics: Vec<ShopperMetrics> =
        shoppers.values().map(ShopperMetrics::of).collect();
    client_metrics.sort_by_key(|m| m.id);

    let stats = {
        let total_agents = shoppers.len();
        let done = shoppers.values().filter(|s| s.shopping_done).count();
        let in_queue = shoppers.values().filter(|s| s.in_queue).count();
        SnapshotStats {
            tick: world.resource::<TickClock>().now(),
            total_agents,
            active_agents: total_agents - done,
            shopping_now: shoppers
                .values()
                .filter(|s| !s.in_queue && !s.shopping_done)
                .count(),
            in_queue,
            done,
        }
    };

    let grid = world.resource::<Grid>();
    let occupant_view = |entity: &Entity| {
        shoppers.get(entity).map(|s| OccupantView {
            id: s.id,
            client_type: s.client_type,
            speed: s.speed,
            patience: s.patience,
            items_left: s.items_left(),
            shopping_done: s.shopping_done,
            path: s.path.iter().copied().collect(),
        })
    };
    let queue_view = |entity: &Entity| {
        shoppers.get(entity).map(|s| QueueView {
            id: s.id,
            client_type: s.client_type,
            speed: s.speed,
            patience: s.patience,
            time_waited: s.time_waited,
        })
    };

    let mut cells: Vec<Vec<CellView>> = Vec::with_capacity(grid.rows());
    for (index, cell) in grid.cells().enumerate() {
        if index % grid.cols() == 0 {
            cells.push(Vec::with_capacity(grid.cols()));
        }
        let (category, product_id) = match &cell.kind {
            CellKind::Shelf {
                category,
                product_id,
                ..
            } => (Some(category.clone()), *product_id),
            _ => (None, None),
        };
        let view = CellView {
            kind: cell.kind_label().to_string(),
            capacity: cell.capacity(),
            occupancy: cell.occupants().len(),
            category,
            product_id,
            occupants: cell.occupants().iter().filter_map(occupant_view).collect(),
            queue: cell.queue().iter().filter_map(queue_view).collect(),
        };
        if let Some(row) = cells.last_mut() {
            row.push(view);
        }
    }

    let console_map = include_console.then(|| render_console(grid, &shoppers));

    TickSnapshot {
        rows: grid.rows(),
        cols: grid.cols(),
        cells,
        stats,
        client_metrics,
        console_map,
        is_final: false,
    }
}

/// Fixed-width textual rendering of the floor, one line per row.
pub fn render_console(grid: &Grid, shoppers: &HashMap<Entity, Shopper>) -> String {
    let symbol = |entity: &Entity| {
        shoppers
            .get(entity)
            .map(|s| s.id.to_string())
            .unwrap_or_else(|| "?".to_string())
    };

    let mut lines = Vec::with_capacity(grid.rows());
    let mut row_repr: Vec<String> = Vec::with_capacity(grid.cols());
    for (index, cell) in grid.cells().enumerate() {
        if index % grid.cols() == 0 && index > 0 {
            lines.push(row_repr.join(" "));
            row_repr = Vec::with_capacity(grid.cols());
        }
        let occupants = cell.occupants();
        let repr = if !occupants.is_empty() {
            let symbols: Vec<String> = occupants.iter().map(symbol).collect();
            format!("[{}]", symbols.join(","))
        } else if !cell.queue().is_empty() {
            let symbols: Vec<String> = cell.queue().iter().map(symbol).collect();
            format!("Q[{}]", symbols.join(","))
        } else {
            match &cell.kind {
                CellKind::Aisle {
                    capacity,
                    occupants,
                } => format!(".{}/{}", occupants.len(), capacity),
                CellKind::Shelf { product_id, .. } => match product_id {
                    Some(id) => format!("SL{id:03}"),
                    None => "SL---".to_string(),
                },
                CellKind::Checkout { .. } => "CB".to_string(),
                CellKind::Entrance { .. } => "EN".to_string(),
                CellKind::Exit { .. } => "EX".to_string(),
                CellKind::Obstacle => "###".to_string(),
            }
        };
        row_repr.push(format!("{repr:>6}"));
    }
    lines.push(row_repr.join(" "));
    lines.join("\n")
}
