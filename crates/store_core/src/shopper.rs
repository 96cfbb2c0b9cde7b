//! Shopper agents: per-entity state plus the pure pieces of the decision
//! policy (target choice, purchasing). The per-tick orchestration lives in
//! [crate::systems::decision].

use std::collections::VecDeque;

use bevy_ecs::prelude::Component;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::grid::{Grid, Position, Product};

/// Stable per-run shopper identifier, assigned monotonically at session
/// setup. Snapshots and telemetry publish this id, never the ECS entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ShopperId(pub u32);

impl std::fmt::Display for ShopperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Solo,
    Familia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedClass {
    Fast,
    Normal,
    Calm,
}

/// One shopper. Owned by the engine world; grid cells refer to the entity
/// carrying this component by id only.
#[derive(Debug, Clone, Component)]
pub struct Shopper {
    pub id: ShopperId,
    pub client_type: ClientType,
    pub speed: SpeedClass,
    /// In [0, 1]; low patience reconsiders checkout choice more often.
    pub patience: f64,
    /// Remaining shopping list. Entries are removed as they are bought.
    pub list: Vec<Product>,
    /// List length at assignment time. Immutable afterwards.
    pub items_total: usize,
    /// Current cell, `None` until the engine places the shopper at the
    /// entrance (and meaningful again once parked on the exit).
    pub pos: Option<Position>,
    pub target: Option<Position>,
    /// Remaining steps to the target. Never contains the current position;
    /// the front element is the immediate next cell.
    pub path: VecDeque<Position>,
    /// Ticks between consecutive steps; re-sampled per step.
    pub move_delay: u32,
    pub delay_counter: u32,
    /// True when the next movement attempt starts a fresh step (and the
    /// delay must be re-sampled).
    pub fresh_step: bool,
    /// Ticks spent standing in a checkout queue.
    pub time_waited: u64,
    /// Service time assigned at the last checkout head, in ticks.
    pub checkout_time: u32,
    pub entered: bool,
    pub shopping_done: bool,
    pub in_queue: bool,
    /// Scheduled arrival tick.
    pub entry_tick: u64,
    /// Tick of actual placement at the entrance.
    pub start_tick: Option<u64>,
    /// Tick the shopper was served at a checkout.
    pub finish_tick: Option<u64>,
}

impl Shopper {
    pub fn new(id: ShopperId, client_type: ClientType, speed: SpeedClass, patience: f64) -> Self {
        Self {
            id,
            client_type,
            speed,
            patience,
            list: Vec::new(),
            items_total: 0,
            pos: None,
            target: None,
            path: VecDeque::new(),
            move_delay: 1,
            delay_counter: 0,
            fresh_step: true,
            time_waited: 0,
            checkout_time: 0,
            entered: false,
            shopping_done: false,
            in_queue: false,
            entry_tick: 0,
            start_tick: None,
            finish_tick: None,
        }
    }

    pub fn items_left(&self) -> usize {
        self.list.len()
    }

    /// Sample a shopping list from the store's products. Families fill
    /// bigger baskets than solo shoppers.
    pub fn assign_list(&mut self, products: &[Product], rng: &mut StdRng) {
        if products.is_empty() {
            self.list.clear();
            self.items_total = 0;
            return;
        }
        let wanted = match self.client_type {
            ClientType::Familia => rng.gen_range(8..=14),
            ClientType::Solo => {
                let n = crate::distributions::basket_size_solo(rng);
                n.clamp(1, 10)
            }
        };
        let wanted = wanted.min(products.len()).max(1);
        self.list = products
            .choose_multiple(rng, wanted)
            .cloned()
            .collect();
        self.items_total = self.list.len();
    }

    /// Remaining list shelf positions ordered by Manhattan distance from
    /// the current cell, nearest first; list order breaks ties. The
    /// decision step walks this ranking until it finds a routable shelf.
    pub fn ranked_list_items(&self) -> Vec<Position> {
        let Some(pos) = self.pos else {
            return Vec::new();
        };
        let mut items: Vec<Position> = self.list.iter().map(|item| item.pos).collect();
        items.sort_by_key(|p| p.manhattan(pos));
        items
    }

    /// Buy an item if one of the remaining list entries sits on the current
    /// cell or on an adjacent shelf. Directionality is a planning concern
    /// only; any neighbor qualifies once the shopper is there.
    pub fn attempt_purchase(&mut self, grid: &Grid) -> bool {
        let Some(pos) = self.pos else {
            return false;
        };
        if let Some(idx) = self.list.iter().position(|item| item.pos == pos) {
            let item = self.list.remove(idx);
            tracing::debug!(shopper = %self.id, product = item.product_id, left = self.list.len(), "bought item on shelf");
            return true;
        }
        for neighbor in grid.neighbors(pos) {
            if let Some(idx) = self.list.iter().position(|item| item.pos == neighbor) {
                let item = self.list.remove(idx);
                tracing::debug!(shopper = %self.id, product = item.product_id, left = self.list.len(), "bought item from adjacent shelf");
                return true;
            }
        }
        false
    }
}
