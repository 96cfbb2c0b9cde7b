//! Run telemetry: per-checkout time series sampled every tick, and the
//! per-shopper metric records assembled for snapshots and the post-run
//! analytics bundle.

use std::collections::BTreeMap;

use bevy_ecs::prelude::{Resource, World};
use serde::{Deserialize, Serialize};

use crate::clock::TickClock;
use crate::grid::Position;
use crate::shopper::{ClientType, Shopper, ShopperId, SpeedClass};

/// One telemetry sample for one checkout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSample {
    pub tick: u64,
    /// True while a shopper is being served (queue non-empty).
    pub busy: bool,
    pub queue_len: usize,
}

/// Per-checkout time series, keyed by checkout position. BTreeMap keeps
/// the row-major key order stable for serialization.
#[derive(Debug, Default, Resource)]
pub struct CheckoutTelemetry {
    series: BTreeMap<Position, Vec<CheckoutSample>>,
}

impl CheckoutTelemetry {
    pub fn record(&mut self, checkout: Position, sample: CheckoutSample) {
        self.series.entry(checkout).or_default().push(sample);
    }

    pub fn series(&self) -> &BTreeMap<Position, Vec<CheckoutSample>> {
        &self.series
    }
}

/// Metrics for one shopper, published in every snapshot and in the
/// post-run bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopperMetrics {
    pub id: ShopperId,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub speed: SpeedClass,
    pub patience: f64,
    pub items_left: usize,
    pub items_total: usize,
    pub shopping_done: bool,
    pub in_queue: bool,
    /// Ticks spent standing in checkout queues.
    pub time_waited: u64,
    pub entry_tick: u64,
    pub start_tick: Option<u64>,
    pub finish_tick: Option<u64>,
    /// `finish_tick - start_tick` when both ends are known.
    pub total_time: Option<u64>,
    pub last_checkout_service_time: u32,
}

impl ShopperMetrics {
    pub fn of(shopper: &Shopper) -> Self {
        let total_time = match (shopper.start_tick, shopper.finish_tick) {
            (Some(start), Some(finish)) => Some(finish.saturating_sub(start)),
            _ => None,
        };
        Self {
            id: shopper.id,
            client_type: shopper.client_type,
            speed: shopper.speed,
            patience: shopper.patience,
            items_left: shopper.items_left(),
            items_total: shopper.items_total,
            shopping_done: shopper.shopping_done,
            in_queue: shopper.in_queue,
            time_waited: shopper.time_waited,
            entry_tick: shopper.entry_tick,
            start_tick: shopper.start_tick,
            finish_tick: shopper.finish_tick,
            total_time,
            last_checkout_service_time: shopper.checkout_time,
        }
    }
}

/// One checkout's full series, in bundle form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSeries {
    pub pos: Position,
    pub samples: Vec<CheckoutSample>,
}

/// Everything the analytics collaborator consumes after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsBundle {
    pub final_tick: u64,
    pub checkouts: Vec<CheckoutSeries>,
    pub shoppers: Vec<ShopperMetrics>,
}

/// Assemble the post-run bundle. Shoppers are sorted by id; checkouts keep
/// their row-major order.
pub fn collect_bundle(world: &mut World) -> AnalyticsBundle {
    let final_tick = world.resource::<TickClock>().now();
    let checkouts = world
        .resource::<CheckoutTelemetry>()
        .series()
        .iter()
        .map(|(pos, samples)| CheckoutSeries {
            pos: *pos,
            samples: samples.clone(),
        })
        .collect();

    let mut roster = world.query::<&Shopper>();
    let mut shoppers: Vec<ShopperMetrics> =
        roster.iter(world).map(ShopperMetrics::of).collect();
    shoppers.sort_by_key(|m| m.id);

    AnalyticsBundle {
        final_tick,
        checkouts,
        shoppers,
    }
}
