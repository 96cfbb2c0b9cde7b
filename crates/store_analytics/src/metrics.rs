//! Aggregate metrics computed from one run's analytics bundle.

use serde::{Deserialize, Serialize};
use store_core::shopper::ClientType;
use store_core::telemetry::AnalyticsBundle;

/// Utilization figures for one checkout over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutUtilization {
    pub row: usize,
    pub col: usize,
    /// Fraction of sampled ticks with a shopper in service.
    pub busy_fraction: f64,
    pub avg_queue_len: f64,
    pub peak_queue_len: usize,
    pub samples: usize,
}

/// One run boiled down to the headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub final_tick: u64,
    pub total_shoppers: usize,
    pub completed: usize,
    pub completion_rate: f64,
    /// Mean entry-to-exit ticks over completed shoppers.
    pub avg_total_time: Option<f64>,
    pub avg_total_time_solo: Option<f64>,
    pub avg_total_time_familia: Option<f64>,
    /// Mean queue wait over completed shoppers, in ticks.
    pub avg_time_waited: Option<f64>,
    pub checkouts: Vec<CheckoutUtilization>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl RunSummary {
    pub fn from_bundle(bundle: &AnalyticsBundle) -> Self {
        let completed: Vec<_> = bundle
            .shoppers
            .iter()
            .filter(|s| s.total_time.is_some())
            .collect();
        let times_of = |client_type: Option<ClientType>| -> Vec<f64> {
            completed
                .iter()
                .filter(|s| client_type.map(|t| s.client_type == t).unwrap_or(true))
                .filter_map(|s| s.total_time)
                .map(|t| t as f64)
                .collect()
        };

        let checkouts = bundle
            .checkouts
            .iter()
            .map(|series| {
                let samples = series.samples.len();
                let busy = series.samples.iter().filter(|s| s.busy).count();
                let queue_total: usize = series.samples.iter().map(|s| s.queue_len).sum();
                CheckoutUtilization {
                    row: series.pos.row,
                    col: series.pos.col,
                    busy_fraction: if samples > 0 {
                        busy as f64 / samples as f64
                    } else {
                        0.0
                    },
                    avg_queue_len: if samples > 0 {
                        queue_total as f64 / samples as f64
                    } else {
                        0.0
                    },
                    peak_queue_len: series
                        .samples
                        .iter()
                        .map(|s| s.queue_len)
                        .max()
                        .unwrap_or(0),
                    samples,
                }
            })
            .collect();

        let total_shoppers = bundle.shoppers.len();
        Self {
            final_tick: bundle.final_tick,
            total_shoppers,
            completed: completed.len(),
            completion_rate: if total_shoppers > 0 {
                completed.len() as f64 / total_shoppers as f64
            } else {
                0.0
            },
            avg_total_time: mean(&times_of(None)),
            avg_total_time_solo: mean(&times_of(Some(ClientType::Solo))),
            avg_total_time_familia: mean(&times_of(Some(ClientType::Familia))),
            avg_time_waited: mean(
                &completed
                    .iter()
                    .map(|s| s.time_waited as f64)
                    .collect::<Vec<_>>(),
            ),
            checkouts,
        }
    }
}

#[cfg(test)]
mod tests {
    use store_core::grid::Position;
    use store_core::shopper::{ShopperId, SpeedClass};
    use store_core::telemetry::{CheckoutSample, CheckoutSeries, ShopperMetrics};

    use super::*;

    fn metric(id: u32, client_type: ClientType, total_time: Option<u64>) -> ShopperMetrics {
        ShopperMetrics {
            id: ShopperId(id),
            client_type,
            speed: SpeedClass::Normal,
            patience: 0.5,
            items_left: 0,
            items_total: 4,
            shopping_done: total_time.is_some(),
            in_queue: false,
            time_waited: 6,
            entry_tick: 0,
            start_tick: Some(0),
            finish_tick: total_time,
            total_time,
            last_checkout_service_time: 5,
        }
    }

    fn bundle() -> AnalyticsBundle {
        AnalyticsBundle {
            final_tick: 100,
            checkouts: vec![CheckoutSeries {
                pos: Position::new(9, 10),
                samples: vec![
                    CheckoutSample {
                        tick: 0,
                        busy: false,
                        queue_len: 0,
                    },
                    CheckoutSample {
                        tick: 1,
                        busy: true,
                        queue_len: 2,
                    },
                    CheckoutSample {
                        tick: 2,
                        busy: true,
                        queue_len: 1,
                    },
                    CheckoutSample {
                        tick: 3,
                        busy: false,
                        queue_len: 0,
                    },
                ],
            }],
            shoppers: vec![
                metric(1, ClientType::Solo, Some(40)),
                metric(2, ClientType::Familia, Some(80)),
                metric(3, ClientType::Solo, None),
            ],
        }
    }

    #[test]
    fn summary_aggregates_completion_and_times() {
        let summary = RunSummary::from_bundle(&bundle());
        assert_eq!(summary.total_shoppers, 3);
        assert_eq!(summary.completed, 2);
        assert!((summary.completion_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.avg_total_time, Some(60.0));
        assert_eq!(summary.avg_total_time_solo, Some(40.0));
        assert_eq!(summary.avg_total_time_familia, Some(80.0));
    }

    #[test]
    fn summary_computes_checkout_utilization() {
        let summary = RunSummary::from_bundle(&bundle());
        assert_eq!(summary.checkouts.len(), 1);
        let checkout = &summary.checkouts[0];
        assert_eq!(checkout.samples, 4);
        assert!((checkout.busy_fraction - 0.5).abs() < 1e-9);
        assert!((checkout.avg_queue_len - 0.75).abs() < 1e-9);
        assert_eq!(checkout.peak_queue_len, 2);
    }

    #[test]
    fn empty_bundle_yields_zeroes() {
        let empty = AnalyticsBundle {
            final_tick: 1,
            checkouts: Vec::new(),
            shoppers: Vec::new(),
        };
        let summary = RunSummary::from_bundle(&empty);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.completion_rate, 0.0);
        assert_eq!(summary.avg_total_time, None);
        assert!(summary.checkouts.is_empty());
    }
}
