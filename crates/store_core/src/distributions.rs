//! Stochastic inputs: arrival volumes, inter-arrival gaps, shopper traits,
//! and per-step noise, parameterized by day of week and hour of day.
//!
//! Every sampler draws from a caller-supplied [StdRng] so a fixed seed
//! reproduces every draw. Sampling is total: distribution construction can
//! only fail on degenerate parameters, and those fall back to the mean
//! instead of panicking.

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution, Exp, Normal, Poisson};
use serde::{Deserialize, Serialize};

use crate::shopper::{ClientType, SpeedClass};

/// Engine-owned random source. Seeded once at session start and sampled
/// only from the engine thread, in the fixed tick order.
#[derive(Debug, Resource)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// Base hourly arrival rate before day/hour adjustment.
const BASE_HOURLY_RATE: f64 = 10.0;

/// Default per-tick arrival rate used when accumulating inter-arrival gaps
/// (one shopper every five ticks on average).
pub const DEFAULT_ARRIVAL_RATE: f64 = 1.0 / 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Traffic multiplier: quiet early week, peaking Friday/Saturday.
    pub fn day_factor(&self) -> f64 {
        match self {
            Weekday::Monday => 0.6,
            Weekday::Tuesday => 0.7,
            Weekday::Wednesday => 0.8,
            Weekday::Thursday => 1.0,
            Weekday::Friday => 1.3,
            Weekday::Saturday => 1.5,
            Weekday::Sunday => 1.2,
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, Weekday::Saturday | Weekday::Sunday)
    }
}

/// Traffic multiplier by hour: midday peak, softer morning and evening.
fn hour_factor(hour: u8) -> f64 {
    match hour {
        9..=11 => 0.8,
        12..=14 => 1.5,
        15..=17 => 1.2,
        _ => 0.9,
    }
}

/// Expected shopper count for one hour: Poisson with
/// λ = base × day_factor × hour_factor.
pub fn arrivals_per_hour(rng: &mut StdRng, day: Weekday, hour: u8) -> u32 {
    let lambda = BASE_HOURLY_RATE * day.day_factor() * hour_factor(hour);
    match Poisson::new(lambda) {
        Ok(dist) => dist.sample(rng) as u32,
        Err(_) => lambda.round() as u32,
    }
}

/// Ticks until the next arrival: exponential with the given per-tick rate,
/// rounded up, never below one tick.
pub fn interarrival_ticks(rng: &mut StdRng, rate: f64) -> u64 {
    let sampled = match Exp::new(rate) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 1.0,
    };
    (sampled.ceil() as u64).max(1)
}

/// Solo or familia, biased by weekend and time of day.
pub fn client_type(rng: &mut StdRng, day: Weekday, hour: u8) -> ClientType {
    let mut familia: f64 = 0.3;
    if day.is_weekend() {
        familia += 0.4;
    }
    if (16..=20).contains(&hour) {
        familia += 0.2;
    }
    if (9..=11).contains(&hour) {
        familia -= 0.2;
    }
    let familia = familia.clamp(0.0, 1.0);
    if rng.gen::<f64>() < familia {
        ClientType::Familia
    } else {
        ClientType::Solo
    }
}

/// Walking temperament, from a type-conditional base distribution adjusted
/// by day and hour, then renormalized.
pub fn speed_class(rng: &mut StdRng, day: Weekday, hour: u8, client_type: ClientType) -> SpeedClass {
    let (mut fast, mut normal, mut calm): (f64, f64, f64) = match client_type {
        ClientType::Familia => (0.1, 0.5, 0.2),
        ClientType::Solo => (0.4, 0.5, 0.1),
    };
    if day.is_weekend() {
        calm += 0.2;
        fast -= 0.1;
    }
    if (9..=11).contains(&hour) {
        fast += 0.2;
        calm -= 0.1;
    }
    fast = fast.max(0.0);
    normal = normal.max(0.0);
    calm = calm.max(0.0);
    let total = fast + normal + calm;

    let draw = rng.gen::<f64>() * total;
    if draw < fast {
        SpeedClass::Fast
    } else if draw < fast + normal {
        SpeedClass::Normal
    } else {
        SpeedClass::Calm
    }
}

/// Patience in [0, 1]: Beta(2, 5), skewed toward the impatient end.
pub fn patience(rng: &mut StdRng) -> f64 {
    match Beta::new(2.0, 5.0) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 2.0 / 7.0,
    }
}

/// Per-item checkout noise: Normal(1, 0.5) clipped to [0, 3], as whole
/// ticks.
pub fn service_noise(rng: &mut StdRng) -> u32 {
    let sampled: f64 = match Normal::new(1.0, 0.5) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 1.0,
    };
    sampled.clamp(0.0, 3.0) as u32
}

/// Solo basket size: Normal(5, 2) as whole items. The caller clamps to the
/// valid basket range.
pub fn basket_size_solo(rng: &mut StdRng) -> usize {
    let sampled: f64 = match Normal::new(5.0, 2.0) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 5.0,
    };
    sampled.max(0.0) as usize
}

/// Ticks a shopper needs per movement step: Normal over a per-speed range,
/// with families slowed down, clipped to [1, 8].
pub fn move_delay(rng: &mut StdRng, client_type: ClientType, speed: SpeedClass) -> u32 {
    let (low, high) = match speed {
        SpeedClass::Fast => (1.0, 2.0),
        SpeedClass::Normal => (2.0, 4.0),
        SpeedClass::Calm => (4.0, 5.0),
    };
    let mut mean = (low + high) / 2.0;
    let mut std = (high - low) / 4.0;
    if client_type == ClientType::Familia {
        mean *= 1.3;
        std *= 1.2;
    }
    let sampled: f64 = match Normal::new(mean, std) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    };
    (sampled.clamp(1.0, 8.0) as u32).max(1)
}
