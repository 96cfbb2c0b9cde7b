//! Simulation time: a whole-tick counter plus the arrival schedule that
//! feeds the entrance.
//!
//! One tick is the indivisible unit of simulation time. The session
//! controller decides how ticks map to wall-clock time; the clock itself
//! never sleeps.

use std::collections::VecDeque;

use bevy_ecs::prelude::{Entity, Resource};

/// Tick counter with the configured ceiling. Starts at 0 and advances once
/// per schedule run, after all systems of the tick have executed.
#[derive(Debug, Clone, Resource)]
pub struct TickClock {
    tick: u64,
    max_ticks: u64,
}

impl TickClock {
    pub fn new(max_ticks: u64) -> Self {
        Self { tick: 0, max_ticks }
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.tick
    }

    pub fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    pub fn at_limit(&self) -> bool {
        self.tick >= self.max_ticks
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }
}

/// Ordered (tick, shopper) pairs fixing when each shopper enters the store.
/// Ticks are non-decreasing; each entity is scheduled and spawned exactly
/// once.
#[derive(Debug, Default, Resource)]
pub struct ArrivalSchedule {
    entries: VecDeque<(u64, Entity)>,
}

impl ArrivalSchedule {
    /// Append an arrival. Entries must be pushed in non-decreasing tick
    /// order; the session controller accumulates inter-arrival gaps so this
    /// holds by construction.
    pub fn push(&mut self, tick: u64, entity: Entity) {
        debug_assert!(
            self.entries.back().map(|(t, _)| *t <= tick).unwrap_or(true),
            "arrival ticks must be non-decreasing"
        );
        self.entries.push_back((tick, entity));
    }

    /// Drain every arrival due at or before `now`.
    pub fn due(&mut self, now: u64) -> Vec<Entity> {
        let mut due = Vec::new();
        while let Some((tick, _)) = self.entries.front() {
            if *tick > now {
                break;
            }
            if let Some((_, entity)) = self.entries.pop_front() {
                due.push(entity);
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Tick of the next scheduled arrival, if any.
    pub fn next_tick(&self) -> Option<u64> {
        self.entries.front().map(|(t, _)| *t)
    }
}
