//! # Grocery Store Simulation Core
//!
//! A tick-driven agent-based simulation of a grocery store.
//!
//! ## Overview
//!
//! This crate provides the core simulation engine, including:
//!
//! - **Grid World**: capacity-bounded aisles, directional shelves, and
//!   FIFO checkout queues on a rectangular floor
//! - **Shopper Agents**: per-tick decisions — pick targets, plan routes,
//!   buy items, choose and reconsider checkouts
//! - **Route Planning**: A* with the directional shelf-access rule and a
//!   plan cache
//! - **Tick Engine**: arrivals, decisions, checkout service, and telemetry
//!   in a fixed per-tick order
//! - **Session Control**: pause/resume/step/stop/set_speed over a bounded
//!   command channel, with one snapshot per tick
//!
//! ## Key Concepts
//!
//! - **Tick-synchronous**: all progress happens in whole ticks with a
//!   fixed system order; there is no intra-tick parallelism
//! - **Deterministic**: a seeded RNG plus fixed agent and checkout
//!   ordering reproduce every snapshot byte-for-byte
//! - **Id-indexed**: cells reference shoppers by entity id, never by
//!   owning pointers
//!
//! ## Example
//!
//! ```rust,no_run
//! use store_core::scenario::SessionConfig;
//! use store_core::session::{command_channel, MemorySink, Session};
//!
//! let config = SessionConfig::default().with_seed(42).with_tick_delay(0.0);
//! let mut session = Session::new(&config).expect("valid config");
//! let (_commands, receiver) = command_channel();
//! let mut sink = MemorySink::default();
//! let bundle = session.run(&receiver, &mut sink);
//! println!("served {} shoppers", bundle.shoppers.len());
//! ```

pub mod clock;
pub mod distributions;
pub mod error;
pub mod grid;
pub mod map;
pub mod pathfind;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod shopper;
pub mod snapshot;
pub mod systems;
pub mod telemetry;

#[cfg(test)]
pub mod test_helpers;
