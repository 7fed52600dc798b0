//! BedWars Arena Server Library
//!
//! Per-arena timed event scheduling for BedWars matches plus the coordination
//! layer that advertises arenas to the rest of the fleet.
//!
//! # Features
//!
//! - `redis` - Redis-backed shared store and pub/sub channel (enabled by default)
//! - `autoscale` - Open a new arena from the same template when one starts playing (enabled by default)
//! - `metrics_extended` - Tick timing and coordination counters on the metrics endpoint (enabled by default)

pub mod config;
pub mod game;
pub mod lobby;
pub mod metrics;
pub mod net;
