//! XTraffic - per-track position pipeline for live traffic
//!
//! This library turns asynchronous reports about moving vehicles from several
//! data sources into one clean, time-ordered position buffer per vehicle, and
//! synthesizes the positions a renderer needs to move a model smoothly:
//! take-off, touch-down, approach and taxi positions.
//!
//! # High-Level API
//!
//! The [`registry`] module holds all tracks and the recompute worker:
//!
//! ```ignore
//! use xtraffic::registry::TrackRegistry;
//!
//! let registry = TrackRegistry::new(config, airports, models, factory)?;
//!
//! // producer threads
//! registry.add_dynamic(key, dynamic, Some(position));
//!
//! // render thread, once per frame
//! registry.frame(sim_time, &viewer, &terrain);
//! ```

pub mod collaborators;
pub mod config;
pub mod error;
pub mod flight_model;
pub mod geo;
pub mod logging;
pub mod phase;
pub mod registry;
pub mod report;
pub mod track;

/// Version of the XTraffic library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
