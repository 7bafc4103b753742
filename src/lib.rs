//! Building-monitoring simulator: generated topology, time-series store,
//! and a cancellable set-point control loop.

pub mod config;
pub mod error;
pub mod io;
/// Control loop, convergence rules, and clocks.
pub mod sim;
pub mod store;
pub mod topology;
