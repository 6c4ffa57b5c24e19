//! farm telemetry host
//!
//! two halves that share one reading shape:
//!     - hub: `server` + `store`, accepts device pushes and serves them back
//!     - monitor: `acquire` + `supervisor`, pulls readings from an endpoint
//!       ladder on a timer and falls back to synthetic data

pub mod acquire;
pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod server;
pub mod store;
pub mod supervisor;
