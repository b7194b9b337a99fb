//! Resource Scheduler Library
//!
//! A custom pod scheduler that places unscheduled pods on the fitting node
//! with the lowest live resource usage.
//!
//! ## Architecture
//!
//! ```text
//! watch producer ──► watch consumer ─┐
//! retry workers (N) ◄── retry queue ─┼──► Scheduler (decision lock)
//! reconciliation sweep ──────────────┘      ├── burst guard
//!                                           ├── snapshot + cpu fit
//!                                           ├── node selection
//!                                           └── binding + events
//! ```
//!
//! ## Modules
//!
//! - `cluster`: platform API trait, HTTP client, wire types and mock
//! - `scheduler`: the serialized decision pipeline
//! - `intake`: watch, retry queue and sweep tasks
//! - `snapshot`, `fit`, `scorer`, `burst`: pipeline stages

pub mod annotations;
pub mod burst;
pub mod cluster;
pub mod config;
pub mod events;
pub mod fit;
pub mod intake;
pub mod quantity;
pub mod scheduler;
pub mod scorer;
pub mod snapshot;

pub use config::Config;
pub use scheduler::{ScheduleOutcome, Scheduler, SchedulerError};
