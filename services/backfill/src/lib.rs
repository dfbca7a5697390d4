//! Resumable, time-budgeted enrichment backfill.
//!
//! Each run visits as many (system, day) or (system, record) units as fit
//! in its budget, writes what it fetched or computed, and reports whether
//! the backlog is done. Callers re-invoke until `completed` is true.

pub mod config;
pub mod driver;
pub mod metrics;
pub mod server;
pub mod throttle;
pub mod work;

pub use config::BackfillConfig;
pub use driver::{BackfillDriver, StopReason};
pub use server::{create_router, ServerState};
pub use throttle::ThrottlePolicy;
pub use work::{WorkPlan, WorkUnit};
