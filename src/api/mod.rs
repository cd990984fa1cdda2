//! API layer
//!
//! HTTP handlers for:
//! - Home page
//! - Skills pages (behind the authorization gate)
//! - Metrics (Prometheus)

mod home;
pub mod metrics;
mod skills;

pub use home::home_router;
pub use metrics::metrics_router;
pub use skills::skills_router;
