pub mod application;
pub mod cli;
pub mod config;
pub mod refill;
pub mod registry;
pub mod stats;
pub mod tui;
pub mod units;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export commonly used types
pub use application::{Application, AllocationRequest, Datacap, Lifecycle, LifecycleState};
pub use config::Config;
pub use refill::{next_request, RefillUnit, RequestAmount};
pub use registry::{load_application, ApplicationFile, Registry};
pub use stats::Statistics;
pub use units::{format_from_bytes, parse_to_bytes, split_formatted, ParseError};
