pub mod client;
pub mod error;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use error::FlowError;
pub use report::generate_report;
pub use runner::{run_flow, RunOutcome};
pub use utils::config::{Config, Variant};
