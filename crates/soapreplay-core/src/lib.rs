//! soapreplay - replay tests from captured SOAP traces
//!
//! Reads a captured message trace, matches each request to the service
//! contract it was sent through and writes two source units that replay
//! the same calls:
//! - a primary unit with one method per captured call and a test method
//!   calling them in trace order
//! - a stub unit with the per-thread proxy harness and customisation hooks
//!
//! # Example
//!
//! ```rust,ignore
//! use soapreplay_core::{RunConfig, ScenarioPipeline};
//!
//! let config = RunConfig::load(Path::new("replay.yaml"))?;
//! let report = ScenarioPipeline::new().run(&config)?;
//! println!("generated {} calls", report.calls_generated());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod supplier;

// Re-exports for convenience
pub use config::{OutputOptions, RunConfig};
pub use error::ReplayError;
pub use pipeline::{ActionCount, RunReport, ScenarioPipeline, SkippedCall};
pub use supplier::{ExistingTrace, TraceSupplier};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipeline
    pub use crate::{
        ExistingTrace, ReplayError, RunConfig, RunReport, ScenarioPipeline, TraceSupplier,
    };
    pub use soapreplay_trace::{ActionFilter, FilterMode};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
