//! soapreplay code generation
//!
//! Turns resolved calls and their captured parameter values into replay
//! test source. Generators build a small language-neutral code model
//! ([`ast`]) which a [`CodePrinter`] renders; [`CSharpPrinter`] is built in.
//!
//! # Core Concepts
//!
//! - [`GenContext`]: statement sink stack, nesting depth, temporary names
//! - [`ObjectGraphCodeGenerator`]: statements rebuilding one captured value
//! - [`ScenarioCodeEmitter`]: call methods plus the proxy harness, as two units
//!
//! # Example
//!
//! ```rust,ignore
//! use soapreplay_codegen::{CSharpPrinter, ScenarioCodeEmitter, ScenarioOptions};
//!
//! let mut emitter = ScenarioCodeEmitter::new(&registry, ScenarioOptions::default());
//! for call in &calls {
//!     emitter.add_call(call)?;
//! }
//! let files = emitter.finish().render(&CSharpPrinter::new());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod ast;
mod context;
mod error;
mod object_graph;
mod printer;
mod scenario;

// Re-exports
pub use context::{GenContext, MAX_DEPTH};
pub use error::CodegenError;
pub use object_graph::ObjectGraphCodeGenerator;
pub use printer::{char_literal, escape_identifier, string_literal, CSharpPrinter, CodePrinter};
pub use scenario::{GeneratedScenario, RenderedScenario, ScenarioCodeEmitter, ScenarioOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CSharpPrinter, CodePrinter, CodegenError, GenContext, ObjectGraphCodeGenerator,
        ScenarioCodeEmitter, ScenarioOptions,
    };
}
