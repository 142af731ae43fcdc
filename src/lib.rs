//! Turn a text description into SVG artwork through an LLM provider and graft it
//! into an existing SVG document.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod merge;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod request;
pub mod sanitize;
pub mod store;

#[cfg(feature = "cli")]
pub use cli::run;
pub use document::{HostDocument, SvgDocument};
pub use error::{GenerateError, Result};
pub use merge::{MergeOptions, MergeResult, Placement, merge};
pub use pipeline::{Pipeline, PipelineOptions, RunReport};
pub use prompt::compose;
pub use provider::{ProviderConfig, ProviderKind};
pub use request::GenerationRequest;
pub use sanitize::{repair, sanitize};
