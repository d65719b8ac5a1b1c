//! sitepipe: the asset pipeline of a Hugo site.
//!
//! Compiles the script and Sass entries, drops selectors the templates never
//! use, versions every output in a manifest, then either finalizes a
//! production build or serves a live-reloading development proxy.

pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod utils;

pub use crate::core::{dispatch, BuildProfile, BuildResult, PipelineBuildService, PipelineConfig};
pub use crate::utils::{PipelineError, Result};
