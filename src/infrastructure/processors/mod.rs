// Processors module
pub mod common;
pub mod module_bundler;
pub mod script_processor;
pub mod style_processor;

pub use module_bundler::*;
pub use script_processor::*;
pub use style_processor::*;
