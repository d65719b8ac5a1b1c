// Shared utilities module
pub mod bundle_analysis;
pub mod env_vars;
pub mod errors;
pub mod logging;
pub mod path_aliases;

pub use bundle_analysis::*;
pub use env_vars::*;
pub use errors::*;
pub use logging::*;
pub use path_aliases::*;
