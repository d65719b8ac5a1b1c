// Infrastructure layer
pub mod dev_server;
pub mod file_system;
pub mod finalizer;
pub mod manifest;
pub mod node_resolver;
pub mod processors;
pub mod purge;

pub use file_system::*;
pub use finalizer::*;
pub use manifest::*;
pub use node_resolver::*;
pub use processors::*;
