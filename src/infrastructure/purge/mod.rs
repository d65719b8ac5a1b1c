// Unused-selector elimination
pub mod eliminator;
pub mod extractors;
pub mod scanner;

pub use eliminator::*;
pub use extractors::*;
pub use scanner::*;
