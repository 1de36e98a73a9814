//! Request handlers.

pub mod artifacts;
pub mod health;
pub mod process;

pub use artifacts::*;
pub use health::*;
pub use process::*;
