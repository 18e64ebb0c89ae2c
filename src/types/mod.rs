//! Core types for Parley.

pub mod extraction;
pub mod reply;
pub mod stream;
pub mod termination;
pub mod turn;

pub use extraction::*;
pub use reply::*;
pub use stream::*;
pub use termination::*;
pub use turn::*;
