//! Concrete suites: what a case is, where it lives, and which stages prepare it.

pub mod fuzz;
pub mod replay;

pub use fuzz::FuzzSuite;
pub use replay::{ReplayFilter, ReplaySuite};
