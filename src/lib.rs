//! PTX harness library surface.
//!
//! Two suites share one pipeline: `ptx_harness` fuzzes Solidity test directories on the GPU,
//! `replay_suite` re-executes fuzzer-reported exploits through the kernel loader.
//! `replay_cmd` prints a single loader invocation for manual reproduction.

pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod replay;
pub mod suites;
pub mod utils;

pub use error::{HarnessError, Result};
