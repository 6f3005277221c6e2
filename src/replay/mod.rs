//! Exploit replay: vulnerability reports to loader invocations.

pub mod builder;
pub mod calldata;
pub mod report;

pub use builder::{LoaderTarget, ReplayBuilder, ReplayInvocation};
pub use calldata::{encode_calldata, function_selector};
pub use report::{ReportKind, Snapshot, TransactionSpec, VulnerabilityReport};
