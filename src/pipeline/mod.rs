pub mod executor;
pub mod runner;
pub mod stage;
pub mod toolchain;
pub mod workspace;

pub use executor::{ProcessRunner, ToolRunner};
pub use runner::{PipelinePlan, PipelineRunner, RetryPolicy};
pub use stage::{StageCommand, StageKind, StageResult};
pub use toolchain::Toolchain;
pub use workspace::{Artifact, TestCase};
