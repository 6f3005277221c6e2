use crate::classifier::{ResultClassifier, SuccessPredicate};
use crate::error::ToolError;
use crate::outcome::{OutcomeKind, RunOutcome};
use crate::pipeline::executor::ToolRunner;
use crate::pipeline::stage::{StageCommand, StageResult};
use crate::pipeline::workspace::TestCase;
use crate::utils::text::stage_dump;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_PREP_ATTEMPTS: u32 = 3;
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts of the preparation chain, first run included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_PREP_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Everything needed to take one case from sources to a verdict.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    /// Compile/translate/link/codegen, in order. Each feeds the next through files.
    pub prep: Vec<StageCommand>,
    pub execute: StageCommand,
    pub execute_timeout: Duration,
    pub success: SuccessPredicate,
}

/// Why the preparation chain gave up: the failing stage's result (absent when it never
/// produced one, e.g. a spawn failure) and a human-readable dump.
struct PrepFailure {
    result: Option<StageResult>,
    diagnostics: String,
}

/// Runs one case's stage chain.
pub struct PipelineRunner<R: ToolRunner> {
    runner: Arc<R>,
    retry: RetryPolicy,
}

impl<R: ToolRunner> PipelineRunner<R> {
    pub fn new(runner: Arc<R>, retry: RetryPolicy) -> Self {
        Self { runner, retry }
    }

    /// Run `plan` for `case`. Artifacts are removed before returning, whatever the outcome.
    pub async fn run(&self, case: &TestCase, plan: &PipelinePlan) -> RunOutcome {
        let started = Instant::now();
        if let Err(err) = std::fs::create_dir_all(&case.directory) {
            tracing::warn!(
                "[PIPE] case={} cannot create {}: {}",
                case.name,
                case.directory.display(),
                err
            );
            return RunOutcome::new(OutcomeKind::CompileError, started.elapsed()).with_diagnostics(
                format!("cannot create case directory {}: {err}", case.directory.display()),
            );
        }
        // Stale output from an interrupted earlier run must not feed this one.
        case.remove_artifacts();
        let _cleanup = case.scope();

        let classifier = ResultClassifier::new(plan.success.clone());
        if let Err(failure) = self.run_prep(case, plan, &classifier).await {
            let kind = match &failure.result {
                Some(result) => classifier.classify(std::slice::from_ref(result)),
                None => OutcomeKind::CompileError,
            };
            return RunOutcome::new(kind, started.elapsed()).with_diagnostics(failure.diagnostics);
        }

        let result = match self
            .runner
            .run(&plan.execute, Some(plan.execute_timeout))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("[PIPE] case={} execute stage error: {}", case.name, err);
                return RunOutcome::new(OutcomeKind::VerificationFailed, started.elapsed())
                    .with_diagnostics(err.to_string());
            }
        };

        let kind = classifier.classify(std::slice::from_ref(&result));
        tracing::debug!(
            "[PIPE] case={} execute verdict={} elapsed_ms={}",
            case.name,
            kind,
            result.elapsed.as_millis()
        );
        let outcome = RunOutcome::new(kind, started.elapsed());
        if kind.is_failure() {
            outcome.with_diagnostics(stage_dump(&result))
        } else {
            outcome
        }
    }

    async fn run_prep(
        &self,
        case: &TestCase,
        plan: &PipelinePlan,
        classifier: &ResultClassifier,
    ) -> Result<(), PrepFailure> {
        let mut last_failure = None;
        for attempt in 1..=self.retry.max_attempts {
            match self.run_prep_once(plan, classifier, attempt).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            "[PIPE] case={} preparation succeeded on attempt {}",
                            case.name,
                            attempt
                        );
                    }
                    return Ok(());
                }
                Err(failure) => {
                    tracing::warn!(
                        "[PIPE] case={} preparation attempt {}/{} failed",
                        case.name,
                        attempt,
                        self.retry.max_attempts
                    );
                    last_failure = Some(failure);
                }
            }
        }
        Err(last_failure.unwrap_or(PrepFailure {
            result: None,
            diagnostics: "preparation chain never ran".to_string(),
        }))
    }

    /// One pass over the preparation chain; stops at the first failing stage.
    async fn run_prep_once(
        &self,
        plan: &PipelinePlan,
        classifier: &ResultClassifier,
        attempt: u32,
    ) -> Result<(), PrepFailure> {
        for command in &plan.prep {
            let result: StageResult = match self.runner.run(command, None).await {
                Ok(result) => result,
                Err(err) => {
                    return Err(PrepFailure {
                        result: None,
                        diagnostics: err.to_string(),
                    })
                }
            };
            if !classifier.stage_failed(&result) {
                continue;
            }
            let headline = match classifier.error_marker(&result) {
                Some(marker) => ToolError::Marker {
                    stage: command.stage.to_string(),
                    marker: marker.to_string(),
                    attempts: attempt,
                }
                .to_string(),
                None => format!(
                    "{} stage `{}` exited with {:?}",
                    command.stage,
                    command.program_name(),
                    result.exit_status
                ),
            };
            let diagnostics = format!("{headline}\n{}", stage_dump(&result));
            return Err(PrepFailure {
                result: Some(result),
                diagnostics,
            });
        }
        Ok(())
    }
}
