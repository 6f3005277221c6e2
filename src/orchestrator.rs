//! Batch execution of independent test cases on a bounded worker pool.

use crate::error::ConfigError;
use crate::outcome::{OutcomeKind, RunOutcome};
use crate::pipeline::executor::{ProcessRunner, ToolRunner};
use crate::pipeline::runner::{PipelinePlan, PipelineRunner, RetryPolicy};
use crate::pipeline::workspace::TestCase;
use crate::utils::config::HarnessConfig;
use crate::utils::text::compact_message;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const PROGRESS_DETAIL_MAX_LEN: usize = 200;

/// What to do with a discovered case.
#[derive(Debug, Clone)]
pub enum CasePlan {
    Run(Box<PipelinePlan>),
    /// Nothing to replay; recorded without touching the device.
    NoExploit,
    /// The report could not be turned into a plan.
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct CaseJob {
    pub case: TestCase,
    pub plan: CasePlan,
}

impl CaseJob {
    pub fn run(case: TestCase, plan: PipelinePlan) -> Self {
        Self {
            case,
            plan: CasePlan::Run(Box::new(plan)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub name: String,
    pub directory: PathBuf,
    pub outcome: OutcomeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub counts: BTreeMap<OutcomeKind, usize>,
    pub failures: Vec<CaseFailure>,
    pub elapsed_ms: u64,
}

impl AggregateReport {
    pub fn record(&mut self, case: &TestCase, outcome: &RunOutcome) {
        *self.counts.entry(outcome.kind).or_insert(0) += 1;
        if outcome.kind.is_failure() {
            self.failures.push(CaseFailure {
                name: case.name.clone(),
                directory: case.directory.clone(),
                outcome: outcome.kind,
            });
        }
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn passed(&self) -> usize {
        self.count(OutcomeKind::Success)
    }

    /// Cases that reached the pipeline (the `Y` of `Passed X / Y`).
    pub fn attempted(&self) -> usize {
        OutcomeKind::ALL
            .iter()
            .filter(|kind| kind.is_attempted())
            .map(|kind| self.count(*kind))
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn summary_line(&self) -> String {
        format!("Passed {} / {}", self.passed(), self.attempted())
    }

    pub fn breakdown(&self) -> String {
        OutcomeKind::ALL
            .iter()
            .map(|kind| format!("{}={}", kind, self.count(*kind)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)
    }
}

/// Sub-directories of `root`, sorted by path.
pub fn discover_case_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn print_progress(case: &TestCase, outcome: &RunOutcome) {
    let secs = outcome.elapsed.as_secs_f64();
    match outcome.kind {
        OutcomeKind::Success => println!("[PASS] {} ({:.1}s)", case.name, secs),
        OutcomeKind::NoExploit => println!("[SKIP] {} no exploit to replay", case.name),
        kind => {
            let detail = outcome
                .diagnostics
                .as_deref()
                .and_then(|d| d.lines().next())
                .map(|line| compact_message(line, PROGRESS_DETAIL_MAX_LEN))
                .unwrap_or_default();
            println!("[FAIL] {} {} ({:.1}s) {}", case.name, kind, secs, detail);
            if let Some(diagnostics) = &outcome.diagnostics {
                eprintln!("===== {} [{}] =====\n{}", case.name, kind, diagnostics);
            }
        }
    }
}

/// Runs prepared cases concurrently and folds their outcomes into one report.
pub struct Orchestrator<R: ToolRunner + 'static> {
    pipeline: Arc<PipelineRunner<R>>,
    concurrency: usize,
    print_progress: bool,
}

impl<R: ToolRunner + 'static> Orchestrator<R> {
    pub fn new(pipeline: PipelineRunner<R>, concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            concurrency,
            print_progress: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.print_progress = false;
        self
    }

    pub async fn run_all(&self, jobs: Vec<CaseJob>) -> Result<AggregateReport, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConfig(
                "worker pool needs at least one worker".to_string(),
            ));
        }
        let started = Instant::now();
        tracing::info!(
            "[SUITE] running {} case(s) on {} worker(s)",
            jobs.len(),
            self.concurrency
        );

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        let mut in_flight = HashMap::new();
        for job in jobs {
            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&permits);
            let case = job.case.clone();
            let handle = join_set.spawn(async move {
                let outcome = match &job.plan {
                    CasePlan::NoExploit => RunOutcome::new(OutcomeKind::NoExploit, Duration::ZERO),
                    CasePlan::Malformed(reason) => {
                        RunOutcome::new(OutcomeKind::MalformedReport, Duration::ZERO)
                            .with_diagnostics(reason.clone())
                    }
                    CasePlan::Run(plan) => {
                        // Holding a permit is what bounds concurrent device use.
                        let _permit = match permits.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => {
                                return (
                                    job.case,
                                    RunOutcome::new(OutcomeKind::VerificationFailed, Duration::ZERO)
                                        .with_diagnostics("worker pool closed"),
                                );
                            }
                        };
                        pipeline.run(&job.case, plan).await
                    }
                };
                (job.case, outcome)
            });
            in_flight.insert(handle.id(), case);
        }

        let mut report = AggregateReport::default();
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, (case, outcome))) => {
                    in_flight.remove(&id);
                    if self.print_progress {
                        print_progress(&case, &outcome);
                    }
                    report.record(&case, &outcome);
                }
                Err(err) => {
                    let Some(case) = in_flight.remove(&err.id()) else {
                        tracing::error!("[SUITE] worker failed for unknown case: {}", err);
                        continue;
                    };
                    tracing::error!("[SUITE] worker for case={} failed: {}", case.name, err);
                    let outcome = RunOutcome::new(OutcomeKind::VerificationFailed, Duration::ZERO)
                        .with_diagnostics(format!("worker failed: {err}"));
                    if self.print_progress {
                        print_progress(&case, &outcome);
                    }
                    report.record(&case, &outcome);
                }
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "[SUITE] finished in {}ms: {}",
            report.elapsed_ms,
            report.breakdown()
        );
        Ok(report)
    }
}

/// Run `jobs` with real processes as configured, then write the JSON summary if one is requested.
pub async fn run_with_config(
    config: &HarnessConfig,
    jobs: Vec<CaseJob>,
) -> crate::Result<AggregateReport> {
    let pipeline = PipelineRunner::new(
        Arc::new(ProcessRunner::default()),
        RetryPolicy::new(config.prep_attempts),
    );
    let report = Orchestrator::new(pipeline, config.workers).run_all(jobs).await?;
    if let Some(path) = &config.report_json {
        report.write_json(path)?;
        tracing::info!("[SUITE] wrote summary to {}", path.display());
    }
    Ok(report)
}
