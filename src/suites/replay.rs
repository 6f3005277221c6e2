use crate::classifier::SuccessPredicate;
use crate::orchestrator::{CaseJob, CasePlan};
use crate::pipeline::runner::{PipelinePlan, DEFAULT_EXECUTE_TIMEOUT};
use crate::pipeline::stage::{StageCommand, StageKind};
use crate::pipeline::toolchain::Toolchain;
use crate::pipeline::workspace::TestCase;
use crate::replay::builder::{LoaderTarget, ReplayBuilder, DEFAULT_LOADER_WIDTH};
use crate::replay::report::{ReportKind, VulnerabilityReport};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BYTECODE_IR: &str = "bytecode.ll";
pub const MAIN_BITCODE: &str = "main.bc";
pub const KERNEL_BITCODE: &str = "kernel.bc";
pub const KERNEL_PTX: &str = "kernel.ptx";

/// Which parsed reports are worth replaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFilter {
    pub kind: Option<ReportKind>,
    pub skip_error_snapshots: bool,
}

impl Default for ReplayFilter {
    fn default() -> Self {
        Self {
            kind: Some(ReportKind::Io),
            skip_error_snapshots: true,
        }
    }
}

impl ReplayFilter {
    pub fn accepts(&self, report: &VulnerabilityReport) -> bool {
        if let Some(kind) = &self.kind {
            if &report.kind != kind {
                return false;
            }
        }
        !(self.skip_error_snapshots && report.snapshot.is_error())
    }
}

/// Report stem up to the first `_`, e.g. `2018-10299_3` -> `2018-10299`.
pub fn contract_key(report_path: &Path) -> String {
    let stem = report_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('_') {
        Some((key, _)) => key.to_string(),
        None => stem,
    }
}

/// Report files to consider: the names listed in `candidates` (one per line), or every `*.json`.
pub fn candidate_reports(reports_dir: &Path, candidates: Option<&Path>) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    match candidates {
        Some(list) => {
            for line in fs::read_to_string(list)?.lines() {
                // tolerate csv rows: the file name is the first column
                let name = line.split(',').next().unwrap_or("").trim();
                if name.is_empty() || name.starts_with('#') {
                    continue;
                }
                paths.push(reports_dir.join(name));
            }
        }
        None => {
            for entry in fs::read_dir(reports_dir)? {
                let path = entry?.path();
                if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                    paths.push(path);
                }
            }
            paths.sort();
        }
    }
    Ok(paths)
}

/// Replays fuzzer-reported exploits against freshly compiled kernels.
#[derive(Debug, Clone)]
pub struct ReplaySuite {
    pub toolchain: Toolchain,
    /// Compiled contract bytecode, one file per contract key.
    pub contracts_dir: PathBuf,
    /// Each case gets `<work_root>/<report stem>` for its generated files.
    pub work_root: PathBuf,
    pub gpu_device: u32,
    pub loader_width: u32,
    pub execute_timeout: Duration,
    pub filter: ReplayFilter,
}

impl ReplaySuite {
    pub fn new(toolchain: Toolchain, contracts_dir: impl Into<PathBuf>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            contracts_dir: contracts_dir.into(),
            work_root: work_root.into(),
            gpu_device: 0,
            loader_width: DEFAULT_LOADER_WIDTH,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
            filter: ReplayFilter::default(),
        }
    }

    pub fn discover(&self, reports_dir: &Path, candidates: Option<&Path>) -> std::io::Result<Vec<CaseJob>> {
        let reports = candidate_reports(reports_dir, candidates)?;
        let mut jobs = Vec::with_capacity(reports.len());
        let mut filtered = 0usize;
        for report in &reports {
            match self.plan_report(report) {
                Some(job) => jobs.push(job),
                None => filtered += 1,
            }
        }
        tracing::info!(
            "[REPLAY] {} report(s) considered, {} filtered out",
            reports.len(),
            filtered
        );
        Ok(jobs)
    }

    /// `None` when the filter rejects the report. The work dir is created by the run, not here.
    pub fn plan_report(&self, report_path: &Path) -> Option<CaseJob> {
        let name = report_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| report_path.display().to_string());
        let work_dir = self.work_root.join(&name);
        let case = TestCase::new(name, &work_dir)
            .with_file(BYTECODE_IR)
            .with_file(MAIN_BITCODE)
            .with_file(KERNEL_BITCODE)
            .with_file(KERNEL_PTX);

        let report = match VulnerabilityReport::load(report_path) {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!("[REPLAY] {}: {}", report_path.display(), err);
                let plan = CasePlan::Malformed(err.to_string());
                return Some(CaseJob { case, plan });
            }
        };
        if !report.has_exploit() {
            return Some(CaseJob {
                case,
                plan: CasePlan::NoExploit,
            });
        }
        if !self.filter.accepts(&report) {
            tracing::debug!(
                "[REPLAY] skip {} kind={} snapshot={}",
                case.name,
                report.kind,
                report.snapshot.as_arg()
            );
            return None;
        }

        let target = LoaderTarget::new(
            self.gpu_device,
            &self.toolchain.loader,
            case.path(KERNEL_PTX),
        )
        .with_width(self.loader_width);
        let invocation = match ReplayBuilder::new(target).build(&report) {
            Ok(Some(invocation)) => invocation,
            Ok(None) => {
                return Some(CaseJob {
                    case,
                    plan: CasePlan::NoExploit,
                })
            }
            Err(err) => {
                tracing::warn!("[REPLAY] {}: {}", report_path.display(), err);
                let plan = CasePlan::Malformed(err.to_string());
                return Some(CaseJob { case, plan });
            }
        };

        let contract = self.contracts_dir.join(contract_key(report_path));
        let plan = PipelinePlan {
            prep: self.prep_stages(&case, &contract, invocation.pair_count()),
            execute: invocation.to_stage_command(),
            execute_timeout: self.execute_timeout,
            success: SuccessPredicate::loader_status(),
        };
        Some(CaseJob::run(case, plan))
    }

    fn prep_stages(&self, case: &TestCase, contract: &Path, txs_len: usize) -> Vec<StageCommand> {
        let tc = &self.toolchain;
        let ir = case.path(BYTECODE_IR).display().to_string();
        let main_bc = case.path(MAIN_BITCODE).display().to_string();
        let kernel_bc = case.path(KERNEL_BITCODE).display().to_string();
        let ptx = case.path(KERNEL_PTX).display().to_string();

        vec![
            StageCommand::new(StageKind::Translate, &tc.translator)
                .arg(contract.display().to_string())
                .args(["-o", ir.as_str(), "--hex", "--dump", "--fsanitize=ibsan"])
                .arg(format!("-txs-len={txs_len}"))
                .arg("--disable-instrument"),
            StageCommand::new(StageKind::Assemble, &tc.llvm_as).args([ir.as_str(), "-o", main_bc.as_str()]),
            StageCommand::new(StageKind::Link, &tc.llvm_link)
                .arg(main_bc.as_str())
                .arg(tc.runtime_bitcode.display().to_string())
                .args(["--only-needed", "-o", kernel_bc.as_str()]),
            StageCommand::new(StageKind::Codegen, &tc.llc)
                .arg(format!("-mcpu={}", tc.target_cpu))
                .args([kernel_bc.as_str(), "-o", ptx.as_str()]),
        ]
    }
}
