use crate::classifier::SuccessPredicate;
use crate::orchestrator::{discover_case_dirs, CaseJob, CasePlan};
use crate::pipeline::runner::{PipelinePlan, DEFAULT_EXECUTE_TIMEOUT};
use crate::pipeline::stage::{StageCommand, StageKind};
use crate::pipeline::toolchain::Toolchain;
use crate::pipeline::workspace::TestCase;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `solc` writes `<Contract>.bin`; the case's entry contract must be `main`.
pub const MAIN_BINARY: &str = "main.bin";
pub const BYTECODE_IR: &str = "bytecode.ll";
pub const KERNEL_BITCODE: &str = "kernel.bc";
pub const KERNEL_PTX: &str = "kernel.ptx";
/// Scratch directory some fuzzer builds leave behind.
pub const BUILD_DIR: &str = "build";

/// One directory of Solidity sources per case, fuzzed on the GPU until a target or bug is hit.
#[derive(Debug, Clone)]
pub struct FuzzSuite {
    pub toolchain: Toolchain,
    pub gpu_device: u32,
    pub execute_timeout: Duration,
}

impl FuzzSuite {
    pub fn new(toolchain: Toolchain, gpu_device: u32) -> Self {
        Self {
            toolchain,
            gpu_device,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
        }
    }

    pub fn with_execute_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = timeout;
        self
    }

    /// One job per sub-directory of `root`, in path order.
    pub fn discover(&self, root: &Path) -> std::io::Result<Vec<CaseJob>> {
        let dirs = discover_case_dirs(root)?;
        tracing::info!("[FUZZ] discovered {} case dir(s) under {}", dirs.len(), root.display());
        Ok(dirs.iter().map(|dir| self.plan_case(dir)).collect())
    }

    /// A case dir that cannot be read becomes a failed case, not a failed batch.
    pub fn plan_case(&self, dir: &Path) -> CaseJob {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        let case = TestCase::new(name, dir)
            .with_extension("bin")
            .with_extension("abi")
            .with_file(BYTECODE_IR)
            .with_file(KERNEL_BITCODE)
            .with_file(KERNEL_PTX)
            .with_dir(BUILD_DIR);

        let sources = match solidity_sources(dir) {
            Ok(sources) => sources,
            Err(err) => {
                tracing::warn!("[FUZZ] cannot list {}: {}", dir.display(), err);
                let plan = CasePlan::Malformed(format!("cannot list {}: {err}", dir.display()));
                return CaseJob { case, plan };
            }
        };
        if sources.is_empty() {
            return CaseJob {
                case,
                plan: CasePlan::Malformed(format!("no .sol sources in {}", dir.display())),
            };
        }
        let plan = self.plan(&case, &sources);
        CaseJob::run(case, plan)
    }

    fn plan(&self, case: &TestCase, sources: &[PathBuf]) -> PipelinePlan {
        let tc = &self.toolchain;
        let dir = &case.directory;
        let out_dir = format!("{}/", dir.display());

        let compile = StageCommand::new(StageKind::Compile, &tc.solc)
            .args(sources.iter().map(|p| p.display().to_string()))
            .args(["-o", out_dir.as_str(), "--bin", "--abi", "--overwrite", "--base-path", "."]);
        let translate = StageCommand::new(StageKind::Translate, &tc.translator)
            .arg(path_arg(&case.path(MAIN_BINARY)))
            .arg("-o")
            .arg(path_arg(&case.path(BYTECODE_IR)))
            .args(["--hex", "--dump"]);
        let link = StageCommand::new(StageKind::Link, &tc.llvm_link)
            .arg(path_arg(&tc.runtime_bitcode))
            .arg(path_arg(&case.path(BYTECODE_IR)))
            .arg("-o")
            .arg(path_arg(&case.path(KERNEL_BITCODE)));
        let codegen = StageCommand::new(StageKind::Codegen, &tc.llc)
            .arg(format!("-mcpu={}", tc.target_cpu))
            .arg(path_arg(&case.path(KERNEL_BITCODE)))
            .arg("-o")
            .arg(path_arg(&case.path(KERNEL_PTX)));

        let mut execute = StageCommand::new(StageKind::Execute, &tc.fuzzer)
            .arg("-t")
            .arg(format!("{}/*", dir.display()))
            .args(["-f", "--panic-on-bug", "--ptx-path"])
            .arg(path_arg(&case.path(KERNEL_PTX)))
            .arg("--gpu-dev")
            .arg(self.gpu_device.to_string());
        if let Some(lib_dir) = &tc.runner_lib_dir {
            execute = execute.env("LD_LIBRARY_PATH", path_arg(lib_dir));
        }

        PipelinePlan {
            prep: vec![compile, translate, link, codegen],
            execute,
            execute_timeout: self.execute_timeout,
            success: SuccessPredicate::fuzzer_hit(),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn solidity_sources(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("sol") {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}
