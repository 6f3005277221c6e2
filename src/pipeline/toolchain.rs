use std::path::PathBuf;

pub const DEFAULT_TARGET_CPU: &str = "sm_86";

/// Locations of every external tool the pipelines invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub solc: PathBuf,
    /// EVM bytecode to LLVM IR translator (`standalone-ptxsema`).
    pub translator: PathBuf,
    pub llvm_as: PathBuf,
    pub llvm_link: PathBuf,
    pub llc: PathBuf,
    /// Device runtime support linked into every kernel (`rt.o.bc`).
    pub runtime_bitcode: PathBuf,
    pub target_cpu: String,
    pub loader: PathBuf,
    pub fuzzer: PathBuf,
    /// Exported as `LD_LIBRARY_PATH` for the fuzzer when set.
    pub runner_lib_dir: Option<PathBuf>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            solc: PathBuf::from("solc"),
            translator: PathBuf::from("standalone-ptxsema"),
            llvm_as: PathBuf::from("llvm-as"),
            llvm_link: PathBuf::from("llvm-link"),
            llc: PathBuf::from("llc"),
            runtime_bitcode: PathBuf::from("rt.o.bc"),
            target_cpu: DEFAULT_TARGET_CPU.to_string(),
            loader: PathBuf::from("loader"),
            fuzzer: PathBuf::from("cli"),
            runner_lib_dir: None,
        }
    }
}
