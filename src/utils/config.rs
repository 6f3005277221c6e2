use crate::error::ConfigError;
use crate::pipeline::runner::{DEFAULT_EXECUTE_TIMEOUT, DEFAULT_PREP_ATTEMPTS};
use crate::pipeline::toolchain::Toolchain;
use crate::replay::builder::DEFAULT_LOADER_WIDTH;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 3;
const MAX_WORKERS: usize = 64;
const MAX_PREP_ATTEMPTS: u32 = 10;
const MAX_EXEC_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Harness settings resolved from `PTXH_*` environment keys.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub toolchain: Toolchain,
    pub gpu_device: u32,
    pub loader_width: u32,
    pub workers: usize,
    pub execute_timeout: Duration,
    pub prep_attempts: u32,
    /// Optional JSON summary destination.
    pub report_json: Option<PathBuf>,
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_number<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            ConfigError::InvalidConfig(format!("{key} must be a non-negative integer, got `{raw}`"))
        }),
    }
}

fn path_or<F>(lookup: &F, key: &str, default: PathBuf) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup(key)).map(PathBuf::from).unwrap_or(default)
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Toolchain::default();
        let toolchain = Toolchain {
            solc: path_or(&lookup, "PTXH_SOLC", defaults.solc),
            translator: path_or(&lookup, "PTXH_TRANSLATOR", defaults.translator),
            llvm_as: path_or(&lookup, "PTXH_LLVM_AS", defaults.llvm_as),
            llvm_link: path_or(&lookup, "PTXH_LLVM_LINK", defaults.llvm_link),
            llc: path_or(&lookup, "PTXH_LLC", defaults.llc),
            runtime_bitcode: path_or(&lookup, "PTXH_RUNTIME_BC", defaults.runtime_bitcode),
            target_cpu: non_empty(lookup("PTXH_MCPU")).unwrap_or(defaults.target_cpu),
            loader: path_or(&lookup, "PTXH_LOADER", defaults.loader),
            fuzzer: path_or(&lookup, "PTXH_FUZZER", defaults.fuzzer),
            runner_lib_dir: non_empty(lookup("PTXH_RUNNER_LIB_DIR")).map(PathBuf::from),
        };
        if !toolchain.target_cpu.starts_with("sm_") {
            return Err(ConfigError::InvalidConfig(format!(
                "PTXH_MCPU must name a CUDA SM target (sm_XX), got `{}`",
                toolchain.target_cpu
            )));
        }

        let gpu_device = parse_number(&lookup, "PTXH_GPU_DEVICE", 0u32)?;
        let loader_width = parse_number(&lookup, "PTXH_WIDTH", DEFAULT_LOADER_WIDTH)?;
        if loader_width == 0 {
            return Err(ConfigError::InvalidConfig(
                "PTXH_WIDTH must be at least 1".to_string(),
            ));
        }

        let workers = parse_number(&lookup, "PTXH_WORKERS", DEFAULT_WORKERS)?;
        if workers == 0 {
            return Err(ConfigError::InvalidConfig(
                "PTXH_WORKERS must be at least 1".to_string(),
            ));
        }
        let workers = workers.min(MAX_WORKERS);

        let timeout_secs = parse_number(
            &lookup,
            "PTXH_EXEC_TIMEOUT_SECS",
            DEFAULT_EXECUTE_TIMEOUT.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "PTXH_EXEC_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        let execute_timeout = Duration::from_secs(timeout_secs.min(MAX_EXEC_TIMEOUT_SECS));

        let prep_attempts = parse_number(&lookup, "PTXH_PREP_ATTEMPTS", DEFAULT_PREP_ATTEMPTS)?
            .clamp(1, MAX_PREP_ATTEMPTS);

        Ok(Self {
            toolchain,
            gpu_device,
            loader_width,
            workers,
            execute_timeout,
            prep_attempts,
            report_json: non_empty(lookup("PTXH_REPORT_JSON")).map(PathBuf::from),
        })
    }
}
