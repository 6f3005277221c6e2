use anyhow::{anyhow, Context, Result};
use ptx_harness::error::ConfigError;
use ptx_harness::orchestrator::run_with_config;
use ptx_harness::suites::ReplaySuite;
use ptx_harness::utils::config::HarnessConfig;
use ptx_harness::utils::env_guard::load_dot_env;
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct Args {
    reports: PathBuf,
    candidates: Option<PathBuf>,
    contracts: PathBuf,
    work_root: PathBuf,
    include_all_kinds: bool,
    workers: Option<usize>,
}

fn print_usage() {
    eprintln!(
        "usage: replay_suite --reports <dir> --contracts <dir> [--candidates <list>] [--work <dir>] [--workers <n>] [--all-kinds]\n\
         env fallback: PTXH_REPORTS_DIR, PTXH_CONTRACTS_DIR, PTXH_CANDIDATES, PTXH_WORK_DIR"
    );
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn next_path(iter: &mut impl Iterator<Item = String>, arg: &str) -> Result<PathBuf> {
    iter.next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("missing value for {arg}"))
}

fn parse_args() -> Result<Args> {
    let mut reports = env_path("PTXH_REPORTS_DIR");
    let mut candidates = env_path("PTXH_CANDIDATES");
    let mut contracts = env_path("PTXH_CONTRACTS_DIR");
    let mut work_root = env_path("PTXH_WORK_DIR");
    let mut include_all_kinds = false;
    let mut workers = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--reports" | "-r" => reports = Some(next_path(&mut iter, &arg)?),
            "--candidates" => candidates = Some(next_path(&mut iter, &arg)?),
            "--contracts" | "-c" => contracts = Some(next_path(&mut iter, &arg)?),
            "--work" | "-w" => work_root = Some(next_path(&mut iter, &arg)?),
            "--all-kinds" => include_all_kinds = true,
            "--workers" | "-j" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow!("missing value for {arg}"))?;
                workers = Some(
                    raw.parse::<usize>()
                        .map_err(|e| anyhow!("invalid worker count '{raw}': {e}"))?,
                );
            }
            other => return Err(anyhow!("unknown argument '{other}'")),
        }
    }

    let reports = reports.ok_or_else(|| {
        ConfigError::MissingConfig("--reports (or PTXH_REPORTS_DIR)".to_string())
    })?;
    let contracts = contracts.ok_or_else(|| {
        ConfigError::MissingConfig("--contracts (or PTXH_CONTRACTS_DIR)".to_string())
    })?;
    let work_root = work_root.unwrap_or_else(|| PathBuf::from("replay_work"));

    Ok(Args {
        reports,
        candidates,
        contracts,
        work_root,
        include_all_kinds,
        workers,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args().inspect_err(|_| print_usage())?;
    load_dot_env(Path::new(".env"));
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = HarnessConfig::from_env().context("invalid harness configuration")?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    let mut suite = ReplaySuite::new(config.toolchain.clone(), &args.contracts, &args.work_root);
    suite.gpu_device = config.gpu_device;
    suite.loader_width = config.loader_width;
    suite.execute_timeout = config.execute_timeout;
    if args.include_all_kinds {
        suite.filter.kind = None;
    }

    let jobs = suite
        .discover(&args.reports, args.candidates.as_deref())
        .with_context(|| format!("cannot enumerate reports in {}", args.reports.display()))?;

    let report = run_with_config(&config, jobs).await?;
    println!("{}", report.summary_line());
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
