use anyhow::{anyhow, Context, Result};
use ptx_harness::orchestrator::run_with_config;
use ptx_harness::suites::FuzzSuite;
use ptx_harness::utils::config::HarnessConfig;
use ptx_harness::utils::env_guard::load_dot_env;
use std::path::{Path, PathBuf};

const DEFAULT_TESTS_ROOT: &str = "./tests";

#[derive(Debug)]
struct Args {
    tests_root: PathBuf,
    only: Vec<String>,
    workers: Option<usize>,
    report_json: Option<PathBuf>,
}

fn print_usage() {
    eprintln!(
        "usage: ptx_harness [--root <dir>] [--only <case>]... [--workers <n>] [--report-json <path>]\n\
         each sub-directory of --root (default ./tests) is one fuzz case\n\
         tools and limits come from PTXH_* env keys (a ./.env file is honoured)"
    );
}

fn parse_args() -> Result<Args> {
    let mut tests_root = PathBuf::from(DEFAULT_TESTS_ROOT);
    let mut only = Vec::new();
    let mut workers = None;
    let mut report_json = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--root" | "--tests" | "-t" => {
                tests_root = PathBuf::from(
                    iter.next()
                        .ok_or_else(|| anyhow!("missing value for {arg}"))?,
                );
            }
            "--only" => {
                only.push(
                    iter.next()
                        .ok_or_else(|| anyhow!("missing value for {arg}"))?,
                );
            }
            "--workers" | "-j" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow!("missing value for {arg}"))?;
                workers = Some(
                    raw.parse::<usize>()
                        .map_err(|e| anyhow!("invalid worker count '{raw}': {e}"))?,
                );
            }
            "--report-json" => {
                report_json = Some(PathBuf::from(
                    iter.next()
                        .ok_or_else(|| anyhow!("missing value for {arg}"))?,
                ));
            }
            other => return Err(anyhow!("unknown argument '{other}'")),
        }
    }

    Ok(Args {
        tests_root,
        only,
        workers,
        report_json,
    })
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout is reserved for per-case progress and the summary line.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args().inspect_err(|_| print_usage())?;
    let applied = load_dot_env(Path::new(".env"));
    init_tracing();
    if applied > 0 {
        tracing::debug!("[STARTUP] applied {} key(s) from .env", applied);
    }

    let mut config = HarnessConfig::from_env().context("invalid harness configuration")?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.report_json.is_some() {
        config.report_json = args.report_json;
    }

    let suite = FuzzSuite::new(config.toolchain.clone(), config.gpu_device)
        .with_execute_timeout(config.execute_timeout);
    let mut jobs = suite
        .discover(&args.tests_root)
        .with_context(|| format!("cannot read test root {}", args.tests_root.display()))?;
    if !args.only.is_empty() {
        jobs.retain(|job| args.only.contains(&job.case.name));
    }
    if jobs.is_empty() {
        tracing::warn!("[FUZZ] no cases selected under {}", args.tests_root.display());
    }

    let report = run_with_config(&config, jobs).await?;
    println!("{}", report.summary_line());
    if report.has_failures() {
        for failure in &report.failures {
            eprintln!("[FAILED] {} ({})", failure.name, failure.outcome);
        }
        std::process::exit(1);
    }
    Ok(())
}
