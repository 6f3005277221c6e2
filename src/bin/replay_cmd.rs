use anyhow::{anyhow, Result};
use ptx_harness::replay::{LoaderTarget, ReplayBuilder, ReplayInvocation, VulnerabilityReport};
use ptx_harness::utils::config::HarnessConfig;
use std::path::{Path, PathBuf};

fn print_usage() {
    eprintln!(
        "usage: replay_cmd <report.json> [--kernel <kernel.ptx>]\n\
         prints the loader command line that replays the report's exploit"
    );
}

fn invocation_for(
    report_path: &Path,
    target: LoaderTarget,
) -> ptx_harness::Result<Option<ReplayInvocation>> {
    let report = VulnerabilityReport::load(report_path)?;
    Ok(ReplayBuilder::new(target).build(&report)?)
}

fn main() -> Result<()> {
    let mut report_path: Option<PathBuf> = None;
    let mut kernel = PathBuf::from("./kernel.ptx");

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--kernel" | "-k" => {
                kernel = PathBuf::from(
                    iter.next()
                        .ok_or_else(|| anyhow!("missing value for {arg}"))?,
                );
            }
            other if report_path.is_none() && !other.starts_with('-') => {
                report_path = Some(PathBuf::from(other));
            }
            other => {
                print_usage();
                return Err(anyhow!("unknown argument '{other}'"));
            }
        }
    }
    let Some(report_path) = report_path else {
        print_usage();
        return Err(anyhow!("a report path is required"));
    };

    let config = HarnessConfig::from_env()?;
    let target = LoaderTarget::new(config.gpu_device, &config.toolchain.loader, kernel)
        .with_width(config.loader_width);
    match invocation_for(&report_path, target)? {
        Some(invocation) => println!("{}", invocation.render()),
        None => eprintln!("{}: no exploit transactions to replay", report_path.display()),
    }
    Ok(())
}
