use crate::error::ReportError;
use crate::replay::calldata::encode_tx;
use crate::replay::report::VulnerabilityReport;
use crate::pipeline::stage::{StageCommand, StageKind};
use std::path::{Path, PathBuf};

/// Launch width the loader is always started with.
pub const DEFAULT_LOADER_WIDTH: u32 = 128;

/// Environment variable the loader reads its CUDA device from.
pub const DEVICE_ENV_VAR: &str = "CUDA_DEVICE_ID";

/// Fixed prefix of every loader invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderTarget {
    pub device_id: u32,
    pub loader: PathBuf,
    pub kernel: PathBuf,
    pub width: u32,
}

impl LoaderTarget {
    pub fn new(device_id: u32, loader: impl Into<PathBuf>, kernel: impl Into<PathBuf>) -> Self {
        Self {
            device_id,
            loader: loader.into(),
            kernel: kernel.into(),
            width: DEFAULT_LOADER_WIDTH,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }
}

/// `[device, loader, kernel, width, (value, calldata) x N, snapshot]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayInvocation {
    args: Vec<String>,
}

const PREFIX_LEN: usize = 4;

impl ReplayInvocation {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn device_id(&self) -> &str {
        &self.args[0]
    }

    pub fn loader(&self) -> &Path {
        Path::new(&self.args[1])
    }

    pub fn kernel(&self) -> &str {
        &self.args[2]
    }

    pub fn width(&self) -> &str {
        &self.args[3]
    }

    pub fn snapshot(&self) -> &str {
        &self.args[self.args.len() - 1]
    }

    /// `(call_value, calldata_hex)` pairs in replay order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.args[PREFIX_LEN..self.args.len() - 1]
            .chunks_exact(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
            .collect()
    }

    pub fn pair_count(&self) -> usize {
        (self.args.len() - PREFIX_LEN - 1) / 2
    }

    /// Everything after the loader path, as passed on its command line.
    pub fn loader_args(&self) -> &[String] {
        &self.args[2..]
    }

    /// Shell-style rendering, e.g. for logging a reproducer.
    pub fn render(&self) -> String {
        let mut out = format!("{DEVICE_ENV_VAR}={} {}", self.device_id(), self.args[1]);
        for arg in self.loader_args() {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }

    /// Execute-stage command: the loader, its arguments, and the device in the environment.
    pub fn to_stage_command(&self) -> StageCommand {
        StageCommand::new(StageKind::Execute, self.loader())
            .args(self.loader_args().iter().cloned())
            .env(DEVICE_ENV_VAR, self.device_id())
    }
}

/// Turns vulnerability reports into loader invocations.
#[derive(Debug, Clone)]
pub struct ReplayBuilder {
    target: LoaderTarget,
}

impl ReplayBuilder {
    pub fn new(target: LoaderTarget) -> Self {
        Self { target }
    }

    /// `Ok(None)` when the report carries nothing beyond the setup transaction.
    pub fn build(
        &self,
        report: &VulnerabilityReport,
    ) -> Result<Option<ReplayInvocation>, ReportError> {
        if !report.has_exploit() {
            return Ok(None);
        }

        let replayed = report.replay_txs();
        let mut args = Vec::with_capacity(PREFIX_LEN + replayed.len() * 2 + 1);
        args.push(self.target.device_id.to_string());
        args.push(self.target.loader.display().to_string());
        args.push(self.target.kernel.display().to_string());
        args.push(self.target.width.to_string());
        for tx in replayed {
            let calldata = encode_tx(tx)?;
            args.push(tx.call_value().to_string());
            args.push(calldata);
        }
        args.push(report.snapshot.as_arg().to_string());

        tracing::debug!(
            "[REPLAY] built invocation pairs={} snapshot={}",
            replayed.len(),
            report.snapshot.as_arg()
        );
        Ok(Some(ReplayInvocation { args }))
    }
}

#[cfg(test)]
mod tests {
    use super::{LoaderTarget, ReplayBuilder, DEFAULT_LOADER_WIDTH};
    use crate::replay::calldata::function_selector;
    use crate::replay::report::{ReportKind, Snapshot, TransactionSpec, TxKeywords, VulnerabilityReport};

    fn tx(method: &str, types: &[&str], args: &[&str], value: &str) -> TransactionSpec {
        TransactionSpec {
            method_name: method.to_string(),
            arg_types: types.iter().map(|s| s.to_string()).collect(),
            args: args.iter().map(|s| s.to_string()).collect(),
            keywords: TxKeywords {
                msg_value: value.to_string(),
            },
        }
    }

    fn builder() -> ReplayBuilder {
        ReplayBuilder::new(LoaderTarget::new(3, "/opt/loader", "/work/kernel.ptx"))
    }

    #[test]
    fn test_setup_only_report_has_nothing_to_replay() {
        let report = VulnerabilityReport {
            kind: ReportKind::Io,
            snapshot: Snapshot::Error,
            tx_seq: vec![tx("", &[], &[], "0")],
        };
        assert_eq!(builder().build(&report).expect("no error"), None);

        let empty = VulnerabilityReport {
            tx_seq: Vec::new(),
            ..report
        };
        assert_eq!(builder().build(&empty).expect("no error"), None);
    }

    #[test]
    fn test_transfer_replay_prefix_pair_and_snapshot() {
        let report = VulnerabilityReport {
            kind: ReportKind::Io,
            snapshot: Snapshot::Value("0xfeed".to_string()),
            tx_seq: vec![
                tx("", &[], &[], "0"),
                tx(
                    "transfer",
                    &["address", "uint256"],
                    &["0x0000000000000000000000000000000000000abc", "100"],
                    "5",
                ),
            ],
        };
        let invocation = builder().build(&report).expect("builds").expect("has exploit");
        assert_eq!(invocation.device_id(), "3");
        assert_eq!(invocation.loader().to_str(), Some("/opt/loader"));
        assert_eq!(invocation.kernel(), "/work/kernel.ptx");
        assert_eq!(invocation.width(), DEFAULT_LOADER_WIDTH.to_string());
        assert_eq!(invocation.snapshot(), "0xfeed");
        assert_eq!(invocation.pair_count(), 1);

        let pairs = invocation.pairs();
        assert_eq!(pairs[0].0, "5");
        let selector = hex::encode(function_selector(
            "transfer",
            &["address".to_string(), "uint256".to_string()],
        ));
        assert!(pairs[0].1.starts_with(&selector));
        assert_eq!(invocation.args().len(), 4 + 2 + 1);
    }

    #[test]
    fn test_replay_preserves_sequence_order() {
        let report = VulnerabilityReport {
            kind: ReportKind::Io,
            snapshot: Snapshot::Value("1".to_string()),
            tx_seq: vec![
                tx("", &[], &[], "0"),
                tx("a", &[], &[], "1"),
                tx("b", &[], &[], "2"),
                tx("c", &[], &[], "3"),
            ],
        };
        let invocation = builder().build(&report).expect("builds").expect("has exploit");
        let values: Vec<&str> = invocation.pairs().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
        let first = hex::encode(function_selector("a", &[]));
        assert_eq!(invocation.pairs()[0].1, first);
        assert!(invocation
            .render()
            .starts_with("CUDA_DEVICE_ID=3 /opt/loader /work/kernel.ptx 128 1 "));

        let command = invocation.to_stage_command();
        assert_eq!(command.args.len(), invocation.args().len() - 2);
        assert_eq!(
            command.envs,
            vec![("CUDA_DEVICE_ID".to_string(), "3".to_string())]
        );
    }

    #[test]
    fn test_encoding_failure_propagates() {
        let report = VulnerabilityReport {
            kind: ReportKind::Io,
            snapshot: Snapshot::Value("1".to_string()),
            tx_seq: vec![tx("", &[], &[], "0"), tx("f", &["uint256"], &["oops"], "0")],
        };
        assert!(builder().build(&report).is_err());
    }
}
