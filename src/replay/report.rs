//! Vulnerability report model.
//!
//! Reports are produced by the upstream exploit generator as JSON:
//!
//! ```json
//! {
//!   "kind": "IO",
//!   "snapshot": "0x1f...",
//!   "tx_seq": [
//!     { "methodName": "", "argTypes": [], "args": [], "keywords": { "msg.value": "0" } },
//!     { "methodName": "transfer", "argTypes": ["address", "uint256"],
//!       "args": ["0x...", "100"], "keywords": { "msg.value": "0" } }
//!   ]
//! }
//! ```
//!
//! The first transaction deploys/sets up the contract and is never replayed.

use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Sentinel written by the generator when no terminal snapshot could be taken.
pub const SNAPSHOT_ERROR_SENTINEL: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportKind {
    /// Integer overflow/underflow.
    Io,
    Other(String),
}

impl ReportKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Io => "IO",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for ReportKind {
    fn from(raw: String) -> Self {
        if raw.trim() == "IO" {
            Self::Io
        } else {
            Self::Other(raw)
        }
    }
}

impl From<ReportKind> for String {
    fn from(kind: ReportKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Snapshot {
    Value(String),
    Error,
}

impl Snapshot {
    pub fn as_arg(&self) -> &str {
        match self {
            Self::Value(raw) => raw.as_str(),
            Self::Error => SNAPSHOT_ERROR_SENTINEL,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl From<String> for Snapshot {
    fn from(raw: String) -> Self {
        if raw == SNAPSHOT_ERROR_SENTINEL {
            Self::Error
        } else {
            Self::Value(raw)
        }
    }
}

impl From<Snapshot> for String {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.as_arg().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxKeywords {
    #[serde(rename = "msg.value", default = "zero_value")]
    pub msg_value: String,
}

fn zero_value() -> String {
    "0".to_string()
}

impl Default for TxKeywords {
    fn default() -> Self {
        Self {
            msg_value: zero_value(),
        }
    }
}

/// One call of an exploit sequence, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSpec {
    #[serde(rename = "methodName")]
    pub method_name: String,
    #[serde(rename = "argTypes", default)]
    pub arg_types: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub keywords: TxKeywords,
}

impl TransactionSpec {
    pub fn call_value(&self) -> &str {
        &self.keywords.msg_value
    }

    /// `name(t1,t2,...)` with no whitespace.
    pub fn signature(&self) -> String {
        format!("{}({})", self.method_name, self.arg_types.join(","))
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.args.len() != self.arg_types.len() {
            return Err(ReportError::Malformed(format!(
                "`{}` declares {} argument type(s) but carries {} argument(s)",
                self.method_name,
                self.arg_types.len(),
                self.args.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub kind: ReportKind,
    pub snapshot: Snapshot,
    pub tx_seq: Vec<TransactionSpec>,
}

impl VulnerabilityReport {
    pub fn from_json(raw: &str) -> Result<Self, ReportError> {
        let report: Self = serde_json::from_str(raw)?;
        report.validate()?;
        Ok(report)
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ReportError::Malformed(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        for tx in &self.tx_seq {
            tx.validate()?;
        }
        Ok(())
    }

    /// Transactions after the setup transaction.
    pub fn replay_txs(&self) -> &[TransactionSpec] {
        self.tx_seq.get(1..).unwrap_or(&[])
    }

    pub fn has_exploit(&self) -> bool {
        self.tx_seq.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportKind, Snapshot, VulnerabilityReport};
    use crate::error::ReportError;

    const TWO_TX_REPORT: &str = r#"{
        "kind": "IO",
        "snapshot": "0xdeadbeef",
        "tx_seq": [
            {"methodName": "", "argTypes": [], "args": [], "keywords": {"msg.value": "0"}},
            {"methodName": "transfer", "argTypes": ["address", "uint256"],
             "args": ["0x0000000000000000000000000000000000000abc", "100"],
             "keywords": {"msg.value": "7", "msg.sender": "0x01"}}
        ],
        "elapsed": 12
    }"#;

    #[test]
    fn test_report_parses_keywords_and_skips_setup_tx() {
        let report = VulnerabilityReport::from_json(TWO_TX_REPORT).expect("valid report");
        assert_eq!(report.kind, ReportKind::Io);
        assert_eq!(report.snapshot, Snapshot::Value("0xdeadbeef".to_string()));
        assert_eq!(report.replay_txs().len(), 1);
        assert_eq!(report.replay_txs()[0].call_value(), "7");
        assert_eq!(
            report.replay_txs()[0].signature(),
            "transfer(address,uint256)"
        );
    }

    #[test]
    fn test_error_snapshot_sentinel_and_other_kind() {
        let raw = r#"{"kind": "RE", "snapshot": "ERROR", "tx_seq": []}"#;
        let report = VulnerabilityReport::from_json(raw).expect("valid report");
        assert!(report.snapshot.is_error());
        assert_eq!(report.kind, ReportKind::Other("RE".to_string()));
        assert!(!report.has_exploit());
        assert!(report.replay_txs().is_empty());
    }

    #[test]
    fn test_argument_count_mismatch_is_malformed() {
        let raw = r#"{"kind": "IO", "snapshot": "1", "tx_seq": [
            {"methodName": "f", "argTypes": ["uint256"], "args": [], "keywords": {"msg.value": "0"}}
        ]}"#;
        let err = VulnerabilityReport::from_json(raw).expect_err("must reject");
        assert!(matches!(err, ReportError::Malformed(_)));
    }
}
