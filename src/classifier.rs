//! Output classification for the external toolchain.
//!
//! None of the tools report structured status; everything they tell us arrives as text on
//! stdout/stderr. Every marker string the harness reacts to is defined here and nowhere else.

use crate::outcome::OutcomeKind;
use crate::pipeline::stage::{StageKind, StageResult};

/// Printed by `solc` and the translator when compilation fails.
pub const TOOL_ERROR_MARKER: &str = "Error";
/// Fuzzer: the instrumented target branch was reached.
pub const TARGET_HIT_MARKER: &str = "target hit";
/// Fuzzer: a `bug()` oracle fired.
pub const BUG_HIT_MARKER: &str = "bug() hit";
/// Loader: final status line when the replay reached the expected snapshot.
pub const VERIFIED_STATUS_LINE: &str = "01010101";
/// Fuzzer: ran to completion without anything to hit.
pub const NO_TARGET_MARKER: &str = "no target found";

/// What counts as "the exploit reproduced" for the execution stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessPredicate {
    /// Last non-empty stdout line equals the given text.
    StatusLine(String),
    /// Any of the markers appears in stdout or stderr.
    AnyMarker(Vec<String>),
}

impl SuccessPredicate {
    /// Loader convention used by the report-replay suite.
    pub fn loader_status() -> Self {
        Self::StatusLine(VERIFIED_STATUS_LINE.to_string())
    }

    /// Fuzzer convention used by the source-tree suite.
    pub fn fuzzer_hit() -> Self {
        Self::AnyMarker(vec![
            TARGET_HIT_MARKER.to_string(),
            BUG_HIT_MARKER.to_string(),
        ])
    }

    pub fn matches(&self, result: &StageResult) -> bool {
        match self {
            Self::StatusLine(expected) => last_line(&result.stdout)
                .map(|line| line == expected.as_bytes())
                .unwrap_or(false),
            Self::AnyMarker(markers) => markers
                .iter()
                .any(|m| contains(&result.stdout, m) || contains(&result.stderr, m)),
        }
    }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &bytes[start..end.max(start)]
}

fn last_line(bytes: &[u8]) -> Option<&[u8]> {
    bytes
        .split(|b| *b == b'\n')
        .map(trim_ascii)
        .filter(|line| !line.is_empty())
        .last()
}

#[derive(Debug, Clone)]
pub struct ResultClassifier {
    error_markers: Vec<String>,
    no_target_markers: Vec<String>,
    success: SuccessPredicate,
}

impl ResultClassifier {
    pub fn new(success: SuccessPredicate) -> Self {
        Self {
            error_markers: vec![TOOL_ERROR_MARKER.to_string()],
            no_target_markers: vec![NO_TARGET_MARKER.to_string()],
            success,
        }
    }

    /// The error marker reported by a stage, if any.
    pub fn error_marker(&self, result: &StageResult) -> Option<&str> {
        self.error_markers
            .iter()
            .find(|m| contains(&result.stdout, m) || contains(&result.stderr, m))
            .map(String::as_str)
    }

    /// Preparation stages fail on a non-zero exit or an error marker in either stream.
    pub fn stage_failed(&self, result: &StageResult) -> bool {
        !result.exited_zero() || result.timed_out || self.error_marker(result).is_some()
    }

    pub fn classify_execution(&self, result: &StageResult) -> OutcomeKind {
        if result.timed_out {
            return OutcomeKind::Timeout;
        }
        if self.success.matches(result) {
            return OutcomeKind::Success;
        }
        let no_target = self
            .no_target_markers
            .iter()
            .any(|m| contains(&result.stdout, m) || contains(&result.stderr, m));
        if no_target {
            return OutcomeKind::NoExploit;
        }
        OutcomeKind::VerificationFailed
    }

    /// Verdict over every stage result captured for one case, in execution order.
    pub fn classify(&self, outputs: &[StageResult]) -> OutcomeKind {
        let mut execution = None;
        for result in outputs {
            if result.stage == StageKind::Execute {
                execution = Some(result);
            } else if self.stage_failed(result) {
                return OutcomeKind::CompileError;
            }
        }
        match execution {
            Some(result) => self.classify_execution(result),
            None if outputs.is_empty() => OutcomeKind::NoExploit,
            None => OutcomeKind::VerificationFailed,
        }
    }
}
