use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal verdict for one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NoExploit,
    CompileError,
    Timeout,
    VerificationFailed,
    MalformedReport,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 6] = [
        OutcomeKind::Success,
        OutcomeKind::NoExploit,
        OutcomeKind::CompileError,
        OutcomeKind::Timeout,
        OutcomeKind::VerificationFailed,
        OutcomeKind::MalformedReport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoExploit => "no_exploit",
            Self::CompileError => "compile_error",
            Self::Timeout => "timeout",
            Self::VerificationFailed => "verification_failed",
            Self::MalformedReport => "malformed_report",
        }
    }

    /// Whether the case reached the device and therefore counts toward `Passed X / Y`.
    pub fn is_attempted(self) -> bool {
        matches!(
            self,
            Self::Success | Self::CompileError | Self::Timeout | Self::VerificationFailed
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::CompileError | Self::Timeout | Self::VerificationFailed | Self::MalformedReport
        )
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub kind: OutcomeKind,
    pub elapsed: Duration,
    /// Tail of the captured output, kept only for failures.
    pub diagnostics: Option<String>,
}

impl RunOutcome {
    pub fn new(kind: OutcomeKind, elapsed: Duration) -> Self {
        Self {
            kind,
            elapsed,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }
}
