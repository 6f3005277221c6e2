#![allow(dead_code)]

use async_trait::async_trait;
use ptx_harness::error::ToolError;
use ptx_harness::pipeline::{StageCommand, StageKind, StageResult, ToolRunner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What a scripted tool does when invoked.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Exit(i32, String),
    /// Exits zero but reports an error marker on stderr.
    Stderr(String),
    Timeout,
    SpawnError,
}

type Responder = Box<dyn Fn(&StageCommand, usize) -> Reply + Send + Sync>;

/// `ToolRunner` whose replies come from a closure `(command, prior runs of this exact command)`.
///
/// Successful replies create the file named after `-o`, like the real tools do.
pub struct ScriptedRunner {
    responder: Responder,
    delay: Duration,
    runs: Mutex<HashMap<String, usize>>,
    log: Mutex<Vec<StageCommand>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&StageCommand, usize) -> Reply + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            runs: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every stage succeeds; the execute stage prints `execute_stdout`.
    pub fn always(execute_stdout: &'static str) -> Self {
        Self::new(move |cmd, _| match cmd.stage {
            StageKind::Execute => Reply::Ok(execute_stdout.to_string()),
            _ => Reply::Ok(String::new()),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<StageCommand> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn count(&self, stage: StageKind) -> usize {
        self.calls().iter().filter(|c| c.stage == stage).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn output_path(cmd: &StageCommand) -> Option<PathBuf> {
    let idx = cmd.args.iter().position(|a| a == "-o")?;
    cmd.args.get(idx + 1).map(PathBuf::from)
}

fn finished(stage: StageKind, code: Option<i32>, stdout: &str, stderr: &str) -> StageResult {
    StageResult {
        stage,
        exit_status: code,
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
        elapsed: Duration::from_millis(1),
        timed_out: false,
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &StageCommand,
        _timeout: Option<Duration>,
    ) -> Result<StageResult, ToolError> {
        let key = format!("{}|{}", command.stage, command.args.join(" "));
        let prior = {
            let mut runs = self.runs.lock().expect("runs lock");
            let entry = runs.entry(key).or_insert(0);
            *entry += 1;
            *entry - 1
        };
        self.log.lock().expect("log lock").push(command.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = (self.responder)(command, prior);
        let result = match reply {
            Reply::Ok(stdout) => {
                if let Some(path) = output_path(command) {
                    if path.parent().map(|p| p.is_dir()).unwrap_or(false) {
                        let _ = std::fs::write(&path, b"generated");
                    }
                }
                finished(command.stage, Some(0), &stdout, "")
            }
            Reply::Exit(code, stderr) => finished(command.stage, Some(code), "", &stderr),
            Reply::Stderr(stderr) => finished(command.stage, Some(0), "", &stderr),
            Reply::Timeout => StageResult {
                timed_out: true,
                ..finished(command.stage, None, "partial output", "")
            },
            Reply::SpawnError => {
                return Err(ToolError::Spawn {
                    program: command.program_name(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such tool"),
                })
            }
        };
        Ok(result)
    }
}
