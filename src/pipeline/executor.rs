//! Process execution seam.
//!
//! `PipelineRunner` only talks to the operating system through `ToolRunner`, so retry,
//! sequencing and cleanup can be exercised against scripted runners in tests.

use crate::error::ToolError;
use crate::pipeline::stage::{StageCommand, StageResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long to keep draining pipes after a timed-out process was killed.
const KILL_DRAIN_GRACE_MS: u64 = 250;

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run one stage to completion, or until `timeout` elapses.
    ///
    /// A timed-out process must be killed before returning; the result then has
    /// `timed_out = true` and whatever output was captured so far.
    async fn run(
        &self,
        command: &StageCommand,
        timeout: Option<Duration>,
    ) -> Result<StageResult, ToolError>;
}

/// `ToolRunner` backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

fn spawn_reader<R>(reader: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf).await;
        }
        buf
    })
}

async fn drain(handle: JoinHandle<Vec<u8>>, grace: Duration) -> Vec<u8> {
    match tokio::time::timeout(grace, handle).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// SIGKILL the stage's whole process group, so descendants holding our pipes die too.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    let Some(pgid) = pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this stage at spawn.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(
            "[PIPE] killpg({}) failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        command: &StageCommand,
        timeout: Option<Duration>,
    ) -> Result<StageResult, ToolError> {
        let program = command.program_name();
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        for (key, value) in &command.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!("[PIPE] spawn stage={} cmd={}", command.stage, command.render());
        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pgid = child.id();
        let mut stdout_task = spawn_reader(child.stdout.take());
        let mut stderr_task = spawn_reader(child.stderr.take());

        // The deadline covers output capture as well as the exit.
        let mut status = None;
        let mut stdout = None;
        let mut stderr = None;
        let capture = async {
            status = Some(child.wait().await);
            stdout = Some((&mut stdout_task).await.unwrap_or_default());
            stderr = Some((&mut stderr_task).await.unwrap_or_default());
        };
        let timed_out = match timeout {
            Some(limit) => tokio::time::timeout(limit, capture).await.is_err(),
            None => {
                capture.await;
                false
            }
        };

        if timed_out {
            tracing::warn!(
                "[PIPE] stage={} exceeded {:?}; killing `{}` and its process group",
                command.stage,
                timeout.unwrap_or_default(),
                program
            );
            kill_process_group(pgid);
            if status.is_none() {
                if let Err(err) = child.kill().await {
                    tracing::warn!("[PIPE] kill failed for `{}`: {}", program, err);
                }
            }
        }

        let exit_status = match status {
            Some(waited) => {
                let waited = waited.map_err(|source| ToolError::Io {
                    program: program.clone(),
                    source,
                })?;
                waited.code()
            }
            None => None,
        };
        let grace = Duration::from_millis(KILL_DRAIN_GRACE_MS);
        let stdout = match stdout {
            Some(buf) => buf,
            None => drain(stdout_task, grace).await,
        };
        let stderr = match stderr {
            Some(buf) => buf,
            None => drain(stderr_task, grace).await,
        };

        Ok(StageResult {
            stage: command.stage,
            exit_status,
            stdout,
            stderr,
            elapsed: started.elapsed(),
            timed_out,
        })
    }
}
