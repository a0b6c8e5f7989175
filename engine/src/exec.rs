use std::{path::Path, process::Stdio, time::Duration};

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::model::ExecutionResult;

/// Runs one command with a wall-clock bound, capturing stdout/stderr up to
/// the configured caps.
///
/// Commands are always argument vectors invoked directly, never shell
/// strings, so submitted source cannot smuggle shell metacharacters. On
/// timeout the child is killed before returning; `kill_on_drop` covers the
/// cancellation paths where the future itself is dropped.
#[derive(Debug, Clone)]
pub struct Executor {
    time_limit: Duration,
    stdout_cap: usize,
    stderr_cap: usize,
}

impl Executor {
    pub const DEFAULT_CAPTURE_MAX_BYTES: usize = 1 << 20;

    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            stdout_cap: Self::DEFAULT_CAPTURE_MAX_BYTES,
            stderr_cap: Self::DEFAULT_CAPTURE_MAX_BYTES,
        }
    }

    pub fn capture_max_bytes(mut self, stdout_cap: usize, stderr_cap: usize) -> Self {
        self.stdout_cap = stdout_cap;
        self.stderr_cap = stderr_cap;
        self
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub async fn run(
        &self,
        argv: &[String],
        stdin_data: &str,
        cwd: &Path,
    ) -> anyhow::Result<ExecutionResult> {
        let (program, args) = argv
            .split_first()
            .context("Empty command for process executor")?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The child leads its own process group, so a timeout can take down
        // anything it forked as well.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut proc = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", argv.join(" ")))?;

        let mut stdin = proc.stdin.take().context("Failed to open stdin")?;
        let stdout = proc.stdout.take().context("Failed to open stdout")?;
        let stderr = proc.stderr.take().context("Failed to open stderr")?;

        // Feed stdin concurrently with draining the outputs, all under the
        // one timeout: a child that fills its output pipe before consuming
        // its whole input would otherwise deadlock against a blocked writer.
        let feed_stdin = async move {
            match stdin.write_all(stdin_data.as_bytes()).await {
                Ok(()) => {}
                // The child may exit without reading its input.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
            }
            drop(stdin); // NOTE: this line is essential
            Ok(())
        };

        let start_at = tokio::time::Instant::now();
        let res = tokio::time::timeout(self.time_limit, async {
            tokio::try_join!(
                feed_stdin,
                read_capped(stdout, self.stdout_cap),
                read_capped(stderr, self.stderr_cap),
                proc.wait(),
            )
            .context("Failed to communicate with subprocess")
        })
        .await;
        let wall_time = tokio::time::Instant::now().duration_since(start_at);

        match res {
            Err(_elapsed) => {
                kill_process_tree(&mut proc).await;
                Ok(ExecutionResult::timed_out(self.time_limit))
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(((), stdout_buf, stderr_buf, exit_status))) => Ok(ExecutionResult::completed(
                String::from_utf8_lossy(&stdout_buf).into(),
                String::from_utf8_lossy(&stderr_buf).into(),
                exit_code_of(exit_status),
                wall_time,
            )),
        }
    }
}

#[cfg(unix)]
async fn kill_process_tree(proc: &mut tokio::process::Child) {
    // Group signal first (see `process_group(0)` above) so forked
    // descendants die with the direct child.
    if let Some(pid) = proc.id() {
        unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    }
    if let Err(e) = proc.kill().await {
        log::warn!("Failed to kill timed-out process: {:#}", e);
    }
}

#[cfg(not(unix))]
async fn kill_process_tree(proc: &mut tokio::process::Child) {
    if let Err(e) = proc.kill().await {
        log::warn!("Failed to kill timed-out process: {:#}", e);
    }
}

/// Reads at most `cap` bytes into memory, draining the rest so the child is
/// never blocked on a full pipe.
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = (&mut reader).take(cap as u64);
    tokio::io::copy(&mut limited, &mut buf).await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(buf)
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    // Mirror the convention of negative codes for signal-terminated children.
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
