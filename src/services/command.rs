//! Bounded external process execution shared by the checker and test stages.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// How a bounded process invocation ended.
#[derive(Debug)]
pub enum CommandRun {
    Completed { status: ExitStatus, output: String },
    TimedOut,
    SpawnFailed(io::Error),
}

/// Run `program args...` in `dir`, killing it if it outlives `timeout`.
///
/// stdout and stderr are captured and joined. On Unix the child leads its
/// own process group and the whole group is killed once the call returns,
/// so grandchildren cannot outlive the timeout and keep touching `dir`.
pub async fn run_command<I, S>(program: &str, args: I, dir: &Path, timeout: Duration) -> CommandRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return CommandRun::SpawnFailed(err),
    };
    let group = child.id();

    let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;
    kill_group(group);

    match waited {
        Err(_) => CommandRun::TimedOut,
        Ok(Err(err)) => CommandRun::SpawnFailed(err),
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.is_empty() {
                if !combined.is_empty() && !combined.ends_with('\n') {
                    combined.push('\n');
                }
                combined.push_str(&stderr);
            }
            CommandRun::Completed {
                status: output.status,
                output: combined,
            }
        }
    }
}

/// SIGKILL every process left in the group led by `leader`.
#[cfg(unix)]
fn kill_group(leader: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = leader.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(errno) => debug!(pgid = pid, %errno, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_leader: Option<u32>) {}

/// Keep the last `limit` characters of `text`.
pub fn tail_chars(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    let skipped: String = text.chars().skip(total - limit).collect();
    format!("...{skipped}")
}
