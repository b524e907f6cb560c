//! Process-group cleanup for remediation commands.
//!
//! Commands are spawned as leaders of their own process group. A
//! [`GroupGuard`] sends SIGKILL to the whole group when dropped unless the
//! command finished first, so a timed-out `npm run build` takes its `node`
//! grandchildren down with it.

use tokio::process::Command;

/// Make the spawned child the leader of a fresh process group.
pub(crate) fn isolate(command: &mut Command) {
    #[cfg(unix)]
    command.process_group(0);
    #[cfg(not(unix))]
    let _ = command;
}

/// Kills the process group led by `pid` on drop, unless disarmed.
#[derive(Debug)]
pub(crate) struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    pub(crate) fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// The command ran to completion; leave anything it backgrounded alone.
    pub(crate) fn disarm(mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_group(pid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg has no memory-safety preconditions. The group id is the
    // leader's pid, assigned by `process_group(0)` at spawn.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pgid, error = %err, "failed to kill remediation process group");
        }
    } else {
        tracing::debug!(pgid, "killed remediation process group");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}
