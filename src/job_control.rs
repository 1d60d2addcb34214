use std::io;

use crate::status::ChildChange;

/// Signals the shell ignores for itself but hands back to children at their
/// default disposition.
const JOB_CONTROL_SIGNALS: &[libc::c_int] = &[
    libc::SIGTSTP,
    libc::SIGTTOU,
    libc::SIGTTIN,
    libc::SIGQUIT,
];

/// Signals reset to `SIG_DFL` in every child before exec.
const CHILD_DEFAULT_SIGNALS: &[libc::c_int] = &[
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTSTP,
    libc::SIGTTOU,
    libc::SIGTTIN,
    libc::SIGPIPE,
    libc::SIGCHLD,
];

pub(crate) enum WaitOutcome {
    Exited(i32),
    Stopped,
}

/// Keep the shell itself from being stopped by keyboard or tty signals.
pub(crate) fn ignore_job_control_signals() -> io::Result<()> {
    for &signal in JOB_CONTROL_SIGNALS {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Restore default signal handling in a freshly forked child.
///
/// Runs between fork and exec, so it only makes async-signal-safe calls.
pub(crate) fn reset_child_signals() -> io::Result<()> {
    for &signal in CHILD_DEFAULT_SIGNALS {
        if unsafe { libc::signal(signal, libc::SIG_DFL) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }

    // The shell may have SIGCHLD blocked around job-table bookkeeping.
    unsafe {
        let mut empty: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut empty);
        if libc::sigprocmask(libc::SIG_SETMASK, &empty, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Blocks SIGCHLD for the calling thread until dropped.
///
/// Held while the main loop spawns, waits for, or registers children so the
/// reaper cannot run in the middle of that bookkeeping. A SIGCHLD that
/// arrives meanwhile stays pending and runs the reaper on drop.
pub(crate) struct SigchldBlock {
    previous: libc::sigset_t,
}

impl SigchldBlock {
    pub(crate) fn new() -> io::Result<Self> {
        unsafe {
            let mut block: libc::sigset_t = std::mem::zeroed();
            let mut previous: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut block);
            libc::sigaddset(&mut block, libc::SIGCHLD);
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &block, &mut previous);
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }
            Ok(Self { previous })
        }
    }
}

impl Drop for SigchldBlock {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, std::ptr::null_mut());
        }
    }
}

/// Send `SIGCONT` to one process.
pub(crate) fn send_continue(pid: libc::pid_t) -> io::Result<()> {
    if pid <= 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid process id"));
    }

    loop {
        let rc = unsafe { libc::kill(pid, libc::SIGCONT) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            // Already gone; the reaper will report it.
            Some(code) if code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Block until `pid` exits or stops.
pub(crate) fn wait_for_pid(pid: libc::pid_t) -> io::Result<WaitOutcome> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }

        match ChildChange::from_wait_status(raw_status) {
            Some(ChildChange::Stopped) => return Ok(WaitOutcome::Stopped),
            Some(ChildChange::Terminated(code)) => return Ok(WaitOutcome::Exited(code)),
            Some(ChildChange::Continued) | None => continue,
        }
    }
}

/// True when `err` means the process was already collected elsewhere.
pub(crate) fn is_already_reaped(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ECHILD)
}
