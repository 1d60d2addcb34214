//! SIGCHLD reaper.
//!
//! The signal handler only runs a non-blocking `waitpid` sweep over a fixed
//! table of tracked process ids and records the latest status of each one in
//! atomics. Nothing is allocated, locked, or printed inside the handler. The
//! main loop calls [`drain`] between commands to turn those records into
//! [`ChildEvent`]s and applies them to the job table itself.
//!
//! Only processes passed to [`track`] are ever waited on here, so foreground
//! children the executor waits for directly are never stolen.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use crate::status::ChildChange;

const CAPACITY: usize = 128;

const FREE: u8 = 0;
const CLAIMED: u8 = 1;
const TRACKED: u8 = 2;
const SWEEPING: u8 = 3;
const REAPED: u8 = 4;

struct Slot {
    state: AtomicU8,
    pid: AtomicI32,
    status: AtomicI32,
    pending: AtomicBool,
}

impl Slot {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(FREE),
            pid: AtomicI32::new(0),
            status: AtomicI32::new(0),
            pending: AtomicBool::new(false),
        }
    }
}

static SLOTS: [Slot; CAPACITY] = [const { Slot::new() }; CAPACITY];

/// A state change of a tracked child, collected by [`drain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildEvent {
    pub pid: libc::pid_t,
    pub change: ChildChange,
}

/// Install the SIGCHLD handler.
pub fn install() -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_sigchld as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGCHLD, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

extern "C" fn on_sigchld(_signal: libc::c_int) {
    // waitpid clobbers errno; the interrupted code may be about to read it.
    let saved = unsafe { *errno_location() };
    sweep();
    unsafe { *errno_location() = saved };
}

/// Start watching `pid`. Returns `false` when every slot is in use, in which
/// case the process is left for the caller to wait on.
pub fn track(pid: libc::pid_t) -> bool {
    for slot in &SLOTS {
        if slot
            .state
            .compare_exchange(FREE, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            slot.pid.store(pid, Ordering::Relaxed);
            slot.status.store(0, Ordering::Relaxed);
            slot.pending.store(false, Ordering::Relaxed);
            slot.state.store(TRACKED, Ordering::Release);
            return true;
        }
    }
    false
}

/// Stop watching `pid`, typically after the caller reaped it itself.
pub fn untrack(pid: libc::pid_t) {
    for slot in &SLOTS {
        if slot.pid.load(Ordering::Relaxed) != pid {
            continue;
        }
        loop {
            let current = slot.state.load(Ordering::Acquire);
            match current {
                // A sweep on another thread owns the slot for a moment.
                SWEEPING => std::hint::spin_loop(),
                TRACKED | REAPED => {
                    if slot
                        .state
                        .compare_exchange(current, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                        .is_ok()
                    {
                        slot.pid.store(0, Ordering::Relaxed);
                        slot.pending.store(false, Ordering::Relaxed);
                        slot.state.store(FREE, Ordering::Release);
                        break;
                    }
                }
                _ => break,
            }
        }
    }
}

/// Non-blocking wait on every tracked process until none reports a further
/// change. Safe to call from the signal handler and from the main loop.
pub fn sweep() {
    for slot in &SLOTS {
        if slot
            .state
            .compare_exchange(TRACKED, SWEEPING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            continue;
        }

        let pid = slot.pid.load(Ordering::Relaxed);
        let mut next_state = TRACKED;
        loop {
            let mut raw_status: libc::c_int = 0;
            let rc = unsafe {
                libc::waitpid(
                    pid,
                    &mut raw_status,
                    libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
                )
            };
            if rc <= 0 {
                break;
            }
            slot.status.store(raw_status, Ordering::Relaxed);
            slot.pending.store(true, Ordering::Release);
            if ChildChange::from_wait_status(raw_status).is_some_and(ChildChange::is_terminal) {
                next_state = REAPED;
                break;
            }
        }
        slot.state.store(next_state, Ordering::Release);
    }
}

/// Collect every state change recorded since the last drain.
///
/// Runs a sweep first so a change that raced with the handler is not left
/// behind. Slots of terminated processes are released.
pub fn drain() -> Vec<ChildEvent> {
    sweep();

    let mut events = Vec::new();
    for slot in &SLOTS {
        let state = slot.state.load(Ordering::Acquire);
        if state != TRACKED && state != REAPED {
            continue;
        }

        if slot.pending.swap(false, Ordering::Acquire) {
            let raw_status = slot.status.load(Ordering::Relaxed);
            if let Some(change) = ChildChange::from_wait_status(raw_status) {
                events.push(ChildEvent {
                    pid: slot.pid.load(Ordering::Relaxed),
                    change,
                });
            }
        }

        if state == REAPED
            && slot
                .state
                .compare_exchange(REAPED, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            slot.pid.store(0, Ordering::Relaxed);
            slot.state.store(FREE, Ordering::Release);
        }
    }

    if !events.is_empty() {
        tracing::debug!(count = events.len(), "reaper drained child events");
    }
    events
}

/// Unit tests that drain the process-wide slot table take this first so they
/// do not consume each other's events.
#[cfg(test)]
pub(crate) static TEST_SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(any(target_os = "linux", target_os = "dragonfly", target_os = "hurd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "android", target_os = "openbsd", target_os = "netbsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno() }
}

#[cfg(any(target_vendor = "apple", target_os = "freebsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__error() }
}

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::___errno() }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "hurd",
    target_os = "android",
    target_os = "openbsd",
    target_os = "netbsd",
    target_vendor = "apple",
    target_os = "freebsd",
    target_os = "solaris",
    target_os = "illumos",
)))]
compile_error!("forksh needs a thread-local errno accessor for this target");

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::{Duration, Instant};

    fn wait_for(pid: libc::pid_t, wanted: ChildChange) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if drain().iter().any(|e| e.pid == pid && e.change == wanted) {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("no {wanted:?} event for pid {pid}");
    }

    fn is_tracked(pid: libc::pid_t) -> bool {
        SLOTS.iter().any(|s| {
            s.pid.load(Ordering::Relaxed) == pid && s.state.load(Ordering::Relaxed) != FREE
        })
    }

    #[test]
    fn exit_is_reported_and_slot_released() {
        let _guard = TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        install().unwrap();

        let child = Command::new("sh").args(["-c", "exit 5"]).spawn().unwrap();
        let pid = child.id() as libc::pid_t;
        assert!(track(pid));

        wait_for(pid, ChildChange::Terminated(5));
        assert!(!is_tracked(pid));
    }

    #[test]
    fn stop_continue_and_kill_are_reported() {
        let _guard = TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner());

        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as libc::pid_t;
        assert!(track(pid));

        unsafe { libc::kill(pid, libc::SIGSTOP) };
        wait_for(pid, ChildChange::Stopped);

        unsafe { libc::kill(pid, libc::SIGCONT) };
        wait_for(pid, ChildChange::Continued);

        unsafe { libc::kill(pid, libc::SIGKILL) };
        wait_for(pid, ChildChange::Terminated(128 + libc::SIGKILL));
    }

    #[test]
    fn untracked_children_are_left_alone() {
        let _guard = TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner());

        let mut child = Command::new("true").spawn().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(drain().iter().all(|e| e.pid != child.id() as libc::pid_t));
        assert!(child.wait().unwrap().success());
    }

    #[test]
    fn errno_accessor_is_the_one_std_reads() {
        unsafe { *errno_location() = libc::EINTR };
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::EINTR));
        unsafe { *errno_location() = 0 };
    }

    #[test]
    fn handler_preserves_errno() {
        let _guard = TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner());

        unsafe { *errno_location() = libc::EAGAIN };
        on_sigchld(libc::SIGCHLD);
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::EAGAIN));
    }

    #[test]
    fn untrack_frees_the_slot() {
        let _guard = TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner());

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as libc::pid_t;
        assert!(track(pid));
        untrack(pid);
        assert!(!is_tracked(pid));

        child.kill().unwrap();
        child.wait().unwrap();
    }
}
