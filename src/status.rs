/// What a wait status says happened to a child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildChange {
    /// Exited normally or was killed; carries the shell-style exit code.
    Terminated(i32),
    Stopped,
    Continued,
}

impl ChildChange {
    /// Decode a raw status as filled in by `waitpid`.
    pub fn from_wait_status(raw_status: libc::c_int) -> Option<Self> {
        if libc::WIFSTOPPED(raw_status) {
            return Some(ChildChange::Stopped);
        }
        if libc::WIFCONTINUED(raw_status) {
            return Some(ChildChange::Continued);
        }
        exit_code_from_wait_status(raw_status).map(ChildChange::Terminated)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChildChange::Terminated(_))
    }
}

/// Convert a raw wait status into shell-style exit code semantics.
///
/// Processes terminated by signal map to `128 + signal`.
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if libc::WIFEXITED(raw_status) {
        return Some(libc::WEXITSTATUS(raw_status));
    }

    if libc::WIFSIGNALED(raw_status) {
        return Some(128 + libc::WTERMSIG(raw_status));
    }

    None
}
