use std::ffi::CString;
use std::io;

/// How the named file should be opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RedirectMode {
    /// `<` read-only
    Read,
    /// `>` write, create, truncate
    Truncate,
    /// `>>` write, create, append
    Append,
}

impl RedirectMode {
    fn from_operator(token: &str) -> Option<Self> {
        match token {
            "<" => Some(RedirectMode::Read),
            ">" => Some(RedirectMode::Truncate),
            ">>" => Some(RedirectMode::Append),
            _ => None,
        }
    }

    pub fn open_flags(self) -> libc::c_int {
        match self {
            RedirectMode::Read => libc::O_RDONLY,
            RedirectMode::Truncate => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            RedirectMode::Append => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
        }
    }

    /// The standard stream this mode rebinds.
    pub fn target_fd(self) -> libc::c_int {
        match self {
            RedirectMode::Read => libc::STDIN_FILENO,
            RedirectMode::Truncate | RedirectMode::Append => libc::STDOUT_FILENO,
        }
    }
}

/// A single I/O redirection instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub mode: RedirectMode,
    pub path: String,
}

/// Strip `<`, `>` and `>>` operators (and the path after each) out of
/// `args`, left to right, returning them in order of appearance.
///
/// An operator with nothing after it is dropped without opening anything.
pub fn extract_redirections(args: &mut Vec<String>) -> Vec<Redirection> {
    let mut redirections = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let Some(mode) = RedirectMode::from_operator(&args[i]) else {
            i += 1;
            continue;
        };

        if i + 1 < args.len() {
            let mut removed = args.drain(i..i + 2);
            removed.next();
            if let Some(path) = removed.next() {
                redirections.push(Redirection { mode, path });
            }
        } else {
            args.remove(i);
        }
        // The list shrank, so the same index now holds the next word.
    }

    redirections
}

/// A redirection with its path already converted for the C API, so the
/// child can bind it between fork and exec without allocating.
pub struct ChildRedirect {
    path: CString,
    flags: libc::c_int,
    target_fd: libc::c_int,
}

impl ChildRedirect {
    pub fn prepare(redirection: &Redirection) -> io::Result<Self> {
        let path = CString::new(redirection.path.as_str())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(Self {
            path,
            flags: redirection.mode.open_flags(),
            target_fd: redirection.mode.target_fd(),
        })
    }

    /// Open the file and move it onto the standard stream. Runs in the
    /// forked child only.
    ///
    /// On failure the child writes `forksh: <path>: <reason>` to its stderr
    /// and exits with status 1; it never returns to run parent logic.
    pub fn bind(&self) {
        // SAFETY: open/dup2/close/write/_exit are async-signal-safe and the
        // path buffer was allocated before the fork.
        unsafe {
            let fd = libc::open(self.path.as_ptr(), self.flags | libc::O_CLOEXEC, 0o644);
            if fd < 0 {
                self.fail();
            }
            if fd != self.target_fd {
                if libc::dup2(fd, self.target_fd) < 0 {
                    self.fail();
                }
                libc::close(fd);
            } else {
                // Landed on the target already; keep it open across exec.
                libc::fcntl(fd, libc::F_SETFD, 0);
            }
        }
    }

    unsafe fn fail(&self) -> ! {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
        let mut reason = [0 as libc::c_char; 128];
        // SAFETY: called from the child only; every buffer is stack or
        // pre-allocated and strerror_r writes at most `reason.len()` bytes.
        unsafe {
            let rc = libc::strerror_r(errno, reason.as_mut_ptr(), reason.len());
            write_stderr(b"forksh: ");
            write_stderr(self.path.as_bytes());
            write_stderr(b": ");
            if rc == 0 {
                let len = libc::strlen(reason.as_ptr());
                write_stderr(std::slice::from_raw_parts(reason.as_ptr().cast(), len));
            } else {
                write_stderr(b"cannot open file");
            }
            write_stderr(b"\n");
            libc::_exit(1);
        }
    }
}

unsafe fn write_stderr(bytes: &[u8]) {
    // SAFETY: plain write(2) to fd 2.
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}
