use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while running one input line.
///
/// None of these are fatal to the shell: the loop reports them with a
/// `forksh:` prefix and moves on to the next line.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("syntax error: empty command in pipeline")]
    EmptyCommand,

    #[error("{builtin}: job not found: {id}")]
    JobNotFound { builtin: &'static str, id: usize },

    #[error("{builtin}: invalid job id: {arg}")]
    InvalidJobId { builtin: &'static str, arg: String },

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("wait: {0}")]
    Wait(#[source] io::Error),

    #[error("kill: {0}")]
    Signal(#[source] io::Error),

    #[error("cannot read {}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {message}", .path.display())]
    Config {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl ShellError {
    /// Exit status a failed command leaves behind, following the usual
    /// shell conventions (127 not found, 126 not executable).
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => 127,
            ShellError::Spawn { .. } => 126,
            ShellError::Usage(_) => 2,
            _ => 1,
        }
    }
}
