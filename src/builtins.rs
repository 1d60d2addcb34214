use std::io::Write;
use std::path::PathBuf;

use crate::config::home_dir;
use crate::error::ShellError;
use crate::history::History;
use crate::job_control::{self, SigchldBlock, WaitOutcome};
use crate::jobs::{JobStatus, JobTable};
use crate::reaper;

/// Built-ins that act on the job table. They are looked up before the
/// general ones.
const JOB_BUILTINS: &[&str] = &["jobs", "fg", "bg"];

/// Built-ins that change the shell's own state.
const GENERAL_BUILTINS: &[&str] = &["cd", "export", "history", "help", "exit", "quit", "$Q"];

/// Every built-in name, used for "did you mean" suggestions.
pub const BUILTINS: &[&str] = &[
    "cd", "export", "exit", "help", "history", "jobs", "fg", "bg", "quit",
];

#[derive(Debug, PartialEq)]
pub enum BuiltinAction {
    Continue(i32),
    Exit(i32),
}

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    JOB_BUILTINS.contains(&name) || GENERAL_BUILTINS.contains(&name)
}

/// Execute a builtin command, writing output to the provided streams.
/// Errors are reported on `stderr` and turned into a non-zero status.
pub fn execute(
    program: &str,
    args: &[String],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    job_table: &mut JobTable,
    history: &History,
) -> BuiltinAction {
    let result = match program {
        "jobs" => builtin_jobs(job_table, stdout),
        "fg" => builtin_fg(args, job_table, stdout),
        "bg" => builtin_bg(args, job_table, stdout, stderr),
        "cd" => Ok(builtin_cd(args, stderr)),
        "export" => builtin_export(args),
        "history" => builtin_history(history, stdout),
        "help" => builtin_help(stdout),
        "exit" | "quit" | "$Q" => return BuiltinAction::Exit(0),
        _ => {
            let _ = writeln!(stderr, "forksh: unknown builtin: {program}");
            Ok(1)
        }
    };

    match result {
        Ok(code) => BuiltinAction::Continue(code),
        Err(e) => {
            let _ = writeln!(stderr, "forksh: {e}");
            BuiltinAction::Continue(e.exit_code())
        }
    }
}

fn builtin_cd(args: &[String], stderr: &mut dyn Write) -> i32 {
    let target: PathBuf = match args.first() {
        Some(dir) => dir.into(),
        None => home_dir(),
    };

    if let Err(e) = std::env::set_current_dir(&target) {
        let _ = writeln!(stderr, "cd: {}: {e}", target.display());
        return 1;
    }

    0
}

fn builtin_export(args: &[String]) -> Result<i32, ShellError> {
    const USAGE: &str = "export KEY=VALUE";

    let [assignment] = args else {
        return Err(ShellError::Usage(USAGE));
    };
    match assignment.split_once('=') {
        Some((key, value)) if !key.is_empty() && !key.contains('\0') && !value.contains('\0') => {
            // SAFETY: the shell mutates its environment only from the main
            // thread; the Ctrl-C handler thread never touches it.
            unsafe { std::env::set_var(key, value) };
            Ok(0)
        }
        _ => Err(ShellError::Usage(USAGE)),
    }
}

fn builtin_history(history: &History, stdout: &mut dyn Write) -> Result<i32, ShellError> {
    for (index, entry) in history.iter().enumerate() {
        let _ = writeln!(stdout, "{}  {}", index + 1, entry);
    }
    Ok(0)
}

fn builtin_help(stdout: &mut dyn Write) -> Result<i32, ShellError> {
    let _ = write!(
        stdout,
        "\
forksh: built-in commands:
  cd [dir]        change directory (home when omitted)
  export K=V      set an environment variable
  history         show command history
  jobs            list background and stopped jobs
  fg <id>         resume a job and wait for it
  bg <id>         resume a stopped job in the background
  help            this message
  exit, quit, $Q  leave the shell
Anything else runs as a program. Supports pipelines (|),
redirection (<, >, >>) and background execution (trailing &).
"
    );
    Ok(0)
}

// ── Job control builtins ──

/// List every tracked job, then forget the ones shown as Done.
fn builtin_jobs(job_table: &mut JobTable, stdout: &mut dyn Write) -> Result<i32, ShellError> {
    job_table.sync_with_reaper();

    for job in job_table.list() {
        let _ = writeln!(stdout, "[{}] {}  {}", job.id, job.status, job.command);
    }
    job_table.purge_done();
    Ok(0)
}

/// Resume a job and block until it finishes.
fn builtin_fg(
    args: &[String],
    job_table: &mut JobTable,
    stdout: &mut dyn Write,
) -> Result<i32, ShellError> {
    let id = parse_job_id("fg", args)?;
    let _block = SigchldBlock::new().map_err(ShellError::Wait)?;
    job_table.sync_with_reaper();

    let job = job_table
        .get(id)
        .ok_or(ShellError::JobNotFound { builtin: "fg", id })?;
    let _ = writeln!(stdout, "{}", job.command);
    let _ = stdout.flush();

    if let JobStatus::Done(code) = job.status {
        job_table.remove(id);
        return Ok(code);
    }

    for &pid in &job.members {
        job_control::send_continue(pid).map_err(ShellError::Signal)?;
    }

    let pid = job.pid;
    match job_control::wait_for_pid(pid) {
        Ok(WaitOutcome::Exited(code)) => {
            reaper::untrack(pid);
            job_table.remove(id);
            Ok(code)
        }
        Ok(WaitOutcome::Stopped) => {
            if let Some(job) = job_table.get_mut(id) {
                job.status = JobStatus::Stopped;
                let _ = writeln!(stdout, "\n[{}] Stopped  {}", job.id, job.command);
            }
            Ok(128 + libc::SIGTSTP)
        }
        Err(e) if job_control::is_already_reaped(&e) => {
            // Collected by the reaper before the wait started.
            job_table.sync_with_reaper();
            let code = match job_table.remove(id).map(|j| j.status) {
                Some(JobStatus::Done(code)) => code,
                _ => 0,
            };
            Ok(code)
        }
        Err(e) => Err(ShellError::Wait(e)),
    }
}

/// Resume a stopped job in the background.
fn builtin_bg(
    args: &[String],
    job_table: &mut JobTable,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32, ShellError> {
    let id = parse_job_id("bg", args)?;
    job_table.sync_with_reaper();

    let job = job_table
        .get_mut(id)
        .ok_or(ShellError::JobNotFound { builtin: "bg", id })?;

    if matches!(job.status, JobStatus::Done(_)) {
        let _ = writeln!(stderr, "bg: job {id} has already completed");
        return Ok(1);
    }

    for &pid in &job.members {
        job_control::send_continue(pid).map_err(ShellError::Signal)?;
    }
    job.status = JobStatus::Running;
    let _ = writeln!(stdout, "[{}] {} &", job.id, job.command);
    Ok(0)
}

// ── Helpers ──

/// `fg` and `bg` take exactly one job id, written `N` or `%N`.
fn parse_job_id(builtin: &'static str, args: &[String]) -> Result<usize, ShellError> {
    let [arg] = args else {
        return Err(ShellError::Usage(match builtin {
            "fg" => "fg <job-id>",
            _ => "bg <job-id>",
        }));
    };
    arg.trim_start_matches('%')
        .parse::<usize>()
        .map_err(|_| ShellError::InvalidJobId {
            builtin,
            arg: arg.clone(),
        })
}
