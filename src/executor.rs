use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::process::Command;

use crate::error::ShellError;
use crate::job_control::{self, SigchldBlock, WaitOutcome};
use crate::jobs::JobTable;
use crate::parser::Pipeline;
use crate::reaper;
use crate::redirect::{self, ChildRedirect};
use crate::suggest;

/// One stage with its redirections already stripped out of the arguments.
struct Stage {
    program: String,
    args: Vec<String>,
    redirects: Vec<ChildRedirect>,
}

impl Stage {
    fn prepare(words: &[String]) -> Result<Self, ShellError> {
        let mut words = words.to_vec();
        let redirections = redirect::extract_redirections(&mut words);
        if words.is_empty() {
            return Err(ShellError::EmptyCommand);
        }

        let program = words.remove(0);
        let redirects = redirections
            .iter()
            .map(ChildRedirect::prepare)
            .collect::<io::Result<Vec<_>>>()
            .map_err(|source| ShellError::Spawn {
                program: program.clone(),
                source,
            })?;

        Ok(Self {
            program,
            args: words,
            redirects,
        })
    }
}

/// Run a pipeline of external programs.
///
/// All N-1 pipes are created and wired before the first child is spawned.
/// In the foreground the call blocks until every stage has been waited for
/// and returns the last stage's status. In the background the pipeline is
/// registered as one job and `[id] pid` is printed right away.
pub fn run_pipeline(
    pipeline: &Pipeline,
    job_table: &mut JobTable,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32, ShellError> {
    let stages = pipeline
        .stages
        .iter()
        .map(|words| Stage::prepare(words))
        .collect::<Result<Vec<_>, _>>()?;
    let count = stages.len();

    // Keep the reaper out until every spawned child is accounted for.
    let _block = SigchldBlock::new().map_err(ShellError::Wait)?;

    let mut readers = Vec::with_capacity(count.saturating_sub(1));
    let mut writers = Vec::with_capacity(count.saturating_sub(1));
    for _ in 1..count {
        let (reader, writer) = os_pipe::pipe().map_err(ShellError::Pipe)?;
        readers.push(Some(reader));
        writers.push(Some(writer));
    }
    tracing::debug!(
        stages = count,
        pipes = readers.len(),
        background = pipeline.background,
        "starting pipeline"
    );

    let mut commands = Vec::with_capacity(count);
    for (i, stage) in stages.into_iter().enumerate() {
        let mut command = Command::new(&stage.program);
        command.args(&stage.args);
        if i > 0 {
            if let Some(reader) = readers[i - 1].take() {
                command.stdin(reader);
            }
        }
        if i + 1 < count {
            if let Some(writer) = writers[i].take() {
                command.stdout(writer);
            }
        }

        let redirects = stage.redirects;
        // SAFETY: the hook only calls async-signal-safe functions and touches
        // buffers allocated before the fork.
        unsafe {
            command.pre_exec(move || {
                job_control::reset_child_signals()?;
                for redirect in &redirects {
                    redirect.bind();
                }
                Ok(())
            });
        }
        commands.push((stage.program, command));
    }

    let mut pids: Vec<Option<libc::pid_t>> = Vec::with_capacity(count);
    let mut last_failure = None;
    let mut abort = None;
    let mut leader = None;

    for (program, command) in commands.iter_mut() {
        if pipeline.background {
            command.process_group(leader.unwrap_or(0));
        }
        match command.spawn() {
            Ok(child) => {
                let pid = child.id() as libc::pid_t;
                if leader.is_none() {
                    leader = Some(pid);
                }
                tracing::debug!(program = %program, pid, "spawned");
                pids.push(Some(pid));
                last_failure = None;
            }
            Err(source) if is_exec_failure(&source) => {
                let err = ShellError::Spawn {
                    program: program.clone(),
                    source,
                };
                let _ = writeln!(stderr, "forksh: {err}");
                if let Some(name) = suggest::suggest(program) {
                    let _ = writeln!(stderr, "Did you mean `{name}`?");
                }
                last_failure = Some(err.exit_code());
                pids.push(None);
            }
            Err(source) => {
                // Stages already running are left alone.
                abort = Some(ShellError::Spawn {
                    program: program.clone(),
                    source,
                });
                break;
            }
        }
    }

    // Close the parent's copies of every pipe end.
    drop(commands);
    drop(readers);
    drop(writers);

    let spawned: Vec<libc::pid_t> = pids.iter().flatten().copied().collect();

    if pipeline.background {
        if !spawned.is_empty() {
            for &pid in &spawned {
                if !reaper::track(pid) {
                    tracing::warn!(pid, "reaper table full; job state will not update");
                }
            }
            let (id, pid) = job_table.register(pipeline.text.clone(), spawned);
            let _ = writeln!(stdout, "[{id}] {pid}");
        }
        return match abort {
            Some(err) => Err(err),
            None => Ok(last_failure.unwrap_or(0)),
        };
    }

    let mut last_code = 0;
    for (index, &pid) in spawned.iter().enumerate() {
        match job_control::wait_for_pid(pid) {
            Ok(WaitOutcome::Exited(code)) => last_code = code,
            Ok(WaitOutcome::Stopped) => {
                let members = spawned[index..].to_vec();
                for &member in &members {
                    if !reaper::track(member) {
                        tracing::warn!(pid = member, "reaper table full; job state will not update");
                    }
                }
                let (id, _) = job_table.register_stopped(pipeline.text.clone(), members);
                let _ = writeln!(stdout, "\n[{id}] Stopped  {}", pipeline.text);
                return Ok(128 + libc::SIGTSTP);
            }
            Err(e) => tracing::warn!(pid, "wait failed: {e}"),
        }
    }

    if let Some(err) = abort {
        return Err(err);
    }
    Ok(match pids.last() {
        Some(Some(_)) => last_code,
        _ => last_failure.unwrap_or(1),
    })
}

/// Whether a spawn error came from replacing the program image rather than
/// from creating the process.
fn is_exec_failure(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    ) || matches!(
        err.raw_os_error(),
        Some(libc::ENOEXEC | libc::ENOTDIR | libc::ENAMETOOLONG | libc::ELOOP | libc::EISDIR)
    )
}
