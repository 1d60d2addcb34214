use std::fmt;

use crate::reaper::{self, ChildEvent};
use crate::status::ChildChange;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobStatus {
    Running,
    Stopped,
    Done(i32),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Running => "Running",
            JobStatus::Stopped => "Stopped",
            JobStatus::Done(_) => "Done",
        })
    }
}

/// A single tracked background or stopped pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    /// The last stage's process; its state is the job's state.
    pub pid: libc::pid_t,
    /// Every process of the pipeline, in stage order. `fg` and `bg`
    /// resume all of them.
    pub members: Vec<libc::pid_t>,
    pub command: String,
    pub status: JobStatus,
}

/// The shell's job table. Entries are kept in submission order and ids are
/// never reused within a session.
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    /// Add a running pipeline. Returns `(job_id, pid)` where pid is the
    /// representative (last) process.
    ///
    /// `members` must not be empty.
    pub fn register(&mut self, command: String, members: Vec<libc::pid_t>) -> (usize, libc::pid_t) {
        self.insert(command, members, JobStatus::Running)
    }

    /// Add a pipeline that stopped while in the foreground.
    pub fn register_stopped(
        &mut self,
        command: String,
        members: Vec<libc::pid_t>,
    ) -> (usize, libc::pid_t) {
        self.insert(command, members, JobStatus::Stopped)
    }

    fn insert(
        &mut self,
        command: String,
        members: Vec<libc::pid_t>,
        status: JobStatus,
    ) -> (usize, libc::pid_t) {
        let id = self.next_id;
        let pid = members.last().copied().unwrap_or_default();
        self.jobs.push(Job {
            id,
            pid,
            members,
            command,
            status,
        });
        self.next_id += 1;
        tracing::debug!(id, pid, ?status, "registered job");
        (id, pid)
    }

    /// Oldest first.
    pub fn list(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn remove(&mut self, id: usize) -> Option<Job> {
        let index = self.jobs.iter().position(|j| j.id == id)?;
        Some(self.jobs.remove(index))
    }

    /// Apply one reaper event. Returns the id of the job whose state changed.
    ///
    /// Only the representative drives the job's state. Any other member that
    /// terminates is dropped from `members` so it is never signalled again.
    pub fn apply(&mut self, event: ChildEvent) -> Option<usize> {
        if let ChildChange::Terminated(_) = event.change {
            if let Some(job) = self
                .jobs
                .iter_mut()
                .find(|j| j.pid != event.pid && j.members.contains(&event.pid))
            {
                job.members.retain(|&pid| pid != event.pid);
                tracing::debug!(id = job.id, pid = event.pid, "pipeline member exited");
                return None;
            }
        }

        let job = self.jobs.iter_mut().find(|j| j.pid == event.pid)?;
        if matches!(job.status, JobStatus::Done(_)) {
            return None;
        }
        job.status = match event.change {
            ChildChange::Terminated(code) => JobStatus::Done(code),
            ChildChange::Stopped => JobStatus::Stopped,
            ChildChange::Continued => JobStatus::Running,
        };
        tracing::debug!(id = job.id, pid = job.pid, status = ?job.status, "job state changed");
        Some(job.id)
    }

    /// Pull pending events out of the reaper and apply them. Called by the
    /// main loop between commands and by the job built-ins before they look
    /// at the table.
    pub fn sync_with_reaper(&mut self) {
        for event in reaper::drain() {
            self.apply(event);
        }
    }

    /// Drop every finished job, returning them oldest first.
    pub fn purge_done(&mut self) -> Vec<Job> {
        let (done, live): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|j| matches!(j.status, JobStatus::Done(_)));
        self.jobs = live;
        done
    }
}
