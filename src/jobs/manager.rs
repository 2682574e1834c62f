//! Job table and job-control operations
//!
//! The manager owns every tracked job, resolves job specs (`%1`, `%+`,
//! `%-`, `%str`, `%?str`, pid), rotates the current/previous markers, moves
//! terminal modes across foreground changes, and waits on whole process
//! groups.

use std::fmt;
use std::io;

use indexmap::IndexMap;
use log::debug;
use nix::sys::termios::{self, SetArg, Termios};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};
use thiserror::Error;

use crate::jobs::job::{Job, JobState};

/// Errors from job-control operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("no such job: {0}")]
    NoSuchJob(String),
    #[error("no current job")]
    NoCurrentJob,
    #[error("terminal control: {0}")]
    Terminal(#[from] nix::Error),
}

/// Manages all jobs in the shell.
pub struct JobManager {
    jobs: IndexMap<u32, Job>,
    next_job_id: u32,
    current_job: Option<u32>,
    previous_job: Option<u32>,
    shell_pgid: Pid,
    shell_tmodes: Option<Termios>,
    last_background_pid: Option<Pid>,
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.jobs.len())
            .field("next_job_id", &self.next_job_id)
            .field("current_job", &self.current_job)
            .field("previous_job", &self.previous_job)
            .field("shell_pgid", &self.shell_pgid)
            .finish()
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    /// Capture the shell's process group and terminal modes once at startup;
    /// they are restored after every foreground wait.
    pub fn new() -> Self {
        Self {
            jobs: IndexMap::new(),
            next_job_id: 1,
            current_job: None,
            previous_job: None,
            shell_pgid: unistd::getpgrp(),
            shell_tmodes: termios::tcgetattr(io::stdin()).ok(),
            last_background_pid: None,
        }
    }

    pub fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    pub fn last_background_pid(&self) -> Option<Pid> {
        self.last_background_pid
    }

    pub fn create_job(&mut self, pgid: Pid, command: impl Into<String>) -> u32 {
        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let job = Job::new(job_id, pgid, command);
        debug!("created job [{}] pgid {}", job_id, pgid);
        self.jobs.insert(job_id, job);
        job_id
    }

    /// Remove a job. Removing the current job promotes the previous job.
    pub fn remove_job(&mut self, job_id: u32) {
        if self.jobs.shift_remove(&job_id).is_some() {
            if self.current_job == Some(job_id) {
                self.current_job = self.previous_job.take();
            } else if self.previous_job == Some(job_id) {
                self.previous_job = None;
            }
        }
    }

    pub fn get_job(&self, job_id: u32) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn get_job_mut(&mut self, job_id: u32) -> Option<&mut Job> {
        self.jobs.get_mut(&job_id)
    }

    pub fn job_by_pid(&self, pid: Pid) -> Option<&Job> {
        self.jobs
            .values()
            .find(|job| job.processes.iter().any(|p| p.pid == pid))
    }

    pub fn job_by_pgid(&self, pgid: Pid) -> Option<&Job> {
        self.jobs.values().find(|job| job.pgid == pgid)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn count_active(&self) -> usize {
        self.jobs.values().filter(|j| j.state != JobState::Done).count()
    }

    /// Route a waitpid result to the owning job and recompute its state.
    pub fn update_process_status(&mut self, pid: Pid, status: WaitStatus) {
        for job in self.jobs.values_mut() {
            if job.processes.iter().any(|p| p.pid == pid) {
                job.update_process_status(pid, status);
                job.update_state();
                return;
            }
        }
        debug!("reaped pid {} not in any job", pid);
    }

    /// Mark a launched job as the background job and the `%+` target.
    pub fn register_background_job(&mut self, job_id: u32, last_pid: Pid) {
        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.foreground = false;
        }
        self.last_background_pid = Some(last_pid);
        if self.current_job != Some(job_id) {
            self.previous_job = self.current_job;
            self.current_job = Some(job_id);
        }
    }

    /// Rotate the current/previous markers and move terminal modes: the
    /// outgoing job's modes are saved, the incoming job's restored.
    pub fn set_foreground_job(&mut self, job_id: Option<u32>) {
        if let Some(current) = self.current_job {
            if Some(current) != job_id {
                if let Some(job) = self.jobs.get_mut(&current) {
                    job.saved_tmodes = termios::tcgetattr(io::stdin()).ok();
                }
                self.previous_job = Some(current);
            }
        }

        self.current_job = job_id;

        let incoming = job_id.and_then(|id| self.jobs.get(&id));
        match incoming {
            Some(job) => {
                if let Some(tmodes) = &job.saved_tmodes {
                    let _ = termios::tcsetattr(io::stdin(), SetArg::TCSADRAIN, tmodes);
                }
            }
            None => {
                if let Some(tmodes) = &self.shell_tmodes {
                    let _ = termios::tcsetattr(io::stdin(), SetArg::TCSADRAIN, tmodes);
                }
            }
        }
    }

    /// Give the terminal to a process group. Returns false when the shell has
    /// no controlling terminal.
    pub fn transfer_terminal_control(&self, pgid: Pid) -> bool {
        match unistd::tcsetpgrp(io::stdin(), pgid) {
            Ok(()) => {
                debug!("terminal -> pgid {}", pgid);
                true
            }
            Err(e) => {
                debug!("tcsetpgrp({}) failed: {}", pgid, e);
                false
            }
        }
    }

    /// Reclaim the terminal for the shell and restore its modes.
    pub fn restore_shell_foreground(&self) {
        let _ = unistd::tcsetpgrp(io::stdin(), self.shell_pgid);
        if let Some(tmodes) = &self.shell_tmodes {
            let _ = termios::tcsetattr(io::stdin(), SetArg::TCSADRAIN, tmodes);
        }
    }

    /// Resolve a job spec to a job id.
    ///
    /// `%`, `%%`, `%+` name the current job; `%-` the previous; `%N` job N;
    /// `%str` the first job whose command starts with `str`; `%?str` the
    /// first whose command contains `str`. A bare integer is a pid lookup.
    pub fn parse_job_spec(&self, spec: &str) -> Option<u32> {
        if spec.is_empty() {
            return self.current_job;
        }

        let Some(body) = spec.strip_prefix('%') else {
            let pid: i32 = spec.parse().ok()?;
            return self.job_by_pid(Pid::from_raw(pid)).map(|j| j.job_id);
        };

        match body {
            "" | "+" | "%" => self.current_job,
            "-" => self.previous_job,
            _ => {
                if let Ok(job_id) = body.parse::<u32>() {
                    return self.jobs.contains_key(&job_id).then_some(job_id);
                }
                if let Some(needle) = body.strip_prefix('?') {
                    return self
                        .jobs
                        .values()
                        .find(|j| j.command.contains(needle))
                        .map(|j| j.job_id);
                }
                self.jobs
                    .values()
                    .find(|j| j.command.starts_with(body))
                    .map(|j| j.job_id)
            }
        }
    }

    /// Like `parse_job_spec`, but failures carry a proper error.
    pub fn resolve_job_spec(&self, spec: &str) -> Result<u32, JobError> {
        match self.parse_job_spec(spec) {
            Some(job_id) => Ok(job_id),
            None if spec.is_empty() || spec == "%" || spec == "%+" || spec == "%%" => {
                Err(JobError::NoCurrentJob)
            }
            None => Err(JobError::NoSuchJob(spec.to_string())),
        }
    }

    /// Wait for a job to complete or stop; returns the pipeline exit status
    /// (the last process in the pipeline).
    pub fn wait_for_job(&mut self, job_id: u32) -> i32 {
        self.wait_for_job_inner(job_id);
        self.jobs.get(&job_id).map(|j| j.exit_status()).unwrap_or(0)
    }

    /// Wait as above but return every process's exit status, indexed by
    /// pipeline position.
    pub fn wait_for_job_statuses(&mut self, job_id: u32) -> Vec<i32> {
        self.wait_for_job_inner(job_id);
        self.jobs
            .get(&job_id)
            .map(|j| j.processes.iter().map(|p| p.exit_status()).collect())
            .unwrap_or_default()
    }

    fn wait_for_job_inner(&mut self, job_id: u32) {
        loop {
            let Some(job) = self.jobs.get(&job_id) else { return };
            if !job.any_running() {
                break;
            }
            let pgid = job.pgid;

            // Wait for any child in the job's process group; WUNTRACED so
            // stops are observed too
            match waitpid(Pid::from_raw(-pgid.as_raw()), Some(WaitPidFlag::WUNTRACED)) {
                Ok(status) => {
                    if let Some(pid) = status.pid() {
                        self.update_process_status(pid, status);
                    }
                }
                // ECHILD: the SIGCHLD reaper got there first; statuses are
                // already in the process records
                Err(_) => break,
            }
        }

        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.update_state();
        }
    }

    /// Print one line per newly finished background job and drop it from the
    /// table. A job is removed only after it is DONE and notified.
    pub fn notify_completed_jobs(&mut self) {
        let done: Vec<u32> = self
            .jobs
            .values()
            .filter(|j| j.state == JobState::Done && !j.notified && !j.foreground)
            .map(|j| j.job_id)
            .collect();

        for job_id in done {
            if let Some(job) = self.jobs.get_mut(&job_id) {
                println!("[{}]+  {:<12} {}", job.job_id, "Done", job.command);
                job.notified = true;
            }
            self.remove_job(job_id);
        }
    }

    /// Print one line per newly stopped job.
    pub fn notify_stopped_jobs(&mut self) {
        let current = self.current_job;
        let previous = self.previous_job;
        for job in self.jobs.values_mut() {
            if job.state == JobState::Stopped && !job.notified {
                let marker = if Some(job.job_id) == current {
                    '+'
                } else if Some(job.job_id) == previous {
                    '-'
                } else {
                    ' '
                };
                println!("[{}]{}  {:<12} {}", job.job_id, marker, "Stopped", job.command);
                job.notified = true;
            }
        }
    }

    /// Formatted `jobs` output, ascending job id.
    pub fn list_jobs(&self) -> Vec<String> {
        self.jobs
            .values()
            .map(|job| {
                job.format_status(
                    Some(job.job_id) == self.current_job,
                    Some(job.job_id) == self.previous_job,
                )
            })
            .collect()
    }

    pub fn current_job_id(&self) -> Option<u32> {
        self.current_job
    }

    pub fn previous_job_id(&self) -> Option<u32> {
        self.previous_job
    }
}
