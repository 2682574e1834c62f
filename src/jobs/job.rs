//! Jobs and processes
//!
//! A job is one pipeline (or subshell) tracked as a single unit for job
//! control. Each job owns the processes forked for it; process status flows
//! in from `waitpid` and the job state is recomputed from the process set.

use std::fmt;

use nix::sys::signal::Signal;
use nix::sys::termios::Termios;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "Running"),
            JobState::Stopped => write!(f, "Stopped"),
            JobState::Done => write!(f, "Done"),
        }
    }
}

/// One process inside a job.
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub command: String,
    /// Most recent status reported by waitpid
    pub status: Option<WaitStatus>,
    pub stopped: bool,
    pub completed: bool,
}

impl Process {
    pub fn new(pid: Pid, command: impl Into<String>) -> Self {
        Self {
            pid,
            command: command.into(),
            status: None,
            stopped: false,
            completed: false,
        }
    }

    /// Update from a waitpid result. `stopped` and `completed` are mutually
    /// exclusive.
    pub fn update_status(&mut self, status: WaitStatus) {
        self.status = Some(status);
        match status {
            WaitStatus::Stopped(..) => {
                self.stopped = true;
                self.completed = false;
            }
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
                self.stopped = false;
                self.completed = true;
            }
            _ => {
                self.stopped = false;
                self.completed = false;
            }
        }
    }

    /// Shell exit status for this process: exit code, or 128 + signal.
    pub fn exit_status(&self) -> i32 {
        match self.status {
            Some(WaitStatus::Exited(_, code)) => code,
            Some(WaitStatus::Signaled(_, signal, _)) => 128 + signal_number(signal),
            Some(WaitStatus::Stopped(_, signal)) => 128 + signal_number(signal),
            _ => 0,
        }
    }
}

pub(crate) fn signal_number(signal: Signal) -> i32 {
    signal as i32
}

/// A pipeline or subshell tracked as one job-control unit.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: u32,
    pub pgid: Pid,
    /// Display string for jobs output
    pub command: String,
    pub processes: Vec<Process>,
    pub state: JobState,
    pub foreground: bool,
    /// Whether the latest state transition has been reported to the user
    pub notified: bool,
    /// Terminal modes captured when the job was suspended
    pub saved_tmodes: Option<Termios>,
}

impl Job {
    pub fn new(job_id: u32, pgid: Pid, command: impl Into<String>) -> Self {
        Self {
            job_id,
            pgid,
            command: command.into(),
            processes: Vec::new(),
            state: JobState::Running,
            foreground: true,
            notified: false,
            saved_tmodes: None,
        }
    }

    pub fn add_process(&mut self, pid: Pid, command: impl Into<String>) {
        self.processes.push(Process::new(pid, command));
    }

    pub fn update_process_status(&mut self, pid: Pid, status: WaitStatus) {
        if let Some(proc) = self.processes.iter_mut().find(|p| p.pid == pid) {
            proc.update_status(status);
        }
    }

    pub fn all_stopped(&self) -> bool {
        !self.processes.is_empty() && self.processes.iter().all(|p| p.stopped)
    }

    pub fn all_completed(&self) -> bool {
        !self.processes.is_empty() && self.processes.iter().all(|p| p.completed)
    }

    pub fn any_running(&self) -> bool {
        self.processes.iter().any(|p| !p.stopped && !p.completed)
    }

    /// Recompute state: DONE if every process completed, STOPPED if every
    /// process stopped, RUNNING otherwise.
    pub fn update_state(&mut self) {
        if self.all_completed() {
            self.state = JobState::Done;
        } else if self.all_stopped() {
            self.state = JobState::Stopped;
        } else {
            self.state = JobState::Running;
        }
    }

    /// `jobs` output line: `[id]<marker>  <state>  <command>`.
    pub fn format_status(&self, is_current: bool, is_previous: bool) -> String {
        let marker = if is_current {
            '+'
        } else if is_previous {
            '-'
        } else {
            ' '
        };
        format!("[{}]{}  {:<12} {}", self.job_id, marker, self.state.to_string(), self.command)
    }

    /// Exit status of the job: the last process in the pipeline.
    pub fn exit_status(&self) -> i32 {
        self.processes.last().map(|p| p.exit_status()).unwrap_or(0)
    }
}
