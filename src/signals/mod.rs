//! Signal and terminal management
//!
//! Installs the interactive or script signal policy, reaps children, and
//! moves the terminal's foreground group. The OS-level handlers are thin
//! `signal-hook` flag trampolines; all real work (reaping, traps, prompts)
//! happens at safe points in the shell loop.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{self, Pid};
use signal_hook::consts;

use crate::jobs::{JobManager, JobState};

/// Signals reset to default in every forked child. Kept in one place so the
/// launcher and subshell paths cannot drift.
const CHILD_RESET_SIGNALS: &[Signal] = &[
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGCHLD,
    Signal::SIGPIPE,
];

/// Reset child signal dispositions to default. Called by the launcher after
/// SIGTTOU has been set to ignore.
pub fn reset_child_signals() {
    for &sig in CHILD_RESET_SIGNALS {
        unsafe {
            let _ = signal(sig, SigHandler::SigDfl);
        }
    }
}

/// Manages signal policy for the shell process.
pub struct SignalManager {
    interactive: bool,
    sigchld: Arc<AtomicBool>,
    sigint: Arc<AtomicBool>,
    sigterm: Arc<AtomicBool>,
    sighup: Arc<AtomicBool>,
    sigquit: Arc<AtomicBool>,
    installed: bool,
}

impl SignalManager {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            sigchld: Arc::new(AtomicBool::new(false)),
            sigint: Arc::new(AtomicBool::new(false)),
            sigterm: Arc::new(AtomicBool::new(false)),
            sighup: Arc::new(AtomicBool::new(false)),
            sigquit: Arc::new(AtomicBool::new(false)),
            installed: false,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Install the signal policy for the chosen mode.
    pub fn install(&mut self) -> io::Result<()> {
        if self.installed {
            return Ok(());
        }
        if self.interactive {
            self.install_interactive()?;
        } else {
            self.install_script();
        }
        self.installed = true;
        Ok(())
    }

    /// Script mode: default dispositions, except the terminal-stop signals
    /// which stay ignored so a backgrounded script does not freeze.
    fn install_script(&self) {
        unsafe {
            let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
            let _ = signal(Signal::SIGTSTP, SigHandler::SigDfl);
            let _ = signal(Signal::SIGCHLD, SigHandler::SigDfl);
            let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
            let _ = signal(Signal::SIGTTOU, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTTIN, SigHandler::SigIgn);
        }
    }

    /// Interactive mode: trap-checking flags for the user-facing signals, a
    /// reaping flag for SIGCHLD, ignore for the stop family.
    fn install_interactive(&self) -> io::Result<()> {
        signal_hook::flag::register(consts::SIGINT, Arc::clone(&self.sigint))?;
        signal_hook::flag::register(consts::SIGTERM, Arc::clone(&self.sigterm))?;
        signal_hook::flag::register(consts::SIGHUP, Arc::clone(&self.sighup))?;
        signal_hook::flag::register(consts::SIGQUIT, Arc::clone(&self.sigquit))?;
        signal_hook::flag::register(consts::SIGCHLD, Arc::clone(&self.sigchld))?;
        unsafe {
            let _ = signal(Signal::SIGTSTP, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTTOU, SigHandler::SigIgn);
            let _ = signal(Signal::SIGTTIN, SigHandler::SigIgn);
            let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
        }
        Ok(())
    }

    /// True once per delivered SIGINT. The kernel already delivered the
    /// signal to the foreground group; the shell only needs to break its
    /// read and set `$? = 130`.
    pub fn take_sigint(&self) -> bool {
        self.sigint.swap(false, Ordering::SeqCst)
    }

    pub fn take_sigterm(&self) -> bool {
        self.sigterm.swap(false, Ordering::SeqCst)
    }

    pub fn take_sighup(&self) -> bool {
        self.sighup.swap(false, Ordering::SeqCst)
    }

    pub fn take_sigquit(&self) -> bool {
        self.sigquit.swap(false, Ordering::SeqCst)
    }

    /// Reap children if SIGCHLD fired since the last safe point.
    pub fn poll_children(&self, jobs: &mut JobManager) {
        if self.sigchld.swap(false, Ordering::SeqCst) {
            reap_children(jobs);
        }
    }

    /// Ensure the shell is in its own process group and owns the terminal.
    pub fn ensure_foreground(&self) {
        let shell_pid = unistd::getpid();
        let shell_pgid = unistd::getpgrp();
        if shell_pgid != shell_pid {
            let _ = unistd::setpgid(Pid::from_raw(0), shell_pid);
        }
        let _ = unistd::tcsetpgrp(io::stdin(), shell_pid);
    }
}

/// The SIGCHLD reap loop: collect every pending status without blocking,
/// update the owning jobs, and reclaim the terminal when a foreground job
/// stopped. Mutates only job/process status fields.
pub fn reap_children(jobs: &mut JobManager) {
    loop {
        match waitpid(
            Pid::from_raw(-1),
            Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED),
        ) {
            Ok(status) => {
                let Some(pid) = status.pid() else { break };
                debug!("reaped {} -> {:?}", pid, status);
                jobs.update_process_status(pid, status);

                let stopped_foreground = jobs
                    .job_by_pid(pid)
                    .map(|j| j.state == JobState::Stopped && j.foreground)
                    .unwrap_or(false);
                if stopped_foreground {
                    if let Some(job) = jobs.job_by_pid(pid).map(|j| j.job_id) {
                        if let Some(job) = jobs.get_job_mut(job) {
                            job.notified = false;
                        }
                    }
                    // A stopped foreground job hands the terminal back
                    let _ = unistd::tcsetpgrp(io::stdin(), jobs.shell_pgid());
                }
            }
            Err(_) => break, // no more children
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use nix::unistd::{fork, setpgid, ForkResult};

    #[test]
    #[serial]
    fn test_reap_collects_exited_child() {
        let mut jobs = JobManager::new();
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                unsafe { libc::_exit(3) };
            }
            ForkResult::Parent { child } => {
                let _ = setpgid(child, child);
                let job_id = jobs.create_job(child, "exit 3");
                jobs.get_job_mut(job_id).unwrap().add_process(child, "exit 3");

                // Busy-wait until the reap loop observes the exit
                for _ in 0..200 {
                    reap_children(&mut jobs);
                    if jobs.get_job(job_id).unwrap().state == JobState::Done {
                        break;
                    }
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                let job = jobs.get_job(job_id).unwrap();
                assert_eq!(job.state, JobState::Done);
                assert_eq!(job.exit_status(), 3);
            }
        }
    }

    #[test]
    #[serial]
    fn test_sigchld_flag_polling() {
        let mut manager = SignalManager::new(false);
        manager.install().unwrap();
        let mut jobs = JobManager::new();
        // No flag set: poll is a no-op
        manager.poll_children(&mut jobs);
        manager.sigchld.store(true, Ordering::SeqCst);
        manager.poll_children(&mut jobs);
        assert!(!manager.sigchld.load(Ordering::SeqCst));
    }
}
