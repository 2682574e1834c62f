//! Process launcher
//!
//! The single entry point for forking children with correct job-control
//! setup. A pipe-based handshake guarantees a pipeline member never runs its
//! command before the parent has put it in the pipeline's process group:
//! the member blocks reading the sync pipe, and the parent closes the write
//! end only after `setpgid`.

use std::io::Write;
use std::os::fd::RawFd;

use log::debug;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{self, fork, ForkResult, Pid};
use thiserror::Error;

use crate::exec::io::IoError;
use crate::shell::Shell;
use crate::signals;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("fork failed: {0}")]
    Fork(nix::errno::Errno),
    #[error("pipe failed: {0}")]
    Pipe(nix::errno::Errno),
    #[error("setpgid failed: {0}")]
    SetPgid(nix::errno::Errno),
}

/// Role of a process in the job-control structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// Standalone command: creates its own process group
    Single,
    /// First command of a pipeline: becomes the group leader
    PipelineLeader,
    /// Any later pipeline command: joins the leader's group
    PipelineMember,
}

/// Configuration for one launch.
#[derive(Debug, Default)]
pub struct LaunchConfig {
    pub role: Option<ProcessRole>,
    /// Target process group; None for SINGLE/LEADER (child creates its own)
    pub pgid: Option<Pid>,
    pub foreground: bool,
    /// Synchronization pipe ends, used by pipeline members
    pub sync_pipe_read: Option<RawFd>,
    pub sync_pipe_write: Option<RawFd>,
}

impl LaunchConfig {
    pub fn single(foreground: bool) -> Self {
        Self {
            role: Some(ProcessRole::Single),
            foreground,
            ..Self::default()
        }
    }

    pub fn role(&self) -> ProcessRole {
        self.role.unwrap_or(ProcessRole::Single)
    }
}

/// Callback run in the child between signal reset and the command itself,
/// typically wiring dup2 redirections.
pub type IoSetup<'a> = Box<dyn FnOnce() -> Result<(), IoError> + 'a>;

/// Launches processes with job-control setup. Borrows the shell hub; never
/// owns it.
pub struct ProcessLauncher<'a> {
    shell: &'a mut Shell,
}

impl<'a> ProcessLauncher<'a> {
    pub fn new(shell: &'a mut Shell) -> Self {
        Self { shell }
    }

    /// Fork and run `execute` in the child. Returns `(pid, pgid)`.
    ///
    /// The child never returns: it exits with the closure's code, 130 on
    /// SIGINT-style interruption of the closure, or 1 on setup failure.
    pub fn launch(
        &mut self,
        execute: impl FnOnce(&mut Shell) -> i32,
        io_setup: Option<IoSetup<'_>>,
        config: &LaunchConfig,
    ) -> Result<(Pid, Pid), LaunchError> {
        // Flush buffered output so the child does not inherit and replay it
        // into redirected descriptors
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        match unsafe { fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => {
                self.child_setup_and_exec(execute, io_setup, config);
                // child never reaches here
                unreachable!()
            }
            ForkResult::Parent { child } => {
                let pgid = self.parent_setup(child, config);
                Ok((child, pgid))
            }
        }
    }

    fn child_setup_and_exec(
        &mut self,
        execute: impl FnOnce(&mut Shell) -> i32,
        io_setup: Option<IoSetup<'_>>,
        config: &LaunchConfig,
    ) -> ! {
        self.shell.state.in_forked_child = true;

        match config.role() {
            ProcessRole::Single | ProcessRole::PipelineLeader => {
                let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));
                // Leaders do not wait on the sync pipe
                if let Some(fd) = config.sync_pipe_read {
                    let _ = unistd::close(fd);
                }
                if let Some(fd) = config.sync_pipe_write {
                    let _ = unistd::close(fd);
                }
            }
            ProcessRole::PipelineMember => {
                if let Some(fd) = config.sync_pipe_write {
                    let _ = unistd::close(fd);
                }
                if let Some(fd) = config.sync_pipe_read {
                    // Blocks until the parent closes its write end, which it
                    // does only after setpgid on this child
                    let mut byte = [0u8; 1];
                    let _ = unistd::read(fd, &mut byte);
                    let _ = unistd::close(fd);
                }
            }
        }

        // SIGTTOU must be ignored while the group/terminal dance settles
        unsafe {
            let _ = signal(Signal::SIGTTOU, SigHandler::SigIgn);
        }
        signals::reset_child_signals();

        if let Some(setup) = io_setup {
            if let Err(e) = setup() {
                eprintln!("jsh: {}", e);
                let _ = std::io::stderr().flush();
                unsafe { libc::_exit(1) };
            }
        }

        let code = execute(self.shell);

        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        unsafe { libc::_exit(code) };
    }

    /// Set the child's process group from the parent side, immediately after
    /// fork. EACCES/ESRCH are ignored: the child may have already done it.
    fn parent_setup(&mut self, pid: Pid, config: &LaunchConfig) -> Pid {
        match config.role() {
            ProcessRole::Single | ProcessRole::PipelineLeader => {
                if let Err(e) = unistd::setpgid(pid, pid) {
                    debug!("parent setpgid({pid}, {pid}): {e}");
                }
                pid
            }
            ProcessRole::PipelineMember => {
                let pgid = config.pgid.unwrap_or(pid);
                if let Err(e) = unistd::setpgid(pid, pgid) {
                    debug!("parent setpgid({pid}, {pgid}): {e}");
                }
                pgid
            }
        }
    }
}
