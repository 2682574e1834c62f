//! Pipeline execution
//!
//! Forks one child per pipeline member: the leader first, then each member
//! in order, each paused on its sync pipe until the parent has set its
//! process group. Waiting collects the whole group, and the pipeline's exit
//! status is the last member's.

use std::os::fd::{IntoRawFd, RawFd};

use log::debug;
use nix::unistd::{close, dup2, pipe};

use crate::exec;
use crate::exec::io::{IoError, IoManager};
use crate::exec::launcher::{IoSetup, LaunchConfig, ProcessLauncher, ProcessRole};
use crate::exec::parser::{display_of, Node};
use crate::jobs::JobState;
use crate::shell::Shell;

/// Run a multi-command pipeline as one foreground job.
pub fn run_pipeline(shell: &mut Shell, commands: &[Node], display: &str) -> i32 {
    let n = commands.len();
    let interactive = exec::terminal_control_allowed(shell);

    let mut pgid = None;
    let mut launched: Vec<(nix::unistd::Pid, String)> = Vec::with_capacity(n);
    let mut prev_read: Option<RawFd> = None;

    for (i, member) in commands.iter().enumerate() {
        // Data pipe to the next member
        let (data_read, data_write) = if i < n - 1 {
            match pipe() {
                Ok((r, w)) => (Some(r.into_raw_fd()), Some(w.into_raw_fd())),
                Err(e) => {
                    eprintln!("jsh: pipe: {}", e);
                    cleanup_fds(&[prev_read]);
                    return 1;
                }
            }
        } else {
            (None, None)
        };

        // Sync pipe: members block until their pgid is set
        let (sync_read, sync_write) = if i > 0 {
            match pipe() {
                Ok((r, w)) => (Some(r.into_raw_fd()), Some(w.into_raw_fd())),
                Err(e) => {
                    eprintln!("jsh: pipe: {}", e);
                    cleanup_fds(&[prev_read, data_read, data_write]);
                    return 1;
                }
            }
        } else {
            (None, None)
        };

        let config = LaunchConfig {
            role: Some(if i == 0 { ProcessRole::PipelineLeader } else { ProcessRole::PipelineMember }),
            pgid,
            foreground: true,
            sync_pipe_read: sync_read,
            sync_pipe_write: sync_write,
        };

        let io_setup = member_io_setup(shell, member, prev_read, data_write, data_read);
        let execute = member_execute(shell, member);

        let result = ProcessLauncher::new(shell).launch(execute, Some(io_setup), &config);
        let (pid, member_pgid) = match result {
            Ok(p) => p,
            Err(e) => {
                eprintln!("jsh: {}", e);
                cleanup_fds(&[prev_read, data_read, data_write, sync_read, sync_write]);
                return 1;
            }
        };
        if i == 0 {
            pgid = Some(member_pgid);
        }

        // The parent has set the child's pgid (in launch); closing the sync
        // write end releases the member to run
        cleanup_fds(&[sync_write, sync_read]);

        // Close the data fds this member consumed
        cleanup_fds(&[prev_read, data_write]);
        prev_read = data_read;

        launched.push((pid, display_of(member)));
    }
    cleanup_fds(&[prev_read]);

    let pgid = pgid.expect("pipeline with no members");
    let job_id = shell.job_manager.create_job(pgid, display);
    if let Some(job) = shell.job_manager.get_job_mut(job_id) {
        for (pid, command) in &launched {
            job.add_process(*pid, command.clone());
        }
    }
    debug!("pipeline [{}] pgid {} with {} members", job_id, pgid, n);

    let transferred = interactive && shell.job_manager.transfer_terminal_control(pgid);
    shell.job_manager.set_foreground_job(Some(job_id));
    let status = shell.job_manager.wait_for_job(job_id);
    if transferred {
        shell.job_manager.restore_shell_foreground();
    }
    shell.job_manager.set_foreground_job(None);

    if shell
        .job_manager
        .get_job(job_id)
        .map(|j| j.state == JobState::Done)
        .unwrap_or(false)
    {
        shell.job_manager.remove_job(job_id);
    }
    status
}

/// Child-side fd wiring: stdin from the previous pipe, stdout into the next,
/// the stray read end closed, then the member's own redirections.
fn member_io_setup(
    shell: &Shell,
    member: &Node,
    stdin_fd: Option<RawFd>,
    stdout_fd: Option<RawFd>,
    close_fd: Option<RawFd>,
) -> IoSetup<'static> {
    let redirects = match member {
        Node::Simple { redirects, .. }
        | Node::Subshell { redirects, .. }
        | Node::Brace { redirects, .. } => {
            exec::resolve_redirects(shell, redirects).unwrap_or_default()
        }
        _ => Vec::new(),
    };

    Box::new(move || -> Result<(), IoError> {
        if let Some(fd) = stdin_fd {
            dup2(fd, 0)?;
            let _ = close(fd);
        }
        if let Some(fd) = stdout_fd {
            dup2(fd, 1)?;
            let _ = close(fd);
        }
        if let Some(fd) = close_fd {
            let _ = close(fd);
        }
        IoManager::new().setup_child_redirections(&redirects)
    })
}

/// What the member actually runs: exec for simple commands (builtins run
/// in the child), the executor for group members.
fn member_execute(
    shell: &Shell,
    member: &Node,
) -> Box<dyn FnOnce(&mut Shell) -> i32> {
    match member {
        Node::Simple { words, assignments, .. } => {
            let argv: Vec<String> = words.iter().map(|w| exec::expand_word(shell, w)).collect();
            let env = exec::child_environment(shell, assignments);
            Box::new(move |sh: &mut Shell| {
                if argv.is_empty() {
                    return 0;
                }
                if let Some(builtin) = crate::builtins::lookup(&argv[0]) {
                    return builtin(sh, &argv[1..]);
                }
                exec::exec_external(&argv, &env)
            })
        }
        other => {
            let node = other.clone();
            Box::new(move |sh: &mut Shell| exec::execute_node(sh, &node).code())
        }
    }
}

fn cleanup_fds(fds: &[Option<RawFd>]) {
    for fd in fds.iter().flatten() {
        let _ = close(*fd);
    }
}
