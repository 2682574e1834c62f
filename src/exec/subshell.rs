//! Subshell and brace group execution
//!
//! Subshell groups `( … )` fork an isolated inner shell; brace groups
//! `{ …; }` run in the current process under a scoped fd save/restore.
//! Background forms of both are registered as background jobs and never
//! waited on.

use log::debug;

use crate::exec::io::{IoManager, Redirect};
use crate::exec::launcher::{IoSetup, LaunchConfig, ProcessLauncher};
use crate::exec::parser::Node;
use crate::exec::{self, ControlFlow};
use crate::jobs::JobState;
use crate::shell::Shell;
use crate::state::FORKED_CHILD_ENV;

/// Run `( body )` in a forked child with an inner shell that inherits
/// variables and functions by value. The parent transfers terminal control
/// for the duration when it owns the terminal.
pub fn execute_subshell(
    shell: &mut Shell,
    body: &[Node],
    redirects: Vec<Redirect>,
    display: &str,
) -> i32 {
    let interactive = exec::terminal_control_allowed(shell);
    let body = body.to_vec();

    let io_setup: IoSetup<'_> =
        Box::new(move || IoManager::new().setup_child_redirections(&redirects));
    let launched = ProcessLauncher::new(shell).launch(
        move |parent| {
            // The env marker tells the inner shell it is a forked child so it
            // skips signal/job-control installation
            std::env::set_var(FORKED_CHILD_ENV, "1");
            let mut inner = Shell::for_subshell(parent);
            std::env::remove_var(FORKED_CHILD_ENV);
            exec::execute_program(&mut inner, &body).code()
        },
        Some(io_setup),
        &LaunchConfig::single(true),
    );
    let (pid, pgid) = match launched {
        Ok(p) => p,
        Err(e) => {
            eprintln!("jsh: {}", e);
            return 1;
        }
    };

    let job_id = shell.job_manager.create_job(pgid, display);
    if let Some(job) = shell.job_manager.get_job_mut(job_id) {
        job.add_process(pid, "subshell");
    }

    let transferred = interactive && shell.job_manager.transfer_terminal_control(pgid);
    debug!("subshell [{}] pgid {} transferred={}", job_id, pgid, transferred);

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

/// Run `{ body; }` in the current process. Redirections are applied with a
/// scoped save and restored on every exit path, control flow included.
pub fn execute_brace_group(
    shell: &mut Shell,
    body: &[Node],
    redirects: &[Redirect],
) -> ControlFlow {
    let saved = match shell.io_manager.apply_redirections(redirects) {
        Ok(saved) => saved,
        Err(e) => {
            eprintln!("jsh: {}", e);
            return ControlFlow::Code(1);
        }
    };
    let flow = exec::execute_program(shell, body);
    shell.io_manager.restore_redirections(saved);
    flow
}

/// Run any node in the background: fork one child, register the job, do not
/// wait. A simple external command execs directly so the job's pid is the
/// command itself; anything else executes with current-shell semantics in
/// the child.
pub fn execute_background(shell: &mut Shell, inner: &Node, display: &str) -> i32 {
    let launched = match direct_exec_parts(shell, inner) {
        Some((argv, env, redirects)) => {
            let io_setup: IoSetup<'_> =
                Box::new(move || IoManager::new().setup_child_redirections(&redirects));
            ProcessLauncher::new(shell).launch(
                move |_| exec::exec_external(&argv, &env),
                Some(io_setup),
                &LaunchConfig::single(false),
            )
        }
        None => {
            let node = inner.clone();
            ProcessLauncher::new(shell).launch(
                move |sh| exec::execute_node(sh, &node).code(),
                None,
                &LaunchConfig::single(false),
            )
        }
    };
    let (pid, pgid) = match launched {
        Ok(p) => p,
        Err(e) => {
            eprintln!("jsh: {}", e);
            return 1;
        }
    };

    let job_id = shell.job_manager.create_job(pgid, display);
    if let Some(job) = shell.job_manager.get_job_mut(job_id) {
        job.add_process(pid, display);
    }
    shell.job_manager.register_background_job(job_id, pid);

    if !shell.state.is_script_mode {
        eprintln!("[{}] {}", job_id, pid);
    }
    0
}

/// A background simple external command can be exec'd without the extra
/// shell layer.
#[allow(clippy::type_complexity)]
fn direct_exec_parts(
    shell: &Shell,
    node: &Node,
) -> Option<(Vec<String>, Vec<std::ffi::CString>, Vec<Redirect>)> {
    let Node::Simple { assignments, words, redirects } = node else {
        return None;
    };
    if words.is_empty() {
        return None;
    }
    let argv: Vec<String> = words.iter().map(|w| exec::expand_word(shell, w)).collect();
    if crate::builtins::lookup(&argv[0]).is_some() {
        return None;
    }
    let env = exec::child_environment(shell, assignments);
    let resolved = exec::resolve_redirects(shell, redirects).ok()?;
    Some((argv, env, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use crate::exec::execute_tokens;
    use crate::lexer::tokenize;

    fn run(shell: &mut Shell, input: &str) -> i32 {
        execute_tokens(shell, tokenize(input).unwrap())
    }

    fn temp_path(name: &str) -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("jsh-subshell-test-{}-{}", std::process::id(), name));
        p.to_string_lossy().into_owned()
    }

    #[test]
    #[serial]
    fn test_subshell_directory_isolation() {
        // cd in a subshell must not move the parent
        let mut shell = Shell::new(false);
        let before = std::env::current_dir().unwrap();
        assert_eq!(run(&mut shell, "(cd /)"), 0);
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    #[serial]
    fn test_subshell_redirect_output() {
        let path = temp_path("out");
        let mut shell = Shell::new(false);
        let code = run(&mut shell, &format!("(echo one; echo two) > {}", path));
        assert_eq!(code, 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "one\ntwo\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[serial]
    fn test_brace_group_redirect_restores_fds() {
        let path = temp_path("brace");
        let mut shell = Shell::new(false);
        let code = run(&mut shell, &format!("{{ echo inside; }} > {}", path));
        assert_eq!(code, 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "inside\n");
        // stdout must be back: a second write goes to the test harness, not
        // the file
        let code = run(&mut shell, "true");
        assert_eq!(code, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "inside\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[serial]
    fn test_background_job_registered() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "sleep 5 &"), 0);
        assert_eq!(shell.job_manager.count_active(), 1);
        let job = shell.job_manager.jobs().next().unwrap();
        assert!(!job.foreground);
        assert!(job.command.contains("sleep 5"));
        // clean up
        let _ = nix::sys::signal::killpg(job.pgid, nix::sys::signal::Signal::SIGKILL);
    }

    #[test]
    #[serial]
    fn test_break_crosses_brace_group() {
        let mut shell = Shell::new(false);
        // break inside a brace group must break the enclosing loop
        assert_eq!(run(&mut shell, "for i in 1 2 3; do { break; }; done"), 0);
        assert_eq!(shell.state.get_var("i"), Some("1"));
    }
}
