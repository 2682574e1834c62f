//! Job-control builtins: jobs, fg, bg, wait

use nix::sys::signal::{killpg, Signal};

use crate::jobs::JobState;
use crate::shell::Shell;

/// `jobs [-l|-p]` — list the job table.
pub fn jobs_builtin(shell: &mut Shell, args: &[String]) -> i32 {
    shell.signal_manager.poll_children(&mut shell.job_manager);

    let long = args.iter().any(|a| a == "-l");
    let pgids_only = args.iter().any(|a| a == "-p");

    if pgids_only {
        for job in shell.job_manager.jobs() {
            println!("{}", job.pgid);
        }
        return 0;
    }

    let current = shell.job_manager.current_job_id();
    let previous = shell.job_manager.previous_job_id();
    for job in shell.job_manager.jobs() {
        if long {
            let marker = if Some(job.job_id) == current {
                '+'
            } else if Some(job.job_id) == previous {
                '-'
            } else {
                ' '
            };
            println!(
                "[{}]{} {:>6}  {:<12} {}",
                job.job_id, marker, job.pgid, job.state.to_string(), job.command
            );
        } else {
            println!(
                "{}",
                job.format_status(Some(job.job_id) == current, Some(job.job_id) == previous)
            );
        }
    }
    0
}

/// `fg [%spec]` — continue a job in the foreground and wait for it.
pub fn fg_builtin(shell: &mut Shell, args: &[String]) -> i32 {
    let spec = args.first().map(|s| s.as_str()).unwrap_or("");
    let job_id = match shell.job_manager.resolve_job_spec(spec) {
        Ok(job_id) => job_id,
        Err(e) => {
            eprintln!("jsh: fg: {}", e);
            return 1;
        }
    };

    let (pgid, command) = {
        let job = shell.job_manager.get_job_mut(job_id).expect("resolved job");
        job.foreground = true;
        for process in &mut job.processes {
            process.stopped = false;
        }
        job.update_state();
        (job.pgid, job.command.clone())
    };
    println!("{}", command);

    let transferred = crate::exec::terminal_control_allowed(shell)
        && shell.job_manager.transfer_terminal_control(pgid);

    if let Err(e) = killpg(pgid, Signal::SIGCONT) {
        eprintln!("jsh: fg: {}", e);
    }

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

/// `bg [%spec]` — continue a stopped job in the background.
pub fn bg_builtin(shell: &mut Shell, args: &[String]) -> i32 {
    let spec = args.first().map(|s| s.as_str()).unwrap_or("");
    let job_id = match shell.job_manager.resolve_job_spec(spec) {
        Ok(job_id) => job_id,
        Err(e) => {
            eprintln!("jsh: bg: {}", e);
            return 1;
        }
    };

    let (pgid, line) = {
        let job = shell.job_manager.get_job_mut(job_id).expect("resolved job");
        job.foreground = false;
        job.notified = true;
        for process in &mut job.processes {
            process.stopped = false;
        }
        job.update_state();
        (job.pgid, format!("[{}]+ {} &", job.job_id, job.command))
    };

    if let Err(e) = killpg(pgid, Signal::SIGCONT) {
        eprintln!("jsh: bg: {}", e);
        return 1;
    }
    println!("{}", line);
    0
}

/// `wait [pid | %spec …]` — wait for specific jobs, or all of them.
pub fn wait_builtin(shell: &mut Shell, args: &[String]) -> i32 {
    if args.is_empty() {
        let ids: Vec<u32> = shell.job_manager.jobs().map(|j| j.job_id).collect();
        let mut status = 0;
        for job_id in ids {
            status = shell.job_manager.wait_for_job(job_id);
            if shell
                .job_manager
                .get_job(job_id)
                .map(|j| j.state == JobState::Done)
                .unwrap_or(false)
            {
                shell.job_manager.remove_job(job_id);
            }
        }
        return status;
    }

    let mut status = 0;
    for spec in args {
        let job_id = match shell.job_manager.resolve_job_spec(spec) {
            Ok(job_id) => job_id,
            Err(e) => {
                eprintln!("jsh: wait: {}", e);
                status = 127;
                continue;
            }
        };
        status = shell.job_manager.wait_for_job(job_id);
        if shell
            .job_manager
            .get_job(job_id)
            .map(|j| j.state == JobState::Done)
            .unwrap_or(false)
        {
            shell.job_manager.remove_job(job_id);
        }
    }
    status
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

    #[test]
    #[serial]
    fn test_background_then_wait() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "/bin/true &"), 0);
        assert_eq!(shell.job_manager.count_active(), 1);
        let code = wait_builtin(&mut shell, &[]);
        assert_eq!(code, 0);
        assert_eq!(shell.job_manager.count_active(), 0);
    }

    #[test]
    #[serial]
    fn test_wait_reports_job_status() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "/bin/false &"), 0);
        let code = wait_builtin(&mut shell, &["%1".to_string()]);
        assert_eq!(code, 1);
    }

    #[test]
    fn test_wait_unknown_spec() {
        let mut shell = Shell::new(false);
        assert_eq!(wait_builtin(&mut shell, &["%42".to_string()]), 127);
    }

    #[test]
    fn test_fg_unknown_spec() {
        let mut shell = Shell::new(false);
        assert_eq!(fg_builtin(&mut shell, &["%42".to_string()]), 1);
    }

    #[test]
    #[serial]
    fn test_jobs_lists_background_job() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "sleep 5 &"), 0);
        // listing does not consume or alter the job
        assert_eq!(jobs_builtin(&mut shell, &[]), 0);
        assert_eq!(shell.job_manager.count_active(), 1);
        let line = shell.job_manager.list_jobs().remove(0);
        assert!(line.starts_with("[1]+"));
        assert!(line.contains("Running"));
        assert!(line.contains("sleep 5"));
        if let Some(job) = shell.job_manager.get_job(1) {
            let _ = killpg(job.pgid, Signal::SIGKILL);
        }
    }
}
