//! kill builtin
//!
//! `kill [-l [status]] | [-s SIG | -SIG | -n N] target…` — targets are pids
//! (zero for the current group, negative for a process group) or job specs.
//! Signal names are case-insensitive, with or without the SIG prefix.

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

use crate::shell::Shell;

/// Parse a signal spec: a number 0..64 or a name like `TERM` / `sigterm`.
/// `None` in the inner option means signal 0 (existence check).
pub fn parse_signal_spec(spec: &str) -> Option<Option<Signal>> {
    if let Ok(num) = spec.parse::<i32>() {
        if num == 0 {
            return Some(None);
        }
        if (0..=64).contains(&num) {
            return Signal::try_from(num).ok().map(Some);
        }
        return None;
    }

    let upper = spec.to_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    name.parse::<Signal>().ok().map(Some)
}

/// Signal name without the SIG prefix, as `kill -l` prints it.
fn short_name(signal: Signal) -> &'static str {
    signal.as_str().strip_prefix("SIG").unwrap_or(signal.as_str())
}

pub fn kill_builtin(shell: &mut Shell, args: &[String]) -> i32 {
    if args.is_empty() {
        eprintln!("jsh: kill: usage: kill [-s sigspec | -n signum | -sigspec] pid | jobspec ...");
        return 2;
    }

    let mut signal: Option<Signal> = Some(Signal::SIGTERM);
    let mut targets: Vec<&String> = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "-l" => return list_signals(args.get(i + 1)),
            "-s" | "-n" => {
                let Some(spec) = args.get(i + 1) else {
                    eprintln!("jsh: kill: {}: option requires an argument", arg);
                    return 2;
                };
                let Some(parsed) = parse_signal_spec(spec) else {
                    eprintln!("jsh: kill: {}: invalid signal specification", spec);
                    return 1;
                };
                signal = parsed;
                i += 2;
                continue;
            }
            "--" => {
                targets.extend(&args[i + 1..]);
                break;
            }
            _ => {
                // -SIG / -N forms, but negative pids are targets
                if let Some(body) = arg.strip_prefix('-') {
                    if targets.is_empty() && body.parse::<i32>().is_err() {
                        let Some(parsed) = parse_signal_spec(body) else {
                            eprintln!("jsh: kill: {}: invalid signal specification", body);
                            return 1;
                        };
                        signal = parsed;
                        i += 1;
                        continue;
                    }
                    if targets.is_empty() && body.parse::<i32>().is_ok() && !arg.starts_with("--") {
                        // Ambiguous -N: bash treats a leading -N as a signal
                        // number when it parses as one
                        if let Some(parsed) = parse_signal_spec(body) {
                            signal = parsed;
                            i += 1;
                            continue;
                        }
                    }
                }
                targets.push(arg);
                i += 1;
            }
        }
    }

    if targets.is_empty() {
        eprintln!("jsh: kill: usage: kill [-s sigspec | -n signum | -sigspec] pid | jobspec ...");
        return 2;
    }

    let mut delivered = false;
    for target in targets {
        if send_to_target(shell, target, signal) {
            delivered = true;
        }
    }
    i32::from(!delivered)
}

fn list_signals(status: Option<&String>) -> i32 {
    match status {
        Some(arg) => {
            // `kill -l status` converts a number or exit status to a name
            let Ok(mut num) = arg.parse::<i32>() else {
                eprintln!("jsh: kill: {}: invalid signal specification", arg);
                return 1;
            };
            if num > 128 {
                num -= 128;
            }
            match Signal::try_from(num) {
                Ok(signal) => {
                    println!("{}", short_name(signal));
                    0
                }
                Err(_) => {
                    eprintln!("jsh: kill: {}: invalid signal specification", arg);
                    1
                }
            }
        }
        None => {
            let names: Vec<String> = Signal::iterator()
                .map(|s| format!("{}) {}", s as i32, short_name(s)))
                .collect();
            for chunk in names.chunks(5) {
                println!("{}", chunk.join("\t"));
            }
            0
        }
    }
}

fn send_to_target(shell: &mut Shell, target: &str, signal: Option<Signal>) -> bool {
    // Job specs resolve to the job's process group
    if target.starts_with('%') {
        let job_id = match shell.job_manager.resolve_job_spec(target) {
            Ok(job_id) => job_id,
            Err(e) => {
                eprintln!("jsh: kill: {}", e);
                return false;
            }
        };
        let pgid = shell.job_manager.get_job(job_id).expect("resolved job").pgid;
        return match signal {
            Some(sig) => match killpg(pgid, sig) {
                Ok(()) => true,
                Err(e) => {
                    eprintln!("jsh: kill: ({}) - {}", pgid, e);
                    false
                }
            },
            None => killpg(pgid, None::<Signal>).is_ok(),
        };
    }

    let Ok(pid) = target.parse::<i32>() else {
        eprintln!("jsh: kill: {}: arguments must be process or job IDs", target);
        return false;
    };
    match kill(Pid::from_raw(pid), signal) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("jsh: kill: ({}) - {}", pid, e);
            false
        }
    }
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
    fn test_parse_signal_spec_forms() {
        assert_eq!(parse_signal_spec("TERM"), Some(Some(Signal::SIGTERM)));
        assert_eq!(parse_signal_spec("sigterm"), Some(Some(Signal::SIGTERM)));
        assert_eq!(parse_signal_spec("SIGTERM"), Some(Some(Signal::SIGTERM)));
        assert_eq!(parse_signal_spec("15"), Some(Some(Signal::SIGTERM)));
        assert_eq!(parse_signal_spec("9"), Some(Some(Signal::SIGKILL)));
        assert_eq!(parse_signal_spec("0"), Some(None));
        assert_eq!(parse_signal_spec("notasignal"), None);
        assert_eq!(parse_signal_spec("99"), None);
    }

    #[test]
    #[serial]
    fn test_kill_background_job_by_spec() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "sleep 30 &"), 0);
        let code = kill_builtin(&mut shell, &["%1".to_string()]);
        assert_eq!(code, 0);
        // after the wait the job is gone and the status is signal-coded
        let status = crate::builtins::jobs::wait_builtin(&mut shell, &[]);
        assert_eq!(status, 128 + 15);
        assert_eq!(shell.job_manager.count_active(), 0);
    }

    #[test]
    #[serial]
    fn test_kill_with_named_signal() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "sleep 30 &"), 0);
        let code = kill_builtin(&mut shell, &["-s".to_string(), "KILL".to_string(), "%1".to_string()]);
        assert_eq!(code, 0);
        let status = crate::builtins::jobs::wait_builtin(&mut shell, &[]);
        assert_eq!(status, 128 + 9);
    }

    #[test]
    fn test_kill_unknown_job() {
        let mut shell = Shell::new(false);
        assert_eq!(kill_builtin(&mut shell, &["%7".to_string()]), 1);
    }

    #[test]
    fn test_kill_usage_error() {
        let mut shell = Shell::new(false);
        assert_eq!(kill_builtin(&mut shell, &[]), 2);
    }

    #[test]
    #[serial]
    fn test_signal_zero_existence_check() {
        let mut shell = Shell::new(false);
        let me = std::process::id().to_string();
        let code = kill_builtin(&mut shell, &["-s".to_string(), "0".to_string(), me]);
        assert_eq!(code, 0);
    }
}
