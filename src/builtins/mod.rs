//! Builtin commands
//!
//! The job-control builtins plus the handful of basics a shell cannot live
//! without. A builtin is a plain function `fn(&mut Shell, &[String]) -> i32`
//! running in the shell process, with redirections already applied by the
//! executor.

mod jobs;
mod kill;

use nix::unistd::chdir;

use crate::shell::Shell;

pub type Builtin = fn(&mut Shell, &[String]) -> i32;

/// Resolve a builtin by name.
pub fn lookup(name: &str) -> Option<Builtin> {
    match name {
        "jobs" => Some(jobs::jobs_builtin),
        "fg" => Some(jobs::fg_builtin),
        "bg" => Some(jobs::bg_builtin),
        "wait" => Some(jobs::wait_builtin),
        "kill" => Some(kill::kill_builtin),
        "cd" => Some(cd_builtin),
        "exit" => Some(exit_builtin),
        "echo" => Some(echo_builtin),
        "true" | ":" => Some(true_builtin),
        "false" => Some(false_builtin),
        _ => None,
    }
}

fn cd_builtin(shell: &mut Shell, args: &[String]) -> i32 {
    let target = match args.first() {
        Some(dir) => dir.clone(),
        None => match shell.state.home_dir() {
            Some(home) => home.to_string(),
            None => {
                eprintln!("jsh: cd: HOME not set");
                return 1;
            }
        },
    };

    match chdir(target.as_str()) {
        Ok(()) => {
            if let Ok(pwd) = std::env::current_dir() {
                shell.state.set_var("PWD", pwd.to_string_lossy().into_owned());
            }
            0
        }
        Err(e) => {
            eprintln!("jsh: cd: {}: {}", target, e);
            1
        }
    }
}

fn exit_builtin(shell: &mut Shell, args: &[String]) -> i32 {
    let code = args
        .first()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(shell.state.last_exit_code);
    std::process::exit(code & 0xff);
}

fn echo_builtin(_shell: &mut Shell, args: &[String]) -> i32 {
    let (newline, args) = match args.first().map(|s| s.as_str()) {
        Some("-n") => (false, &args[1..]),
        _ => (true, args),
    };
    let line = args.join(" ");
    if newline {
        println!("{}", line);
    } else {
        print!("{}", line);
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }
    0
}

fn true_builtin(_shell: &mut Shell, _args: &[String]) -> i32 {
    0
}

fn false_builtin(_shell: &mut Shell, _args: &[String]) -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_lookup_known_builtins() {
        for name in ["jobs", "fg", "bg", "wait", "kill", "cd", "exit", "echo", "true", "false", ":"] {
            assert!(lookup(name).is_some(), "missing builtin {name}");
        }
        assert!(lookup("definitely-not").is_none());
    }

    #[test]
    fn test_true_false() {
        let mut shell = Shell::new(false);
        assert_eq!(true_builtin(&mut shell, &[]), 0);
        assert_eq!(false_builtin(&mut shell, &[]), 1);
    }

    #[test]
    #[serial]
    fn test_cd_sets_pwd() {
        let mut shell = Shell::new(false);
        let original = std::env::current_dir().unwrap();
        assert_eq!(cd_builtin(&mut shell, &["/".to_string()]), 0);
        assert_eq!(shell.state.get_var("PWD"), Some("/"));
        let _ = std::env::set_current_dir(original);
    }

    #[test]
    fn test_cd_missing_dir_fails() {
        let mut shell = Shell::new(false);
        assert_eq!(cd_builtin(&mut shell, &["/no/such/dir".to_string()]), 1);
    }
}
