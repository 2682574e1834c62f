//! Shell state
//!
//! The mutable state every subsystem borrows: variables, positional
//! parameters, options, the last exit code, and the forked-child marker that
//! tells builtins to use raw descriptors.

use std::collections::HashMap;
use std::env;

/// Environment variable used to hand the forked-child marker to subshell
/// inner shells so they skip signal/job-control installation.
pub const FORKED_CHILD_ENV: &str = "JSH_IN_FORKED_CHILD";

/// Shell options (`set -e` and friends).
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// set -e: exit on first failing command
    pub errexit: bool,
    /// set -b: report background job completion immediately
    pub notify: bool,
    /// set -o posix
    pub posix: bool,
}

/// The shell's mutable state hub.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub variables: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub positional_params: Vec<String>,
    pub last_exit_code: i32,
    pub options: ShellOptions,
    /// User trap table: signal name -> action
    pub traps: HashMap<String, String>,
    /// Set in forked children so builtins write through raw descriptors and
    /// inner shells skip handler installation
    pub in_forked_child: bool,
    pub is_script_mode: bool,
}

impl ShellState {
    pub fn new(is_script_mode: bool) -> Self {
        let env_vars: HashMap<String, String> = env::vars().collect();
        let in_forked_child = env_vars.contains_key(FORKED_CHILD_ENV);
        Self {
            variables: HashMap::new(),
            env: env_vars,
            positional_params: Vec::new(),
            last_exit_code: 0,
            options: ShellOptions::default(),
            traps: HashMap::new(),
            in_forked_child,
            is_script_mode,
        }
    }

    /// Variable lookup: shell variables shadow the environment.
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.variables
            .get(name)
            .or_else(|| self.env.get(name))
            .map(|s| s.as_str())
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn home_dir(&self) -> Option<&str> {
        self.get_var("HOME")
    }

    /// By-value snapshot for a subshell: variables and environment are
    /// inherited, the child marker is set.
    pub fn snapshot_for_subshell(&self) -> Self {
        let mut snapshot = self.clone();
        snapshot.in_forked_child = true;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_variables_shadow_env() {
        let mut state = ShellState::new(true);
        state.env.insert("X".to_string(), "env".to_string());
        assert_eq!(state.get_var("X"), Some("env"));
        state.set_var("X", "shell");
        assert_eq!(state.get_var("X"), Some("shell"));
    }

    #[test]
    fn test_subshell_snapshot_marks_child() {
        let mut state = ShellState::new(false);
        state.set_var("A", "1");
        let snap = state.snapshot_for_subshell();
        assert!(snap.in_forked_child);
        assert_eq!(snap.get_var("A"), Some("1"));
        assert!(!state.in_forked_child);
    }
}
