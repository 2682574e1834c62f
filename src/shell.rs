//! The shell hub
//!
//! One owned object holding the state, job table, I/O manager and signal
//! manager. Every other component borrows pieces of the hub; none of them
//! own it.

use log::debug;

use crate::exec;
use crate::exec::io::IoManager;
use crate::jobs::JobManager;
use crate::lexer::{Lexer, LexerConfig};
use crate::signals::SignalManager;
use crate::state::ShellState;

pub struct Shell {
    pub state: ShellState,
    pub job_manager: JobManager,
    pub io_manager: IoManager,
    pub signal_manager: SignalManager,
}

impl Shell {
    pub fn new(interactive: bool) -> Self {
        Self {
            state: ShellState::new(!interactive),
            job_manager: JobManager::new(),
            io_manager: IoManager::new(),
            signal_manager: SignalManager::new(interactive),
        }
    }

    /// Inner shell for a forked subshell: variables inherited by value, a
    /// fresh job table, no handler installation.
    pub fn for_subshell(parent: &Shell) -> Self {
        Self {
            state: parent.state.snapshot_for_subshell(),
            job_manager: JobManager::new(),
            io_manager: IoManager::new(),
            signal_manager: SignalManager::new(false),
        }
    }

    /// Install the signal policy and claim the terminal. Skipped entirely in
    /// forked children, which inherit sane dispositions from the launcher.
    pub fn install_signal_handlers(&mut self) {
        if self.state.in_forked_child {
            debug!("forked child: skipping signal installation");
            return;
        }
        if let Err(e) = self.signal_manager.install() {
            eprintln!("jsh: failed to install signal handlers: {}", e);
        }
        if self.signal_manager.is_interactive() {
            self.signal_manager.ensure_foreground();
        }
    }

    fn lexer_config(&self) -> LexerConfig {
        let mut config = if self.signal_manager.is_interactive() {
            LexerConfig::interactive()
        } else {
            LexerConfig::batch()
        };
        config.posix_mode = self.state.options.posix;
        config
    }

    /// Tokenize and execute one complete command. Returns the exit code and
    /// records it in `$?`.
    pub fn run_command(&mut self, input: &str) -> i32 {
        let lexer = Lexer::new(input, self.lexer_config());
        let code = if self.signal_manager.is_interactive() {
            let (tokens, errors) = lexer.tokenize_with_diagnostics();
            if let Some(error) = errors.first() {
                eprintln!("jsh: {}", error);
                2
            } else {
                exec::execute_tokens(self, tokens)
            }
        } else {
            match lexer.tokenize() {
                Ok(tokens) => exec::execute_tokens(self, tokens),
                Err(error) => {
                    eprintln!("jsh: {}", error);
                    2
                }
            }
        };
        self.state.last_exit_code = code;
        if self.state.options.notify {
            self.job_manager.notify_completed_jobs();
        }
        code
    }

    /// REPL-idle safe point: reap children, run pending traps, report job
    /// transitions.
    pub fn idle(&mut self) {
        self.signal_manager.poll_children(&mut self.job_manager);

        if self.signal_manager.take_sigint() {
            self.handle_user_signal("INT");
        }
        if self.signal_manager.take_sigterm() {
            self.run_trap_or_default("TERM");
        }
        if self.signal_manager.take_sighup() {
            self.run_trap_or_default("HUP");
        }
        if self.signal_manager.take_sigquit() {
            self.run_trap_or_default("QUIT");
        }

        self.job_manager.notify_stopped_jobs();
        self.job_manager.notify_completed_jobs();
    }

    /// SIGINT default behavior: the kernel already delivered the signal to
    /// the foreground group; the shell just prints a newline and sets `$?`.
    fn handle_user_signal(&mut self, name: &str) {
        if let Some(action) = self.state.traps.get(name).cloned() {
            if !action.is_empty() {
                self.run_command(&action);
            }
            return;
        }
        println!();
        self.state.last_exit_code = 130;
    }

    fn run_trap_or_default(&mut self, name: &str) {
        if let Some(action) = self.state.traps.get(name).cloned() {
            if !action.is_empty() {
                self.run_command(&action);
            }
        }
    }
}
