//! Execution
//!
//! Walks the command tree produced by the front-end parser and drives the
//! launcher, pipelines, subshells and builtins. Control flow (`break`,
//! `continue`, `return`) is data, not exceptions: every execute function
//! returns a `ControlFlow` that loops and callers pattern-match at their
//! boundary.

pub mod io;
pub mod launcher;
pub mod parser;
pub mod pipeline;
pub mod subshell;

use std::ffi::CString;

use nix::errno::Errno;
use nix::unistd;

use crate::builtins;
use crate::exec::io::{IoManager, Redirect};
use crate::exec::launcher::{LaunchConfig, ProcessLauncher};
use crate::exec::parser::{Connector, Node, RedirectSpec};
use crate::lexer::{ExpansionKind, Token};
use crate::shell::Shell;

pub use io::IoError;
pub use launcher::{LaunchError, ProcessRole};
pub use parser::CommandParser;

/// Result of executing a node: a plain exit code, or a control-flow signal
/// caught at the enclosing loop/function boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Code(i32),
    Break(u32),
    Continue(u32),
    Return(i32),
}

impl ControlFlow {
    /// Collapse to a plain exit code (used at process boundaries, where
    /// control flow cannot cross).
    pub fn code(self) -> i32 {
        match self {
            ControlFlow::Code(c) | ControlFlow::Return(c) => c,
            ControlFlow::Break(_) | ControlFlow::Continue(_) => 0,
        }
    }
}

/// Execute a statement list; stops early on a control-flow signal or, with
/// `set -e`, on the first failure.
pub fn execute_program(shell: &mut Shell, nodes: &[Node]) -> ControlFlow {
    let mut last = 0;
    for node in nodes {
        match execute_node(shell, node) {
            ControlFlow::Code(code) => {
                last = code;
                shell.state.last_exit_code = code;
                if shell.state.options.errexit && code != 0 {
                    return ControlFlow::Code(code);
                }
            }
            other => return other,
        }
    }
    ControlFlow::Code(last)
}

pub fn execute_node(shell: &mut Shell, node: &Node) -> ControlFlow {
    match node {
        Node::Simple { assignments, words, redirects } => {
            execute_simple(shell, assignments, words, redirects)
        }
        Node::Subshell { body, redirects, display } => {
            let redirects = match resolve_redirects(shell, redirects) {
                Ok(r) => r,
                Err(e) => return report(e),
            };
            ControlFlow::Code(subshell::execute_subshell(shell, body, redirects, display))
        }
        Node::Brace { body, redirects, .. } => {
            let redirects = match resolve_redirects(shell, redirects) {
                Ok(r) => r,
                Err(e) => return report(e),
            };
            subshell::execute_brace_group(shell, body, &redirects)
        }
        Node::Pipeline { negate, commands, display } => {
            let code = pipeline::run_pipeline(shell, commands, display);
            let code = if *negate { i32::from(code == 0) } else { code };
            ControlFlow::Code(code)
        }
        Node::AndOr { first, rest } => {
            let mut flow = execute_node(shell, first);
            for (connector, node) in rest {
                let code = match flow {
                    ControlFlow::Code(c) => c,
                    other => return other,
                };
                shell.state.last_exit_code = code;
                let run = match connector {
                    Connector::And => code == 0,
                    Connector::Or => code != 0,
                };
                if run {
                    flow = execute_node(shell, node);
                }
            }
            flow
        }
        Node::Background { inner, display } => {
            ControlFlow::Code(subshell::execute_background(shell, inner, display))
        }
        Node::If { cond, then_body, elifs, else_body } => {
            match execute_program(shell, cond) {
                ControlFlow::Code(0) => return execute_program(shell, then_body),
                ControlFlow::Code(_) => {}
                other => return other,
            }
            for (elif_cond, elif_body) in elifs {
                match execute_program(shell, elif_cond) {
                    ControlFlow::Code(0) => return execute_program(shell, elif_body),
                    ControlFlow::Code(_) => {}
                    other => return other,
                }
            }
            match else_body {
                Some(body) => execute_program(shell, body),
                None => ControlFlow::Code(0),
            }
        }
        Node::Loop { until, cond, body } => {
            let mut last = 0;
            loop {
                let passed = match execute_program(shell, cond) {
                    ControlFlow::Code(c) => (c == 0) != *until,
                    other => return other,
                };
                if !passed {
                    break;
                }
                match execute_program(shell, body) {
                    ControlFlow::Code(c) => last = c,
                    ControlFlow::Break(n) => {
                        if n > 1 {
                            return ControlFlow::Break(n - 1);
                        }
                        break;
                    }
                    ControlFlow::Continue(n) => {
                        if n > 1 {
                            return ControlFlow::Continue(n - 1);
                        }
                    }
                    other => return other,
                }
            }
            ControlFlow::Code(last)
        }
        Node::For { var, items, body } => {
            let values: Vec<String> = items.iter().map(|t| expand_word(shell, t)).collect();
            let mut last = 0;
            for value in values {
                shell.state.set_var(var.clone(), value);
                match execute_program(shell, body) {
                    ControlFlow::Code(c) => last = c,
                    ControlFlow::Break(n) => {
                        if n > 1 {
                            return ControlFlow::Break(n - 1);
                        }
                        break;
                    }
                    ControlFlow::Continue(n) => {
                        if n > 1 {
                            return ControlFlow::Continue(n - 1);
                        }
                    }
                    other => return other,
                }
            }
            ControlFlow::Code(last)
        }
    }
}

fn report(message: String) -> ControlFlow {
    eprintln!("jsh: {}", message);
    ControlFlow::Code(1)
}

fn execute_simple(
    shell: &mut Shell,
    assignments: &[(String, String)],
    words: &[Token],
    redirects: &[RedirectSpec],
) -> ControlFlow {
    // Bare assignments mutate the shell itself
    if words.is_empty() {
        for (name, value) in assignments {
            let value = expand_string(shell, value);
            shell.state.set_var(name.clone(), value);
        }
        return ControlFlow::Code(0);
    }

    let argv: Vec<String> = words.iter().map(|w| expand_word(shell, w)).collect();
    let resolved = match resolve_redirects(shell, redirects) {
        Ok(r) => r,
        Err(e) => return report(e),
    };

    // Control-flow builtins are the executor's own
    match argv[0].as_str() {
        "break" => return ControlFlow::Break(parse_level(argv.get(1))),
        "continue" => return ControlFlow::Continue(parse_level(argv.get(1))),
        "return" => {
            let code = argv
                .get(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or(shell.state.last_exit_code);
            return ControlFlow::Return(code);
        }
        _ => {}
    }

    if let Some(builtin) = builtins::lookup(&argv[0]) {
        // Builtins run in-process under a scoped fd save/restore
        let saved = match shell.io_manager.apply_redirections(&resolved) {
            Ok(s) => s,
            Err(e) => return report(e.to_string()),
        };
        let code = builtin(shell, &argv[1..]);
        shell.io_manager.restore_redirections(saved);
        return ControlFlow::Code(code);
    }

    ControlFlow::Code(run_external(shell, argv, assignments, resolved))
}

fn parse_level(arg: Option<&String>) -> u32 {
    arg.and_then(|s| s.parse().ok()).filter(|&n| n >= 1).unwrap_or(1)
}

/// Launch a single external command as a foreground job and wait for it.
fn run_external(
    shell: &mut Shell,
    argv: Vec<String>,
    assignments: &[(String, String)],
    redirects: Vec<Redirect>,
) -> i32 {
    let display = argv.join(" ");
    let argv0 = argv[0].clone();
    let env = child_environment(shell, assignments);
    let interactive = terminal_control_allowed(shell);

    let io_setup: launcher::IoSetup<'_> =
        Box::new(move || IoManager::new().setup_child_redirections(&redirects));
    let launched = ProcessLauncher::new(shell).launch(
        move |_| exec_external(&argv, &env),
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
        job.add_process(pid, argv0);
    }

    shell.job_manager.set_foreground_job(Some(job_id));
    let transferred = interactive && shell.job_manager.transfer_terminal_control(pgid);
    let status = shell.job_manager.wait_for_job(job_id);
    if transferred {
        shell.job_manager.restore_shell_foreground();
    }
    shell.job_manager.set_foreground_job(None);

    if shell
        .job_manager
        .get_job(job_id)
        .map(|j| j.state == crate::jobs::JobState::Done)
        .unwrap_or(false)
    {
        shell.job_manager.remove_job(job_id);
    }
    status
}

/// Replace the child image. Only returns on failure, with the conventional
/// shell exit codes (127 not found, 126 not executable).
pub(crate) fn exec_external(argv: &[String], env: &[CString]) -> i32 {
    let cargs: Vec<CString> = match argv.iter().map(|a| CString::new(a.as_str())).collect() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("jsh: invalid argument");
            return 1;
        }
    };

    match unistd::execvpe(&cargs[0], &cargs, env) {
        Err(Errno::ENOENT) => {
            eprintln!("jsh: {}: command not found", argv[0]);
            127
        }
        Err(Errno::EACCES) => {
            eprintln!("jsh: {}: permission denied", argv[0]);
            126
        }
        Err(e) => {
            eprintln!("jsh: {}: {}", argv[0], e);
            126
        }
        Ok(_) => unreachable!(),
    }
}

/// Environment for a child: the exported environment, shell variables set by
/// this command's prefix assignments layered on top.
pub(crate) fn child_environment(shell: &Shell, assignments: &[(String, String)]) -> Vec<CString> {
    let mut env = shell.state.env.clone();
    for (name, value) in assignments {
        env.insert(name.clone(), expand_string(shell, value));
    }
    env.iter()
        .filter_map(|(k, v)| CString::new(format!("{}={}", k, v)).ok())
        .collect()
}

/// The terminal-transfer precheck: stdin is a tty, we are not a script, and
/// we are currently the foreground group. The last clause keeps the shell
/// from fighting over `tcsetpgrp` when a test harness shares the terminal.
pub fn terminal_control_allowed(shell: &Shell) -> bool {
    if shell.state.is_script_mode || !shell.signal_manager.is_interactive() {
        return false;
    }
    let Ok(fg) = unistd::tcgetpgrp(std::io::stdin()) else {
        return false;
    };
    fg == unistd::getpgrp()
}

/// Expand one word token: literal parts verbatim, variable parts looked up,
/// substitution parts kept as source text (full expansion is the expander's
/// job, not the core's).
pub fn expand_word(shell: &Shell, token: &Token) -> String {
    if token.parts.is_empty() {
        return token.value.clone();
    }
    let mut out = String::new();
    for part in &token.parts {
        if part.literal_dollar {
            out.push_str(&part.value);
            continue;
        }
        match part.expansion {
            Some(ExpansionKind::Variable) => {
                out.push_str(&lookup_variable(shell, &part.value));
            }
            Some(ExpansionKind::Parameter) => {
                // Bare ${NAME} only; operators are the expander's concern
                if crate::lexer::unicode::validate_identifier(&part.value, false) {
                    out.push_str(&lookup_variable(shell, &part.value));
                } else {
                    out.push_str(&format!("${{{}}}", part.value));
                }
            }
            _ => out.push_str(&part.value),
        }
    }
    out
}

fn expand_string(shell: &Shell, value: &str) -> String {
    // Assignment values arrive unparsed; expand `$NAME` occurrences only
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' && i + 1 < chars.len() {
            let (name, end) = crate::lexer::helpers::extract_variable_name(&chars, i + 1, false);
            if !name.is_empty() {
                out.push_str(&lookup_variable(shell, &name));
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn lookup_variable(shell: &Shell, name: &str) -> String {
    match name {
        "?" => shell.state.last_exit_code.to_string(),
        "$" => unistd::getpid().to_string(),
        "!" => shell
            .job_manager
            .last_background_pid()
            .map(|p| p.to_string())
            .unwrap_or_default(),
        "#" => shell.state.positional_params.len().to_string(),
        _ => {
            if let Ok(n) = name.parse::<usize>() {
                if n == 0 {
                    return "jsh".to_string();
                }
                return shell
                    .state
                    .positional_params
                    .get(n - 1)
                    .cloned()
                    .unwrap_or_default();
            }
            shell.state.get_var(name).unwrap_or_default().to_string()
        }
    }
}

/// Turn parsed redirect specs into applicable redirections, expanding target
/// words.
pub fn resolve_redirects(
    shell: &Shell,
    specs: &[RedirectSpec],
) -> Result<Vec<Redirect>, String> {
    let mut out = Vec::new();
    for spec in specs {
        let redirect = match spec {
            RedirectSpec::In { fd, target } => Redirect::ReadFile {
                fd: *fd,
                path: expand_word(shell, target),
            },
            RedirectSpec::Out { fd, target, append } => Redirect::WriteFile {
                fd: *fd,
                path: expand_word(shell, target),
                append: *append,
            },
            RedirectSpec::Combined { target, append } => Redirect::CombinedOutput {
                path: expand_word(shell, target),
                append: *append,
            },
            RedirectSpec::ReadWrite { fd, target } => Redirect::ReadWriteFile {
                fd: *fd,
                path: expand_word(shell, target),
            },
            RedirectSpec::Dup { fd, target, .. } => Redirect::DupFd { fd: *fd, target: *target },
            RedirectSpec::Close { fd } => Redirect::CloseFd { fd: *fd },
            RedirectSpec::Here { fd, body, quoted } => {
                let body = if *quoted { body.clone() } else { expand_string(shell, body) };
                Redirect::HereBody { fd: *fd, body }
            }
            RedirectSpec::HereString { fd, target } => Redirect::HereBody {
                fd: *fd,
                body: format!("{}\n", expand_word(shell, target)),
            },
        };
        out.push(redirect);
    }
    Ok(out)
}

/// Parse and execute one token stream. Stray `break`/`continue` at top level
/// are reported the way a shell reports them, not propagated.
pub fn execute_tokens(shell: &mut Shell, tokens: Vec<Token>) -> i32 {
    let nodes = match CommandParser::new(tokens).parse() {
        Ok(nodes) => nodes,
        Err(e) => {
            eprintln!("jsh: {}", e);
            return 2;
        }
    };
    match execute_program(shell, &nodes) {
        ControlFlow::Code(code) => code,
        ControlFlow::Return(code) => code,
        ControlFlow::Break(_) => {
            eprintln!("jsh: break: only meaningful in a `for', `while', or `until' loop");
            0
        }
        ControlFlow::Continue(_) => {
            eprintln!("jsh: continue: only meaningful in a `for', `while', or `until' loop");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use crate::lexer::tokenize;

    fn run(shell: &mut Shell, input: &str) -> i32 {
        execute_tokens(shell, tokenize(input).unwrap())
    }

    #[test]
    fn test_assignment_and_expansion() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "GREETING=hello"), 0);
        assert_eq!(shell.state.get_var("GREETING"), Some("hello"));
        assert_eq!(run(&mut shell, "COPY=$GREETING"), 0);
        assert_eq!(shell.state.get_var("COPY"), Some("hello"));
    }

    #[test]
    fn test_true_false_and_or() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "true"), 0);
        assert_eq!(run(&mut shell, "false"), 1);
        assert_eq!(run(&mut shell, "false || true"), 0);
        assert_eq!(run(&mut shell, "true && false"), 1);
        assert_eq!(run(&mut shell, "false && true"), 1);
    }

    #[test]
    #[serial]
    fn test_negated_pipeline_code() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "! false"), 0);
        assert_eq!(run(&mut shell, "! true"), 1);
    }

    #[test]
    #[serial]
    fn test_external_command() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "/bin/true"), 0);
        assert_eq!(run(&mut shell, "/bin/false"), 1);
    }

    #[test]
    #[serial]
    fn test_command_not_found_is_127() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "definitely-not-a-command-xyz"), 127);
    }

    #[test]
    fn test_if_execution() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "if true; then X=yes; else X=no; fi"), 0);
        assert_eq!(shell.state.get_var("X"), Some("yes"));
        assert_eq!(run(&mut shell, "if false; then Y=yes; else Y=no; fi"), 0);
        assert_eq!(shell.state.get_var("Y"), Some("no"));
    }

    #[test]
    fn test_for_loop_execution() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "for i in a b c; do LAST=$i; done"), 0);
        assert_eq!(shell.state.get_var("LAST"), Some("c"));
        assert_eq!(shell.state.get_var("i"), Some("c"));
    }

    #[test]
    fn test_while_loop_with_break() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "while true; do break; done"), 0);
    }

    #[test]
    fn test_break_outside_loop_reports() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "break"), 0);
    }

    #[test]
    fn test_last_exit_code_variable() {
        let mut shell = Shell::new(false);
        run(&mut shell, "false");
        assert_eq!(run(&mut shell, "CODE=$?"), 0);
        assert_eq!(shell.state.get_var("CODE"), Some("1"));
    }

    #[test]
    fn test_brace_group_runs_in_process() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "{ X=inner; }"), 0);
        assert_eq!(shell.state.get_var("X"), Some("inner"));
    }

    #[test]
    #[serial]
    fn test_subshell_isolates_state() {
        let mut shell = Shell::new(false);
        run(&mut shell, "X=outer");
        assert_eq!(run(&mut shell, "(X=inner; true)"), 0);
        assert_eq!(shell.state.get_var("X"), Some("outer"));
    }

    #[test]
    #[serial]
    fn test_subshell_exit_code_propagates() {
        let mut shell = Shell::new(false);
        assert_eq!(run(&mut shell, "(false)"), 1);
        assert_eq!(run(&mut shell, "(true)"), 0);
    }
}
