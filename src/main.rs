use std::io::{BufRead, IsTerminal, Read, Write};

use clap::Parser;
use jsh::input::MultiLineBuffer;
use jsh::shell::Shell;

#[derive(Parser)]
#[command(name = "jsh")]
#[command(about = "An interactive POSIX-style shell with job control")]
#[command(version)]
struct Cli {
    /// Execute the script from a command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Force interactive mode
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// POSIX-restricted lexing
    #[arg(long = "posix")]
    posix: bool,

    /// Accepted for compatibility; no rc files are read
    #[arg(long = "norc")]
    norc: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,

    /// Arguments passed to the script as positional parameters
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let stdin_tty = std::io::stdin().is_terminal();
    let interactive =
        cli.interactive || (cli.script.is_none() && cli.script_file.is_none() && stdin_tty);

    let mut shell = Shell::new(interactive);
    shell.state.options.posix = cli.posix;
    shell.state.positional_params = cli.args.clone();
    shell.install_signal_handlers();

    let code = if let Some(script) = cli.script {
        shell.run_command(&script)
    } else if let Some(path) = cli.script_file {
        match std::fs::read_to_string(&path) {
            Ok(source) => shell.run_command(&source),
            Err(e) => {
                eprintln!("jsh: {}: {}", path, e);
                127
            }
        }
    } else if interactive {
        repl(&mut shell)
    } else {
        let mut source = String::new();
        match std::io::stdin().read_to_string(&mut source) {
            Ok(_) => shell.run_command(&source),
            Err(e) => {
                eprintln!("jsh: {}", e);
                1
            }
        }
    };

    std::process::exit(code & 0xff);
}

/// The interactive loop: prompt, assemble multi-line input, execute, and
/// handle job notifications at idle.
fn repl(shell: &mut Shell) -> i32 {
    let stdin = std::io::stdin();
    let mut buffer = MultiLineBuffer::new();

    loop {
        shell.idle();

        print_prompt(&buffer.prompt());
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                // EOF: run what is buffered, then leave
                if !buffer.is_empty() {
                    let command = buffer.take();
                    shell.run_command(&command);
                }
                println!();
                return shell.state.last_exit_code;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("jsh: {}", e);
                return 1;
            }
        }

        buffer.push_line(&line);
        if !buffer.is_complete() {
            continue;
        }

        let command = buffer.take();
        if command.trim().is_empty() {
            continue;
        }
        shell.run_command(&command);
    }
}

fn print_prompt(prompt: &str) {
    eprint!("{}", prompt);
    let _ = std::io::stderr().flush();
}
