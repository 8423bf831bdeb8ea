use crate::builtin::{Builtins, Context};
use crate::command::{EXIT_INTERRUPTED, EXIT_NOT_FOUND, ExecutionResult, ExitCode};
use crate::env::Environment;
use crate::external::{LaunchRequest, ProcessError, ProcessLauncher, SystemLauncher};
use crate::io_binding::IoBinding;
use crate::parser::{self, Command};
use crate::redirect;
use anyhow::Context as _;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::Path;

/// Prompt shown by [`Interpreter::repl`] unless another one is given.
pub const DEFAULT_PROMPT: &str = "$ ";

/// Prompt shown while a line ending in a backslash is being continued.
const CONTINUATION_PROMPT: &str = "> ";

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter owns the session state that persists between lines: the
/// [`Environment`], the base [`IoBinding`] every command starts from, the
/// registered builtins, and the launcher used for everything else.
///
/// Example
/// ```no_run
/// use lineshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let result = sh.evaluate("echo hello world").unwrap();
/// assert_eq!(result.exit_code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    io: IoBinding,
    builtins: Builtins,
    launcher: Box<dyn ProcessLauncher>,
}

impl Interpreter {
    pub fn new(
        env: Environment,
        io: IoBinding,
        builtins: Builtins,
        launcher: Box<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            env,
            io,
            builtins,
            launcher,
        }
    }

    /// Replace the launcher used for external commands.
    pub fn with_launcher(mut self, launcher: Box<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Parse and run one line.
    ///
    /// Grammar and redirect failures are reported on the base error stream and
    /// yield exit code 1; an unknown command yields 127; an interrupted external
    /// command yields 130. Only failures to launch or wait for a program, or to
    /// write to the streams themselves, are returned as errors.
    pub fn evaluate(&mut self, line: &str) -> anyhow::Result<ExecutionResult> {
        if line.trim().is_empty() {
            return Ok(ExecutionResult::continue_with(0));
        }

        let cmd = match parser::parse(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                writeln!(self.io.error(), "parse error: {e}")?;
                return Ok(ExecutionResult::continue_with(1));
            }
        };
        log::debug!("evaluating {cmd:?}");

        if self.builtins.is_builtin(cmd.name()) {
            return self.run_builtin(&cmd);
        }
        if let Some(program) = self.env.find_executable(cmd.name()) {
            return self.run_external(&cmd, &program);
        }

        // Targets are still created even though nothing will write to them.
        match redirect::apply(cmd.redirects(), &self.io) {
            Ok(resolved) => resolved.release()?,
            Err(e) => {
                writeln!(self.io.error(), "{}: {e}", cmd.name())?;
                return Ok(ExecutionResult::continue_with(1));
            }
        }
        writeln!(self.io.error(), "{}: command not found", cmd.name())?;
        Ok(ExecutionResult::continue_with(EXIT_NOT_FOUND))
    }

    fn run_builtin(&mut self, cmd: &Command) -> anyhow::Result<ExecutionResult> {
        log::debug!("{} is a builtin", cmd.name());
        let Some(handler) = self.builtins.get(cmd.name()) else {
            return Ok(ExecutionResult::continue_with(EXIT_NOT_FOUND));
        };

        let resolved = match redirect::apply(cmd.redirects(), &self.io) {
            Ok(resolved) => resolved,
            Err(e) => {
                writeln!(self.io.error(), "{}: {e}", cmd.name())?;
                return Ok(ExecutionResult::continue_with(1));
            }
        };

        let names = self.builtins.list_names();
        let args: Vec<&str> = cmd.arguments().collect();
        let mut ctx = Context {
            io: &resolved,
            env: &mut self.env,
            builtins: &names,
        };
        let result = handler.run(&args, &mut ctx);

        if let Err(e) = resolved.flush() {
            log::warn!("failed to flush output of {}: {e}", cmd.name());
        }
        if let Err(e) = resolved.release() {
            log::warn!("failed to release redirects of {}: {e}", cmd.name());
        }
        result
    }

    fn run_external(&mut self, cmd: &Command, program: &Path) -> anyhow::Result<ExecutionResult> {
        log::debug!("{} resolved to {}", cmd.name(), program.display());
        let redirects = match redirect::to_process(cmd.redirects()) {
            Ok(redirects) => redirects,
            Err(e) => {
                writeln!(self.io.error(), "{}: {e}", cmd.name())?;
                return Ok(ExecutionResult::continue_with(1));
            }
        };

        // Anything a builtin left buffered must reach the terminal before the child writes.
        self.io.flush()?;

        let request = LaunchRequest {
            program: program.to_path_buf(),
            argv: cmd.argv(),
            current_dir: self.env.current_dir.clone(),
            vars: self.env.vars.clone(),
            redirects,
        };
        let child = self.launcher.launch(request)?;
        match child.wait() {
            Ok(code) => Ok(ExecutionResult::continue_with(code)),
            Err(ProcessError::Interrupted) => {
                writeln!(self.io.error(), "{}: interrupted", cmd.name())?;
                Ok(ExecutionResult::continue_with(EXIT_INTERRUPTED))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read-eval-print loop over the terminal.
    ///
    /// Returns the exit code of the last command once `exit` runs or input ends.
    pub fn repl(&mut self, prompt: &str) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new().context("failed to start the line editor")?;
        let mut last_exit: ExitCode = 0;

        loop {
            let line = match read_command(&mut rl, prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e).context("failed to read input"),
            };
            if line.trim().is_empty() {
                continue;
            }
            if let Err(e) = rl.add_history_entry(line.as_str()) {
                log::warn!("failed to record history: {e}");
            }

            match self.evaluate(&line) {
                Ok(result) => {
                    last_exit = result.exit_code;
                    if result.terminate {
                        break;
                    }
                }
                Err(e) => {
                    last_exit = 1;
                    writeln!(self.io.error(), "{e:#}")?;
                }
            }
        }

        self.io.flush()?;
        Ok(last_exit)
    }
}

/// Read one logical line, joining physical lines that end in a backslash.
fn read_command(rl: &mut DefaultEditor, prompt: &str) -> rustyline::Result<String> {
    let mut line = rl.readline(prompt)?;
    while line.ends_with('\\') {
        line.pop();
        let next = rl.readline(CONTINUATION_PROMPT)?;
        line.push_str(&next);
    }
    Ok(line)
}

impl Default for Interpreter {
    /// An interpreter over the process environment and stdio, with the
    /// standard builtins and the [`SystemLauncher`].
    fn default() -> Self {
        Self::new(
            Environment::new(),
            IoBinding::stdio(),
            Builtins::default(),
            Box::new(SystemLauncher),
        )
    }
}
