use crate::command::{ExecutionResult, ExitCode};
use crate::env::Environment;
use crate::io_binding::IoBinding;
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

/// What a builtin gets to work with while it runs.
pub struct Context<'a> {
    /// Streams after redirects were applied.
    pub io: &'a IoBinding,
    pub env: &'a mut Environment,
    /// Names of every registered builtin.
    pub builtins: &'a [&'static str],
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the provided streams and environment.
    ///
    /// Errors are reported on the error stream and turn into exit code 1.
    fn execute(self, ctx: &mut Context<'_>) -> Result<ExecutionResult>;
}

/// Object-safe handler the interpreter dispatches builtins through.
pub trait Builtin {
    /// Parse `args` (without the command name) and run the command.
    ///
    /// Only failures to write to the streams themselves are returned as errors.
    fn run(&self, args: &[&str], ctx: &mut Context<'_>) -> Result<ExecutionResult>;
}

/// Adapts a [`BuiltinCommand`] type into a [`Builtin`] handler.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand> Builtin for Factory<T> {
    fn run(&self, args: &[&str], ctx: &mut Context<'_>) -> Result<ExecutionResult> {
        let cmd = match T::from_args(&[T::name()], args) {
            Ok(cmd) => cmd,
            Err(EarlyExit { output, status }) => {
                // --help succeeds and goes to output; usage errors go to error.
                return Ok(match status {
                    Ok(()) => {
                        ctx.io.output().write_all(output.as_bytes())?;
                        ExecutionResult::continue_with(0)
                    }
                    Err(()) => {
                        ctx.io.error().write_all(output.as_bytes())?;
                        ExecutionResult::continue_with(1)
                    }
                });
            }
        };

        match cmd.execute(ctx) {
            Ok(result) => Ok(result),
            Err(e) => {
                writeln!(ctx.io.error(), "{e}")?;
                Ok(ExecutionResult::continue_with(1))
            }
        }
    }
}

/// Registry of builtin handlers, keyed by command name.
pub struct Builtins {
    handlers: BTreeMap<&'static str, Box<dyn Builtin>>,
}

impl Builtins {
    /// A registry with no builtins at all.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register `T` under its canonical name, replacing any previous handler.
    pub fn register<T: BuiltinCommand + 'static>(&mut self) {
        self.handlers.insert(T::name(), Box::new(Factory::<T>::default()));
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Builtin> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    /// Registered names in sorted order.
    pub fn list_names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

impl Default for Builtins {
    /// The standard builtins: `cd`, `echo`, `exit`, `pwd` and `type`.
    fn default() -> Self {
        let mut builtins = Self::empty();
        builtins.register::<Cd>();
        builtins.register::<Echo>();
        builtins.register::<Exit>();
        builtins.register::<Pwd>();
        builtins.register::<Type>();
        builtins
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExecutionResult> {
        writeln!(ctx.io.output(), "{}", ctx.env.current_dir.display())?;
        Ok(ExecutionResult::continue_with(0))
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl Cd {
    fn resolve_target(&self, env: &Environment) -> Result<PathBuf> {
        let home = || env.home().ok_or_else(|| anyhow!("cd: HOME not set"));
        Ok(match self.target.as_deref() {
            None | Some("") | Some("~") => home()?,
            Some(t) if t.starts_with("~/") => home()?.join(&t[2..]),
            Some(t) => env.current_dir.join(t),
        })
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExecutionResult> {
        let new_dir = self.resolve_target(ctx.env)?;

        let canonical = fs::canonicalize(&new_dir)
            .map_err(|_| anyhow!("cd: {}: No such file or directory", new_dir.display()))?;
        if !canonical.is_dir() {
            return Err(anyhow!("cd: {}: Not a directory", new_dir.display()));
        }

        env::set_current_dir(&canonical)
            .map_err(|e| anyhow!("cd: can't chdir to {}: {e}", canonical.display()))?;
        ctx.env.current_dir = canonical;
        Ok(ExecutionResult::continue_with(0))
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit status of the shell; defaults to 0.
    pub code: Option<ExitCode>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _ctx: &mut Context<'_>) -> Result<ExecutionResult> {
        Ok(ExecutionResult::exit_with(self.code.unwrap_or(0)))
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExecutionResult> {
        let s = self.args.join(" ");
        let mut out = ctx.io.output();
        if self.no_newline {
            write!(out, "{}", s)?;
        } else {
            writeln!(out, "{}", s)?;
        }
        Ok(ExecutionResult::continue_with(0))
    }
}

#[derive(FromArgs)]
/// tell how each name would be interpreted if used as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExecutionResult> {
        let mut exit_code = 0;
        for name in &self.names {
            if ctx.builtins.iter().any(|b| *b == name.as_str()) {
                writeln!(ctx.io.output(), "{name} is a shell builtin")?;
            } else if let Some(path) = ctx.env.find_executable(name) {
                writeln!(ctx.io.output(), "{name} is {}", path.display())?;
            } else {
                writeln!(ctx.io.error(), "{name}: not found")?;
                exit_code = 1;
            }
        }
        Ok(ExecutionResult::continue_with(exit_code))
    }
}
