//! A small line-oriented shell: tokenizing, parsing, redirection and command
//! dispatch.
//!
//! One input line goes through [`lexer::tokenize`], [`parser::parse`], and
//! then [`Interpreter::evaluate`], which applies the command's redirects and
//! runs it either as a builtin (in-process, against an [`io_binding::IoBinding`])
//! or as an external program through an [`external::ProcessLauncher`].
//!
//! Supported redirect operators are `>`, `1>`, `>>`, `1>>`, `2>`, `2>>`, `&>`,
//! `&>>` and `<`. Pipelines, variable expansion and globbing are not part of
//! the language.

pub mod builtin;
pub mod command;
pub mod env;
pub mod external;
pub mod interpreter;
pub mod io_adapters;
pub mod io_binding;
pub mod lexer;
pub mod parser;
pub mod redirect;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;

pub use command::{ExecutionResult, ExitCode};
pub use io_binding::IoBinding;
pub use parser::{Command, ParseError, Redirect, RedirectType};
