//! Applying redirect directives to streams.
//!
//! Directives are processed strictly in order, so when several of them target
//! the same stream the last one wins. Two entry points share the same table:
//! [`apply`] substitutes stream handles for in-process builtins, and
//! [`to_process`] produces per-descriptor file redirections for an external
//! process, which owns its own streams once launched.

use crate::io_binding::{InputStream, IoBinding, Ownership, OutputStream, Resolved};
use crate::parser::{Redirect, RedirectType};
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// A redirect target that could not be opened in the required mode.
#[derive(Debug, Error)]
#[error("{}: {source}", .path.display())]
pub struct RedirectError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// How a file is opened for a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    Read,
    Truncate,
    Append,
}

impl OpenMode {
    fn of(kind: RedirectType) -> OpenMode {
        match kind {
            RedirectType::Input => OpenMode::Read,
            k if k.is_append() => OpenMode::Append,
            _ => OpenMode::Truncate,
        }
    }

    fn open(self, path: &Path) -> Result<File, RedirectError> {
        log::trace!("opening {} ({self:?})", path.display());
        let result = match self {
            OpenMode::Read => File::open(path),
            OpenMode::Truncate => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
            OpenMode::Append => OpenOptions::new().create(true).append(true).open(path),
        };
        result.map_err(|source| RedirectError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Flush a stream that is about to be superseded, if this pass opened it.
///
/// Dropping the last reference afterwards closes it; a stream still shared
/// with the other output stays open for that stream.
fn supersede(stream: &OutputStream, owned: bool) {
    if owned {
        if let Err(e) = stream.borrow_mut().flush() {
            log::warn!("failed to flush superseded redirect: {e}");
        }
    }
}

fn writer(file: File) -> OutputStream {
    Rc::new(RefCell::new(BufWriter::new(file)))
}

/// Apply `redirects` on top of `base`.
///
/// With no redirects, `base` itself is returned and nothing is opened.
/// Otherwise the result owns every stream the redirects opened and borrows
/// the rest from `base`. Streams inherited from `base` are never closed here,
/// even when superseded. If any target fails to open, everything opened so
/// far is released before the error is returned.
pub fn apply<'a>(
    redirects: &[Redirect],
    base: &'a IoBinding,
) -> Result<Resolved<'a>, RedirectError> {
    if redirects.is_empty() {
        return Ok(Resolved::Inherited(base));
    }

    let mut input: InputStream = Rc::clone(base.input_stream());
    let mut output: OutputStream = Rc::clone(base.output_stream());
    let mut error: OutputStream = Rc::clone(base.error_stream());
    let mut owned = Ownership::NONE;

    for redirect in redirects {
        let path = Path::new(redirect.target.as_str());
        let mode = OpenMode::of(redirect.kind);

        match redirect.kind {
            RedirectType::Input => {
                input = Rc::new(RefCell::new(BufReader::new(mode.open(path)?)));
                owned.input = true;
            }
            RedirectType::Output | RedirectType::OutputAppend => {
                supersede(&output, owned.output);
                output = writer(mode.open(path)?);
                owned.output = true;
            }
            RedirectType::Error | RedirectType::ErrorAppend => {
                supersede(&error, owned.error);
                error = writer(mode.open(path)?);
                owned.error = true;
            }
            RedirectType::AllOutput | RedirectType::AllAppend => {
                supersede(&output, owned.output);
                if !Rc::ptr_eq(&output, &error) {
                    supersede(&error, owned.error);
                }
                let shared = writer(mode.open(path)?);
                output = Rc::clone(&shared);
                error = shared;
                owned.output = true;
                owned.error = true;
            }
        }
    }

    Ok(Resolved::Derived(IoBinding::new(input, output, error, owned)))
}

/// Where one standard stream of an external process is connected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamTarget {
    /// Use the interpreter's own stream.
    #[default]
    Inherit,
    ReadFrom(PathBuf),
    WriteTruncate(PathBuf),
    WriteAppend(PathBuf),
}

impl StreamTarget {
    fn for_mode(mode: OpenMode, path: PathBuf) -> StreamTarget {
        match mode {
            OpenMode::Read => StreamTarget::ReadFrom(path),
            OpenMode::Truncate => StreamTarget::WriteTruncate(path),
            OpenMode::Append => StreamTarget::WriteAppend(path),
        }
    }

    /// Open the file this target names, or `None` to inherit.
    pub fn open(&self) -> io::Result<Option<File>> {
        let (mode, path) = match self {
            StreamTarget::Inherit => return Ok(None),
            StreamTarget::ReadFrom(p) => (OpenMode::Read, p),
            StreamTarget::WriteTruncate(p) => (OpenMode::Truncate, p),
            StreamTarget::WriteAppend(p) => (OpenMode::Append, p),
        };
        mode.open(path).map(Some).map_err(|e| e.source)
    }
}

/// Per-descriptor redirections for an external process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessRedirects {
    pub stdin: StreamTarget,
    pub stdout: StreamTarget,
    pub stderr: StreamTarget,
    /// Stdout and stderr were last set together by `&>` or `&>>` and should
    /// share one open file.
    pub merged: bool,
}

/// Translate `redirects` into file redirections for an external process.
///
/// Every target is checked (and output targets created or truncated) in
/// order, exactly as [`apply`] would open them, so superseded output files
/// are left behind empty. Later directives replace earlier ones per stream.
pub fn to_process(redirects: &[Redirect]) -> Result<ProcessRedirects, RedirectError> {
    let mut plan = ProcessRedirects::default();

    for redirect in redirects {
        let path = PathBuf::from(redirect.target.as_str());
        let mode = OpenMode::of(redirect.kind);
        drop(mode.open(&path)?);
        let target = StreamTarget::for_mode(mode, path);

        match redirect.kind {
            RedirectType::Input => plan.stdin = target,
            RedirectType::Output | RedirectType::OutputAppend => {
                plan.stdout = target;
                plan.merged = false;
            }
            RedirectType::Error | RedirectType::ErrorAppend => {
                plan.stderr = target;
                plan.merged = false;
            }
            RedirectType::AllOutput | RedirectType::AllAppend => {
                plan.stdout = target.clone();
                plan.stderr = target;
                plan.merged = true;
            }
        }
    }

    Ok(plan)
}
