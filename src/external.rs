use crate::command::ExitCode;
use crate::redirect::{ProcessRedirects, StreamTarget};
use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use thiserror::Error;

/// Failure to run an external program to completion.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{}: {source}", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The wait was cut short. [`SystemLauncher`] never reports this, since
    /// the standard library retries an interrupted wait; other launchers may.
    #[error("interrupted")]
    Interrupted,
    #[error("wait failed: {0}")]
    Wait(#[source] io::Error),
}

/// Everything needed to start an external program.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Resolved path of the executable.
    pub program: PathBuf,
    /// Full argument vector; `argv[0]` is the name the command was invoked by.
    pub argv: Vec<String>,
    pub current_dir: PathBuf,
    pub vars: HashMap<String, String>,
    pub redirects: ProcessRedirects,
}

/// Starts external programs.
pub trait ProcessLauncher {
    fn launch(&self, request: LaunchRequest) -> Result<Box<dyn RunningProcess>, ProcessError>;
}

/// A started program that can be waited on.
pub trait RunningProcess {
    /// Block until the program exits and return its exit code.
    ///
    /// An interrupted wait yields [`ProcessError::Interrupted`].
    fn wait(self: Box<Self>) -> Result<ExitCode, ProcessError>;
}

/// Launches programs as child processes of this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    fn stdio(target: &StreamTarget) -> io::Result<Stdio> {
        Ok(match target.open()? {
            Some(file) => Stdio::from(file),
            None => Stdio::inherit(),
        })
    }

    /// Open stdout and stderr, sharing one file when they were merged.
    fn output_stdio(redirects: &ProcessRedirects) -> io::Result<(Stdio, Stdio)> {
        if redirects.merged {
            if let Some(file) = redirects.stdout.open()? {
                let clone: File = file.try_clone()?;
                return Ok((Stdio::from(file), Stdio::from(clone)));
            }
        }
        Ok((
            Self::stdio(&redirects.stdout)?,
            Self::stdio(&redirects.stderr)?,
        ))
    }
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, request: LaunchRequest) -> Result<Box<dyn RunningProcess>, ProcessError> {
        let launch_error = |source| ProcessError::Launch {
            program: request.program.clone(),
            source,
        };
        let stdin = Self::stdio(&request.redirects.stdin).map_err(launch_error)?;
        let (stdout, stderr) = Self::output_stdio(&request.redirects).map_err(launch_error)?;

        let mut command = std::process::Command::new(&request.program);
        if let Some((name, args)) = request.argv.split_first() {
            set_arg0(&mut command, name);
            command.args(args);
        }
        let child = command
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .env_clear()
            .envs(request.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&request.current_dir)
            .spawn()
            .map_err(launch_error)?;
        log::debug!("spawned {} (pid {})", request.program.display(), child.id());
        Ok(Box::new(ChildProcess(child)))
    }
}

#[cfg(unix)]
fn set_arg0(command: &mut std::process::Command, name: &str) {
    use std::os::unix::process::CommandExt;
    command.arg0(name);
}

#[cfg(not(unix))]
fn set_arg0(_command: &mut std::process::Command, _name: &str) {}

struct ChildProcess(Child);

impl RunningProcess for ChildProcess {
    fn wait(mut self: Box<Self>) -> Result<ExitCode, ProcessError> {
        let exit_status = self.0.wait().map_err(ProcessError::Wait)?;
        Ok(match exit_status.code() {
            Some(x) => x,
            None => terminated_by_signal(exit_status),
        })
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it is an executable file.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first executable match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => {
            // Empty path -> not found
            None
        }
        (Some(x), None) => {
            // Single component -> search in PATH
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => {
            // Multiple components -> relative to the current dir
            find_by_path(path).map(Cow::Borrowed)
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| find_by_path(path).is_some())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if is_executable(path) { Some(path) } else { None }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    #[cfg(unix)]
    fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_true() {
        let path = Path::new("/bin/sh");
        let res = find_command_path(osstr("/bin"), path);
        assert!(res.is_some(), "Expected to find /bin/sh via absolute path");
        let found = res.unwrap();
        assert_eq!(found.as_ref(), path);
    }

    #[test]
    #[cfg(unix)]
    fn absolute_nonexisting() {
        let path = Path::new("/bin/nonexisting");
        let res = find_command_path(osstr("/bin"), path);
        assert!(
            res.is_none(),
            "Expected not to find /bin/nonexisting via absolute path"
        );
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let path = Path::new("sh");
        let res = find_command_path(osstr("/nonexistent:/bin"), path);
        let found = res.expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found.as_ref(), Path::new("/bin/sh"));
    }

    #[test]
    #[cfg(unix)]
    fn single_component_not_found_in_path() {
        let path = Path::new("nonexisting");
        let res = find_command_path(osstr("/bin"), path);
        assert!(res.is_none(), "Expected not to find 'nonexisting' in PATH");
    }

    #[test]
    #[cfg(unix)]
    fn non_executable_file_is_skipped() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_file(first.path(), "tool", 0o644);
        let runnable = make_file(second.path(), "tool", 0o755);

        let search = std::env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_command_path(&search, Path::new("tool")).unwrap();
        assert_eq!(found.as_ref(), runnable.as_path());
    }

    #[test]
    #[cfg(unix)]
    fn directory_is_not_a_command() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let res = find_command_path(dir.path().as_os_str(), Path::new("sub"));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn empty_path_is_none() {
        let res = find_command_path(osstr("/bin"), Path::new(""));
        assert!(res.is_none(), "Empty path should not resolve to anything");
    }

    fn request(program: &str, args: &[&str], dir: &Path, redirects: ProcessRedirects) -> LaunchRequest {
        LaunchRequest {
            program: PathBuf::from(program),
            argv: std::iter::once(program)
                .chain(args.iter().copied())
                .map(str::to_string)
                .collect(),
            current_dir: dir.to_path_buf(),
            vars: std::env::vars().collect(),
            redirects,
        }
    }

    #[test]
    #[cfg(unix)]
    fn launch_reports_exit_code() {
        let dir = TempDir::new().unwrap();
        let req = request("/bin/sh", &["-c", "exit 3"], dir.path(), ProcessRedirects::default());
        let code = SystemLauncher.launch(req).unwrap().wait().unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    #[cfg(unix)]
    fn launch_writes_redirected_streams() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let redirects = ProcessRedirects {
            stdout: StreamTarget::WriteTruncate(out.clone()),
            stderr: StreamTarget::WriteTruncate(out.clone()),
            merged: true,
            ..ProcessRedirects::default()
        };
        let req = request(
            "/bin/sh",
            &["-c", "echo one; echo two >&2; echo three"],
            dir.path(),
            redirects,
        );
        let code = SystemLauncher.launch(req).unwrap().wait().unwrap();

        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "one\ntwo\nthree\n");
    }

    #[test]
    #[cfg(unix)]
    fn launch_runs_in_requested_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("pwd.txt");
        let redirects = ProcessRedirects {
            stdout: StreamTarget::WriteTruncate(out.clone()),
            ..ProcessRedirects::default()
        };
        let req = request("/bin/sh", &["-c", "pwd -P"], dir.path(), redirects);
        SystemLauncher.launch(req).unwrap().wait().unwrap();

        let expected = fs::canonicalize(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap().trim_end(), expected.to_string_lossy());
    }

    #[test]
    #[cfg(unix)]
    fn launch_passes_invoked_name_as_arg0() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("arg0.txt");
        let mut req = request(
            "/bin/sh",
            &["-c", "echo $0"],
            dir.path(),
            ProcessRedirects {
                stdout: StreamTarget::WriteTruncate(out.clone()),
                ..ProcessRedirects::default()
            },
        );
        req.argv[0] = "sh".to_string();
        SystemLauncher.launch(req).unwrap().wait().unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "sh\n");
    }

    #[test]
    fn launch_missing_program_fails() {
        let dir = TempDir::new().unwrap();
        let req = request("/no/such/program", &[], dir.path(), ProcessRedirects::default());
        match SystemLauncher.launch(req) {
            Err(ProcessError::Launch { program, .. }) => {
                assert_eq!(program, PathBuf::from("/no/such/program"))
            }
            _ => panic!("expected a launch error"),
        }
    }
}
