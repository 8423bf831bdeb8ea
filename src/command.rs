/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Exit code reported when a command name resolves to nothing.
pub const EXIT_NOT_FOUND: ExitCode = 127;

/// Exit code reported when waiting for an external command was interrupted.
pub const EXIT_INTERRUPTED: ExitCode = 130;

/// Outcome of evaluating one line: its exit code, and whether the session
/// should end after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: ExitCode,
    pub terminate: bool,
}

impl ExecutionResult {
    /// Keep the session going after a command that exited with `exit_code`.
    pub fn continue_with(exit_code: ExitCode) -> Self {
        Self {
            exit_code,
            terminate: false,
        }
    }

    /// End the session with `exit_code`.
    pub fn exit_with(exit_code: ExitCode) -> Self {
        Self {
            exit_code,
            terminate: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
