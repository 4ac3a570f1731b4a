//! Synchronous run-and-capture process execution.
//!
//! Trial commands are run through the platform shell with combined output
//! redirected to a file, because redirection and quoting behavior are
//! themselves facts under test. The [`CaptureRunner`] trait is the seam:
//! alternative implementations may capture through pipes as long as the
//! captured-bytes contract holds.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

/// How a command string must be dressed before the shell sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirection {
    /// `cmd > path 2>&1`, understood by POSIX shells and `cmd.exe` alike.
    Direct,
    /// `cmd.exe` on top with a POSIX `sh` underneath: the command is
    /// escaped and wrapped as `sh -c "<escaped>" > path 2>&1`.
    ShViaCmd,
}

/// Synchronous run-and-capture capability.
pub trait CaptureRunner {
    /// Run a command line to completion, leaving its combined stdout and
    /// stderr bytes at `capture`, and return the raw exit status.
    fn run_captured(&self, command: &str, capture: &Path) -> Result<i32>;
}

/// Runs command lines through the platform shell with file redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRunner {
    redirection: Redirection,
    cwd: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new(redirection: Redirection) -> Self {
        ShellRunner {
            redirection,
            cwd: None,
        }
    }

    /// The first-guess runner used before the shell has been classified.
    pub fn direct() -> Self {
        ShellRunner::new(Redirection::Direct)
    }

    /// Run the command from `dir` instead of the inherited working
    /// directory. Used to execute freshly built trial programs.
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn spawn(&self, full_command: &str) -> Result<i32> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(full_command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(full_command);
            c
        };
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        let status = cmd
            .status()
            .with_context(|| format!("failed to run `{}`", full_command))?;
        Ok(status.code().unwrap_or(-1))
    }
}

impl CaptureRunner for ShellRunner {
    fn run_captured(&self, command: &str, capture: &Path) -> Result<i32> {
        let full = match self.redirection {
            Redirection::Direct => {
                format!("{} > {} 2>&1", command, capture.display())
            }
            Redirection::ShViaCmd => {
                format!(
                    "sh -c \"{}\" > {} 2>&1",
                    escape_for_cmd(command),
                    capture.display()
                )
            }
        };
        tracing::debug!(command = %full, "running trial command");
        self.spawn(&full)
    }
}

/// Escape a command so it survives `cmd.exe`'s parser on the way to
/// `sh -c "..."`.
///
/// Quotes and backslashes are doubled. `%` and `!` are fenced in a closed
/// and reopened quote pair so `cmd.exe` never sees them inside a quoted
/// region where variable expansion would fire. Each input character
/// contributes one, two, or three output characters; the output length is
/// computed first so the rewrite is a single pass into one allocation.
pub fn escape_for_cmd(command: &str) -> String {
    let extra: usize = command
        .chars()
        .map(|c| match c {
            '"' | '\\' => 1,
            '%' | '!' => 2,
            _ => 0,
        })
        .sum();
    let mut out = String::with_capacity(command.len() + extra);
    for c in command.chars() {
        match c {
            '"' | '\\' => {
                out.push(c);
                out.push(c);
            }
            '%' | '!' => {
                out.push('"');
                out.push(c);
                out.push('"');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Find a C compiler to probe.
///
/// Honors the `CC` environment variable, then searches `PATH` for common
/// compiler drivers.
pub fn find_c_compiler() -> Option<PathBuf> {
    if let Ok(cc) = std::env::var("CC") {
        if let Ok(path) = which::which(&cc) {
            return Some(path);
        }
    }

    for compiler in &["cc", "gcc", "clang", "cl"] {
        if let Ok(path) = which::which(compiler) {
            return Some(path);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reverse of `escape_for_cmd`, as the target shell would see it.
    fn unescape(escaped: &str) -> String {
        let mut out = String::new();
        let mut chars = escaped.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    // Either a doubled quote or the opening fence of `"%"`.
                    match chars.next() {
                        Some('"') => out.push('"'),
                        Some(inner) => {
                            assert_eq!(chars.next(), Some('"'), "unterminated fence");
                            out.push(inner);
                        }
                        None => panic!("dangling quote"),
                    }
                }
                '\\' => {
                    assert_eq!(chars.next(), Some('\\'), "lone backslash");
                    out.push('\\');
                }
                other => out.push(other),
            }
        }
        out
    }

    #[test]
    fn escape_unescape_is_identity() {
        let inputs = [
            "plain",
            r#"say "hi""#,
            r"back\slash",
            "100% done!",
            r#"mix "of" \ % ! chars"#,
            "",
        ];
        for input in inputs {
            assert_eq!(unescape(&escape_for_cmd(input)), input, "input: {input:?}");
        }
    }

    #[test]
    fn escape_output_classes() {
        assert_eq!(escape_for_cmd(r#"""#), r#""""#);
        assert_eq!(escape_for_cmd(r"\"), r"\\");
        assert_eq!(escape_for_cmd("%"), "\"%\"");
        assert_eq!(escape_for_cmd("!"), "\"!\"");
        assert_eq!(escape_for_cmd("abc"), "abc");
    }

    #[cfg(unix)]
    #[test]
    fn direct_runner_captures_combined_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let capture = tmp.path().join("capture");
        let status = ShellRunner::direct()
            .run_captured("echo out; echo err 1>&2", &capture)
            .unwrap();
        assert_eq!(status, 0);
        let bytes = std::fs::read(&capture).unwrap();
        assert_eq!(bytes, b"out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn runner_reports_raw_exit_status() {
        let tmp = tempfile::TempDir::new().unwrap();
        let capture = tmp.path().join("capture");
        let status = ShellRunner::direct().run_captured("exit 3", &capture).unwrap();
        assert_eq!(status, 3);
    }

    #[cfg(unix)]
    #[test]
    fn runner_honors_cwd() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("marker"), b"here").unwrap();
        let capture = tmp.path().join("capture");
        let status = ShellRunner::direct()
            .with_cwd(tmp.path())
            .run_captured("cat marker", &capture)
            .unwrap();
        assert_eq!(status, 0);
        assert_eq!(std::fs::read(&capture).unwrap(), b"here");
    }
}
