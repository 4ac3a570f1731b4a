//! Shell detection.
//!
//! Nothing about the invoking shell is assumed. Its escaping convention is
//! inferred by running a probe command whose output differs between POSIX
//! shells and `cmd.exe`, and reading back what was actually captured.

use std::path::Path;

use anyhow::Result;

use crate::probe::ProbeError;
use crate::util::fs::{remove_and_verify, slurp_file};
use crate::util::process::{CaptureRunner, Redirection, ShellRunner};

/// Fixed capture filename reused by shell probes.
pub const CAPTURE_NAME: &str = "_soundings_capture";

/// Which escaping convention governs command construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Posix,
    CmdExe,
}

/// The local shell's dialect, detected once and read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellProfile {
    kind: ShellKind,
    posix_via_cmd: bool,
}

impl ShellProfile {
    /// Classify the local shell by observing which escape character it
    /// consumes.
    ///
    /// `echo foo\^bar` is run with POSIX-style redirection as a first
    /// guess. A POSIX shell eats the backslash and prints `foo^bar`;
    /// `cmd.exe` eats the caret and prints `foo\bar`. Any other outcome is
    /// fatal. Detection is idempotent: the same environment always yields
    /// the same profile.
    pub fn detect(scratch: &Path) -> Result<ShellProfile> {
        let capture = scratch.join(CAPTURE_NAME);
        remove_and_verify(&capture)?;

        ShellRunner::direct().run_captured(r"echo foo\^bar", &capture)?;
        let bytes = slurp_file(&capture).unwrap_or_default();

        let profile = if output_line_is(&bytes, b"foo\\bar") {
            tracing::debug!("caret consumed: cmd.exe-flavored shell");
            Self::classify_cmd_exe(&capture)?
        } else if output_line_is(&bytes, b"foo^bar") {
            tracing::debug!("backslash consumed: POSIX-flavored shell");
            ShellProfile {
                kind: ShellKind::Posix,
                posix_via_cmd: false,
            }
        } else {
            return Err(ProbeError::ShellUnknown.into());
        };

        remove_and_verify(&capture)?;
        tracing::info!(kind = ?profile.kind, via_cmd = profile.posix_via_cmd, "detected shell");
        Ok(profile)
    }

    /// `cmd.exe` is on top; check whether a POSIX `sh`/`find` is reachable
    /// underneath, in which case commands are escaped and wrapped rather
    /// than handed to `cmd.exe` raw.
    fn classify_cmd_exe(capture: &Path) -> Result<ShellProfile> {
        remove_and_verify(capture)?;
        let wrapped = ShellRunner::new(Redirection::ShViaCmd);
        // Exit status is irrelevant; only the captured bytes matter.
        let _ = wrapped.run_captured("find . -prune", capture);
        let bytes = slurp_file(capture).unwrap_or_default();

        if bytes.len() >= 2 && bytes[0] == b'.' && bytes[1].is_ascii_whitespace() {
            Ok(ShellProfile {
                kind: ShellKind::Posix,
                posix_via_cmd: true,
            })
        } else {
            Ok(ShellProfile {
                kind: ShellKind::CmdExe,
                posix_via_cmd: false,
            })
        }
    }

    pub fn kind(&self) -> ShellKind {
        self.kind
    }

    /// True when the top-level shell is `cmd.exe` but commands run through
    /// a POSIX `sh` after escaping.
    pub fn posix_via_cmd(&self) -> bool {
        self.posix_via_cmd
    }

    /// The local bit bucket.
    pub fn dev_null(&self) -> &'static str {
        match self.kind {
            ShellKind::Posix => "/dev/null",
            ShellKind::CmdExe => "nul",
        }
    }

    pub fn dir_sep(&self) -> &'static str {
        match self.kind {
            ShellKind::Posix => "/",
            ShellKind::CmdExe => "\\",
        }
    }

    /// Prefix for executing a program in the current directory.
    pub fn local_prefix(&self) -> &'static str {
        match self.kind {
            ShellKind::Posix => "./",
            ShellKind::CmdExe => ".\\",
        }
    }

    /// The redirection strategy commands must use under this shell.
    pub fn redirection(&self) -> Redirection {
        if self.posix_via_cmd {
            Redirection::ShViaCmd
        } else {
            Redirection::Direct
        }
    }

    /// A runner configured for this shell.
    pub fn runner(&self) -> ShellRunner {
        ShellRunner::new(self.redirection())
    }

    #[cfg(test)]
    pub(crate) fn fixture(kind: ShellKind, posix_via_cmd: bool) -> ShellProfile {
        ShellProfile {
            kind,
            posix_via_cmd,
        }
    }
}

/// Whether the captured bytes are exactly `expected` plus trailing line
/// whitespace (`\n`, or `\r\n` under cmd.exe).
fn output_line_is(bytes: &[u8], expected: &[u8]) -> bool {
    bytes.starts_with(expected) && bytes[expected.len()..].iter().all(u8::is_ascii_whitespace)
}
