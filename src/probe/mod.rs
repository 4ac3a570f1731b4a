//! Empirical probing of the local shell and C toolchain.
//!
//! Every fact in this module tree is established the same way: run a small
//! trial (a compilation, a shell command) and inspect what actually landed
//! on disk. Probes report in two tiers only. A *fatal* condition is an
//! `Err` and means the pipeline cannot continue: the shell cannot be
//! identified, no argument dialect produces an executable, a trial artifact
//! cannot be deleted before reuse. A *probe-negative* result is an ordinary
//! `Ok(false)` or `None` - a macro that is not defined, a link that does
//! not succeed - and feeds the next branch of detection.

pub mod binfmt;
pub mod compiler;
pub mod library;
pub mod profile;
pub mod shell;

use thiserror::Error;

/// Fatal detection failures.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Neither a POSIX nor a cmd.exe escaping convention explains the
    /// shell's observed behavior.
    #[error("could not identify the local shell from its escaping behavior")]
    ShellUnknown,

    /// The compiler accepted neither MSVC-style nor POSIX-style arguments
    /// for a minimal program, so no further probing is meaningful.
    #[error("`{command}` could not compile a minimal program under any known argument dialect")]
    NoWorkingCompiler { command: String },

    /// The trial executable matches no known magic bytes. Filename and
    /// library-naming rules derive from the format, so this is fatal.
    #[error("could not classify the binary format of `{path}`")]
    UnknownBinaryFormat { path: String },
}
