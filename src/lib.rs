//! Soundings - empirical probing of the local C toolchain and shell.
//!
//! Before a larger build can proceed, it must know facts about the local
//! C compiler and shell that cannot be read from any configuration file:
//! which command-line dialect the compiler accepts, what binary format it
//! produces, how executables and libraries are named, and how the invoking
//! shell quotes and redirects. This crate answers those questions by
//! compiling, linking, and running small trial programs and inspecting
//! their artifacts and output.
//!
//! The entry point is [`ToolchainProfile::detect`], which runs the whole
//! sequence: shell detection first, then the argument-dialect bootstrap,
//! binary-format sniffing, and known-compiler identification. The resulting
//! profile is read-only configuration for downstream feature probes.

pub mod flags;
pub mod probe;
pub mod util;

pub use flags::Dialect;
pub use probe::binfmt::BinaryFormat;
pub use probe::compiler::{CompilerIdentity, TrialCompiler};
pub use probe::library::SharedLib;
pub use probe::profile::ToolchainProfile;
pub use probe::shell::{ShellKind, ShellProfile};
pub use probe::ProbeError;
