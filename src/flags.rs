//! Argument-dialect rendering for compiler invocations.
//!
//! The full flags-builder abstraction lives with the downstream build
//! machinery; trial compilation only needs the output-target flags, which
//! are the part that differs between dialects.

/// The family of command-line flag syntax a compiler driver accepts.
///
/// `Posix` and `Msvc` are the generic bootstrap guesses; `Gnu` and `SunC`
/// are refinements applied once compiler identity is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Posix,
    Gnu,
    Msvc,
    SunC,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Posix => "posix",
            Dialect::Gnu => "gnu",
            Dialect::Msvc => "msvc",
            Dialect::SunC => "sun-c",
        }
    }

    /// Flags naming an executable build target.
    pub fn output_exe_flags(&self, exe_file: &str) -> String {
        match self {
            Dialect::Msvc => format!("/Fe{}", exe_file),
            _ => format!("-o {}", exe_file),
        }
    }

    /// Flags compiling to an object-file target without linking.
    pub fn output_obj_flags(&self, obj_file: &str) -> String {
        match self {
            Dialect::Msvc => format!("/c /Fo{}", obj_file),
            _ => format!("-c -o {}", obj_file),
        }
    }
}
