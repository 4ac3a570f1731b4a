//! The aggregate toolchain profile and its detection sequence.

use std::path::Path;

use anyhow::{Context, Result};

use crate::flags::Dialect;
use crate::probe::binfmt::BinaryFormat;
use crate::probe::compiler::{sweep, CompilerIdentity, TrialCompiler, TRY_BASENAME};
use crate::probe::shell::ShellProfile;
use crate::probe::ProbeError;
use crate::util::fs::remove_and_verify;

/// The minimal program every compiler must manage before probing can
/// continue.
const TRIAL_PROGRAM: &str = "int main() { return 0; }\n";

/// Ordered dialect refinement rules, applied exactly once after compiler
/// identity is known. The first matching rule narrows the generic
/// bootstrap guess; the order is the precedence.
const DIALECT_REFINEMENTS: &[(fn(&CompilerIdentity) -> bool, Dialect)] = &[
    (|id| id.is_gcc, Dialect::Gnu),
    (|id| id.is_msvc, Dialect::Msvc),
    (|id| id.is_sun_c, Dialect::SunC),
];

/// Filename extensions derived from a binary format and compiler family.
#[derive(Debug)]
struct Extensions {
    exe: &'static str,
    obj: &'static str,
    shared_lib: &'static str,
    static_lib: &'static str,
    import_lib: &'static str,
}

fn extensions_for(format: BinaryFormat, gcc_family: bool) -> Extensions {
    match format {
        BinaryFormat::Elf => Extensions {
            exe: "",
            obj: ".o",
            shared_lib: ".so",
            static_lib: ".a",
            import_lib: "",
        },
        BinaryFormat::MachO => Extensions {
            exe: "",
            obj: ".o",
            shared_lib: ".dylib",
            static_lib: ".a",
            import_lib: "",
        },
        BinaryFormat::Pe if gcc_family => Extensions {
            exe: ".exe",
            obj: ".o",
            shared_lib: ".dll",
            static_lib: ".a",
            import_lib: ".dll.a",
        },
        BinaryFormat::Pe => Extensions {
            exe: ".exe",
            obj: ".obj",
            shared_lib: ".dll",
            static_lib: ".lib",
            import_lib: ".lib",
        },
    }
}

/// Everything downstream feature probes need to know about the toolchain.
///
/// Constructed once by [`ToolchainProfile::detect`] and read-only
/// thereafter, except for the trial compiler's flag accumulators, which
/// probes scope themselves.
#[derive(Debug)]
pub struct ToolchainProfile {
    trial: TrialCompiler,
    shell: ShellProfile,
    dialect: Dialect,
    binary_format: BinaryFormat,
    identity: CompilerIdentity,
    exts: Extensions,
}

impl ToolchainProfile {
    /// Run the full detection sequence: shell first, then the dialect
    /// bootstrap, binary-format sniff, and identity refinement.
    ///
    /// `scratch` is the directory trial artifacts live in; it must allow
    /// writing, executing, and deleting files.
    pub fn detect(cc_command: &str, base_flags: &str, scratch: &Path) -> Result<ToolchainProfile> {
        let shell = ShellProfile::detect(scratch)?;
        Self::detect_with_shell(cc_command, base_flags, scratch, shell)
    }

    /// [`detect`](Self::detect) with an already-classified shell.
    pub fn detect_with_shell(
        cc_command: &str,
        base_flags: &str,
        scratch: &Path,
        shell: ShellProfile,
    ) -> Result<ToolchainProfile> {
        tracing::info!(compiler = cc_command, "probing toolchain");
        let mut trial = TrialCompiler::new(cc_command, base_flags, shell.clone(), scratch);

        // Bootstrap: before the dialect is known, the only observable
        // signal is whether a given argument style is accepted, so try
        // each in turn against a minimal program.
        let mut dialect = Dialect::Msvc;
        trial.set_dialect(dialect);
        remove_and_verify(&trial.try_exe_path()).context("stale trial executable")?;
        let mut compiled = trial.compile_exe(TRY_BASENAME, TRIAL_PROGRAM)?;
        if compiled {
            trial.set_obj_ext(".obj");
        } else {
            dialect = Dialect::Posix;
            trial.set_dialect(dialect);
            remove_and_verify(&trial.try_exe_path()).context("stale trial executable")?;
            compiled = trial.compile_exe(TRY_BASENAME, TRIAL_PROGRAM)?;
            if compiled {
                trial.set_obj_ext(".o");
            }
        }
        if !compiled {
            return Err(ProbeError::NoWorkingCompiler {
                command: cc_command.to_string(),
            }
            .into());
        }
        tracing::debug!(dialect = dialect.as_str(), "argument dialect accepted");

        let binary_format = BinaryFormat::sniff_file(&trial.try_exe_path())?;
        tracing::info!(format = binary_format.as_str(), "detected binary format");
        sweep(&trial.try_exe_path());

        let mut identity = CompilerIdentity::detect(&trial)?;
        trial.set_msvc_junk_sweep(identity.is_msvc);

        // Refine the generic guess; keep it if no rule matches.
        let dialect = DIALECT_REFINEMENTS
            .iter()
            .find(|(applies, _)| applies(&identity))
            .map(|&(_, refined)| refined)
            .unwrap_or(dialect);
        trial.set_dialect(dialect);

        let exts = extensions_for(binary_format, identity.is_gcc);
        trial.set_exe_ext(exts.exe);
        trial.set_obj_ext(exts.obj);

        if binary_format == BinaryFormat::Pe {
            identity.is_cygwin = trial.has_macro("__CYGWIN__")?;
            identity.is_mingw = trial.has_macro("__MINGW32__")?;
        }

        Ok(ToolchainProfile {
            trial,
            shell,
            dialect,
            binary_format,
            identity,
            exts,
        })
    }

    pub fn cc_command(&self) -> &str {
        self.trial.cc_command()
    }

    pub fn base_flags(&self) -> &str {
        self.trial.base_flags()
    }

    pub fn shell(&self) -> &ShellProfile {
        &self.shell
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn binary_format(&self) -> BinaryFormat {
        self.binary_format
    }

    pub fn identity(&self) -> &CompilerIdentity {
        &self.identity
    }

    /// The trial compiler, for feature probes that need further trial
    /// compiles against this toolchain.
    pub fn trial(&self) -> &TrialCompiler {
        &self.trial
    }

    /// Mutable access for the extra/temp flag accumulators.
    pub fn trial_mut(&mut self) -> &mut TrialCompiler {
        &mut self.trial
    }

    pub fn exe_ext(&self) -> &'static str {
        self.exts.exe
    }

    pub fn obj_ext(&self) -> &'static str {
        self.exts.obj
    }

    pub fn shared_lib_ext(&self) -> &'static str {
        self.exts.shared_lib
    }

    pub fn static_lib_ext(&self) -> &'static str {
        self.exts.static_lib
    }

    pub fn import_lib_ext(&self) -> &'static str {
        self.exts.import_lib
    }

    /// The command that links executables: MSVC splits compiling and
    /// linking, everyone else's driver does both.
    pub fn link_command(&self) -> &str {
        if self.identity.is_msvc {
            "link"
        } else {
            self.trial.cc_command()
        }
    }

    /// Render the command that creates a static library from `objects`.
    pub fn archiver_command(&self, target: &str, objects: &str) -> String {
        if self.identity.is_msvc {
            format!("lib /NOLOGO {objects} /OUT:{target}")
        } else {
            format!("ar rcs {target} {objects}")
        }
    }

    /// MSVC's `lib` maintains the symbol index itself, so there is no
    /// ranlib step.
    pub fn ranlib_command(&self, target: &str) -> Option<String> {
        if self.identity.is_msvc {
            None
        } else {
            Some(format!("ranlib {target}"))
        }
    }

    /// Platform-correct shared library filename, optionally embedding a
    /// version per the binary format's convention.
    pub fn shared_lib_filename(&self, dir: &str, basename: &str, version: Option<&str>) -> String {
        // Cygwin names its shared libraries with a "cyg" prefix.
        let prefix = if self.identity.is_msvc {
            ""
        } else if self.identity.is_cygwin {
            "cyg"
        } else {
            "lib"
        };
        self.build_lib_filename(dir, prefix, basename, version, self.exts.shared_lib)
    }

    /// Import library filename (PE formats only; the extension differs
    /// between GCC-family and MSVC-family toolchains).
    pub fn import_lib_filename(&self, dir: &str, basename: &str, version: Option<&str>) -> String {
        let prefix = if self.identity.is_msvc { "" } else { "lib" };
        self.build_lib_filename(dir, prefix, basename, version, self.exts.import_lib)
    }

    /// MSVC linker export file.
    pub fn export_filename(&self, dir: &str, basename: &str, version: Option<&str>) -> String {
        self.build_lib_filename(dir, "", basename, version, ".exp")
    }

    pub fn static_lib_filename(&self, dir: &str, basename: &str) -> String {
        let prefix = if self.identity.is_msvc { "" } else { "lib" };
        self.build_lib_filename(dir, prefix, basename, None, self.exts.static_lib)
    }

    /// Version embedding differs per format: ELF appends `.N` after the
    /// extension, Mach-O inserts `.N` before it, PE inserts `-N`.
    fn build_lib_filename(
        &self,
        dir: &str,
        prefix: &str,
        basename: &str,
        version: Option<&str>,
        ext: &str,
    ) -> String {
        let suffix = match version {
            None => ext.to_string(),
            Some(v) => match self.binary_format {
                BinaryFormat::Pe => format!("-{v}{ext}"),
                BinaryFormat::MachO => format!(".{v}{ext}"),
                BinaryFormat::Elf => format!("{ext}.{v}"),
            },
        };

        if dir.is_empty() || dir == "." {
            format!("{prefix}{basename}{suffix}")
        } else {
            format!("{dir}{}{prefix}{basename}{suffix}", self.shell.dir_sep())
        }
    }

    #[cfg(test)]
    pub(crate) fn fixture(
        binary_format: BinaryFormat,
        identity: CompilerIdentity,
        dialect: Dialect,
    ) -> ToolchainProfile {
        use crate::probe::shell::ShellKind;

        let shell = ShellProfile::fixture(ShellKind::Posix, false);
        let mut trial = TrialCompiler::new("cc", "", shell.clone(), ".");
        trial.set_dialect(dialect);
        let exts = extensions_for(binary_format, identity.is_gcc);
        trial.set_exe_ext(exts.exe);
        trial.set_obj_ext(exts.obj);
        ToolchainProfile {
            trial,
            shell,
            dialect,
            binary_format,
            identity,
            exts,
        }
    }
}
