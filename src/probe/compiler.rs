//! Trial compilation and compiler identity probes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::flags::Dialect;
use crate::probe::shell::ShellProfile;
use crate::util::fs::{can_open_file, remove_and_verify, slurp_file, write_file};
use crate::util::process::CaptureRunner;

/// Fixed trial source filename, reused across all probes.
pub const TRY_SOURCE_NAME: &str = "_soundings_try.c";
/// Fixed basename of trial executables and objects.
pub const TRY_BASENAME: &str = "_soundings_try";
/// Fixed capture filename for output of trial programs.
pub const TARGET_NAME: &str = "_soundings_target";

/// Compiles short throwaway programs to observe whether the attempt
/// succeeds.
///
/// Success is judged purely by whether the expected artifact exists
/// afterward. Exit codes are deliberately ignored: some compilers return
/// zero on failure modes and some wrappers return nonzero on success, but
/// the artifact on disk never lies.
///
/// Each trial reuses fixed filenames under an explicit scratch directory;
/// every name is remove-and-verified before use so one probe cannot
/// contaminate the next.
#[derive(Debug)]
pub struct TrialCompiler {
    cc_command: String,
    base_flags: String,
    shell: ShellProfile,
    scratch: PathBuf,
    dialect: Dialect,
    exe_ext: &'static str,
    obj_ext: &'static str,
    msvc_junk_sweep: bool,
    extra_flags: Vec<String>,
    temp_flags: Vec<String>,
}

impl TrialCompiler {
    /// Create a trial compiler that has not yet been through the dialect
    /// bootstrap.
    ///
    /// The executable extension starts as a provisional `.exe`: POSIX
    /// compilers are happy to emit `foo.exe` when told to, while MSVC
    /// insists on it, so the bootstrap trial works for both dialects.
    pub fn new(
        cc_command: impl Into<String>,
        base_flags: impl Into<String>,
        shell: ShellProfile,
        scratch: impl Into<PathBuf>,
    ) -> Self {
        TrialCompiler {
            cc_command: cc_command.into(),
            base_flags: base_flags.into(),
            shell,
            scratch: scratch.into(),
            dialect: Dialect::Posix,
            exe_ext: ".exe",
            obj_ext: ".o",
            msvc_junk_sweep: false,
            extra_flags: Vec::new(),
            temp_flags: Vec::new(),
        }
    }

    pub fn cc_command(&self) -> &str {
        &self.cc_command
    }

    pub fn base_flags(&self) -> &str {
        &self.base_flags
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn exe_ext(&self) -> &'static str {
        self.exe_ext
    }

    pub fn obj_ext(&self) -> &'static str {
        self.obj_ext
    }

    pub(crate) fn set_dialect(&mut self, dialect: Dialect) {
        self.dialect = dialect;
    }

    pub(crate) fn set_exe_ext(&mut self, ext: &'static str) {
        self.exe_ext = ext;
    }

    pub(crate) fn set_obj_ext(&mut self, ext: &'static str) {
        self.obj_ext = ext;
    }

    pub(crate) fn set_msvc_junk_sweep(&mut self, sweep: bool) {
        self.msvc_junk_sweep = sweep;
    }

    /// Path the next executable trial will produce.
    pub fn try_exe_path(&self) -> PathBuf {
        self.scratch.join(format!("{TRY_BASENAME}{}", self.exe_ext))
    }

    /// Path the next object trial will produce.
    pub fn try_obj_path(&self) -> PathBuf {
        self.scratch.join(format!("{TRY_BASENAME}{}", self.obj_ext))
    }

    fn source_path(&self) -> PathBuf {
        self.scratch.join(TRY_SOURCE_NAME)
    }

    fn target_path(&self) -> PathBuf {
        self.scratch.join(TARGET_NAME)
    }

    /// Append a flag that persists across subsequent trials.
    pub fn push_extra_flag(&mut self, flag: impl Into<String>) {
        self.extra_flags.push(flag.into());
    }

    /// Append a flag scoped to the caller's current trial; the caller
    /// clears it afterward.
    pub fn push_temp_flag(&mut self, flag: impl Into<String>) {
        self.temp_flags.push(flag.into());
    }

    pub fn clear_extra_flags(&mut self) {
        self.extra_flags.clear();
    }

    pub fn clear_temp_flags(&mut self) {
        self.temp_flags.clear();
    }

    /// Write `code` to the trial source path and run one compiler
    /// invocation against it, quietly.
    fn run_trial(&self, code: &str, output_flags: &str) -> Result<()> {
        let source = self.source_path();
        write_file(&source, code)?;

        let source_str = source.display().to_string();
        let extra = self.extra_flags.join(" ");
        let temp = self.temp_flags.join(" ");
        let command = join_command(&[
            &self.cc_command,
            &self.base_flags,
            &source_str,
            &extra,
            &temp,
            output_flags,
        ]);

        // A nonzero status is not a failure signal; only the artifact is.
        let _ = self
            .shell
            .runner()
            .run_captured(&command, Path::new(self.shell.dev_null()))?;
        Ok(())
    }

    /// Compile `code` into an executable named from `basename` plus the
    /// current executable extension. `Ok(false)` means the compiler
    /// declined; `Err` means the engine itself cannot continue safely.
    pub fn compile_exe(&self, basename: &str, code: &str) -> Result<bool> {
        let exe_file = self.scratch.join(format!("{basename}{}", self.exe_ext));
        let output_flags = self.dialect.output_exe_flags(&exe_file.display().to_string());
        self.run_trial(code, &output_flags)?;

        if self.msvc_junk_sweep {
            // cl drops ancillary build junk next to the exe; none of it is
            // part of the contract artifact.
            for ext in [".obj", ".ilk", ".pdb"] {
                let junk = self.scratch.join(format!("{basename}{ext}"));
                if let Err(err) = remove_and_verify(&junk) {
                    tracing::warn!(%err, "failed to sweep MSVC build junk");
                }
            }
        }

        let succeeded = can_open_file(&exe_file);
        // A leftover trial source would corrupt the next trial.
        remove_and_verify(&self.source_path())
            .context("failed to remove trial source after compilation")?;
        Ok(succeeded)
    }

    /// Compile `code` to an object file, without linking.
    pub fn compile_obj(&self, basename: &str, code: &str) -> Result<bool> {
        let obj_file = self.scratch.join(format!("{basename}{}", self.obj_ext));
        let output_flags = self.dialect.output_obj_flags(&obj_file.display().to_string());
        self.run_trial(code, &output_flags)?;

        let succeeded = can_open_file(&obj_file);
        remove_and_verify(&self.source_path())
            .context("failed to remove trial source after compilation")?;
        Ok(succeeded)
    }

    /// Whether `code` compiles to an object file. A negative result is a
    /// signal, not an error.
    pub fn test_compile(&self, code: &str) -> Result<bool> {
        let obj = self.try_obj_path();
        remove_and_verify(&obj).context("stale trial object")?;
        let succeeded = self.compile_obj(TRY_BASENAME, code)?;
        sweep(&obj);
        Ok(succeeded)
    }

    /// Whether `code` compiles and links into an executable.
    pub fn test_link(&self, code: &str) -> Result<bool> {
        let exe = self.try_exe_path();
        remove_and_verify(&exe).context("stale trial executable")?;
        let succeeded = self.compile_exe(TRY_BASENAME, code)?;
        sweep(&exe);
        Ok(succeeded)
    }

    /// Compile `code`, run the resulting program locally with output
    /// redirected to the fixed target path, and return the captured bytes.
    /// `None` when the program would not build.
    pub fn capture_output(&self, code: &str) -> Result<Option<Vec<u8>>> {
        let exe = self.try_exe_path();
        let target = self.target_path();
        remove_and_verify(&exe).context("stale trial executable")?;
        remove_and_verify(&target).context("stale trial capture")?;

        let mut captured = None;
        if self.compile_exe(TRY_BASENAME, code)? {
            let command = format!(
                "{}{TRY_BASENAME}{}",
                self.shell.local_prefix(),
                self.exe_ext
            );
            let runner = self.shell.runner().with_cwd(&self.scratch);
            let _ = runner.run_captured(&command, &target)?;
            captured = Some(slurp_file(&target)?);
        }

        sweep(&exe);
        sweep(&target);
        Ok(captured)
    }

    /// Whether the preprocessor defines `macro_name`, via a trial compile
    /// that `#error`s out unless it does.
    pub fn has_macro(&self, macro_name: &str) -> Result<bool> {
        let code = format!(
            "#ifdef {macro_name}\n\
             int i;\n\
             #else\n\
             #error \"nope\"\n\
             #endif\n"
        );
        self.test_compile(&code)
    }

    /// Evaluate a numeric preprocessor expression against `predicate`
    /// using the same error-trap template, e.g.
    /// `test_macro_expr("_MSC_VER", ">= 1800")`.
    pub fn test_macro_expr(&self, expression: &str, predicate: &str) -> Result<bool> {
        let code = format!(
            "#if ({expression}) {predicate}\n\
             int i;\n\
             #else\n\
             #error \"nope\"\n\
             #endif\n"
        );
        self.test_compile(&code)
    }

    /// Compare the combined GCC version number, e.g. `">= 40900"`.
    pub fn test_gcc_version(&self, predicate: &str) -> Result<bool> {
        const GCC_VERSION: &str =
            "10000 * __GNUC__ + 100 * __GNUC_MINOR__ + __GNUC_PATCHLEVEL__";
        self.test_macro_expr(GCC_VERSION, predicate)
    }

    pub fn test_msvc_version(&self, predicate: &str) -> Result<bool> {
        self.test_macro_expr("_MSC_VER", predicate)
    }

    pub fn test_sun_c_version(&self, predicate: &str) -> Result<bool> {
        self.test_macro_expr("__SUNPRO_C", predicate)
    }
}

/// Post-trial cleanup of an already-judged artifact. The next probe
/// re-verifies the name before reuse, so failure here is only logged.
pub(crate) fn sweep(path: &Path) {
    if let Err(err) = remove_and_verify(path) {
        tracing::warn!(%err, "failed to sweep trial artifact");
    }
}

fn join_command(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Independently probed compiler identity facts.
///
/// These are not a single enum because several can hold at once: Clang
/// commonly defines `__GNUC__` as well as `__clang__`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompilerIdentity {
    pub is_gcc: bool,
    pub is_clang: bool,
    pub is_msvc: bool,
    pub is_sun_c: bool,
    pub is_cygwin: bool,
    pub is_mingw: bool,
}

impl CompilerIdentity {
    /// Probe the macros that give known compilers away.
    ///
    /// Cygwin and MinGW are only meaningful for PE output and are probed
    /// later, once the binary format is known.
    pub fn detect(trial: &TrialCompiler) -> Result<CompilerIdentity> {
        let identity = CompilerIdentity {
            is_gcc: trial.has_macro("__GNUC__")?,
            is_msvc: trial.has_macro("_MSC_VER")?,
            is_clang: trial.has_macro("__clang__")?,
            is_sun_c: trial.has_macro("__SUNPRO_C")?,
            is_cygwin: false,
            is_mingw: false,
        };
        tracing::debug!(?identity, "probed known-compiler macros");
        Ok(identity)
    }
}
