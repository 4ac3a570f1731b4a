//! End-to-end detection tests against fake and live compilers.
//!
//! The fake compilers are shell scripts that accept exactly one argument
//! dialect and emit a canned binary image, which lets the bootstrap,
//! binary-format, and identity stages run for real without depending on
//! what is installed.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use soundings::{BinaryFormat, Dialect, ProbeError, ShellKind, ShellProfile, ToolchainProfile};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A minimal synthetic PE image: MZ stub, header offset at 0x3C, PE
/// signature at 0x40.
fn pe_image() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x44];
    bytes[0] = b'M';
    bytes[1] = b'Z';
    bytes[0x3C..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    bytes[0x40..0x44].copy_from_slice(b"PE\0\0");
    bytes
}

fn elf_image() -> Vec<u8> {
    let mut bytes = b"\x7FELF".to_vec();
    bytes.extend_from_slice(&[0u8; 12]);
    bytes
}

/// Fake `cl`: accepts only MSVC-style arguments, defines `_MSC_VER`, and
/// emits a PE image.
fn msvc_only_compiler(dir: &Path) -> PathBuf {
    let payload = dir.join("pe_payload.bin");
    fs::write(&payload, pe_image()).unwrap();
    let body = format!(
        r#"#!/bin/sh
out=""
mode=""
src=""
for a in "$@"; do
  case "$a" in
    /Fe*) mode=exe; out="${{a#/Fe}}" ;;
    /Fo*) mode=obj; out="${{a#/Fo}}" ;;
    /c) ;;
    -*) exit 2 ;;
    *.c) src="$a" ;;
  esac
done
[ -n "$out" ] || exit 2
if [ "$mode" = "obj" ]; then
  grep -q "_MSC_VER" "$src" || exit 1
fi
cp "{payload}" "$out"
"#,
        payload = payload.display()
    );
    write_script(dir, "fake_cl", &body)
}

/// Fake POSIX-only compiler emitting an ELF image. `defines` is grep'd in
/// the trial source to decide which macro probes succeed.
fn posix_only_compiler(dir: &Path, name: &str, defines: Option<&str>) -> PathBuf {
    let payload = dir.join(format!("{name}_payload.bin"));
    fs::write(&payload, elf_image()).unwrap();
    let gate = match defines {
        Some(macro_name) => format!(r#"grep -q "{macro_name}" "$src" || exit 1"#),
        None => "exit 1".to_string(),
    };
    let body = format!(
        r#"#!/bin/sh
out=""
mode=""
src=""
while [ $# -gt 0 ]; do
  case "$1" in
    /Fe*|/Fo*|/c) exit 2 ;;
    -c) mode=obj ;;
    -o) shift; out="$1" ;;
    *.c) src="$1" ;;
  esac
  shift
done
[ -n "$out" ] || exit 2
if [ "$mode" = "obj" ]; then
  {gate}
fi
cp "{payload}" "$out"
"#,
        payload = payload.display()
    );
    write_script(dir, name, &body)
}

#[test]
fn msvc_only_compiler_locks_msvc_dialect() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let cc = msvc_only_compiler(tmp.path());

    let profile =
        ToolchainProfile::detect(&cc.display().to_string(), "", tmp.path()).unwrap();

    assert_eq!(profile.dialect(), Dialect::Msvc);
    assert_eq!(profile.binary_format(), BinaryFormat::Pe);
    assert!(profile.identity().is_msvc);
    assert!(!profile.identity().is_gcc);
    assert!(!profile.identity().is_cygwin);
    assert_eq!(profile.exe_ext(), ".exe");
    assert_eq!(profile.obj_ext(), ".obj");
    assert_eq!(profile.static_lib_ext(), ".lib");
    assert_eq!(
        profile.shared_lib_filename(".", "foo", Some("3")),
        "foo-3.dll"
    );
    assert_eq!(profile.link_command(), "link");
    assert!(profile
        .archiver_command("foo.lib", "a.obj")
        .contains("/NOLOGO"));
    assert_eq!(profile.ranlib_command("foo.lib"), None);
}

#[test]
fn posix_only_compiler_locks_posix_dialect() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let cc = posix_only_compiler(tmp.path(), "fake_cc", None);

    let profile =
        ToolchainProfile::detect(&cc.display().to_string(), "", tmp.path()).unwrap();

    // No identity macro is defined, so the generic POSIX guess stands.
    assert_eq!(profile.dialect(), Dialect::Posix);
    assert_eq!(profile.binary_format(), BinaryFormat::Elf);
    assert_eq!(*profile.identity(), Default::default());
    assert_eq!(profile.exe_ext(), "");
    assert_eq!(profile.obj_ext(), ".o");
    assert_eq!(profile.shared_lib_ext(), ".so");
    assert_eq!(
        profile.shared_lib_filename(".", "foo", Some("3")),
        "libfoo.so.3"
    );
    assert_eq!(
        profile.archiver_command("libfoo.a", "a.o"),
        "ar rcs libfoo.a a.o"
    );
    assert_eq!(
        profile.ranlib_command("libfoo.a").as_deref(),
        Some("ranlib libfoo.a")
    );
}

#[test]
fn gcc_identity_refines_dialect_to_gnu() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let cc = posix_only_compiler(tmp.path(), "fake_gcc", Some("__GNUC__"));

    let profile =
        ToolchainProfile::detect(&cc.display().to_string(), "", tmp.path()).unwrap();

    assert_eq!(profile.dialect(), Dialect::Gnu);
    assert!(profile.identity().is_gcc);
    assert!(!profile.identity().is_clang);
    assert_eq!(profile.binary_format(), BinaryFormat::Elf);
}

#[test]
fn compiler_accepting_no_dialect_is_fatal() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let cc = write_script(tmp.path(), "fake_broken", "#!/bin/sh\nexit 1\n");

    let err =
        ToolchainProfile::detect(&cc.display().to_string(), "", tmp.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProbeError>(),
        Some(ProbeError::NoWorkingCompiler { .. })
    ));
}

#[test]
fn scratch_directory_is_left_clean() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let scratch = tmp.path().join("scratch");
    fs::create_dir(&scratch).unwrap();
    let cc = posix_only_compiler(tmp.path(), "fake_cc", None);

    ToolchainProfile::detect(&cc.display().to_string(), "", &scratch).unwrap();

    let leftovers: Vec<_> = fs::read_dir(&scratch)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "leftover trial files: {leftovers:?}");
}

#[test]
fn live_compiler_round_trip() {
    init_logging();
    let Some(cc) = soundings::util::process::find_c_compiler() else {
        eprintln!("no C compiler installed; skipping");
        return;
    };
    let tmp = TempDir::new().unwrap();

    let shell = ShellProfile::detect(tmp.path()).unwrap();
    assert_eq!(shell.kind(), ShellKind::Posix);

    let profile = ToolchainProfile::detect_with_shell(
        &cc.display().to_string(),
        "",
        tmp.path(),
        shell,
    )
    .unwrap();

    // Any Unix compiler reachable here produces ELF or Mach-O and takes
    // POSIX-style flags.
    assert!(matches!(
        profile.binary_format(),
        BinaryFormat::Elf | BinaryFormat::MachO
    ));
    assert_eq!(profile.exe_ext(), "");
    assert_eq!(profile.obj_ext(), ".o");
    assert!(matches!(profile.dialect(), Dialect::Posix | Dialect::Gnu));

    let trial = profile.trial();
    assert!(trial.test_compile("int trial_value = 1;\n").unwrap());
    assert!(!trial.test_compile("this is not C\n").unwrap());
    assert!(trial
        .test_link("int main() { return 0; }\n")
        .unwrap());
    assert!(!trial.has_macro("__SOUNDINGS_NOT_A_MACRO__").unwrap());

    let output = trial
        .capture_output(
            "#include <stdio.h>\n\
             int main() { printf(\"sounding\"); return 0; }\n",
        )
        .unwrap();
    assert_eq!(output.as_deref(), Some(b"sounding".as_slice()));
}
