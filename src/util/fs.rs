//! Filesystem utilities for probe scratch files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::util::retry::{retry_for, DEFAULT_BUDGET};

/// Number of random characters appended when renaming a file before
/// deletion.
const RENAME_SUFFIX_LEN: usize = 16;

/// Delete `path` and verify that it is gone, tolerating transient locks
/// held by other processes.
///
/// On Windows an antivirus scanner or a lingering handle can make a single
/// `remove_file` call unreliable, and can also make recreating a file under
/// the same name fail. The file is therefore first renamed to a random
/// name, then removed, with both steps polled under a bounded wall-clock
/// budget. A missing file counts as success.
pub fn remove_and_verify(path: &Path) -> Result<()> {
    remove_with_budget(path, DEFAULT_BUDGET)
}

/// [`remove_and_verify`] with an explicit time budget.
pub fn remove_with_budget(path: &Path, budget: Duration) -> Result<()> {
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to stat: {}", path.display()));
        }
        Ok(_) => {}
    }

    let decoy = decoy_name(path);
    let renamed = retry_for(budget, || fs::rename(path, &decoy).is_ok());
    let doomed: &Path = if renamed { &decoy } else { path };

    let removed = retry_for(budget, || match fs::remove_file(doomed) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(_) => false,
    });
    if !removed {
        bail!(
            "failed to remove {} within {:.1}s",
            path.display(),
            budget.as_secs_f64()
        );
    }
    Ok(())
}

/// The target's name with a random alphanumeric suffix, in the same
/// directory.
fn decoy_name(path: &Path) -> PathBuf {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RENAME_SUFFIX_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect();
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Read a file's raw bytes, with nice error messages.
pub fn slurp_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, overwriting any previous contents.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Whether a file exists and can be opened for reading.
///
/// This is the ground truth used to judge trial compilations: exit codes
/// are unreliable across compiler drivers, existence of the artifact is
/// not.
pub fn can_open_file(path: &Path) -> bool {
    fs::File::open(path).is_ok()
}
