//! Versioned shared-library naming.

use crate::probe::profile::ToolchainProfile;

/// A shared library identified by name and version, whose on-disk
/// filenames follow the detected binary format's conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLib {
    name: String,
    version: String,
    major_version: String,
}

impl SharedLib {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        major_version: impl Into<String>,
    ) -> Self {
        SharedLib {
            name: name.into(),
            version: version.into(),
            major_version: major_version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn major_version(&self) -> &str {
        &self.major_version
    }

    /// The installed filename. DLLs embed only the major version; ELF and
    /// Mach-O embed the full version string.
    pub fn filename(&self, profile: &ToolchainProfile) -> String {
        if profile.shared_lib_ext() == ".dll" {
            profile.shared_lib_filename("", &self.name, Some(&self.major_version))
        } else {
            profile.shared_lib_filename("", &self.name, Some(&self.version))
        }
    }

    /// The major-version filename, i.e. the soname-style link target.
    pub fn major_version_filename(&self, profile: &ToolchainProfile) -> String {
        profile.shared_lib_filename("", &self.name, Some(&self.major_version))
    }

    /// The unversioned development link name.
    pub fn no_version_filename(&self, profile: &ToolchainProfile) -> String {
        profile.shared_lib_filename("", &self.name, None)
    }

    /// Import library filename (PE only).
    pub fn implib_filename(&self, profile: &ToolchainProfile) -> String {
        profile.import_lib_filename("", &self.name, Some(&self.major_version))
    }

    /// Linker export file (MSVC only).
    pub fn export_filename(&self, profile: &ToolchainProfile) -> String {
        profile.export_filename("", &self.name, Some(&self.major_version))
    }
}
