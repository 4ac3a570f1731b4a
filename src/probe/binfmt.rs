//! Binary format sniffing.
//!
//! The format of a successfully built trial executable is classified from
//! its raw magic bytes. Filename extensions and library-naming rules all
//! derive from the result, so an unrecognized format is fatal.

use std::path::Path;

use anyhow::Result;

use crate::probe::ProbeError;
use crate::util::fs::slurp_file;

/// Executable container formats the engine can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Elf,
    MachO,
    Pe,
}

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

const MACHO_MAGICS: [[u8; 4]; 5] = [
    [0xCA, 0xFE, 0xBA, 0xBE], // fat binary
    [0xFE, 0xED, 0xFA, 0xCE], // 32-bit big endian
    [0xFE, 0xED, 0xFA, 0xCF], // 64-bit big endian
    [0xCE, 0xFA, 0xED, 0xFE], // 32-bit little endian
    [0xCF, 0xFA, 0xED, 0xFE], // 64-bit little endian
];

/// Offset of the PE header pointer inside the MS-DOS stub.
const PE_HEADER_OFF_FIELD: usize = 0x3C;

impl BinaryFormat {
    /// Classify raw executable bytes by their magic numbers.
    ///
    /// The signatures are mutually exclusive, so the check order only
    /// affects efficiency, never the outcome. Returns `None` for anything
    /// unrecognized.
    pub fn classify(bytes: &[u8]) -> Option<BinaryFormat> {
        if bytes.len() >= 4 && bytes[..4] == ELF_MAGIC {
            return Some(BinaryFormat::Elf);
        }

        if bytes.len() >= 4 && MACHO_MAGICS.iter().any(|magic| &bytes[..4] == magic) {
            return Some(BinaryFormat::MachO);
        }

        if bytes.len() >= PE_HEADER_OFF_FIELD + 4 && bytes.starts_with(b"MZ") {
            let off = u32::from_le_bytes([
                bytes[PE_HEADER_OFF_FIELD],
                bytes[PE_HEADER_OFF_FIELD + 1],
                bytes[PE_HEADER_OFF_FIELD + 2],
                bytes[PE_HEADER_OFF_FIELD + 3],
            ]) as usize;
            // The stub offset is attacker-ish input: it may point past the
            // end of the file, so every read is bounds-checked.
            if let Some(header) = off.checked_add(4).and_then(|end| bytes.get(off..end)) {
                if header == b"PE\0\0" {
                    return Some(BinaryFormat::Pe);
                }
            }
        }

        None
    }

    /// Classify a trial executable on disk.
    pub fn sniff_file(path: &Path) -> Result<BinaryFormat> {
        let bytes = slurp_file(path)?;
        Self::classify(&bytes).ok_or_else(|| {
            ProbeError::UnknownBinaryFormat {
                path: path.display().to_string(),
            }
            .into()
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryFormat::Elf => "ELF",
            BinaryFormat::MachO => "Mach-O",
            BinaryFormat::Pe => "Portable Executable",
        }
    }
}
