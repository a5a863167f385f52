use crate::Result;
use derive_more::Display;
use lazy_static::lazy_static;
use log::debug;
use nix::libc::c_int;
use regex::Regex;
use std::path::Path;
use std::process::Command;

lazy_static! {
    static ref SONAME_RE: Regex =
        Regex::new(r"libpapi\.so\.(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?").unwrap();
    static ref TOOL_RE: Regex =
        Regex::new(r"PAPI [Vv]ersion:?\s*(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?").unwrap();
    static ref PLAIN_RE: Regex =
        Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?$").unwrap();
}

/// A PAPI release, `major.minor.revision.increment`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display(fmt = "{}.{}.{}.{}", major, minor, revision, increment)]
pub struct PapiVersion {
    major: u8,
    minor: u8,
    revision: u8,
    increment: u8,
}

impl Default for PapiVersion {
    /// PAPI 7.0, the release the record layouts in this crate follow.
    fn default() -> Self {
        PapiVersion::new(7, 0, 0, 0)
    }
}

impl PapiVersion {
    /// Create a new PapiVersion structure directly.
    pub fn new(major: u8, minor: u8, revision: u8, increment: u8) -> Self {
        PapiVersion {
            major,
            minor,
            revision,
            increment,
        }
    }

    /// Unpack a `PAPI_VERSION_NUMBER`.
    pub fn from_number(number: c_int) -> Self {
        let n = number as u32;
        PapiVersion::new((n >> 24) as u8, (n >> 16) as u8, (n >> 8) as u8, n as u8)
    }

    /// Equivalent of the `PAPI_VERSION_NUMBER` macro.
    pub fn number(&self) -> c_int {
        (u32::from(self.major) << 24
            | u32::from(self.minor) << 16
            | u32::from(self.revision) << 8
            | u32::from(self.increment)) as c_int
    }

    /// Equivalent of `PAPI_VER_CURRENT`: the number without revision and increment.
    ///
    /// This is the value handed to `PAPI_library_init`.
    pub fn ver_current(&self) -> c_int {
        (self.number() as u32 & 0xFFFF_0000) as c_int
    }

    /// Get major version.
    #[inline]
    pub fn major(&self) -> u8 {
        self.major
    }

    /// Get minor version.
    #[inline]
    pub fn minor(&self) -> u8 {
        self.minor
    }

    /// Parse `7`, `7.1` or `7.1.0.0`.
    pub fn parse(text: &str) -> Option<Self> {
        PLAIN_RE.captures(text.trim()).and_then(|c| from_captures(&c))
    }

    /// Read the version out of a library file name such as `libpapi.so.7.1.0.0`.
    ///
    /// Symbolic links are followed, so `libpapi.so` resolves to the versioned file.
    pub fn from_soname(path: &Path) -> Option<Self> {
        let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        [target.as_path(), path].iter().find_map(|p| {
            let name = p.file_name()?.to_str()?;
            SONAME_RE.captures(name).and_then(|c| from_captures(&c))
        })
    }

    /// Create the version structure by parsing the output of the `papi_version` command.
    pub fn get_details_from_tool() -> Result<Self> {
        let output = Command::new("papi_version").output()?.stdout;
        let text = std::str::from_utf8(output.as_slice())?;
        debug!("papi_version reported {:?}", text.trim());
        Ok(TOOL_RE
            .captures(text)
            .and_then(|c| from_captures(&c))
            .unwrap_or_default())
    }
}

fn from_captures(caps: &regex::Captures) -> Option<PapiVersion> {
    let part = |i: usize| -> Option<u8> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<u8>().ok(),
            None => Some(0),
        }
    };
    Some(PapiVersion::new(part(1)?, part(2)?, part(3)?, part(4)?))
}
