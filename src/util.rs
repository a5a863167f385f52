//! Utilities used in this crate.
//!
//! This is not part of the public interface of the crate.

use crate::{Error, Result};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Print a hexdump of buffer in memory.
pub fn hexdump(buf: &[u8]) -> String {
    let step = 32;
    let lines: Vec<String> = (0..buf.len())
        .step_by(step)
        .map(|i| {
            let bytes: Vec<String> = (i..std::cmp::min(buf.len(), i + step))
                .map(|x| format!("{:02X}", buf[x]))
                .collect();
            format!("+{:#06x}\t\t{}", i, bytes.join(" "))
        })
        .collect();
    lines.join("\n")
}

/// Convert a name to a C string, rejecting interior NULs.
pub fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidName(name.to_string()))
}

/// Read a NUL terminated name out of a fixed size buffer filled by PAPI.
pub fn buf_to_string(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|c| **c != 0)
        .map(|c| *c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copy a C string owned by PAPI. `None` for a null pointer.
///
/// # Safety
/// A non-null `ptr` must point to a NUL terminated string.
pub unsafe fn ptr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

macro_rules! builder_pattern_some {
    ($(#[$outer:meta])* $var_name: ident : $var_type: ty) => {
        $(#[$outer])*
        pub fn $var_name(mut self, $var_name: $var_type) -> Self {
            self.$var_name = Some($var_name);
            self
        }
    };
}

macro_rules! builder_pattern_bool {
    ($(#[$outer:meta])* $var_name: ident) => {
        builder_pattern_bool!($(#[$outer])* $var_name => $var_name);
    };
    ($(#[$outer:meta])* $name: ident => $var_name: ident) => {
        $(#[$outer])*
        pub fn $name(mut self) -> Self {
            self.$var_name = true;
            self
        }
    };
}
