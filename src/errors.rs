//! Utilities dealing with error handling in this crate.

use derive_more::Display;
use failure::Fail;
use nix::libc::c_int;

/// Named failure conditions reported by PAPI through negative status codes.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PapiError {
    /// `PAPI_EINVAL`
    #[display(fmt = "Invalid argument")]
    InvalidArgument,
    /// `PAPI_ENOMEM`
    #[display(fmt = "Insufficient memory")]
    NoMemory,
    /// `PAPI_ESYS`
    #[display(fmt = "A System/C library call failed")]
    System,
    /// `PAPI_ECMP`
    #[display(fmt = "Not supported by component")]
    Component,
    /// `PAPI_ECLOST`
    #[display(fmt = "Access to the counters was lost or interrupted")]
    CountersLost,
    /// `PAPI_EBUG`
    #[display(fmt = "Internal error in PAPI")]
    Bug,
    /// `PAPI_ENOEVNT`
    #[display(fmt = "Event does not exist")]
    NoEvent,
    /// `PAPI_ECNFLCT`
    #[display(fmt = "Event exists, but cannot be counted due to counter resource limitations")]
    Conflict,
    /// `PAPI_ENOTRUN`
    #[display(fmt = "EventSet is currently not running")]
    NotRunning,
    /// `PAPI_EISRUN`
    #[display(fmt = "EventSet is currently counting")]
    IsRunning,
    /// `PAPI_ENOEVST`
    #[display(fmt = "No such EventSet available")]
    NoEventSet,
    /// `PAPI_ENOTPRESET`
    #[display(fmt = "Event in argument is not a valid preset")]
    NotPreset,
    /// `PAPI_ENOCNTR`
    #[display(fmt = "Hardware does not support performance counters")]
    NoCounters,
    /// `PAPI_EMISC`
    #[display(fmt = "Unknown error code")]
    Misc,
    /// `PAPI_EPERM`
    #[display(fmt = "Permission level does not permit operation")]
    Permission,
    /// `PAPI_ENOINIT`
    #[display(fmt = "PAPI hasn't been initialized yet")]
    NotInitialized,
    /// `PAPI_ENOCMP`
    #[display(fmt = "Component index isn't set")]
    NoComponent,
    /// `PAPI_ENOSUPP`
    #[display(fmt = "Not supported")]
    NotSupported,
    /// `PAPI_ENOIMPL`
    #[display(fmt = "Not implemented")]
    NotImplemented,
    /// `PAPI_EBUF`
    #[display(fmt = "Buffer size exceeded")]
    Buffer,
    /// `PAPI_EINVAL_DOM`
    #[display(fmt = "EventSet domain is not supported for the operation")]
    InvalidDomain,
    /// `PAPI_EATTR`
    #[display(fmt = "Invalid or missing event attributes")]
    Attribute,
    /// `PAPI_ECOUNT`
    #[display(fmt = "Too many events or attributes")]
    Count,
    /// `PAPI_ECOMBO`
    #[display(fmt = "Bad combination of features")]
    Combo,
    /// `PAPI_ECMP_DISABLED`
    #[display(fmt = "Component containing event is disabled")]
    ComponentDisabled,
    /// A negative status code this crate does not know about.
    #[display(fmt = "Unrecognized status code {}", _0)]
    Unknown(c_int),
}

impl PapiError {
    /// Map a PAPI status code to its condition.
    ///
    /// Returns `None` for `PAPI_OK` and positive return values.
    pub fn from_code(code: c_int) -> Option<Self> {
        use crate::papi::ffi::*;
        use PapiError::*;
        if code >= PAPI_OK {
            return None;
        }
        Some(match code {
            PAPI_EINVAL => InvalidArgument,
            PAPI_ENOMEM => NoMemory,
            PAPI_ESYS => System,
            PAPI_ECMP => Component,
            PAPI_ECLOST => CountersLost,
            PAPI_EBUG => Bug,
            PAPI_ENOEVNT => NoEvent,
            PAPI_ECNFLCT => Conflict,
            PAPI_ENOTRUN => NotRunning,
            PAPI_EISRUN => IsRunning,
            PAPI_ENOEVST => NoEventSet,
            PAPI_ENOTPRESET => NotPreset,
            PAPI_ENOCNTR => NoCounters,
            PAPI_EMISC => Misc,
            PAPI_EPERM => Permission,
            PAPI_ENOINIT => NotInitialized,
            PAPI_ENOCMP => NoComponent,
            PAPI_ENOSUPP => NotSupported,
            PAPI_ENOIMPL => NotImplemented,
            PAPI_EBUF => Buffer,
            PAPI_EINVAL_DOM => InvalidDomain,
            PAPI_EATTR => Attribute,
            PAPI_ECOUNT => Count,
            PAPI_ECOMBO => Combo,
            PAPI_ECMP_DISABLED => ComponentDisabled,
            other => Unknown(other),
        })
    }

    /// The raw PAPI status code of this condition.
    pub fn code(self) -> c_int {
        use crate::papi::ffi::*;
        use PapiError::*;
        match self {
            InvalidArgument => PAPI_EINVAL,
            NoMemory => PAPI_ENOMEM,
            System => PAPI_ESYS,
            Component => PAPI_ECMP,
            CountersLost => PAPI_ECLOST,
            Bug => PAPI_EBUG,
            NoEvent => PAPI_ENOEVNT,
            Conflict => PAPI_ECNFLCT,
            NotRunning => PAPI_ENOTRUN,
            IsRunning => PAPI_EISRUN,
            NoEventSet => PAPI_ENOEVST,
            NotPreset => PAPI_ENOTPRESET,
            NoCounters => PAPI_ENOCNTR,
            Misc => PAPI_EMISC,
            Permission => PAPI_EPERM,
            NotInitialized => PAPI_ENOINIT,
            NoComponent => PAPI_ENOCMP,
            NotSupported => PAPI_ENOSUPP,
            NotImplemented => PAPI_ENOIMPL,
            Buffer => PAPI_EBUF,
            InvalidDomain => PAPI_EINVAL_DOM,
            Attribute => PAPI_EATTR,
            Count => PAPI_ECOUNT,
            Combo => PAPI_ECOMBO,
            ComponentDisabled => PAPI_ECMP_DISABLED,
            Unknown(code) => code,
        }
    }
}

/// Errors produced by this crate.
#[derive(Debug, Fail)]
pub enum Error {
    /// Errors originating from calls to `std::io::*`.
    #[fail(display = "IO Error - {}", _0)]
    IO(#[cause] std::io::Error),
    /// Errors originating from calls to `std::env::*`.
    #[fail(display = "Env Error - {}", _0)]
    Env(#[cause] std::env::VarError),
    /// Errors originating from calls to `regex::*`.
    #[fail(display = "Regex Error - {}", _0)]
    Regex(#[cause] regex::Error),
    /// Errors parsing Glob patterns.
    #[fail(display = "Glob Error - {}", _0)]
    GlobPattern(#[cause] glob::PatternError),
    /// Errors interating over entries in a glob.
    #[fail(display = "Glob Error - {}", _0)]
    GlobIter(#[cause] glob::GlobError),
    /// Errors caused by parsing integers from strings.
    #[fail(display = "Parse Error - {}", _0)]
    ParseInt(#[cause] std::num::ParseIntError),
    /// Errors caused by failing to read a `&[u8]` to a `str`.
    #[fail(display = "Parse Error - {}", _0)]
    ParseUtf8(#[cause] std::str::Utf8Error),
    /// A PAPI entry point returned a negative status code.
    #[fail(display = "PAPI Error - {} failed: {}", call, code)]
    Papi {
        /// Name of the native entry point.
        call: &'static str,
        /// Condition reported by the library.
        code: PapiError,
    },
    /// The PAPI shared library could not be opened or is missing symbols.
    #[fail(display = "Load Error - {}: {}", path, reason)]
    Load {
        /// Path handed to the dynamic loader.
        path: String,
        /// Message from the dynamic loader.
        reason: String,
    },
    /// No PAPI shared library was found on the search path.
    #[fail(display = "Could not find libpapi, set PAPI_LIBRARY")]
    LibraryNotFound,
    /// `PAPI_library_init` reported a different version than the one requested.
    #[fail(display = "PAPI version mismatch - requested {:#X}, library is {:#X}", expected, found)]
    VersionMismatch {
        /// `PAPI_VER_CURRENT` handed to the library.
        expected: c_int,
        /// Version returned by the library.
        found: c_int,
    },
    /// A name passed to PAPI contained an interior NUL byte.
    #[fail(display = "Invalid name - {:?}", _0)]
    InvalidName(String),
    /// A foreign pointer could not be resolved.
    #[fail(display = "Invalid address - {:#X}", _0)]
    InvalidAddress(u64),
    /// A descriptor table does not match the foreign record it was applied to.
    ///
    /// This is a defect in the table, not a runtime condition. See `Error::is_defect`.
    #[fail(display = "Decode Error - {}.{}: {}", record, field, reason)]
    Decode {
        /// Name of the record type being decoded.
        record: &'static str,
        /// Field that could not be resolved.
        field: &'static str,
        /// What went wrong.
        reason: String,
    },
}

impl Error {
    /// Check a PAPI status code, passing non-negative values through.
    #[inline]
    pub fn check(call: &'static str, code: c_int) -> Result<c_int> {
        match PapiError::from_code(code) {
            None => Ok(code),
            Some(code) => Err(Error::Papi { call, code }),
        }
    }

    /// True for errors raised by a malformed descriptor table.
    ///
    /// These signal a programming error; every other variant is an ordinary failure.
    pub fn is_defect(&self) -> bool {
        match self {
            Error::Decode { .. } => true,
            _ => false,
        }
    }

    /// The PAPI condition carried by this error, if any.
    pub fn papi_error(&self) -> Option<PapiError> {
        match self {
            Error::Papi { code, .. } => Some(*code),
            _ => None,
        }
    }
}

macro_rules! error_from {
    ($et: ty => $cet: expr) => {
        impl From<$et> for Error {
            #[inline]
            fn from(err: $et) -> Self {
                $cet(err)
            }
        }
    };
}

error_from!(std::io::Error => Error::IO);
error_from!(std::env::VarError => Error::Env);
error_from!(regex::Error => Error::Regex);
error_from!(glob::PatternError => Error::GlobPattern);
error_from!(glob::GlobError => Error::GlobIter);
error_from!(std::num::ParseIntError => Error::ParseInt);
error_from!(std::str::Utf8Error => Error::ParseUtf8);

/// Result type used in this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(PapiError::from_code(0), None);
        assert_eq!(PapiError::from_code(7), None);
        assert_eq!(PapiError::from_code(-1), Some(PapiError::InvalidArgument));
        assert_eq!(PapiError::from_code(-8), Some(PapiError::Conflict));
        assert_eq!(PapiError::from_code(-10), Some(PapiError::IsRunning));
        assert_eq!(PapiError::from_code(-16), Some(PapiError::NotInitialized));
        assert_eq!(PapiError::from_code(-25), Some(PapiError::ComponentDisabled));
        assert_eq!(PapiError::from_code(-99), Some(PapiError::Unknown(-99)));
    }

    #[test]
    fn test_error_code_roundtrip() {
        for code in -25..0 {
            let err = PapiError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
            assert_ne!(err, PapiError::Unknown(code));
        }
    }

    #[test]
    fn test_check_status() {
        assert_eq!(Error::check("PAPI_start", 0).unwrap(), 0);
        assert_eq!(Error::check("PAPI_num_events", 3).unwrap(), 3);
        let err = Error::check("PAPI_start", -9).unwrap_err();
        assert_eq!(err.papi_error(), Some(PapiError::NotRunning));
        assert!(!err.is_defect());
        assert_eq!(
            format!("{}", err),
            "PAPI Error - PAPI_start failed: EventSet is currently not running"
        );
    }

    #[test]
    fn test_system_failure_is_a_status() {
        let err = Error::check("PAPI_attach", -3).unwrap_err();
        assert_eq!(err.papi_error(), Some(PapiError::System));
        assert!(!err.is_defect());
    }

    #[test]
    fn test_decode_error_is_defect() {
        let err = Error::Decode {
            record: "EventInfo",
            field: "symbol",
            reason: "no such field".into(),
        };
        assert!(err.is_defect());
        assert_eq!(err.papi_error(), None);
        assert_eq!(
            format!("{}", err),
            "Decode Error - EventInfo.symbol: no such field"
        );
    }
}
