//! Utilities to interact with the PAPI performance counter library and to read the records
//! it hands out.
//!
//! The library is opened at runtime (see `papi::find_library`), so nothing links against
//! `libpapi` at build time. Records returned by PAPI (`PAPI_hw_info_t` and friends) are
//! turned into owned `decode::Record` values by walking a static descriptor table for each
//! record type, declared in `structs`.

#![deny(missing_docs, missing_debug_implementations)]

#[macro_use]
pub(crate) mod util;

mod errors;
pub use errors::{Error, PapiError, Result};

pub mod api;
pub use api::Counter;

pub mod decode;

pub mod structs;

pub mod papi;
pub use papi::{EventSet, Papi};
