//! Runtime binding to `libpapi`.
//!
//! The library is opened with `dlopen` when a [`Papi`] context is built, so nothing links
//! against PAPI at build time. Every native call goes through the context: event sets,
//! info queries and the high level API all borrow it, which also ties their lifetime to
//! the loaded library.
//!
//! ```no_run
//! # fn main() -> papi_utils::Result<()> {
//! use papi_utils::papi::{EventSet, Papi};
//!
//! let papi = Papi::build().multiplex().open()?;
//! let events = EventSet::build()
//!     .event("PAPI_TOT_INS")
//!     .event("PAPI_TOT_CYC")
//!     .open(&papi)?;
//! events.start()?;
//! let counts = events.stop()?;
//! println!("{:?}", counts);
//! # Ok(())
//! # }
//! ```

use crate::decode::{decode_ptr, decode_struct, ProcessMemory, Record};
use crate::util::{buf_to_string, c_name, ptr_to_string};
use crate::{Error, PapiError, Result};
use dlopen2::wrapper::Container;
use log::{debug, warn};
use nix::libc::{c_int, c_ulong};
use std::env::VarError;
use std::fmt;
use std::path::{Path, PathBuf};

pub mod ffi;
use ffi::PapiApi;

mod version;
pub use version::PapiVersion;

mod eventset;
pub use eventset::{EventSet, EventSetBuilder, EventState};

pub mod high;

/// Environment variable naming the library to load.
pub const LIBRARY_ENV: &str = "PAPI_LIBRARY";
/// Environment variable overriding the library version.
pub const VERSION_ENV: &str = "PAPI_VERSION";

/// Locations searched for `libpapi` when no path is given.
const SEARCH_PATTERNS: [&str; 4] = [
    "/usr/lib*/libpapi.so*",
    "/usr/local/lib*/libpapi.so*",
    "/usr/lib/*/libpapi.so*",
    "/opt/*/lib*/libpapi.so*",
];

/// An initialized PAPI library.
///
/// Dropping the context calls `PAPI_shutdown` and unloads the library.
pub struct Papi {
    api: Container<PapiApi>,
    path: PathBuf,
    version: PapiVersion,
}

impl fmt::Debug for Papi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Papi")
            .field("path", &self.path)
            .field("version", &self.version)
            .finish()
    }
}

/// Initialization levels reported by `PAPI_is_initialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitState {
    /// `PAPI_LOW_LEVEL_INITED`
    pub low_level: bool,
    /// `PAPI_HIGH_LEVEL_INITED`
    pub high_level: bool,
    /// `PAPI_THREAD_LEVEL_INITED`
    pub thread_level: bool,
}

impl InitState {
    fn from_bits(bits: c_int) -> Self {
        InitState {
            low_level: bits & ffi::PAPI_LOW_LEVEL_INITED != 0,
            high_level: bits & ffi::PAPI_HIGH_LEVEL_INITED != 0,
            thread_level: bits & ffi::PAPI_THREAD_LEVEL_INITED != 0,
        }
    }

    /// True when no level is initialized.
    pub fn is_none(&self) -> bool {
        *self == InitState::default()
    }
}

/// The two user locks provided by PAPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    /// `PAPI_USR1_LOCK`
    User1,
    /// `PAPI_USR2_LOCK`
    User2,
}

impl Lock {
    fn code(self) -> c_int {
        match self {
            Lock::User1 => ffi::PAPI_USR1_LOCK,
            Lock::User2 => ffi::PAPI_USR2_LOCK,
        }
    }
}

/// A held PAPI user lock, released on drop.
#[derive(Debug)]
pub struct LockGuard<'p> {
    papi: &'p Papi,
    lock: Lock,
}

impl<'p> Drop for LockGuard<'p> {
    fn drop(&mut self) {
        let ret = unsafe { self.papi.api.PAPI_unlock(self.lock.code()) };
        if let Err(e) = Error::check("PAPI_unlock", ret) {
            warn!("Could not release {:?} -- {}", self.lock, e);
        }
    }
}

extern "C" fn current_thread_id() -> c_ulong {
    unsafe { nix::libc::pthread_self() as c_ulong }
}

impl Papi {
    /// Load and initialize PAPI using the associated builder.
    pub fn build() -> PapiBuilder {
        PapiBuilder::default()
    }

    /// Load and initialize PAPI with default settings.
    pub fn init() -> Result<Self> {
        Papi::build().open()
    }

    /// Path of the loaded library.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version handed to `PAPI_library_init`.
    pub fn version(&self) -> PapiVersion {
        self.version
    }

    pub(crate) fn api(&self) -> &PapiApi {
        &self.api
    }

    /// Check the status code of a native call.
    #[inline]
    pub(crate) fn check(&self, call: &'static str, ret: c_int) -> Result<c_int> {
        let ret = Error::check(call, ret)?;
        debug!("{} -> {}", call, ret);
        Ok(ret)
    }

    /// Initialization levels of the library.
    pub fn init_state(&self) -> InitState {
        InitState::from_bits(unsafe { self.api.PAPI_is_initialized() })
    }

    /// Shut the library down. Equivalent to dropping the context.
    pub fn shutdown(self) {}

    // Threads

    /// Register the calling thread with PAPI.
    pub fn register_thread(&self) -> Result<()> {
        self.check("PAPI_register_thread", unsafe { self.api.PAPI_register_thread() })?;
        Ok(())
    }

    /// Unregister the calling thread.
    pub fn unregister_thread(&self) -> Result<()> {
        self.check("PAPI_unregister_thread", unsafe {
            self.api.PAPI_unregister_thread()
        })?;
        Ok(())
    }

    /// Identifier of the calling thread, as seen by PAPI.
    pub fn thread_id(&self) -> Result<c_ulong> {
        let id = unsafe { self.api.PAPI_thread_id() };
        // Failures come back as a status code cast to unsigned long.
        let signed = id as i64;
        if (i64::from(ffi::PAPI_ECMP_DISABLED)..0).contains(&signed) {
            Error::check("PAPI_thread_id", signed as c_int)?;
        }
        Ok(id)
    }

    /// Identifiers of every thread registered with PAPI.
    pub fn list_threads(&self) -> Result<Vec<c_ulong>> {
        let mut count: c_int = 0;
        self.check("PAPI_list_threads", unsafe {
            self.api.PAPI_list_threads(std::ptr::null_mut(), &mut count)
        })?;
        let mut tids: Vec<c_ulong> = vec![0; count as usize];
        self.check("PAPI_list_threads", unsafe {
            self.api.PAPI_list_threads(tids.as_mut_ptr(), &mut count)
        })?;
        tids.truncate(count as usize);
        Ok(tids)
    }

    /// Take one of the PAPI user locks.
    pub fn lock(&self, lock: Lock) -> Result<LockGuard<'_>> {
        self.check("PAPI_lock", unsafe { self.api.PAPI_lock(lock.code()) })?;
        Ok(LockGuard { papi: self, lock })
    }

    // Options

    /// Set the debug level of the library (`PAPI_QUIET`, `PAPI_VERB_ECONT`, `PAPI_VERB_ESTOP`).
    pub fn set_debug(&self, level: c_int) -> Result<()> {
        self.check("PAPI_set_debug", unsafe { self.api.PAPI_set_debug(level) })?;
        Ok(())
    }

    /// Set the default counting domain of new event sets (`PAPI_DOM_*`).
    pub fn set_domain(&self, domain: c_int) -> Result<()> {
        self.check("PAPI_set_domain", unsafe { self.api.PAPI_set_domain(domain) })?;
        Ok(())
    }

    /// Set the default counting domain of one component.
    pub fn set_cmp_domain(&self, domain: c_int, cidx: c_int) -> Result<()> {
        self.check("PAPI_set_cmp_domain", unsafe {
            self.api.PAPI_set_cmp_domain(domain, cidx)
        })?;
        Ok(())
    }

    /// Set the default granularity of new event sets (`PAPI_GRN_*`).
    pub fn set_granularity(&self, granularity: c_int) -> Result<()> {
        self.check("PAPI_set_granularity", unsafe {
            self.api.PAPI_set_granularity(granularity)
        })?;
        Ok(())
    }

    /// Set the default granularity of one component.
    pub fn set_cmp_granularity(&self, granularity: c_int, cidx: c_int) -> Result<()> {
        self.check("PAPI_set_cmp_granularity", unsafe {
            self.api.PAPI_set_cmp_granularity(granularity, cidx)
        })?;
        Ok(())
    }

    // Components

    /// Number of components compiled into the library.
    pub fn num_components(&self) -> Result<c_int> {
        self.check("PAPI_num_components", unsafe { self.api.PAPI_num_components() })
    }

    /// Number of hardware counters of a component.
    pub fn num_cmp_hwctrs(&self, cidx: c_int) -> Result<c_int> {
        self.check("PAPI_num_cmp_hwctrs", unsafe { self.api.PAPI_num_cmp_hwctrs(cidx) })
    }

    /// Number of hardware counters of the CPU component.
    pub fn num_counters(&self) -> Result<c_int> {
        self.num_cmp_hwctrs(0)
    }

    /// Index of the component called `name`.
    pub fn component_index(&self, name: &str) -> Result<c_int> {
        let name = c_name(name)?;
        self.check("PAPI_get_component_index", unsafe {
            self.api.PAPI_get_component_index(name.as_ptr())
        })
    }

    /// Description of a component.
    pub fn component_info(&self, cidx: c_int) -> Result<Record> {
        let info = unsafe { self.api.PAPI_get_component_info(cidx) };
        self.decode_info("PAPI_get_component_info", info, PapiError::NoComponent)
    }

    /// Descriptions of every component.
    pub fn components(&self) -> Result<Vec<Record>> {
        (0..self.num_components()?)
            .map(|cidx| self.component_info(cidx))
            .collect()
    }

    // Events

    /// Translate an event name into its code.
    pub fn event_name_to_code(&self, name: &str) -> Result<c_int> {
        let cname = c_name(name)?;
        let mut code: c_int = 0;
        self.check("PAPI_event_name_to_code", unsafe {
            self.api.PAPI_event_name_to_code(cname.as_ptr(), &mut code)
        })?;
        Ok(code)
    }

    /// Translate an event code into its name.
    pub fn event_code_to_name(&self, code: c_int) -> Result<String> {
        let mut buf = [0; ffi::PAPI_MAX_STR_LEN];
        self.check("PAPI_event_code_to_name", unsafe {
            self.api.PAPI_event_code_to_name(code, buf.as_mut_ptr())
        })?;
        Ok(buf_to_string(&buf))
    }

    /// Check whether an event can be counted on this system.
    pub fn query_event(&self, code: c_int) -> Result<bool> {
        let ret = unsafe { self.api.PAPI_query_event(code) };
        self.query_result("PAPI_query_event", ret)
    }

    /// Check whether a named event can be counted on this system.
    pub fn query_named_event(&self, name: &str) -> Result<bool> {
        let name = c_name(name)?;
        let ret = unsafe { self.api.PAPI_query_named_event(name.as_ptr()) };
        self.query_result("PAPI_query_named_event", ret)
    }

    fn query_result(&self, call: &'static str, ret: c_int) -> Result<bool> {
        match PapiError::from_code(ret) {
            None => Ok(true),
            Some(PapiError::NoEvent) => Ok(false),
            Some(code) => Err(Error::Papi { call, code }),
        }
    }

    /// Component counting an event.
    pub fn event_component(&self, code: c_int) -> Result<c_int> {
        self.check("PAPI_get_event_component", unsafe {
            self.api.PAPI_get_event_component(code)
        })
    }

    /// Full description of an event.
    pub fn event_info(&self, code: c_int) -> Result<Record> {
        let mut info = ffi::PAPI_event_info_t::default();
        self.check("PAPI_get_event_info", unsafe {
            self.api.PAPI_get_event_info(code, &mut info)
        })?;
        decode_struct(&info, &unsafe { ProcessMemory::new() })
    }

    /// Codes of the preset events, optionally only those available on this system.
    pub fn preset_events(&self, available_only: bool) -> Result<Vec<c_int>> {
        let modifier = if available_only {
            ffi::PAPI_PRESET_ENUM_AVAIL
        } else {
            ffi::PAPI_ENUM_EVENTS
        };
        let mut code = ffi::PAPI_PRESET_MASK as c_int;
        let mut codes = Vec::new();
        let mut ret = unsafe { self.api.PAPI_enum_event(&mut code, ffi::PAPI_ENUM_FIRST) };
        if ret == ffi::PAPI_OK && (!available_only || self.query_event(code)?) {
            codes.push(code);
        }
        while ret == ffi::PAPI_OK {
            ret = unsafe { self.api.PAPI_enum_event(&mut code, modifier) };
            if ret == ffi::PAPI_OK {
                codes.push(code);
            }
        }
        Ok(codes)
    }

    /// Codes of the native events of a component.
    pub fn native_events(&self, cidx: c_int) -> Result<Vec<c_int>> {
        let mut code = ffi::PAPI_NATIVE_MASK as c_int;
        let mut codes = Vec::new();
        let mut ret =
            unsafe { self.api.PAPI_enum_cmp_event(&mut code, ffi::PAPI_ENUM_FIRST, cidx) };
        while ret == ffi::PAPI_OK {
            codes.push(code);
            ret = unsafe {
                self.api
                    .PAPI_enum_cmp_event(&mut code, ffi::PAPI_ENUM_EVENTS, cidx)
            };
        }
        match PapiError::from_code(ret) {
            None | Some(PapiError::NoEvent) | Some(PapiError::InvalidArgument) => Ok(codes),
            Some(code) => Err(Error::Papi {
                call: "PAPI_enum_cmp_event",
                code,
            }),
        }
    }

    /// Create an empty event set.
    pub fn event_set(&self) -> Result<EventSet<'_>> {
        EventSet::build().open(self)
    }

    // System information

    /// Description of the hardware, including the memory hierarchy.
    pub fn hardware_info(&self) -> Result<Record> {
        let info = unsafe { self.api.PAPI_get_hardware_info() };
        self.decode_info("PAPI_get_hardware_info", info, PapiError::NotInitialized)
    }

    /// Description of the running executable.
    pub fn executable_info(&self) -> Result<Record> {
        let info = unsafe { self.api.PAPI_get_executable_info() };
        self.decode_info("PAPI_get_executable_info", info, PapiError::NotInitialized)
    }

    /// Shared libraries mapped in the process.
    pub fn shared_lib_info(&self) -> Result<Record> {
        let info = unsafe { self.api.PAPI_get_shared_lib_info() };
        self.decode_info("PAPI_get_shared_lib_info", info, PapiError::NotInitialized)
    }

    /// Dynamic memory usage of the process.
    pub fn dmem_info(&self) -> Result<Record> {
        let mut info = ffi::PAPI_dmem_info_t::default();
        self.check("PAPI_get_dmem_info", unsafe {
            self.api.PAPI_get_dmem_info(&mut info)
        })?;
        decode_struct(&info, &unsafe { ProcessMemory::new() })
    }

    /// Decode a record owned by the library. Null means the call failed with `missing`.
    fn decode_info<T: crate::decode::ForeignStruct>(
        &self,
        call: &'static str,
        info: *const T,
        missing: PapiError,
    ) -> Result<Record> {
        // Records returned by PAPI stay valid until shutdown.
        let record = unsafe { decode_ptr(info, &ProcessMemory::new())? };
        record.ok_or(Error::Papi {
            call,
            code: missing,
        })
    }

    // Timers

    /// Real time counter, in clock cycles.
    pub fn real_cyc(&self) -> i64 {
        unsafe { self.api.PAPI_get_real_cyc() }
    }

    /// Real time counter, in nanoseconds.
    pub fn real_nsec(&self) -> i64 {
        unsafe { self.api.PAPI_get_real_nsec() }
    }

    /// Real time counter, in microseconds.
    pub fn real_usec(&self) -> i64 {
        unsafe { self.api.PAPI_get_real_usec() }
    }

    /// Virtual time counter of the process, in clock cycles.
    pub fn virt_cyc(&self) -> i64 {
        unsafe { self.api.PAPI_get_virt_cyc() }
    }

    /// Virtual time counter of the process, in nanoseconds.
    pub fn virt_nsec(&self) -> i64 {
        unsafe { self.api.PAPI_get_virt_nsec() }
    }

    /// Virtual time counter of the process, in microseconds.
    pub fn virt_usec(&self) -> i64 {
        unsafe { self.api.PAPI_get_virt_usec() }
    }

    /// Message of a status code, as provided by the library.
    pub fn strerror(&self, code: c_int) -> Option<String> {
        unsafe { ptr_to_string(self.api.PAPI_strerror(code)) }
    }
}

impl Drop for Papi {
    fn drop(&mut self) {
        debug!("Shutting down PAPI from {}", self.path.display());
        unsafe { self.api.PAPI_shutdown() };
    }
}

/// Locate `libpapi`: `PAPI_LIBRARY` first, then the usual library directories.
pub fn find_library() -> Result<PathBuf> {
    match std::env::var(LIBRARY_ENV) {
        Ok(path) => return Ok(PathBuf::from(path)),
        Err(VarError::NotPresent) => {}
        Err(e) => return Err(e.into()),
    }
    for pattern in SEARCH_PATTERNS.iter() {
        for entry in glob::glob(pattern)? {
            let path = entry?;
            if path.is_file() {
                return Ok(path);
            }
        }
    }
    Err(Error::LibraryNotFound)
}

/// Helper struct to build a `Papi` context.
#[derive(Debug, Default)]
pub struct PapiBuilder {
    /// Library to load.
    ///
    /// Defaults to `PAPI_LIBRARY`, then a search of the library directories.
    library: Option<PathBuf>,
    /// Version handed to `PAPI_library_init`.
    ///
    /// Defaults to `PAPI_VERSION`, then the version in the library file name, then the
    /// output of `papi_version`, then 7.0.
    version: Option<PapiVersion>,
    /// Call `PAPI_multiplex_init`.
    ///
    /// Defaults to `false`.
    multiplex: bool,
    /// Call `PAPI_thread_init` with the pthread id of the caller.
    ///
    /// Defaults to `false`.
    thread_support: bool,
    /// Library debug level.
    ///
    /// Defaults to the library default.
    debug: Option<c_int>,
    /// Default counting domain.
    ///
    /// Defaults to the library default.
    domain: Option<c_int>,
    /// Default granularity.
    ///
    /// Defaults to the library default.
    granularity: Option<c_int>,
    /// Components disabled before initialization.
    disabled_components: Vec<String>,
}

impl PapiBuilder {
    builder_pattern_some!(
        /// Load the library from this path.
        library: PathBuf
    );

    builder_pattern_some!(
        /// Initialize the library for this version.
        version: PapiVersion
    );

    builder_pattern_bool!(
        /// Enable multiplexing of event sets.
        multiplex
    );

    builder_pattern_bool!(
        /// Enable thread level counting.
        thread_support
    );

    builder_pattern_some!(
        /// Set the library debug level.
        debug: c_int
    );

    builder_pattern_some!(
        /// Set the default counting domain.
        domain: c_int
    );

    builder_pattern_some!(
        /// Set the default granularity.
        granularity: c_int
    );

    /// Disable a component by name before the library initializes it.
    pub fn disable_component(mut self, name: &str) -> Self {
        self.disabled_components.push(name.to_string());
        self
    }

    fn resolve_version(&self, path: &Path) -> Result<PapiVersion> {
        if let Some(version) = self.version {
            return Ok(version);
        }
        match std::env::var(VERSION_ENV) {
            Ok(text) => match PapiVersion::parse(&text) {
                Some(version) => return Ok(version),
                None => warn!("Ignoring unparsable {}={:?}", VERSION_ENV, text),
            },
            Err(VarError::NotPresent) => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(version) = PapiVersion::from_soname(path) {
            return Ok(version);
        }
        match PapiVersion::get_details_from_tool() {
            Ok(version) => Ok(version),
            Err(e) => {
                debug!("papi_version unavailable -- {}", e);
                Ok(PapiVersion::default())
            }
        }
    }

    /// Load the library and initialize it.
    pub fn open(&self) -> Result<Papi> {
        let path = match &self.library {
            Some(path) => path.clone(),
            None => find_library()?,
        };
        debug!("Loading PAPI from {}", path.display());
        let api: Container<PapiApi> =
            unsafe { Container::load(&path) }.map_err(|e| Error::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let version = self.resolve_version(&path)?;

        for name in &self.disabled_components {
            let cname = c_name(name)?;
            Error::check("PAPI_disable_component_by_name", unsafe {
                api.PAPI_disable_component_by_name(cname.as_ptr())
            })?;
        }

        let expected = version.ver_current();
        let found = Error::check("PAPI_library_init", unsafe {
            api.PAPI_library_init(expected)
        })?;
        if found != expected {
            return Err(Error::VersionMismatch { expected, found });
        }
        debug!("Initialized PAPI {}", PapiVersion::from_number(found));

        // From here on dropping the context shuts the library down.
        let papi = Papi { api, path, version };
        if self.thread_support {
            papi.check("PAPI_thread_init", unsafe {
                papi.api.PAPI_thread_init(Some(current_thread_id))
            })?;
        }
        if self.multiplex {
            papi.check("PAPI_multiplex_init", unsafe {
                papi.api.PAPI_multiplex_init()
            })?;
        }
        if let Some(level) = self.debug {
            papi.set_debug(level)?;
        }
        if let Some(domain) = self.domain {
            papi.set_domain(domain)?;
        }
        if let Some(granularity) = self.granularity {
            papi.set_granularity(granularity)?;
        }
        Ok(papi)
    }
}
