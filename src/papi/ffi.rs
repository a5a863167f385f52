//! Declarations mirroring the PAPI 7 `papi.h` header.
//!
//! The structs are `#[repr(C)]` copies of the native records so that their memory can be
//! handed to the decoder. Entry points are resolved at runtime through [`PapiApi`].

#![allow(
    clippy::all,
    missing_docs,
    missing_debug_implementations,
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case
)]

use dlopen2::wrapper::WrapperApi;
use nix::libc::{c_char, c_float, c_int, c_longlong, c_uint, c_ulong};

// Return codes
pub const PAPI_OK: c_int = 0;
pub const PAPI_EINVAL: c_int = -1;
pub const PAPI_ENOMEM: c_int = -2;
pub const PAPI_ESYS: c_int = -3;
pub const PAPI_ECMP: c_int = -4;
pub const PAPI_ESBSTR: c_int = -4;
pub const PAPI_ECLOST: c_int = -5;
pub const PAPI_EBUG: c_int = -6;
pub const PAPI_ENOEVNT: c_int = -7;
pub const PAPI_ECNFLCT: c_int = -8;
pub const PAPI_ENOTRUN: c_int = -9;
pub const PAPI_EISRUN: c_int = -10;
pub const PAPI_ENOEVST: c_int = -11;
pub const PAPI_ENOTPRESET: c_int = -12;
pub const PAPI_ENOCNTR: c_int = -13;
pub const PAPI_EMISC: c_int = -14;
pub const PAPI_EPERM: c_int = -15;
pub const PAPI_ENOINIT: c_int = -16;
pub const PAPI_ENOCMP: c_int = -17;
pub const PAPI_ENOSUPP: c_int = -18;
pub const PAPI_ENOIMPL: c_int = -19;
pub const PAPI_EBUF: c_int = -20;
pub const PAPI_EINVAL_DOM: c_int = -21;
pub const PAPI_EATTR: c_int = -22;
pub const PAPI_ECOUNT: c_int = -23;
pub const PAPI_ECOMBO: c_int = -24;
pub const PAPI_ECMP_DISABLED: c_int = -25;

// Initialization state
pub const PAPI_NOT_INITED: c_int = 0;
pub const PAPI_LOW_LEVEL_INITED: c_int = 1;
pub const PAPI_HIGH_LEVEL_INITED: c_int = 2;
pub const PAPI_THREAD_LEVEL_INITED: c_int = 4;

// Event set state
pub const PAPI_STOPPED: c_int = 0x01;
pub const PAPI_RUNNING: c_int = 0x02;
pub const PAPI_PAUSED: c_int = 0x04;
pub const PAPI_NOT_INIT: c_int = 0x08;
pub const PAPI_OVERFLOWING: c_int = 0x10;
pub const PAPI_PROFILING: c_int = 0x20;
pub const PAPI_MULTIPLEXING: c_int = 0x40;
pub const PAPI_ATTACHED: c_int = 0x80;
pub const PAPI_CPU_ATTACHED: c_int = 0x100;

pub const PAPI_NULL: c_int = -1;

pub const PAPI_NATIVE_MASK: c_uint = 0x4000_0000;
pub const PAPI_PRESET_MASK: c_uint = 0x8000_0000;

// Event enumeration modifiers
pub const PAPI_ENUM_EVENTS: c_int = 0;
pub const PAPI_ENUM_FIRST: c_int = 1;
pub const PAPI_PRESET_ENUM_AVAIL: c_int = 2;

// String lengths
pub const PAPI_MIN_STR_LEN: usize = 64;
pub const PAPI_MAX_STR_LEN: usize = 128;
pub const PAPI_2MAX_STR_LEN: usize = 256;
pub const PAPI_HUGE_STR_LEN: usize = 1024;

pub const PAPI_PMU_MAX: usize = 40;
pub const PAPI_MAX_INFO_TERMS: usize = 12;
pub const PAPI_MH_MAX_LEVELS: usize = 6;
pub const PAPI_MAX_MEM_HIERARCHY_LEVELS: usize = 4;

// Debug levels
pub const PAPI_QUIET: c_int = 0;
pub const PAPI_VERB_ECONT: c_int = 1;
pub const PAPI_VERB_ESTOP: c_int = 2;

// Domains
pub const PAPI_DOM_USER: c_int = 0x1;
pub const PAPI_DOM_KERNEL: c_int = 0x2;
pub const PAPI_DOM_OTHER: c_int = 0x4;
pub const PAPI_DOM_SUPERVISOR: c_int = 0x8;
pub const PAPI_DOM_ALL: c_int =
    PAPI_DOM_USER | PAPI_DOM_KERNEL | PAPI_DOM_OTHER | PAPI_DOM_SUPERVISOR;

// Granularities
pub const PAPI_GRN_THR: c_int = 0x1;
pub const PAPI_GRN_PROC: c_int = 0x2;
pub const PAPI_GRN_PROCG: c_int = 0x4;
pub const PAPI_GRN_SYS: c_int = 0x8;
pub const PAPI_GRN_SYS_CPU: c_int = 0x10;

// Locks
pub const PAPI_USR1_LOCK: c_int = 0x0;
pub const PAPI_USR2_LOCK: c_int = 0x1;

// Presets used by the rate functions
pub const PAPI_FP_INS: c_int = 52;
pub const PAPI_FP_OPS: c_int = 102;
pub const PAPI_SP_OPS: c_int = 103;
pub const PAPI_DP_OPS: c_int = 104;
pub const PAPI_VEC_SP: c_int = 105;
pub const PAPI_VEC_DP: c_int = 106;

pub type caddr_t = *mut c_char;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct PAPI_address_map_t {
    pub name: [c_char; PAPI_HUGE_STR_LEN],
    pub text_start: caddr_t,
    pub text_end: caddr_t,
    pub data_start: caddr_t,
    pub data_end: caddr_t,
    pub bss_start: caddr_t,
    pub bss_end: caddr_t,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct PAPI_exe_info_t {
    pub fullname: [c_char; PAPI_HUGE_STR_LEN],
    pub address_info: PAPI_address_map_t,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct PAPI_dmem_info_t {
    pub peak: c_longlong,
    pub size: c_longlong,
    pub resident: c_longlong,
    pub high_water_mark: c_longlong,
    pub shared: c_longlong,
    pub text: c_longlong,
    pub library: c_longlong,
    pub heap: c_longlong,
    pub locked: c_longlong,
    pub stack: c_longlong,
    pub pagesize: c_longlong,
    pub pte: c_longlong,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct PAPI_event_info_t {
    pub event_code: c_uint,
    pub symbol: [c_char; PAPI_HUGE_STR_LEN],
    pub short_descr: [c_char; PAPI_MIN_STR_LEN],
    pub long_descr: [c_char; PAPI_HUGE_STR_LEN],
    pub component_index: c_int,
    pub units: [c_char; PAPI_MIN_STR_LEN],
    pub location: c_int,
    pub data_type: c_int,
    pub value_type: c_int,
    pub timescope: c_int,
    pub update_type: c_int,
    pub update_freq: c_int,
    pub count: c_uint,
    pub event_type: c_uint,
    pub derived: [c_char; PAPI_MIN_STR_LEN],
    pub postfix: [c_char; PAPI_2MAX_STR_LEN],
    pub code: [c_uint; PAPI_MAX_INFO_TERMS],
    pub name: [[c_char; PAPI_2MAX_STR_LEN]; PAPI_MAX_INFO_TERMS],
    pub note: [c_char; PAPI_HUGE_STR_LEN],
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct PAPI_mh_tlb_info_t {
    pub type_: c_int,
    pub num_entries: c_int,
    pub page_size: c_int,
    pub associativity: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct PAPI_mh_cache_info_t {
    pub type_: c_int,
    pub size: c_int,
    pub line_size: c_int,
    pub num_lines: c_int,
    pub associativity: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct PAPI_mh_level_t {
    pub tlb: [PAPI_mh_tlb_info_t; PAPI_MH_MAX_LEVELS],
    pub cache: [PAPI_mh_cache_info_t; PAPI_MH_MAX_LEVELS],
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct PAPI_mh_info_t {
    pub levels: c_int,
    pub level: [PAPI_mh_level_t; PAPI_MAX_MEM_HIERARCHY_LEVELS],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct PAPI_hw_info_t {
    pub ncpu: c_int,
    pub threads: c_int,
    pub cores: c_int,
    pub sockets: c_int,
    pub nnodes: c_int,
    pub totalcpus: c_int,
    pub vendor: c_int,
    pub vendor_string: [c_char; PAPI_MAX_STR_LEN],
    pub model: c_int,
    pub model_string: [c_char; PAPI_MAX_STR_LEN],
    pub revision: c_float,
    pub cpuid_family: c_int,
    pub cpuid_model: c_int,
    pub cpuid_stepping: c_int,
    pub cpu_max_mhz: c_int,
    pub cpu_min_mhz: c_int,
    pub mem_hierarchy: PAPI_mh_info_t,
    pub virtualized: c_int,
    pub virtual_vendor_string: [c_char; PAPI_MAX_STR_LEN],
    pub virtual_vendor_version: [c_char; PAPI_MAX_STR_LEN],
    pub mhz: c_float,
    pub clock_mhz: c_int,
    pub reserved: [c_int; 8],
}

/// `PAPI_component_info_t`.
///
/// The trailing one-bit flags share a single `unsigned int` storage unit, kept here as
/// `_bitfield_1`. Bit positions follow the order of declaration in the header.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct PAPI_component_info_t {
    pub name: [c_char; PAPI_MAX_STR_LEN],
    pub short_name: [c_char; PAPI_MIN_STR_LEN],
    pub description: [c_char; PAPI_MAX_STR_LEN],
    pub version: [c_char; PAPI_MIN_STR_LEN],
    pub support_version: [c_char; PAPI_MIN_STR_LEN],
    pub kernel_version: [c_char; PAPI_MIN_STR_LEN],
    pub disabled_reason: [c_char; PAPI_MAX_STR_LEN],
    pub disabled: c_int,
    pub CmpIdx: c_int,
    pub num_cntrs: c_int,
    pub num_mpx_cntrs: c_int,
    pub num_preset_events: c_int,
    pub num_native_events: c_int,
    pub default_domain: c_int,
    pub available_domains: c_int,
    pub default_granularity: c_int,
    pub available_granularities: c_int,
    pub hardware_intr_sig: c_int,
    pub component_type: c_int,
    pub pmu_names: [*mut c_char; PAPI_PMU_MAX],
    pub reserved: [c_int; 8],
    pub _bitfield_1: c_uint,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct PAPI_shlib_info_t {
    pub map: *mut PAPI_address_map_t,
    pub count: c_int,
}

macro_rules! zeroed_default {
    ($($ty: ty),*) => {
        $(
            impl Default for $ty {
                fn default() -> Self {
                    // All-zero is a valid value for these plain C records.
                    unsafe { std::mem::zeroed() }
                }
            }
        )*
    };
}

zeroed_default!(
    PAPI_address_map_t,
    PAPI_exe_info_t,
    PAPI_event_info_t,
    PAPI_hw_info_t,
    PAPI_component_info_t,
    PAPI_shlib_info_t
);

/// Native entry points of `libpapi`, resolved when the library is loaded.
#[derive(WrapperApi)]
pub struct PapiApi {
    // High level API
    PAPI_hl_region_begin: unsafe extern "C" fn(region: *const c_char) -> c_int,
    PAPI_hl_read: unsafe extern "C" fn(region: *const c_char) -> c_int,
    PAPI_hl_region_end: unsafe extern "C" fn(region: *const c_char) -> c_int,
    PAPI_hl_stop: unsafe extern "C" fn() -> c_int,

    // Low level API
    PAPI_accum: unsafe extern "C" fn(EventSet: c_int, values: *mut c_longlong) -> c_int,
    PAPI_add_event: unsafe extern "C" fn(EventSet: c_int, Event: c_int) -> c_int,
    PAPI_add_named_event: unsafe extern "C" fn(EventSet: c_int, EventName: *const c_char) -> c_int,
    PAPI_assign_eventset_component: unsafe extern "C" fn(EventSet: c_int, cidx: c_int) -> c_int,
    PAPI_attach: unsafe extern "C" fn(EventSet: c_int, tid: c_ulong) -> c_int,
    PAPI_cleanup_eventset: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_create_eventset: unsafe extern "C" fn(EventSet: *mut c_int) -> c_int,
    PAPI_detach: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_destroy_eventset: unsafe extern "C" fn(EventSet: *mut c_int) -> c_int,
    PAPI_enum_event: unsafe extern "C" fn(EventCode: *mut c_int, modifier: c_int) -> c_int,
    PAPI_enum_cmp_event:
        unsafe extern "C" fn(EventCode: *mut c_int, modifier: c_int, cidx: c_int) -> c_int,
    PAPI_event_code_to_name: unsafe extern "C" fn(EventCode: c_int, out: *mut c_char) -> c_int,
    PAPI_event_name_to_code: unsafe extern "C" fn(name: *const c_char, out: *mut c_int) -> c_int,
    PAPI_get_dmem_info: unsafe extern "C" fn(dest: *mut PAPI_dmem_info_t) -> c_int,
    PAPI_get_event_info:
        unsafe extern "C" fn(EventCode: c_int, info: *mut PAPI_event_info_t) -> c_int,
    PAPI_get_executable_info: unsafe extern "C" fn() -> *const PAPI_exe_info_t,
    PAPI_get_hardware_info: unsafe extern "C" fn() -> *const PAPI_hw_info_t,
    PAPI_get_component_info: unsafe extern "C" fn(cidx: c_int) -> *const PAPI_component_info_t,
    PAPI_get_multiplex: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_get_real_cyc: unsafe extern "C" fn() -> c_longlong,
    PAPI_get_real_nsec: unsafe extern "C" fn() -> c_longlong,
    PAPI_get_real_usec: unsafe extern "C" fn() -> c_longlong,
    PAPI_get_shared_lib_info: unsafe extern "C" fn() -> *const PAPI_shlib_info_t,
    PAPI_get_virt_cyc: unsafe extern "C" fn() -> c_longlong,
    PAPI_get_virt_nsec: unsafe extern "C" fn() -> c_longlong,
    PAPI_get_virt_usec: unsafe extern "C" fn() -> c_longlong,
    PAPI_is_initialized: unsafe extern "C" fn() -> c_int,
    PAPI_library_init: unsafe extern "C" fn(version: c_int) -> c_int,
    PAPI_list_events:
        unsafe extern "C" fn(EventSet: c_int, Events: *mut c_int, number: *mut c_int) -> c_int,
    PAPI_list_threads: unsafe extern "C" fn(tids: *mut c_ulong, number: *mut c_int) -> c_int,
    PAPI_lock: unsafe extern "C" fn(lck: c_int) -> c_int,
    PAPI_multiplex_init: unsafe extern "C" fn() -> c_int,
    PAPI_num_cmp_hwctrs: unsafe extern "C" fn(cidx: c_int) -> c_int,
    PAPI_num_events: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_query_event: unsafe extern "C" fn(EventCode: c_int) -> c_int,
    PAPI_query_named_event: unsafe extern "C" fn(EventName: *const c_char) -> c_int,
    PAPI_read: unsafe extern "C" fn(EventSet: c_int, values: *mut c_longlong) -> c_int,
    PAPI_read_ts: unsafe extern "C" fn(
        EventSet: c_int,
        values: *mut c_longlong,
        cyc: *mut c_longlong,
    ) -> c_int,
    PAPI_register_thread: unsafe extern "C" fn() -> c_int,
    PAPI_remove_event: unsafe extern "C" fn(EventSet: c_int, EventCode: c_int) -> c_int,
    PAPI_remove_named_event:
        unsafe extern "C" fn(EventSet: c_int, EventName: *const c_char) -> c_int,
    PAPI_reset: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_set_debug: unsafe extern "C" fn(level: c_int) -> c_int,
    PAPI_set_cmp_domain: unsafe extern "C" fn(domain: c_int, cidx: c_int) -> c_int,
    PAPI_set_domain: unsafe extern "C" fn(domain: c_int) -> c_int,
    PAPI_set_cmp_granularity: unsafe extern "C" fn(granularity: c_int, cidx: c_int) -> c_int,
    PAPI_set_granularity: unsafe extern "C" fn(granularity: c_int) -> c_int,
    PAPI_set_multiplex: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_shutdown: unsafe extern "C" fn(),
    PAPI_start: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_state: unsafe extern "C" fn(EventSet: c_int, status: *mut c_int) -> c_int,
    PAPI_stop: unsafe extern "C" fn(EventSet: c_int, values: *mut c_longlong) -> c_int,
    PAPI_strerror: unsafe extern "C" fn(code: c_int) -> *mut c_char,
    PAPI_thread_id: unsafe extern "C" fn() -> c_ulong,
    PAPI_thread_init: unsafe extern "C" fn(id_fn: Option<extern "C" fn() -> c_ulong>) -> c_int,
    PAPI_unlock: unsafe extern "C" fn(lck: c_int) -> c_int,
    PAPI_unregister_thread: unsafe extern "C" fn() -> c_int,
    PAPI_write: unsafe extern "C" fn(EventSet: c_int, values: *mut c_longlong) -> c_int,
    PAPI_get_event_component: unsafe extern "C" fn(EventCode: c_int) -> c_int,
    PAPI_get_eventset_component: unsafe extern "C" fn(EventSet: c_int) -> c_int,
    PAPI_get_component_index: unsafe extern "C" fn(name: *const c_char) -> c_int,
    PAPI_disable_component_by_name: unsafe extern "C" fn(name: *const c_char) -> c_int,
    PAPI_num_components: unsafe extern "C" fn() -> c_int,

    // Rate functions
    PAPI_flips_rate: unsafe extern "C" fn(
        event: c_int,
        rtime: *mut c_float,
        ptime: *mut c_float,
        flpins: *mut c_longlong,
        mflips: *mut c_float,
    ) -> c_int,
    PAPI_flops_rate: unsafe extern "C" fn(
        event: c_int,
        rtime: *mut c_float,
        ptime: *mut c_float,
        flpops: *mut c_longlong,
        mflops: *mut c_float,
    ) -> c_int,
    PAPI_ipc: unsafe extern "C" fn(
        rtime: *mut c_float,
        ptime: *mut c_float,
        ins: *mut c_longlong,
        ipc: *mut c_float,
    ) -> c_int,
    PAPI_epc: unsafe extern "C" fn(
        event: c_int,
        rtime: *mut c_float,
        ptime: *mut c_float,
        ref_: *mut c_longlong,
        core: *mut c_longlong,
        evt: *mut c_longlong,
        epc: *mut c_float,
    ) -> c_int,
    PAPI_rate_stop: unsafe extern "C" fn() -> c_int,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        // Sizes on LP64 targets, matching sizeof() in C.
        assert_eq!(std::mem::size_of::<PAPI_dmem_info_t>(), 12 * 8);
        assert_eq!(std::mem::size_of::<PAPI_mh_tlb_info_t>(), 16);
        assert_eq!(std::mem::size_of::<PAPI_mh_cache_info_t>(), 20);
        assert_eq!(std::mem::size_of::<PAPI_mh_level_t>(), 6 * 16 + 6 * 20);
        assert_eq!(std::mem::size_of::<PAPI_mh_info_t>(), 4 + 4 * 216);
        if cfg!(target_pointer_width = "64") {
            assert_eq!(std::mem::size_of::<PAPI_address_map_t>(), 1024 + 6 * 8);
            assert_eq!(std::mem::size_of::<PAPI_shlib_info_t>(), 16);
        }
    }
}
