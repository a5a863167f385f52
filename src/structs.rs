//! Layouts and descriptor tables of the records returned by PAPI.
//!
//! Each table pairs a record from [`crate::papi::ffi`] with the rules used to turn it into
//! a [`Record`](crate::decode::Record). The `*_TABLE` statics are what the library
//! wrappers decode with; they are public so that snapshots taken elsewhere can be decoded
//! with [`decode_record`](crate::decode::decode_record).

use crate::decode::{
    Descriptor, DescriptorTable, FieldLayout, ForeignStruct, NumKind, RecordLayout, Rule,
    Storage,
};
use crate::papi::ffi::*;
use crate::record_layout;
use std::mem::{offset_of, size_of};

const I32: Rule = Rule::Scalar(NumKind::I32);
const U32: Rule = Rule::Scalar(NumKind::U32);
const I64: Rule = Rule::Scalar(NumKind::I64);
const F32: Rule = Rule::Scalar(NumKind::F32);
const STR: Rule = Rule::String;
const ADDR: Rule = Rule::Address;

const fn flag(shift: u32) -> Storage {
    Storage::Bits { shift, width: 1 }
}

// PAPI_dmem_info_t

static DMEM_INFO_LAYOUT: RecordLayout = record_layout!(PAPI_dmem_info_t {
    peak: Storage::LONGLONG,
    size: Storage::LONGLONG,
    resident: Storage::LONGLONG,
    high_water_mark: Storage::LONGLONG,
    shared: Storage::LONGLONG,
    text: Storage::LONGLONG,
    library: Storage::LONGLONG,
    heap: Storage::LONGLONG,
    locked: Storage::LONGLONG,
    stack: Storage::LONGLONG,
    pagesize: Storage::LONGLONG,
    pte: Storage::LONGLONG,
});

/// Dynamic memory usage of the process.
pub static DMEM_INFO_TABLE: DescriptorTable = DescriptorTable {
    name: "DmemInfo",
    layout: &DMEM_INFO_LAYOUT,
    fields: &[
        Descriptor::new("peak", I64),
        Descriptor::new("size", I64),
        Descriptor::new("resident", I64),
        Descriptor::new("high_water_mark", I64),
        Descriptor::new("shared", I64),
        Descriptor::new("text", I64),
        Descriptor::new("library", I64),
        Descriptor::new("heap", I64),
        Descriptor::new("locked", I64),
        Descriptor::new("stack", I64),
        Descriptor::new("pagesize", I64),
        Descriptor::new("pte", I64),
    ],
};

// PAPI_event_info_t

const NAME_TERM: Storage = Storage::Chars(PAPI_2MAX_STR_LEN);

static EVENT_INFO_LAYOUT: RecordLayout = record_layout!(PAPI_event_info_t {
    event_code: Storage::UINT,
    symbol: Storage::Chars(PAPI_HUGE_STR_LEN),
    short_descr: Storage::Chars(PAPI_MIN_STR_LEN),
    long_descr: Storage::Chars(PAPI_HUGE_STR_LEN),
    component_index: Storage::INT,
    units: Storage::Chars(PAPI_MIN_STR_LEN),
    location: Storage::INT,
    data_type: Storage::INT,
    value_type: Storage::INT,
    timescope: Storage::INT,
    update_type: Storage::INT,
    update_freq: Storage::INT,
    count: Storage::UINT,
    event_type: Storage::UINT,
    derived: Storage::Chars(PAPI_MIN_STR_LEN),
    postfix: Storage::Chars(PAPI_2MAX_STR_LEN),
    code: Storage::Array(&Storage::UINT, PAPI_MAX_INFO_TERMS),
    name: Storage::Array(&NAME_TERM, PAPI_MAX_INFO_TERMS),
    note: Storage::Chars(PAPI_HUGE_STR_LEN),
});

/// Description of a preset or native event.
///
/// `event_code` is declared `I32`: preset codes have the top bit set and print negative,
/// matching the codes accepted by the event set wrappers.
pub static EVENT_INFO_TABLE: DescriptorTable = DescriptorTable {
    name: "EventInfo",
    layout: &EVENT_INFO_LAYOUT,
    fields: &[
        Descriptor::new("event_code", I32),
        Descriptor::new("symbol", STR),
        Descriptor::new("short_descr", STR),
        Descriptor::new("long_descr", STR),
        Descriptor::new("component_index", I32),
        Descriptor::new("units", STR),
        Descriptor::new("location", I32),
        Descriptor::new("data_type", I32),
        Descriptor::new("value_type", I32),
        Descriptor::new("timescope", I32),
        Descriptor::new("update_type", I32),
        Descriptor::new("update_freq", I32),
        Descriptor::new("count", U32),
        Descriptor::new("event_type", U32),
        Descriptor::new("derived", STR),
        Descriptor::new("postfix", STR),
        Descriptor::new("code", Rule::FixedArray(&U32)),
        Descriptor::new("name", Rule::FixedArray(&STR)),
        Descriptor::new("note", STR),
    ],
};

// Memory hierarchy. `type` is a keyword, so these two layouts are spelled out.

static MH_TLB_LAYOUT: RecordLayout = RecordLayout {
    name: "PAPI_mh_tlb_info_t",
    size: size_of::<PAPI_mh_tlb_info_t>(),
    fields: &[
        FieldLayout {
            name: "type",
            offset: offset_of!(PAPI_mh_tlb_info_t, type_),
            storage: Storage::INT,
        },
        FieldLayout {
            name: "num_entries",
            offset: offset_of!(PAPI_mh_tlb_info_t, num_entries),
            storage: Storage::INT,
        },
        FieldLayout {
            name: "page_size",
            offset: offset_of!(PAPI_mh_tlb_info_t, page_size),
            storage: Storage::INT,
        },
        FieldLayout {
            name: "associativity",
            offset: offset_of!(PAPI_mh_tlb_info_t, associativity),
            storage: Storage::INT,
        },
    ],
};

/// One TLB of a memory hierarchy level.
pub static MH_TLB_TABLE: DescriptorTable = DescriptorTable {
    name: "MhTlb",
    layout: &MH_TLB_LAYOUT,
    fields: &[
        Descriptor::new("type", I32),
        Descriptor::new("num_entries", I32),
        Descriptor::new("page_size", I32),
        Descriptor::new("associativity", I32),
    ],
};

static MH_CACHE_LAYOUT: RecordLayout = RecordLayout {
    name: "PAPI_mh_cache_info_t",
    size: size_of::<PAPI_mh_cache_info_t>(),
    fields: &[
        FieldLayout {
            name: "type",
            offset: offset_of!(PAPI_mh_cache_info_t, type_),
            storage: Storage::INT,
        },
        FieldLayout {
            name: "size",
            offset: offset_of!(PAPI_mh_cache_info_t, size),
            storage: Storage::INT,
        },
        FieldLayout {
            name: "line_size",
            offset: offset_of!(PAPI_mh_cache_info_t, line_size),
            storage: Storage::INT,
        },
        FieldLayout {
            name: "num_lines",
            offset: offset_of!(PAPI_mh_cache_info_t, num_lines),
            storage: Storage::INT,
        },
        FieldLayout {
            name: "associativity",
            offset: offset_of!(PAPI_mh_cache_info_t, associativity),
            storage: Storage::INT,
        },
    ],
};

/// One cache of a memory hierarchy level.
pub static MH_CACHE_TABLE: DescriptorTable = DescriptorTable {
    name: "MhCache",
    layout: &MH_CACHE_LAYOUT,
    fields: &[
        Descriptor::new("type", I32),
        Descriptor::new("size", I32),
        Descriptor::new("line_size", I32),
        Descriptor::new("num_lines", I32),
        Descriptor::new("associativity", I32),
    ],
};

static MH_TLB_STORAGE: Storage = Storage::Struct(&MH_TLB_LAYOUT);
static MH_CACHE_STORAGE: Storage = Storage::Struct(&MH_CACHE_LAYOUT);

static MH_LEVEL_LAYOUT: RecordLayout = record_layout!(PAPI_mh_level_t {
    tlb: Storage::Array(&MH_TLB_STORAGE, PAPI_MH_MAX_LEVELS),
    cache: Storage::Array(&MH_CACHE_STORAGE, PAPI_MH_MAX_LEVELS),
});

/// TLBs and caches of one memory hierarchy level.
pub static MH_LEVEL_TABLE: DescriptorTable = DescriptorTable {
    name: "MhLevel",
    layout: &MH_LEVEL_LAYOUT,
    fields: &[
        Descriptor::new(
            "tlb",
            Rule::NestedStruct {
                table: &MH_TLB_TABLE,
                depth: 1,
            },
        ),
        Descriptor::new(
            "cache",
            Rule::NestedStruct {
                table: &MH_CACHE_TABLE,
                depth: 1,
            },
        ),
    ],
};

static MH_LEVEL_STORAGE: Storage = Storage::Struct(&MH_LEVEL_LAYOUT);

static MH_INFO_LAYOUT: RecordLayout = record_layout!(PAPI_mh_info_t {
    levels: Storage::INT,
    level: Storage::Array(&MH_LEVEL_STORAGE, PAPI_MAX_MEM_HIERARCHY_LEVELS),
});

/// The memory hierarchy. Every slot of `level` is decoded; `levels` says how many are
/// populated.
pub static MH_INFO_TABLE: DescriptorTable = DescriptorTable {
    name: "MhInfo",
    layout: &MH_INFO_LAYOUT,
    fields: &[
        Descriptor::new("levels", I32),
        Descriptor::new(
            "level",
            Rule::NestedStruct {
                table: &MH_LEVEL_TABLE,
                depth: 1,
            },
        ),
    ],
};

// PAPI_hw_info_t

static HW_INFO_LAYOUT: RecordLayout = record_layout!(PAPI_hw_info_t {
    ncpu: Storage::INT,
    threads: Storage::INT,
    cores: Storage::INT,
    sockets: Storage::INT,
    nnodes: Storage::INT,
    totalcpus: Storage::INT,
    vendor: Storage::INT,
    vendor_string: Storage::Chars(PAPI_MAX_STR_LEN),
    model: Storage::INT,
    model_string: Storage::Chars(PAPI_MAX_STR_LEN),
    revision: Storage::Float,
    cpuid_family: Storage::INT,
    cpuid_model: Storage::INT,
    cpuid_stepping: Storage::INT,
    cpu_max_mhz: Storage::INT,
    cpu_min_mhz: Storage::INT,
    mem_hierarchy: Storage::Struct(&MH_INFO_LAYOUT),
    virtualized: Storage::INT,
    virtual_vendor_string: Storage::Chars(PAPI_MAX_STR_LEN),
    virtual_vendor_version: Storage::Chars(PAPI_MAX_STR_LEN),
    mhz: Storage::Float,
    clock_mhz: Storage::INT,
});

/// Hardware description. The deprecated `mhz` and `clock_mhz` are left out.
pub static HW_INFO_TABLE: DescriptorTable = DescriptorTable {
    name: "HardwareInfo",
    layout: &HW_INFO_LAYOUT,
    fields: &[
        Descriptor::new("ncpu", I32),
        Descriptor::new("threads", I32),
        Descriptor::new("cores", I32),
        Descriptor::new("sockets", I32),
        Descriptor::new("nnodes", I32),
        Descriptor::new("totalcpus", I32),
        Descriptor::new("vendor", I32),
        Descriptor::new("vendor_string", STR),
        Descriptor::new("model", I32),
        Descriptor::new("model_string", STR),
        Descriptor::new("revision", F32),
        Descriptor::new("cpuid_family", I32),
        Descriptor::new("cpuid_model", I32),
        Descriptor::new("cpuid_stepping", I32),
        Descriptor::new("cpu_max_mhz", I32),
        Descriptor::new("cpu_min_mhz", I32),
        Descriptor::new(
            "mem_hierarchy",
            Rule::NestedStruct {
                table: &MH_INFO_TABLE,
                depth: 0,
            },
        ),
        Descriptor::new("virtualized", I32),
        Descriptor::new("virtual_vendor_string", STR),
        Descriptor::new("virtual_vendor_version", STR),
    ],
};

// Executable and shared libraries

static ADDRESS_MAP_LAYOUT: RecordLayout = record_layout!(PAPI_address_map_t {
    name: Storage::Chars(PAPI_HUGE_STR_LEN),
    text_start: Storage::CharPtr,
    text_end: Storage::CharPtr,
    data_start: Storage::CharPtr,
    data_end: Storage::CharPtr,
    bss_start: Storage::CharPtr,
    bss_end: Storage::CharPtr,
});

/// Text, data and bss ranges of one mapped object.
pub static ADDRESS_MAP_TABLE: DescriptorTable = DescriptorTable {
    name: "AddressMap",
    layout: &ADDRESS_MAP_LAYOUT,
    fields: &[
        Descriptor::new("name", STR),
        Descriptor::new("text_start", ADDR),
        Descriptor::new("text_end", ADDR),
        Descriptor::new("data_start", ADDR),
        Descriptor::new("data_end", ADDR),
        Descriptor::new("bss_start", ADDR),
        Descriptor::new("bss_end", ADDR),
    ],
};

static EXE_INFO_LAYOUT: RecordLayout = record_layout!(PAPI_exe_info_t {
    fullname: Storage::Chars(PAPI_HUGE_STR_LEN),
    address_info: Storage::Struct(&ADDRESS_MAP_LAYOUT),
});

/// The running executable.
pub static EXE_INFO_TABLE: DescriptorTable = DescriptorTable {
    name: "ExecutableInfo",
    layout: &EXE_INFO_LAYOUT,
    fields: &[
        Descriptor::new("fullname", STR),
        Descriptor::new(
            "address_info",
            Rule::NestedStruct {
                table: &ADDRESS_MAP_TABLE,
                depth: 0,
            },
        ),
    ],
};

static SHLIB_INFO_LAYOUT: RecordLayout = record_layout!(PAPI_shlib_info_t {
    map: Storage::StructPtr(&ADDRESS_MAP_LAYOUT),
    count: Storage::INT,
});

/// Shared objects mapped in the process. `map` holds `count` address maps.
pub static SHLIB_INFO_TABLE: DescriptorTable = DescriptorTable {
    name: "SharedLibInfo",
    layout: &SHLIB_INFO_LAYOUT,
    fields: &[
        Descriptor::new("count", I32),
        Descriptor::new(
            "map",
            Rule::DynamicArray {
                table: &ADDRESS_MAP_TABLE,
                length_field: "count",
            },
        ),
    ],
};

// PAPI_component_info_t

static COMPONENT_INFO_LAYOUT: RecordLayout = record_layout!(PAPI_component_info_t {
    name: Storage::Chars(PAPI_MAX_STR_LEN),
    short_name: Storage::Chars(PAPI_MIN_STR_LEN),
    description: Storage::Chars(PAPI_MAX_STR_LEN),
    version: Storage::Chars(PAPI_MIN_STR_LEN),
    support_version: Storage::Chars(PAPI_MIN_STR_LEN),
    kernel_version: Storage::Chars(PAPI_MIN_STR_LEN),
    disabled_reason: Storage::Chars(PAPI_MAX_STR_LEN),
    disabled: Storage::INT,
    CmpIdx: Storage::INT,
    num_cntrs: Storage::INT,
    num_mpx_cntrs: Storage::INT,
    num_preset_events: Storage::INT,
    num_native_events: Storage::INT,
    default_domain: Storage::INT,
    available_domains: Storage::INT,
    default_granularity: Storage::INT,
    available_granularities: Storage::INT,
    hardware_intr_sig: Storage::INT,
    component_type: Storage::INT,
    pmu_names: Storage::Array(&Storage::CharPtr, PAPI_PMU_MAX),
    reserved: Storage::Array(&Storage::INT, 8),
    hardware_intr @ _bitfield_1: flag(0),
    precise_intr @ _bitfield_1: flag(1),
    posix1b_timers @ _bitfield_1: flag(2),
    kernel_profile @ _bitfield_1: flag(3),
    kernel_multiplex @ _bitfield_1: flag(4),
    fast_counter_read @ _bitfield_1: flag(5),
    fast_real_timer @ _bitfield_1: flag(6),
    fast_virtual_timer @ _bitfield_1: flag(7),
    attach @ _bitfield_1: flag(8),
    attach_must_ptrace @ _bitfield_1: flag(9),
    cntr_umasks @ _bitfield_1: flag(10),
    cpu @ _bitfield_1: flag(11),
    inherit @ _bitfield_1: flag(12),
    reserved_bits @ _bitfield_1: Storage::Bits { shift: 13, width: 12 },
});

/// A PAPI component and its capabilities.
pub static COMPONENT_INFO_TABLE: DescriptorTable = DescriptorTable {
    name: "ComponentInfo",
    layout: &COMPONENT_INFO_LAYOUT,
    fields: &[
        Descriptor::new("name", STR),
        Descriptor::new("short_name", STR),
        Descriptor::new("description", STR),
        Descriptor::new("version", STR),
        Descriptor::new("support_version", STR),
        Descriptor::new("kernel_version", STR),
        Descriptor::new("disabled_reason", STR),
        Descriptor::new("disabled", I32),
        Descriptor::new("CmpIdx", I32),
        Descriptor::new("num_cntrs", I32),
        Descriptor::new("num_mpx_cntrs", I32),
        Descriptor::new("num_preset_events", I32),
        Descriptor::new("num_native_events", I32),
        Descriptor::new("default_domain", I32),
        Descriptor::new("available_domains", I32),
        Descriptor::new("default_granularity", I32),
        Descriptor::new("available_granularities", I32),
        Descriptor::new("hardware_intr_sig", I32),
        Descriptor::new("component_type", I32),
        Descriptor::new("pmu_names", Rule::FixedArray(&STR)),
        Descriptor::new("reserved", Rule::FixedArray(&I32)),
        Descriptor::new("hardware_intr", U32),
        Descriptor::new("precise_intr", U32),
        Descriptor::new("posix1b_timers", U32),
        Descriptor::new("kernel_profile", U32),
        Descriptor::new("kernel_multiplex", U32),
        Descriptor::new("fast_counter_read", U32),
        Descriptor::new("fast_real_timer", U32),
        Descriptor::new("fast_virtual_timer", U32),
        Descriptor::new("attach", U32),
        Descriptor::new("attach_must_ptrace", U32),
        Descriptor::new("cntr_umasks", U32),
        Descriptor::new("cpu", U32),
        Descriptor::new("inherit", U32),
        Descriptor::new("reserved_bits", U32),
    ],
};

macro_rules! foreign_struct {
    ($($ty: ty => $table: ident),* $(,)?) => {
        $(
            unsafe impl ForeignStruct for $ty {
                fn table() -> &'static DescriptorTable {
                    &$table
                }
            }
        )*
    };
}

foreign_struct!(
    PAPI_dmem_info_t => DMEM_INFO_TABLE,
    PAPI_event_info_t => EVENT_INFO_TABLE,
    PAPI_mh_tlb_info_t => MH_TLB_TABLE,
    PAPI_mh_cache_info_t => MH_CACHE_TABLE,
    PAPI_mh_level_t => MH_LEVEL_TABLE,
    PAPI_mh_info_t => MH_INFO_TABLE,
    PAPI_hw_info_t => HW_INFO_TABLE,
    PAPI_address_map_t => ADDRESS_MAP_TABLE,
    PAPI_exe_info_t => EXE_INFO_TABLE,
    PAPI_shlib_info_t => SHLIB_INFO_TABLE,
    PAPI_component_info_t => COMPONENT_INFO_TABLE,
);

/// Every table shipped with the crate.
pub fn tables() -> &'static [&'static DescriptorTable] {
    static ALL: [&DescriptorTable; 11] = [
        &DMEM_INFO_TABLE,
        &EVENT_INFO_TABLE,
        &MH_TLB_TABLE,
        &MH_CACHE_TABLE,
        &MH_LEVEL_TABLE,
        &MH_INFO_TABLE,
        &HW_INFO_TABLE,
        &ADDRESS_MAP_TABLE,
        &EXE_INFO_TABLE,
        &SHLIB_INFO_TABLE,
        &COMPONENT_INFO_TABLE,
    ];
    &ALL
}

/// Look up a shipped table by record name, e.g. `"HardwareInfo"`.
pub fn table(name: &str) -> Option<&'static DescriptorTable> {
    tables().iter().copied().find(|t| t.name == name)
}
