//! Conversion of foreign fixed-layout records into owned [`Record`]s.
//!
//! Decoding walks a [`DescriptorTable`] in order. Each descriptor names a field of the
//! table's [`RecordLayout`] and a [`Rule`] saying how to convert it. Pointers inside the
//! record are followed through a [`ForeignMemory`], so the result never refers back to
//! the source buffer.
//!
//! Errors from this module are always `Error::Decode`: a table that does not fit the
//! record it is applied to.

use crate::{Error, Result};
use byteorder::{NativeEndian, ReadBytesExt};
use log::{error, log_enabled, trace, warn, Level};
use std::convert::TryFrom;
use std::io::Cursor;

pub mod layout;
pub use layout::{FieldLayout, RecordLayout, Storage, POINTER_SIZE};

pub mod rule;
pub use rule::{Descriptor, DescriptorTable, NumKind, Rule};

mod value;
pub use value::{Record, Value};

mod memory;
pub use memory::{ForeignMemory, ProcessMemory, SnapshotMemory};

/// A `#[repr(C)]` mirror of a foreign record with a known descriptor table.
///
/// # Safety
/// `table().layout` must describe `Self` exactly: its size and every field offset. Every
/// field the layout names must be an initialized member of `Self`, so that the bytes it
/// covers (down to nested struct members) never include padding.
pub unsafe trait ForeignStruct: Sized {
    /// Table used to decode `Self`.
    fn table() -> &'static DescriptorTable;
}

/// Decode a record from a snapshot of its bytes.
pub fn decode_record(
    table: &'static DescriptorTable,
    bytes: &[u8],
    memory: &dyn ForeignMemory,
) -> Result<Record> {
    if bytes.len() < table.layout.size {
        return Err(report(Error::Decode {
            record: table.name,
            field: "",
            reason: format!(
                "snapshot of {} bytes is shorter than {} ({} bytes)",
                bytes.len(),
                table.layout.name,
                table.layout.size
            ),
        }));
    }
    if log_enabled!(Level::Trace) {
        trace!(
            "Decoding {} from\n{}",
            table.name,
            crate::util::hexdump(&bytes[..table.layout.size])
        );
    }
    Decoder { table, memory }.record(bytes).map_err(report)
}

/// Decode a `#[repr(C)]` value.
pub fn decode_struct<T: ForeignStruct>(value: &T, memory: &dyn ForeignMemory) -> Result<Record> {
    decode_record(T::table(), &snapshot(value), memory)
}

/// Copy the fields of a `#[repr(C)]` value that its layout declares.
///
/// Padding and undeclared members read back as zero.
pub fn snapshot<T: ForeignStruct>(value: &T) -> Vec<u8> {
    let layout = T::table().layout;
    let mut bytes = vec![0u8; std::cmp::max(layout.size, std::mem::size_of::<T>())];
    let base = value as *const T as *const u8;
    for field in layout.fields {
        copy_storage(&field.storage, base, &mut bytes, field.offset);
    }
    bytes
}

/// Copy the initialized bytes of one field, recursing through arrays and nested structs.
fn copy_storage(storage: &Storage, base: *const u8, dst: &mut [u8], offset: usize) {
    match *storage {
        Storage::Array(elem, len) => {
            let stride = elem.size();
            for i in 0..len {
                copy_storage(elem, base, dst, offset + i * stride);
            }
        }
        Storage::Struct(layout) => {
            for field in layout.fields {
                copy_storage(&field.storage, base, dst, offset + field.offset);
            }
        }
        _ => {
            let size = storage.size();
            // Offsets come from the layout of `T`, which the `ForeignStruct` contract ties
            // to initialized members.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    base.add(offset),
                    dst[offset..offset + size].as_mut_ptr(),
                    size,
                );
            }
        }
    }
}

/// Decode the record behind a pointer, `None` when the pointer is null.
///
/// # Safety
/// A non-null `ptr` must point to a valid `T` for the duration of the call.
pub unsafe fn decode_ptr<T: ForeignStruct>(
    ptr: *const T,
    memory: &dyn ForeignMemory,
) -> Result<Option<Record>> {
    match ptr.as_ref() {
        Some(value) => decode_struct(value, memory).map(Some),
        None => Ok(None),
    }
}

fn report(err: Error) -> Error {
    error!("Descriptor table defect -- {}", err);
    err
}

/// Decoding state for one record.
struct Decoder<'m> {
    table: &'static DescriptorTable,
    memory: &'m dyn ForeignMemory,
}

impl<'m> Decoder<'m> {
    fn record(&self, bytes: &[u8]) -> Result<Record> {
        let mut out = Record::with_capacity(self.table.name, self.table.fields.len());
        for desc in self.table.fields {
            let field = self.table.layout.field(desc.name).ok_or_else(|| {
                self.table
                    .defect(desc.name, format!("no field in {}", self.table.layout.name))
            })?;
            let raw = bytes
                .get(field.offset..field.offset + field.storage.size())
                .ok_or_else(|| {
                    self.table.defect(desc.name, "field lies outside the record".into())
                })?;
            let value = match desc.rule {
                Rule::DynamicArray {
                    table,
                    length_field,
                } => {
                    let len = self.length(&out, desc.name, length_field)?;
                    self.dynamic_array(desc.name, table, &field.storage, raw, len)?
                }
                rule => self.value(desc.name, &rule, &field.storage, raw)?,
            };
            out.push(desc.name, value);
        }
        Ok(out)
    }

    fn value(
        &self,
        name: &'static str,
        rule: &Rule,
        storage: &Storage,
        raw: &[u8],
    ) -> Result<Value> {
        let fail = |reason: String| self.table.defect(name, reason);
        match (rule, storage) {
            (Rule::Scalar(kind), _) => {
                rule::check_rule(rule, storage).map_err(fail)?;
                scalar(*kind, storage, raw)?
                    .ok_or_else(|| fail(format!("no number in {:?}", storage)))
            }
            (Rule::String, Storage::Chars(_)) => Ok(Value::Str(self.text(name, raw))),
            (Rule::String, Storage::CharPtr) => match read_pointer(raw)? {
                0 => Ok(Value::Null),
                addr => {
                    let bytes = self
                        .memory
                        .read_c_string(addr)
                        .map_err(|e| fail(e.to_string()))?;
                    Ok(Value::Str(self.text(name, &bytes)))
                }
            },
            (Rule::Address, Storage::Ptr)
            | (Rule::Address, Storage::CharPtr)
            | (Rule::Address, Storage::StructPtr(_)) => match read_pointer(raw)? {
                0 => Ok(Value::Null),
                addr => Ok(Value::Addr(addr)),
            },
            (Rule::FixedArray(elem), Storage::Array(elem_storage, len)) => {
                let stride = elem_storage.size();
                (0..*len)
                    .map(|i| {
                        let cell = &raw[i * stride..(i + 1) * stride];
                        self.value(name, elem, elem_storage, cell)
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
            (Rule::NestedStruct { table, depth }, _) => {
                self.nested(name, *table, *depth, storage, raw)
            }
            (Rule::DynamicArray { .. }, _) => {
                Err(fail("dynamic arrays cannot be nested in other rules".into()))
            }
            _ => Err(fail(rule::mismatch(rule, storage))),
        }
    }

    fn nested(
        &self,
        name: &'static str,
        table: &'static DescriptorTable,
        depth: u8,
        storage: &Storage,
        raw: &[u8],
    ) -> Result<Value> {
        match (depth, storage) {
            (0, Storage::Struct(layout)) if table.layout == *layout => {
                let inner = Decoder {
                    table,
                    memory: self.memory,
                };
                inner.record(raw).map(Value::Record)
            }
            (d, Storage::Array(elem, len)) if d > 0 => {
                let stride = elem.size();
                (0..*len)
                    .map(|i| {
                        let cell = &raw[i * stride..(i + 1) * stride];
                        self.nested(name, table, d - 1, elem, cell)
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
            (d, _) => Err(self.table.defect(
                name,
                format!("nested {} at depth {} cannot read {:?}", table.name, d, storage),
            )),
        }
    }

    fn dynamic_array(
        &self,
        name: &'static str,
        table: &'static DescriptorTable,
        storage: &Storage,
        raw: &[u8],
        len: usize,
    ) -> Result<Value> {
        let fail = |reason: String| self.table.defect(name, reason);
        let layout = match storage {
            Storage::StructPtr(layout) if table.layout == *layout => *layout,
            _ => return Err(fail(format!("dynamic {} cannot read {:?}", table.name, storage))),
        };
        if len == 0 {
            return Ok(Value::List(Vec::new()));
        }
        let addr = read_pointer(raw)?;
        if addr == 0 {
            return Err(fail(format!("null pointer with {} elements", len)));
        }
        let total = len
            .checked_mul(layout.size)
            .ok_or_else(|| fail(format!("{} elements of {} overflow", len, layout.name)))?;
        let bytes = self
            .memory
            .read_bytes(addr, total)
            .map_err(|e| fail(e.to_string()))?;
        let inner = Decoder {
            table,
            memory: self.memory,
        };
        bytes
            .chunks(layout.size)
            .map(|chunk| inner.record(chunk).map(Value::Record))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }

    /// Element count of a dynamic array, taken from a field decoded earlier.
    fn length(&self, out: &Record, name: &'static str, length_field: &str) -> Result<usize> {
        let value = out.get(length_field).ok_or_else(|| {
            self.table.defect(
                name,
                format!("length field {} has not been decoded", length_field),
            )
        })?;
        match value.as_i64().map(usize::try_from) {
            Some(Ok(n)) => Ok(n),
            _ => Err(self.table.defect(
                name,
                format!("length field {} holds {}", length_field, value),
            )),
        }
    }

    /// ASCII text up to the first NUL.
    fn text(&self, name: &'static str, bytes: &[u8]) -> String {
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        let bytes = &bytes[..end];
        if !bytes.is_ascii() {
            warn!(
                "Non-ASCII text in {}.{}, invalid bytes replaced",
                self.table.name, name
            );
        }
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Read a pointer-sized field as an address.
fn read_pointer(raw: &[u8]) -> Result<u64> {
    let mut cursor = Cursor::new(raw);
    let addr = if POINTER_SIZE == 8 {
        cursor.read_u64::<NativeEndian>()?
    } else {
        u64::from(cursor.read_u32::<NativeEndian>()?)
    };
    Ok(addr)
}

/// Read an integer of `size` bytes, widened to 64 bits the way a C integer is passed
/// through a generic `long long` slot: sign-extended if signed, zero-extended otherwise.
fn read_widened(raw: &[u8], size: usize, signed: bool) -> Result<i64> {
    let mut cursor = Cursor::new(raw);
    let value = match (size, signed) {
        (1, true) => i64::from(cursor.read_i8()?),
        (1, false) => i64::from(cursor.read_u8()?),
        (2, true) => i64::from(cursor.read_i16::<NativeEndian>()?),
        (2, false) => i64::from(cursor.read_u16::<NativeEndian>()?),
        (4, true) => i64::from(cursor.read_i32::<NativeEndian>()?),
        (4, false) => i64::from(cursor.read_u32::<NativeEndian>()?),
        (8, true) => cursor.read_i64::<NativeEndian>()?,
        _ => cursor.read_u64::<NativeEndian>()? as i64,
    };
    Ok(value)
}

/// Read a bitfield member from its `unsigned int` storage unit.
fn read_bits(raw: &[u8], shift: u32, width: u32) -> Result<i64> {
    let word = Cursor::new(raw).read_u32::<NativeEndian>()?;
    // Big endian ABIs allocate bitfields from the most significant bit.
    let shift = if cfg!(target_endian = "big") {
        32 - shift - width
    } else {
        shift
    };
    let mask = if width >= 32 { u32::max_value() } else { (1 << width) - 1 };
    Ok(i64::from((word >> shift) & mask))
}

/// Reinterpret a widened integer as `kind`.
pub fn narrow(kind: NumKind, raw: i64) -> Value {
    match kind {
        NumKind::I8 => Value::Int(i64::from(raw as i8)),
        NumKind::U8 => Value::UInt(u64::from(raw as u8)),
        NumKind::I16 => Value::Int(i64::from(raw as i16)),
        NumKind::U16 => Value::UInt(u64::from(raw as u16)),
        NumKind::I32 => Value::Int(i64::from(raw as i32)),
        NumKind::U32 => Value::UInt(u64::from(raw as u32)),
        NumKind::I64 => Value::Int(raw),
        NumKind::U64 => Value::UInt(raw as u64),
        NumKind::F32 => Value::Float(f64::from(raw as f32)),
        NumKind::F64 => Value::Float(raw as f64),
    }
}

/// Read a number stored as `storage`. `None` for storages that hold no number.
fn scalar(kind: NumKind, storage: &Storage, raw: &[u8]) -> Result<Option<Value>> {
    let mut cursor = Cursor::new(raw);
    let value = match *storage {
        Storage::Float => Value::Float(f64::from(cursor.read_f32::<NativeEndian>()?)),
        Storage::Double => {
            let v = cursor.read_f64::<NativeEndian>()?;
            if kind == NumKind::F32 {
                Value::Float(f64::from(v as f32))
            } else {
                Value::Float(v)
            }
        }
        Storage::Int { size, signed } => narrow(kind, read_widened(raw, size, signed)?),
        Storage::Bits { shift, width } => narrow(kind, read_bits(raw, shift, width)?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_layout;
    use nix::libc::{c_char, c_int, c_uint, c_void};
    use rayon::prelude::*;
    use std::ffi::CString;
    use std::ptr;

    #[repr(C)]
    struct Leaf {
        id: c_int,
        rank: c_int,
        label: *const c_char,
    }

    #[repr(C)]
    struct Sample {
        count: c_uint,
        wide: c_uint,
        ratio: f32,
        mhz: f64,
        name: [c_char; 16],
        desc: *const c_char,
        base: *const c_void,
        ids: [c_int; 3],
        names: [[c_char; 8]; 2],
        flags: c_uint,
        cells: [[Leaf; 2]; 3],
        items: *const Leaf,
    }

    static LEAF_LAYOUT: RecordLayout = record_layout!(Leaf {
        id: Storage::INT,
        label: Storage::CharPtr,
    });

    static LEAF_TABLE: DescriptorTable = DescriptorTable {
        name: "Leaf",
        layout: &LEAF_LAYOUT,
        fields: &[
            Descriptor::new("id", Rule::Scalar(NumKind::I32)),
            Descriptor::new("label", Rule::String),
        ],
    };

    static LEAF_STORAGE: Storage = Storage::Struct(&LEAF_LAYOUT);
    static LEAF_ROW: Storage = Storage::Array(&LEAF_STORAGE, 2);
    const NAME8: Storage = Storage::Chars(8);

    static SAMPLE_LAYOUT: RecordLayout = record_layout!(Sample {
        count: Storage::UINT,
        wide: Storage::UINT,
        ratio: Storage::Float,
        mhz: Storage::Double,
        name: Storage::Chars(16),
        desc: Storage::CharPtr,
        base: Storage::Ptr,
        ids: Storage::Array(&Storage::INT, 3),
        names: Storage::Array(&NAME8, 2),
        low @ flags: Storage::Bits { shift: 0, width: 4 },
        high @ flags: Storage::Bits { shift: 4, width: 12 },
        cells: Storage::Array(&LEAF_ROW, 3),
        items: Storage::StructPtr(&LEAF_LAYOUT),
    });

    static SAMPLE_TABLE: DescriptorTable = DescriptorTable {
        name: "Sample",
        layout: &SAMPLE_LAYOUT,
        fields: &[
            Descriptor::new("count", Rule::Scalar(NumKind::U32)),
            Descriptor::new("wide", Rule::Scalar(NumKind::I32)),
            Descriptor::new("ratio", Rule::Scalar(NumKind::F32)),
            Descriptor::new("mhz", Rule::Scalar(NumKind::F64)),
            Descriptor::new("name", Rule::String),
            Descriptor::new("desc", Rule::String),
            Descriptor::new("base", Rule::Address),
            Descriptor::new("ids", Rule::FixedArray(&Rule::Scalar(NumKind::I32))),
            Descriptor::new("names", Rule::FixedArray(&Rule::String)),
            Descriptor::new("low", Rule::Scalar(NumKind::U8)),
            Descriptor::new("high", Rule::Scalar(NumKind::U32)),
            Descriptor::new(
                "cells",
                Rule::NestedStruct {
                    table: &LEAF_TABLE,
                    depth: 2,
                },
            ),
            Descriptor::new(
                "items",
                Rule::DynamicArray {
                    table: &LEAF_TABLE,
                    length_field: "count",
                },
            ),
        ],
    };

    unsafe impl ForeignStruct for Sample {
        fn table() -> &'static DescriptorTable {
            &SAMPLE_TABLE
        }
    }

    static MISNAMED: DescriptorTable = DescriptorTable {
        name: "Sample",
        layout: &SAMPLE_LAYOUT,
        fields: &[
            Descriptor::new("count", Rule::Scalar(NumKind::U32)),
            Descriptor::new("s_field", Rule::String),
        ],
    };

    static WRONG_RULE: DescriptorTable = DescriptorTable {
        name: "Sample",
        layout: &SAMPLE_LAYOUT,
        fields: &[Descriptor::new("base", Rule::Scalar(NumKind::F64))],
    };

    fn fill(dst: &mut [c_char], text: &str) {
        for (d, s) in dst.iter_mut().zip(text.bytes()) {
            *d = s as c_char;
        }
    }

    /// Strings referenced by a `Sample`; must outlive it.
    struct Backing {
        desc: CString,
        labels: Vec<CString>,
        items: Vec<Leaf>,
    }

    impl Backing {
        fn new() -> Self {
            let labels: Vec<CString> = (0..8)
                .map(|i| CString::new(format!("leaf{}", i)).unwrap())
                .collect();
            let items = vec![
                Leaf {
                    id: 100,
                    rank: 0,
                    label: labels[6].as_ptr(),
                },
                Leaf {
                    id: 101,
                    rank: 1,
                    label: ptr::null(),
                },
            ];
            Backing {
                desc: CString::new("Intel(R) Core(TM)").unwrap(),
                labels,
                items,
            }
        }

        fn sample(&self) -> Sample {
            let leaf = |row: usize, col: usize| Leaf {
                id: (row * 2 + col) as c_int,
                rank: col as c_int,
                label: self.labels[(row * 2 + col) % 6].as_ptr(),
            };
            let mut sample = Sample {
                count: self.items.len() as c_uint,
                wide: 0xFFFF_FFFF,
                ratio: 0.5,
                mhz: 2400.25,
                name: [0; 16],
                desc: self.desc.as_ptr(),
                base: 0x40_0000 as *const c_void,
                ids: [1, -2, 3],
                names: [[0; 8]; 2],
                flags: 0xA | (0x123 << 4),
                cells: [
                    [leaf(0, 0), leaf(0, 1)],
                    [leaf(1, 0), leaf(1, 1)],
                    [leaf(2, 0), leaf(2, 1)],
                ],
                items: self.items.as_ptr(),
            };
            fill(&mut sample.name, "perf_event");
            fill(&mut sample.names[0], "L1");
            fill(&mut sample.names[1], "L2 cache");
            sample
        }
    }

    /// A count followed by a pointer to that many leaves.
    #[repr(C)]
    struct Span {
        len: u64,
        items: *const Leaf,
    }

    static SPAN_LAYOUT: RecordLayout = record_layout!(Span {
        len: Storage::Int { size: 8, signed: false },
        items: Storage::StructPtr(&LEAF_LAYOUT),
    });

    const SPAN_ITEMS: Descriptor = Descriptor::new(
        "items",
        Rule::DynamicArray {
            table: &LEAF_TABLE,
            length_field: "len",
        },
    );

    static SPAN_UNSIGNED: DescriptorTable = DescriptorTable {
        name: "Span",
        layout: &SPAN_LAYOUT,
        fields: &[Descriptor::new("len", Rule::Scalar(NumKind::U64)), SPAN_ITEMS],
    };

    static SPAN_SIGNED: DescriptorTable = DescriptorTable {
        name: "Span",
        layout: &SPAN_LAYOUT,
        fields: &[Descriptor::new("len", Rule::Scalar(NumKind::I64)), SPAN_ITEMS],
    };

    static SPAN_LATE_LENGTH: DescriptorTable = DescriptorTable {
        name: "Span",
        layout: &SPAN_LAYOUT,
        fields: &[SPAN_ITEMS, Descriptor::new("len", Rule::Scalar(NumKind::U64))],
    };

    static SHALLOW_CELLS: DescriptorTable = DescriptorTable {
        name: "Sample",
        layout: &SAMPLE_LAYOUT,
        fields: &[Descriptor::new(
            "cells",
            Rule::NestedStruct {
                table: &LEAF_TABLE,
                depth: 1,
            },
        )],
    };

    static DEEP_CELLS: DescriptorTable = DescriptorTable {
        name: "Sample",
        layout: &SAMPLE_LAYOUT,
        fields: &[Descriptor::new(
            "cells",
            Rule::NestedStruct {
                table: &LEAF_TABLE,
                depth: 3,
            },
        )],
    };

    /// Bytes of a `Span` holding `len` and an items pointer of 0x7000.
    fn span_bytes(len: u64) -> Vec<u8> {
        let mut bytes = vec![0u8; SPAN_LAYOUT.size];
        bytes[..8].copy_from_slice(&len.to_ne_bytes());
        let off = SPAN_LAYOUT.field("items").unwrap().offset;
        bytes[off..off + POINTER_SIZE].copy_from_slice(&0x7000usize.to_ne_bytes());
        bytes
    }

    fn defect(result: Result<Record>) -> (&'static str, String) {
        match result {
            Err(Error::Decode { field, reason, .. }) => (field, reason),
            other => panic!("expected a decode defect, got {:?}", other),
        }
    }

    #[test]
    fn test_sample_table_validates() {
        assert!(SAMPLE_TABLE.validate().is_ok());
        assert!(LEAF_TABLE.validate().is_ok());
    }

    #[test]
    fn test_decode_every_rule() {
        let backing = Backing::new();
        let sample = backing.sample();
        let mem = unsafe { ProcessMemory::new() };
        let r = decode_struct(&sample, &mem).unwrap();

        assert_eq!(r.type_name(), "Sample");
        assert_eq!(
            r.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            SAMPLE_TABLE.fields.iter().map(|d| d.name).collect::<Vec<_>>()
        );
        assert_eq!(r.get("count"), Some(&Value::UInt(2)));
        assert_eq!(r.get("wide"), Some(&Value::Int(-1)));
        assert_eq!(r.get("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(r.get("mhz"), Some(&Value::Float(2400.25)));
        assert_eq!(r.get_str("name"), Some("perf_event"));
        assert_eq!(r.get_str("desc"), Some("Intel(R) Core(TM)"));
        assert_eq!(r.get("base"), Some(&Value::Addr(0x40_0000)));
        assert_eq!(
            r.get("ids"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(-2), Value::Int(3)]))
        );
        assert_eq!(
            r.get("names"),
            Some(&Value::List(vec![
                Value::Str("L1".into()),
                Value::Str("L2 cache".into())
            ]))
        );

        let rows = r.get("cells").and_then(Value::as_list).unwrap();
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_list().unwrap();
            assert_eq!(row.len(), 2);
            for (j, cell) in row.iter().enumerate() {
                let cell = cell.as_record().unwrap();
                let id = i * 2 + j;
                assert_eq!(cell.type_name(), "Leaf");
                assert_eq!(cell.get_i64("id"), Some(id as i64));
                assert_eq!(cell.get_str("label"), Some(format!("leaf{}", id % 6).as_str()));
            }
        }

        let items = r.get("items").and_then(Value::as_list).unwrap();
        assert_eq!(items.len(), 2);
        let first = items[0].as_record().unwrap();
        assert_eq!(first.get_i64("id"), Some(100));
        assert_eq!(first.get_str("label"), Some("leaf6"));
        assert!(items[1].as_record().unwrap().get("label").unwrap().is_null());
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn test_decode_bitfields() {
        let backing = Backing::new();
        let sample = backing.sample();
        let mem = unsafe { ProcessMemory::new() };
        let r = decode_struct(&sample, &mem).unwrap();
        assert_eq!(r.get("low"), Some(&Value::UInt(0xA)));
        assert_eq!(r.get("high"), Some(&Value::UInt(0x123)));
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(narrow(NumKind::I32, 0xFFFF_FFFF), Value::Int(-1));
        assert_eq!(narrow(NumKind::U32, -1), Value::UInt(0xFFFF_FFFF));
        assert_eq!(narrow(NumKind::U8, -1), Value::UInt(255));
        assert_eq!(narrow(NumKind::I16, 0x1_8000), Value::Int(-32768));
        assert_eq!(narrow(NumKind::I64, -7), Value::Int(-7));
        assert_eq!(read_widened(&[0xFF, 0xFF, 0xFF, 0xFF], 4, true).unwrap(), -1);
        assert_eq!(
            read_widened(&[0xFF, 0xFF, 0xFF, 0xFF], 4, false).unwrap(),
            0xFFFF_FFFF
        );
    }

    #[test]
    fn test_decode_is_idempotent() {
        let backing = Backing::new();
        let sample = backing.sample();
        let bytes = snapshot(&sample);
        let mem = unsafe { ProcessMemory::new() };
        let first = decode_record(&SAMPLE_TABLE, &bytes, &mem).unwrap();
        let second = decode_record(&SAMPLE_TABLE, &bytes, &mem).unwrap();
        assert_eq!(first, second);
        assert_eq!(format!("{}", first), format!("{}", second));

        let all: Vec<Record> = (0..32)
            .into_par_iter()
            .map(|_| decode_record(&SAMPLE_TABLE, &bytes, &mem).unwrap())
            .collect();
        assert!(all.iter().all(|r| *r == first));
    }

    #[test]
    fn test_empty_dynamic_array() {
        let backing = Backing::new();
        let mut sample = backing.sample();
        sample.count = 0;
        sample.items = ptr::null();
        let mem = unsafe { ProcessMemory::new() };
        let r = decode_struct(&sample, &mem).unwrap();
        assert_eq!(r.get("items"), Some(&Value::List(Vec::new())));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_dynamic_array_size_overflow() {
        let mem = SnapshotMemory::new().with_region(0x7000, vec![0u8; 64]);
        let (field, reason) = defect(decode_record(&SPAN_UNSIGNED, &span_bytes(1 << 62), &mem));
        assert_eq!(field, "items");
        assert!(reason.ends_with("elements of Leaf overflow"));

        let r = decode_record(&SPAN_UNSIGNED, &span_bytes(0), &mem).unwrap();
        assert_eq!(r.get("items"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn test_negative_length_is_a_defect() {
        let mem = SnapshotMemory::new().with_region(0x7000, vec![0u8; 64]);
        let bytes = span_bytes(u64::max_value());
        let (field, reason) = defect(decode_record(&SPAN_SIGNED, &bytes, &mem));
        assert_eq!(field, "items");
        assert_eq!(reason, "length field len holds -1");
    }

    #[test]
    fn test_late_length_is_a_defect() {
        let mem = SnapshotMemory::new();
        let (field, reason) = defect(decode_record(&SPAN_LATE_LENGTH, &span_bytes(1), &mem));
        assert_eq!(field, "items");
        assert_eq!(reason, "length field len has not been decoded");
        assert!(SPAN_LATE_LENGTH.validate().is_err());
    }

    #[test]
    fn test_nested_depth_mismatch_is_a_defect() {
        let backing = Backing::new();
        let bytes = snapshot(&backing.sample());
        let mem = unsafe { ProcessMemory::new() };
        for &table in [&SHALLOW_CELLS, &DEEP_CELLS].iter() {
            assert!(table.validate().is_err());
            let (field, reason) = defect(decode_record(table, &bytes, &mem));
            assert_eq!(field, "cells");
            assert!(reason.starts_with("nested Leaf at depth"));
        }
    }

    #[test]
    fn test_snapshot_skips_padding() {
        // `ratio` is followed by four bytes of padding before `mhz`.
        let backing = Backing::new();
        let sample = backing.sample();
        let ratio = SAMPLE_LAYOUT.field("ratio").unwrap().offset;
        let mhz = SAMPLE_LAYOUT.field("mhz").unwrap().offset;
        assert!(mhz > ratio + 4);
        let bytes = snapshot(&sample);
        assert_eq!(bytes.len(), std::mem::size_of::<Sample>());
        assert!(bytes[ratio + 4..mhz].iter().all(|b| *b == 0));
        assert_eq!(&bytes[mhz..mhz + 8], &2400.25f64.to_ne_bytes());
    }

    #[test]
    fn test_null_dynamic_array_is_a_defect() {
        let backing = Backing::new();
        let mut sample = backing.sample();
        sample.items = ptr::null();
        let mem = unsafe { ProcessMemory::new() };
        match decode_struct(&sample, &mem) {
            Err(Error::Decode { record, field, .. }) => {
                assert_eq!(record, "Sample");
                assert_eq!(field, "items");
            }
            other => panic!("expected a decode defect, got {:?}", other),
        }
    }

    #[test]
    fn test_null_pointers() {
        let backing = Backing::new();
        let mut sample = backing.sample();
        sample.desc = ptr::null();
        sample.base = ptr::null();
        let mem = unsafe { ProcessMemory::new() };
        let r = decode_struct(&sample, &mem).unwrap();
        assert!(r.get("desc").unwrap().is_null());
        assert!(r.get("base").unwrap().is_null());
        assert_eq!(format!("{}", r.get("desc").unwrap()), "None");

        let none = unsafe { decode_ptr::<Sample>(ptr::null(), &mem) }.unwrap();
        assert!(none.is_none());
        let some = unsafe { decode_ptr(&sample as *const Sample, &mem) }.unwrap();
        assert_eq!(some.unwrap().get_i64("count"), Some(2));
    }

    #[test]
    fn test_non_ascii_text_is_replaced() {
        let backing = Backing::new();
        let mut sample = backing.sample();
        sample.name[1] = 0xE9u8 as c_char;
        let mem = unsafe { ProcessMemory::new() };
        let r = decode_struct(&sample, &mem).unwrap();
        let name = r.get_str("name").unwrap();
        assert!(name.starts_with('p'));
        assert!(name.contains('\u{FFFD}'));
        assert!(name.ends_with("rf_event"));
    }

    #[test]
    fn test_defects_name_the_field() {
        let backing = Backing::new();
        let bytes = snapshot(&backing.sample());
        let mem = SnapshotMemory::new();

        let err = decode_record(&MISNAMED, &bytes, &mem).unwrap_err();
        assert!(err.is_defect());
        assert!(format!("{}", err).contains("Sample.s_field"));

        match decode_record(&WRONG_RULE, &bytes, &mem) {
            Err(Error::Decode { field, reason, .. }) => {
                assert_eq!(field, "base");
                assert_eq!(reason, "rule Scalar(F64) cannot read void*");
            }
            other => panic!("expected a decode defect, got {:?}", other),
        }
        assert!(WRONG_RULE.validate().is_err());
    }

    #[test]
    fn test_short_snapshot() {
        let mem = SnapshotMemory::new();
        let err = decode_record(&LEAF_TABLE, &[0u8; 3], &mem).unwrap_err();
        assert!(err.is_defect());
    }

    #[test]
    fn test_snapshot_pointers() {
        // A leaf copied out of another address space, its label at 0x9000.
        let mut bytes = vec![0u8; LEAF_LAYOUT.size];
        bytes[..4].copy_from_slice(&42i32.to_ne_bytes());
        let off = LEAF_LAYOUT.field("label").unwrap().offset;
        bytes[off..off + POINTER_SIZE].copy_from_slice(&0x9000usize.to_ne_bytes());
        let mem = SnapshotMemory::new().with_region(0x9000, b"remote\0".to_vec());
        let r = decode_record(&LEAF_TABLE, &bytes, &mem).unwrap();
        assert_eq!(format!("{}", r), "Leaf(id=42, label=\"remote\")");

        let missing = SnapshotMemory::new();
        let err = decode_record(&LEAF_TABLE, &bytes, &missing).unwrap_err();
        assert!(format!("{}", err).contains("Leaf.label"));
    }
}
