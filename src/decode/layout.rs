//! Byte-level description of foreign records.
//!
//! A [`RecordLayout`] answers "where is field `x` and how is it stored" for one C type. It
//! is the read-by-name capability the decoder works on; the decoding rules themselves live
//! in [`crate::decode::rule`].

use std::fmt;

/// Size in bytes of a foreign pointer.
pub const POINTER_SIZE: usize = std::mem::size_of::<usize>();

/// How a field is stored in foreign memory.
#[derive(Clone, Copy)]
pub enum Storage {
    /// A two's complement integer of `size` bytes.
    Int {
        /// Width in bytes (1, 2, 4 or 8).
        size: usize,
        /// Whether the C type is signed.
        signed: bool,
    },
    /// A C `float`.
    Float,
    /// A C `double`.
    Double,
    /// A bitfield member inside an `unsigned int` storage unit located at the field offset.
    Bits {
        /// Position of the lowest bit, counted in declaration order.
        shift: u32,
        /// Number of bits.
        width: u32,
    },
    /// An inline `char[N]` buffer.
    Chars(usize),
    /// A `char *` pointing to a NUL terminated string.
    CharPtr,
    /// An opaque pointer.
    Ptr,
    /// An inline fixed size array.
    Array(&'static Storage, usize),
    /// An inline struct.
    Struct(&'static RecordLayout),
    /// A pointer to one or more structs.
    StructPtr(&'static RecordLayout),
}

impl Storage {
    /// `int`
    pub const INT: Storage = Storage::Int {
        size: 4,
        signed: true,
    };
    /// `unsigned int`
    pub const UINT: Storage = Storage::Int {
        size: 4,
        signed: false,
    };
    /// `long long`
    pub const LONGLONG: Storage = Storage::Int {
        size: 8,
        signed: true,
    };

    /// Number of bytes occupied by one value of this storage.
    pub fn size(&self) -> usize {
        match *self {
            Storage::Int { size, .. } => size,
            Storage::Float => 4,
            Storage::Double => 8,
            Storage::Bits { .. } => 4,
            Storage::Chars(len) => len,
            Storage::CharPtr | Storage::Ptr | Storage::StructPtr(_) => POINTER_SIZE,
            Storage::Array(elem, len) => elem.size() * len,
            Storage::Struct(layout) => layout.size,
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Storage::Int { size, signed } => {
                write!(f, "{}{}", if signed { "i" } else { "u" }, size * 8)
            }
            Storage::Float => write!(f, "float"),
            Storage::Double => write!(f, "double"),
            Storage::Bits { shift, width } => write!(f, "bits[{}..{}]", shift, shift + width),
            Storage::Chars(len) => write!(f, "char[{}]", len),
            Storage::CharPtr => write!(f, "char*"),
            Storage::Ptr => write!(f, "void*"),
            Storage::Array(elem, len) => write!(f, "{:?}[{}]", elem, len),
            Storage::Struct(layout) => write!(f, "struct {}", layout.name),
            Storage::StructPtr(layout) => write!(f, "struct {}*", layout.name),
        }
    }
}

/// Location of one named field inside a foreign record.
#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    /// Name of the field as declared in C.
    pub name: &'static str,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// How the field is stored.
    pub storage: Storage,
}

/// Layout of a foreign record type.
#[derive(Debug)]
pub struct RecordLayout {
    /// Name of the C type.
    pub name: &'static str,
    /// `sizeof` the C type, including trailing padding.
    pub size: usize,
    /// Fields that can be read from the record.
    pub fields: &'static [FieldLayout],
}

impl RecordLayout {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl PartialEq for RecordLayout {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Build a [`RecordLayout`] for a `#[repr(C)]` struct, computing offsets from the struct.
///
/// A bitfield member is written `member @ storage_unit: Storage::Bits { .. }`, where
/// `storage_unit` is the Rust field holding the bits.
#[macro_export]
macro_rules! record_layout {
    (@offset $ty: ty, $name: ident) => {
        std::mem::offset_of!($ty, $name)
    };
    (@offset $ty: ty, $name: ident, $unit: ident) => {
        std::mem::offset_of!($ty, $unit)
    };
    ($ty: ty { $($name: ident $(@ $unit: ident)? : $storage: expr),* $(,)? }) => {
        $crate::decode::RecordLayout {
            name: stringify!($ty),
            size: std::mem::size_of::<$ty>(),
            fields: &[$(
                $crate::decode::FieldLayout {
                    name: stringify!($name),
                    offset: $crate::record_layout!(@offset $ty, $name $(, $unit)?),
                    storage: $storage,
                }
            ),*],
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Sample {
        a: u8,
        b: u32,
        c: [u16; 3],
        flags: u32,
    }

    static SAMPLE: RecordLayout = record_layout!(Sample {
        a: Storage::Int { size: 1, signed: false },
        b: Storage::UINT,
        c: Storage::Array(&Storage::Int { size: 2, signed: false }, 3),
        low @ flags: Storage::Bits { shift: 0, width: 4 },
        high @ flags: Storage::Bits { shift: 4, width: 28 },
    });

    #[test]
    fn test_layout_offsets() {
        assert_eq!(SAMPLE.name, "Sample");
        assert_eq!(SAMPLE.size, std::mem::size_of::<Sample>());
        assert_eq!(SAMPLE.field("a").unwrap().offset, 0);
        assert_eq!(SAMPLE.field("b").unwrap().offset, 4);
        assert_eq!(SAMPLE.field("c").unwrap().offset, 8);
        assert_eq!(SAMPLE.field("c").unwrap().storage.size(), 6);
        assert_eq!(SAMPLE.field("low").unwrap().offset, 16);
        assert_eq!(SAMPLE.field("high").unwrap().offset, 16);
        assert!(SAMPLE.field("flags").is_none());
    }

    #[test]
    fn test_storage_debug() {
        let s = Storage::Array(&Storage::Chars(16), 2);
        assert_eq!(format!("{:?}", s), "char[16][2]");
        assert_eq!(format!("{:?}", Storage::INT), "i32");
        assert_eq!(format!("{:?}", Storage::StructPtr(&SAMPLE)), "struct Sample*");
    }
}
