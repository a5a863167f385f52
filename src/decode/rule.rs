//! Declarative decoding rules.

use crate::decode::layout::{RecordLayout, Storage};
use crate::{Error, Result};

/// Numeric type a scalar field is narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumKind {
    /// `signed char`
    I8,
    /// `unsigned char`
    U8,
    /// `short`
    I16,
    /// `unsigned short`
    U16,
    /// `int`
    I32,
    /// `unsigned int`
    U32,
    /// `long long`
    I64,
    /// `unsigned long long`
    U64,
    /// `float`
    F32,
    /// `double`
    F64,
}

impl NumKind {
    /// True for `F32` and `F64`.
    pub fn is_float(self) -> bool {
        match self {
            NumKind::F32 | NumKind::F64 => true,
            _ => false,
        }
    }
}

/// How a single field is turned into a [`crate::decode::Value`].
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// A number, narrowed to the given kind.
    Scalar(NumKind),
    /// Text from a `char[N]` buffer or a `char *`.
    String,
    /// A pointer kept as an integer address.
    Address,
    /// Apply the element rule to every entry of an inline array.
    FixedArray(&'static Rule),
    /// A struct, wrapped in `depth` levels of inline arrays.
    NestedStruct {
        /// Table of the innermost struct.
        table: &'static DescriptorTable,
        /// Number of array levels around the struct.
        depth: u8,
    },
    /// A pointer to `length_field` consecutive structs.
    DynamicArray {
        /// Table of the pointed-to struct.
        table: &'static DescriptorTable,
        /// Sibling field holding the element count. Must come earlier in the table.
        length_field: &'static str,
    },
}

/// Maps one field name to its rule.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    /// Field name, as found in the record layout.
    pub name: &'static str,
    /// Rule applied to the field.
    pub rule: Rule,
}

impl Descriptor {
    /// Construct a descriptor.
    pub const fn new(name: &'static str, rule: Rule) -> Self {
        Descriptor { name, rule }
    }
}

/// Schema used to decode one record type.
#[derive(Debug)]
pub struct DescriptorTable {
    /// Name given to decoded records.
    pub name: &'static str,
    /// Foreign layout the descriptors read from.
    pub layout: &'static RecordLayout,
    /// Descriptors, in decoding and display order.
    pub fields: &'static [Descriptor],
}

impl DescriptorTable {
    /// Position of a descriptor in the table.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|d| d.name == name)
    }

    /// Check every descriptor against the layout, recursing into nested tables.
    ///
    /// Decoding performs the same checks lazily; this lets a table be verified without a
    /// record at hand.
    pub fn validate(&self) -> Result<()> {
        for (idx, desc) in self.fields.iter().enumerate() {
            let field = self.layout.field(desc.name).ok_or_else(|| {
                self.defect(desc.name, format!("no field in {}", self.layout.name))
            })?;
            if let Rule::DynamicArray { length_field, .. } = desc.rule {
                match self.position(length_field) {
                    Some(pos) if pos < idx => {
                        let len_rule = self.fields[pos].rule;
                        match len_rule {
                            Rule::Scalar(kind) if !kind.is_float() => {}
                            _ => {
                                return Err(self.defect(
                                    desc.name,
                                    format!("length field {} is not an integer", length_field),
                                ))
                            }
                        }
                    }
                    _ => {
                        return Err(self.defect(
                            desc.name,
                            format!("length field {} must be declared before", length_field),
                        ))
                    }
                }
            }
            check_rule(&desc.rule, &field.storage)
                .map_err(|reason| self.defect(desc.name, reason))?;
        }
        Ok(())
    }

    /// Build a decoder-defect error for `field` of this table.
    pub(crate) fn defect(&self, field: &'static str, reason: String) -> Error {
        Error::Decode {
            record: self.name,
            field,
            reason,
        }
    }
}

/// Check that `rule` can be applied to a field stored as `storage`.
pub(crate) fn check_rule(rule: &Rule, storage: &Storage) -> std::result::Result<(), String> {
    match (rule, storage) {
        (Rule::Scalar(kind), Storage::Float) | (Rule::Scalar(kind), Storage::Double) => {
            if kind.is_float() {
                Ok(())
            } else {
                Err(mismatch(rule, storage))
            }
        }
        (Rule::Scalar(kind), Storage::Int { size, .. }) => {
            if kind.is_float() || ![1, 2, 4, 8].contains(size) {
                Err(mismatch(rule, storage))
            } else {
                Ok(())
            }
        }
        (Rule::Scalar(kind), Storage::Bits { shift, width }) => {
            if kind.is_float() || *width == 0 || shift + width > 32 {
                Err(mismatch(rule, storage))
            } else {
                Ok(())
            }
        }
        (Rule::String, Storage::Chars(_)) | (Rule::String, Storage::CharPtr) => Ok(()),
        (Rule::Address, Storage::Ptr)
        | (Rule::Address, Storage::CharPtr)
        | (Rule::Address, Storage::StructPtr(_)) => Ok(()),
        (Rule::FixedArray(elem), Storage::Array(elem_storage, _)) => check_rule(elem, elem_storage),
        (Rule::NestedStruct { table, depth }, _) => check_nested(table, *depth, storage),
        (Rule::DynamicArray { table, .. }, Storage::StructPtr(layout)) => {
            if table.layout == *layout {
                table.validate().map_err(|e| e.to_string())
            } else {
                Err(format!("table {} does not read {}", table.name, layout.name))
            }
        }
        _ => Err(mismatch(rule, storage)),
    }
}

fn check_nested(
    table: &DescriptorTable,
    depth: u8,
    storage: &Storage,
) -> std::result::Result<(), String> {
    match (depth, storage) {
        (0, Storage::Struct(layout)) if table.layout == *layout => {
            table.validate().map_err(|e| e.to_string())
        }
        (0, Storage::Struct(layout)) => {
            Err(format!("table {} does not read {}", table.name, layout.name))
        }
        (d, Storage::Array(elem, _)) if d > 0 => check_nested(table, d - 1, elem),
        (d, _) => Err(format!(
            "nested {} at depth {} cannot read {:?}",
            table.name, d, storage
        )),
    }
}

pub(crate) fn mismatch(rule: &Rule, storage: &Storage) -> String {
    format!("rule {} cannot read {:?}", rule_name(rule), storage)
}

fn rule_name(rule: &Rule) -> String {
    match rule {
        Rule::Scalar(kind) => format!("Scalar({:?})", kind),
        Rule::String => "String".into(),
        Rule::Address => "Address".into(),
        Rule::FixedArray(elem) => format!("FixedArray({})", rule_name(elem)),
        Rule::NestedStruct { table, depth } => format!("NestedStruct({}, {})", table.name, depth),
        Rule::DynamicArray { table, length_field } => {
            format!("DynamicArray({}, {})", table.name, length_field)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::layout::FieldLayout;

    static LEAF: RecordLayout = RecordLayout {
        name: "leaf",
        size: 4,
        fields: &[FieldLayout {
            name: "v",
            offset: 0,
            storage: Storage::INT,
        }],
    };

    static LEAF_TABLE: DescriptorTable = DescriptorTable {
        name: "Leaf",
        layout: &LEAF,
        fields: &[Descriptor::new("v", Rule::Scalar(NumKind::I32))],
    };

    static LEAF_STORAGE: Storage = Storage::Struct(&LEAF);

    static OUTER: RecordLayout = RecordLayout {
        name: "outer",
        size: 32,
        fields: &[
            FieldLayout {
                name: "n",
                offset: 0,
                storage: Storage::INT,
            },
            FieldLayout {
                name: "items",
                offset: 8,
                storage: Storage::StructPtr(&LEAF),
            },
            FieldLayout {
                name: "cells",
                offset: 16,
                storage: Storage::Array(&LEAF_STORAGE, 4),
            },
        ],
    };

    static LATE_LENGTH: DescriptorTable = DescriptorTable {
        name: "Outer",
        layout: &OUTER,
        fields: &[
            Descriptor::new(
                "items",
                Rule::DynamicArray {
                    table: &LEAF_TABLE,
                    length_field: "n",
                },
            ),
            Descriptor::new("n", Rule::Scalar(NumKind::I32)),
        ],
    };

    static WRONG_DEPTH: DescriptorTable = DescriptorTable {
        name: "Outer",
        layout: &OUTER,
        fields: &[Descriptor::new(
            "cells",
            Rule::NestedStruct {
                table: &LEAF_TABLE,
                depth: 2,
            },
        )],
    };

    static UNKNOWN_FIELD: DescriptorTable = DescriptorTable {
        name: "Outer",
        layout: &OUTER,
        fields: &[Descriptor::new("missing", Rule::String)],
    };

    static GOOD: DescriptorTable = DescriptorTable {
        name: "Outer",
        layout: &OUTER,
        fields: &[
            Descriptor::new("n", Rule::Scalar(NumKind::U32)),
            Descriptor::new(
                "items",
                Rule::DynamicArray {
                    table: &LEAF_TABLE,
                    length_field: "n",
                },
            ),
            Descriptor::new(
                "cells",
                Rule::NestedStruct {
                    table: &LEAF_TABLE,
                    depth: 1,
                },
            ),
        ],
    };

    fn defect_field(table: &DescriptorTable) -> &'static str {
        match table.validate() {
            Err(Error::Decode { field, .. }) => field,
            other => panic!("expected a decode defect, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_good_table() {
        assert!(GOOD.validate().is_ok());
        assert_eq!(GOOD.position("items"), Some(1));
    }

    #[test]
    fn test_validate_defects() {
        assert_eq!(defect_field(&LATE_LENGTH), "items");
        assert_eq!(defect_field(&WRONG_DEPTH), "cells");
        assert_eq!(defect_field(&UNKNOWN_FIELD), "missing");
    }

    #[test]
    fn test_check_rule_mismatch() {
        assert!(check_rule(&Rule::String, &Storage::INT).is_err());
        assert!(check_rule(&Rule::Scalar(NumKind::I32), &Storage::Float).is_err());
        assert!(check_rule(&Rule::Scalar(NumKind::F64), &Storage::Float).is_ok());
        let strings = Storage::Array(&Storage::CharPtr, 3);
        assert!(check_rule(&Rule::FixedArray(&Rule::String), &strings).is_ok());
        assert!(check_rule(&Rule::Address, &Storage::Ptr).is_ok());
        let reason = check_rule(&Rule::Address, &Storage::INT).unwrap_err();
        assert_eq!(reason, "rule Address cannot read i32");
    }
}
