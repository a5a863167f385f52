//! Owned values produced by the decoder.

use std::fmt;

/// A decoded field value.
///
/// Values own all of their data; nothing points back into foreign memory.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A null `char *` or pointer.
    Null,
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// Text.
    Str(String),
    /// A non-null pointer, kept for display and comparison only.
    Addr(u64),
    /// An ordered sequence.
    List(Vec<Value>),
    /// A nested record.
    Record(Record),
}

impl Value {
    /// True for `Value::Null`.
    pub fn is_null(&self) -> bool {
        *self == Value::Null
    }

    /// Integer view of the value, if it is an integer that fits an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) if v <= i64::max_value() as u64 => Some(v as i64),
            _ => None,
        }
    }

    /// Unsigned view of the value, if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(v) if v >= 0 => Some(v as u64),
            Value::UInt(v) => Some(v),
            _ => None,
        }
    }

    /// Float view of the value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Text of the value. `None` for anything but `Value::Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of a `Value::List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Nested record of a `Value::Record`.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Convert to JSON. Addresses become hex strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Int(v) => Json::from(*v),
            Value::UInt(v) => Json::from(*v),
            Value::Float(v) => Json::from(*v),
            Value::Str(s) => Json::from(s.as_str()),
            Value::Addr(a) => Json::from(format!("{:#x}", a)),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(r) => r.to_json(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Addr(a) => write!(f, "{:#x}", a),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            // Nested records are always printed on one line.
            Value::Record(r) => write!(f, "{}", r),
        }
    }
}

/// A decoded foreign record: one named value per descriptor, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: &'static str,
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub(crate) fn with_capacity(type_name: &'static str, capacity: usize) -> Self {
        Record {
            type_name,
            fields: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, name: &'static str, value: Value) {
        self.fields.push((name, value));
    }

    /// Name of the record type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Value of a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Integer field, see [`Value::as_i64`].
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Text field, see [`Value::as_str`].
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Iterate fields in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the table had no descriptors.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert to a JSON object keeping field order.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(n, v)| ((*n).to_string(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// `{}` prints `Type(a=1, b="x")`, `{:#}` prints one field per line.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "{}(", self.type_name)?;
            for (name, value) in &self.fields {
                writeln!(f, "\t{}={}", name, value)?;
            }
            write!(f, ")")
        } else {
            write!(f, "{}(", self.type_name)?;
            for (i, (name, value)) in self.fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", name, value)?;
            }
            write!(f, ")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut tlb = Record::with_capacity("MhTlb", 2);
        tlb.push("type", Value::Int(1));
        tlb.push("num_entries", Value::Int(64));
        let mut r = Record::with_capacity("Sample", 4);
        r.push("name", Value::Str("cpu".into()));
        r.push("start", Value::Addr(0x400000));
        r.push("end", Value::Null);
        r.push("tlb", Value::List(vec![Value::Record(tlb)]));
        r
    }

    #[test]
    fn test_record_display() {
        let r = sample();
        assert_eq!(
            format!("{}", r),
            "Sample(name=\"cpu\", start=0x400000, end=None, tlb=[MhTlb(type=1, num_entries=64)])"
        );
        let long = format!("{:#}", r);
        assert!(long.starts_with("Sample(\n\tname=\"cpu\"\n"));
        assert!(long.ends_with("\tend=None\n\ttlb=[MhTlb(type=1, num_entries=64)]\n)"));
    }

    #[test]
    fn test_record_json_keeps_order() {
        let json = sample().to_json();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["name", "start", "end", "tlb"]);
        assert_eq!(json["start"], "0x400000");
        assert!(json["end"].is_null());
        assert_eq!(json["tlb"][0]["num_entries"], 64);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::UInt(7).as_i64(), Some(7));
        assert_eq!(Value::UInt(u64::max_value()).as_i64(), None);
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Str("x".into()).as_str(), Some("x"));
        assert!(Value::Null.is_null());
        let r = sample();
        assert_eq!(r.get_str("name"), Some("cpu"));
        assert_eq!(r.get("tlb").and_then(Value::as_list).map(|l| l.len()), Some(1));
        let names = r.iter().map(|(n, _)| n).collect::<Vec<_>>();
        assert_eq!(names, vec!["name", "start", "end", "tlb"]);
    }
}
